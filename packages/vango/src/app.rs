//! Wires the scheduler to the reactive runtime.

use std::sync::Arc;

use vango_core::{FiberId, PatchSink, RenderResult, Scheduler, SchedulerHandle, VNode};
use vango_signals::{Computed, Runtime, State};

/// A scheduler and a reactive runtime bound together: signal writes mark
/// fibers dirty, renders track signal reads.
pub struct App {
    scheduler: Scheduler,
    runtime: Runtime,
}

impl App {
    pub fn new(sink: Box<dyn PatchSink>) -> App {
        let mut scheduler = Scheduler::new(sink);
        let handle = scheduler.handle();
        let runtime = Runtime::new(move |fiber| handle.mark_dirty(fiber));
        scheduler.set_reactive_bridge(Arc::new(runtime.clone()));
        App { scheduler, runtime }
    }

    /// Mount a component: its renders are tracked, and it re-runs whenever a
    /// signal it read changes.
    pub fn component(&mut self, mut render: impl FnMut() -> VNode + 'static) -> FiberId {
        self.scheduler.create_fiber(move || Ok(Some(render())))
    }

    /// Mount a fiber with the full render contract (fallible, may produce
    /// nothing).
    pub fn fiber(&mut self, render: impl FnMut() -> RenderResult + 'static) -> FiberId {
        self.scheduler.create_fiber(render)
    }

    pub fn state<T: Send + Sync + 'static>(&self, value: T) -> State<T> {
        State::new_in(&self.runtime, value)
    }

    pub fn computed<T: Clone + Send + Sync + 'static>(
        &self,
        compute: impl FnMut() -> T + Send + 'static,
    ) -> Computed<T> {
        Computed::new_in(&self.runtime, compute)
    }

    /// Group writes so each affected fiber renders once.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        vango_signals::batch(&self.runtime, f)
    }

    pub fn tick(&mut self) -> usize {
        self.scheduler.tick()
    }

    pub fn run_until_idle(&mut self) -> usize {
        self.scheduler.run_until_idle()
    }

    pub async fn run(&mut self) {
        self.scheduler.run().await
    }

    pub fn handle(&self) -> SchedulerHandle {
        self.scheduler.handle()
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }
}
