//! The cooperative scheduler.
//!
//! A single rendering thread owns every fiber. Producers on any thread mark
//! fibers dirty through a cloneable [`SchedulerHandle`]; each tick atomically
//! drains the dirty set into a working list, re-renders each fiber, diffs
//! against its retained tree, and hands the patches to the configured sink.
//! Marks landed mid-tick wait for the next tick - a fiber is never re-entered
//! within the tick that is rendering it.
//!
//! There are no coroutines here. A plain loop plus a dirty set is enough;
//! embeddings that interleave rendering with network I/O either call
//! [`Scheduler::tick`] from their own event loop or drive the async
//! [`Scheduler::run`], which parks on the wake channel between ticks.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_channel::mpsc::{UnboundedReceiver, UnboundedSender};
use futures_util::StreamExt;
use indexmap::IndexSet;
use slab::Slab;
use smallvec::SmallVec;
use tracing::{debug, error, trace};

use crate::diff::{DiffSession, MountedNode};
use crate::error::{RenderError, SchedulerError};
use crate::node::VNode;
use crate::patch::Patch;

/// Identifies one fiber for the lifetime of its scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct FiberId(pub u32);

impl fmt::Display for FiberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fiber-{}", self.0)
    }
}

/// What a render thunk produces: a tree, deliberately nothing (`None`, which
/// removes the fiber's output), or an error (which retires the fiber).
pub type RenderResult = Result<Option<VNode>, RenderError>;

/// Receives the patches of each re-rendered fiber, in tick order.
pub trait PatchSink {
    fn flush(&mut self, fiber: FiberId, patches: Vec<Patch>);
}

/// Collect patches for inspection; handy in tests and headless embeddings.
impl PatchSink for Vec<(FiberId, Vec<Patch>)> {
    fn flush(&mut self, fiber: FiberId, patches: Vec<Patch>) {
        self.push((fiber, patches));
    }
}

/// Hooks the reactive runtime installs around each render so signal reads
/// subscribe the right fiber. Kept as a trait so this crate does not depend
/// on any particular reactive implementation.
pub trait ReactiveBridge: Send + Sync {
    /// About to run `fiber`'s thunk: set the current-fiber pointer and drop
    /// the fiber's previous subscriptions.
    fn begin_render(&self, fiber: FiberId);
    /// The thunk returned: clear the pointer and store the collected
    /// dependencies.
    fn end_render(&self, fiber: FiberId);
    /// The fiber will never render again; unsubscribe it everywhere
    /// (best-effort - stale subscribers are tolerated).
    fn retire(&self, fiber: FiberId);
}

enum SchedulerMsg {
    Wake,
    Stop,
}

struct Shared {
    /// Insertion-ordered so tick fairness is the order marks arrived.
    dirty: Mutex<IndexSet<FiberId>>,
    sender: UnboundedSender<SchedulerMsg>,
}

/// Cloneable, thread-safe producer side of the scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    shared: Arc<Shared>,
}

impl SchedulerHandle {
    /// Mark a fiber dirty. Idempotent; safe from any thread.
    pub fn mark_dirty(&self, fiber: FiberId) {
        let inserted = self.shared.dirty.lock().unwrap().insert(fiber);
        if inserted {
            trace!(%fiber, "marked dirty");
        }
        let _ = self.shared.sender.unbounded_send(SchedulerMsg::Wake);
    }

    /// Ask the scheduler's `run` loop to exit after the current tick.
    pub fn stop(&self) {
        let _ = self.shared.sender.unbounded_send(SchedulerMsg::Stop);
    }
}

struct Fiber {
    render: Box<dyn FnMut() -> RenderResult>,
    /// Retained output of the most recent successful render, with its shadow.
    last: Option<(VNode, MountedNode)>,
}

/// Single-threaded loop of fibers over a shared diff session.
pub struct Scheduler {
    fibers: Slab<Fiber>,
    session: DiffSession,
    sink: Box<dyn PatchSink>,
    bridge: Option<Arc<dyn ReactiveBridge>>,
    shared: Arc<Shared>,
    receiver: UnboundedReceiver<SchedulerMsg>,
    /// Soft per-tick budget; work past it is deferred to the next tick.
    deadline: Option<Duration>,
    last_error: Arc<Mutex<Option<SchedulerError>>>,
    running: bool,
}

impl Scheduler {
    pub fn new(sink: Box<dyn PatchSink>) -> Scheduler {
        let (sender, receiver) = futures_channel::mpsc::unbounded();
        Scheduler {
            fibers: Slab::new(),
            session: DiffSession::new(),
            sink,
            bridge: None,
            shared: Arc::new(Shared {
                dirty: Mutex::new(IndexSet::new()),
                sender,
            }),
            receiver,
            deadline: None,
            last_error: Arc::new(Mutex::new(None)),
            running: false,
        }
    }

    /// Bound each tick (roughly a frame, ~16ms) so long dirty lists don't
    /// starve input handling. Unfinished fibers run first next tick.
    pub fn with_deadline(mut self, deadline: Duration) -> Scheduler {
        self.deadline = Some(deadline);
        self
    }

    pub fn set_reactive_bridge(&mut self, bridge: Arc<dyn ReactiveBridge>) {
        self.bridge = Some(bridge);
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            shared: self.shared.clone(),
        }
    }

    /// Register a fiber and schedule its first render for the next tick.
    pub fn create_fiber(&mut self, render: impl FnMut() -> RenderResult + 'static) -> FiberId {
        let entry = self.fibers.vacant_entry();
        let id = FiberId(entry.key() as u32);
        entry.insert(Fiber {
            render: Box::new(render),
            last: None,
        });
        self.handle().mark_dirty(id);
        debug!(fiber = %id, "fiber created");
        id
    }

    pub fn mark_dirty(&self, fiber: FiberId) {
        self.handle().mark_dirty(fiber);
    }

    /// Drop a fiber: it leaves the dirty set, its retained tree is cleared,
    /// and the reactive runtime forgets it. Never scheduled again.
    pub fn retire(&mut self, fiber: FiberId) {
        self.shared.dirty.lock().unwrap().shift_remove(&fiber);
        if self.fibers.try_remove(fiber.0 as usize).is_some() {
            debug!(%fiber, "fiber retired");
        }
        if let Some(bridge) = &self.bridge {
            bridge.retire(fiber);
        }
    }

    /// The most recent failure, if any (latest wins). Taking it clears the
    /// channel.
    pub fn take_error(&self) -> Option<SchedulerError> {
        self.last_error.lock().unwrap().take()
    }

    /// Ask [`run`](Self::run) to exit after the current tick.
    pub fn stop(&self) {
        self.handle().stop();
    }

    /// Run one tick: drain the dirty set and re-render each fiber in it, in
    /// mark order. Returns the number of fibers rendered.
    pub fn tick(&mut self) -> usize {
        let working: SmallVec<[FiberId; 8]> = {
            let mut dirty = self.shared.dirty.lock().unwrap();
            dirty.drain(..).collect()
        };
        if working.is_empty() {
            return 0;
        }
        trace!(fibers = working.len(), "tick start");

        let started = Instant::now();
        let mut rendered = 0;

        for (position, fiber_id) in working.iter().enumerate() {
            if let Some(deadline) = self.deadline {
                if position > 0 && started.elapsed() >= deadline {
                    self.defer(&working[position..]);
                    break;
                }
            }
            if self.render_fiber(*fiber_id) {
                rendered += 1;
            }
        }

        rendered
    }

    /// Put unfinished work back at the front of the dirty set, ahead of any
    /// marks that arrived mid-tick.
    fn defer(&self, remainder: &[FiberId]) {
        let mut dirty = self.shared.dirty.lock().unwrap();
        let mut rebuilt: IndexSet<FiberId> = remainder.iter().copied().collect();
        rebuilt.extend(dirty.drain(..));
        *dirty = rebuilt;
        let _ = self.shared.sender.unbounded_send(SchedulerMsg::Wake);
        debug!(deferred = remainder.len(), "tick deadline reached");
    }

    fn render_fiber(&mut self, fiber_id: FiberId) -> bool {
        let Some(fiber) = self.fibers.get_mut(fiber_id.0 as usize) else {
            // Retired after being marked; nothing to do.
            return false;
        };

        if let Some(bridge) = &self.bridge {
            bridge.begin_render(fiber_id);
        }
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (fiber.render)()));
        if let Some(bridge) = &self.bridge {
            bridge.end_render(fiber_id);
        }

        match outcome {
            Ok(Ok(next)) => {
                let prev = fiber.last.take();
                let (patches, shadow) = self
                    .session
                    .diff(prev.as_ref().map(|(tree, m)| (tree, m)), next.as_ref());
                fiber.last = next.zip(shadow);
                if !patches.is_empty() {
                    self.sink.flush(fiber_id, patches);
                }
                true
            }
            Ok(Err(err)) => {
                error!(%fiber_id, %err, "render failed; retiring fiber");
                *self.last_error.lock().unwrap() = Some(SchedulerError::RenderFailed {
                    fiber: fiber_id,
                    source: err,
                });
                self.retire(fiber_id);
                false
            }
            Err(panic_payload) => {
                let message = panic_message(panic_payload);
                error!(%fiber_id, panic = %message, "render panicked; retiring fiber");
                *self.last_error.lock().unwrap() = Some(SchedulerError::RenderPanic {
                    fiber: fiber_id,
                    message,
                });
                self.retire(fiber_id);
                false
            }
        }
    }

    /// Drive ticks until [`SchedulerHandle::stop`] is called, parking on the
    /// wake channel whenever the dirty set is empty.
    pub async fn run(&mut self) {
        self.running = true;
        while self.running {
            self.tick();
            match self.receiver.next().await {
                Some(SchedulerMsg::Wake) => self.drain_messages(),
                Some(SchedulerMsg::Stop) | None => self.running = false,
            }
        }
    }

    /// Coalesce queued wakeups so one tick serves them all.
    fn drain_messages(&mut self) {
        while let Ok(Some(msg)) = self.receiver.try_next() {
            if let SchedulerMsg::Stop = msg {
                self.running = false;
            }
        }
    }

    /// Tick until the dirty set stays empty. Convenient for tests and
    /// synchronous embeddings.
    pub fn run_until_idle(&mut self) -> usize {
        let mut total = 0;
        loop {
            let rendered = self.tick();
            if rendered == 0 && self.shared.dirty.lock().unwrap().is_empty() {
                break;
            }
            total += rendered;
        }
        total
    }

    /// Retained tree of a fiber, if it has rendered.
    pub fn last_tree(&self, fiber: FiberId) -> Option<&VNode> {
        self.fibers
            .get(fiber.0 as usize)
            .and_then(|f| f.last.as_ref())
            .map(|(tree, _)| tree)
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
