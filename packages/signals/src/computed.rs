//! Derived reactive values with caching.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;
use vango_core::FiberId;

use crate::runtime::{
    next_computed_key, notify, pop_scope, push_scope, record_read, DependencySource, Invalidate,
    Runtime, RuntimeInner, ScopeSubscriber, Subs,
};

/// A cached derivation. The thunk re-runs only when a dependency changed
/// since the last read; reading a valid computed costs a clone.
///
/// Computeds are both subscribers (of the signals their thunk reads) and
/// signals (fibers and other computeds subscribe to them), so invalidation
/// ripples through derivation chains without recomputing anything eagerly.
pub struct Computed<T: 'static> {
    inner: Arc<ComputedInner<T>>,
}

struct ComputedInner<T> {
    rt: Arc<RuntimeInner>,
    key: u64,
    compute: Mutex<Box<dyn FnMut() -> T + Send>>,
    value: Mutex<Option<T>>,
    valid: AtomicBool,
    subs: Mutex<Subs>,
    /// Unsubscribe handles for the dependencies of the latest run.
    deps: Mutex<Vec<Weak<dyn DependencySource>>>,
}

impl<T: Clone + Send + Sync + 'static> Computed<T> {
    pub fn new_in(rt: &Runtime, compute: impl FnMut() -> T + Send + 'static) -> Computed<T> {
        Computed {
            inner: Arc::new(ComputedInner {
                rt: rt.inner.clone(),
                key: next_computed_key(),
                compute: Mutex::new(Box::new(compute)),
                value: Mutex::new(None),
                valid: AtomicBool::new(false),
                subs: Mutex::new(Subs::default()),
                deps: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn get(&self) -> T {
        if !self.inner.valid.load(Ordering::Acquire) {
            self.recompute();
        }
        let source = Arc::downgrade(&self.inner) as Weak<dyn DependencySource>;
        record_read(&self.inner.rt, &self.inner.subs, source);
        self.inner
            .value
            .lock()
            .clone()
            .expect("computed holds a value after recompute")
    }

    /// Whether the cache is current. Mostly for tests and diagnostics.
    pub fn is_valid(&self) -> bool {
        self.inner.valid.load(Ordering::Acquire)
    }

    fn recompute(&self) {
        // Drop the previous run's subscriptions; the tracked run below
        // collects the current ones.
        for dep in self.inner.deps.lock().drain(..) {
            if let Some(dep) = dep.upgrade() {
                dep.unsubscribe_computed(self.inner.key);
            }
        }

        let hook = Arc::downgrade(&self.inner) as Weak<dyn Invalidate>;
        push_scope(
            self.inner.rt.id,
            ScopeSubscriber::Computed {
                key: self.inner.key,
                hook,
            },
        );
        let mut thunk = self.inner.compute.lock();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (*thunk)()));
        drop(thunk);
        let collected = pop_scope();

        match outcome {
            Ok(value) => {
                *self.inner.deps.lock() = collected;
                *self.inner.value.lock() = Some(value);
                self.inner.valid.store(true, Ordering::Release);
                trace!(key = self.inner.key, "computed refreshed");
            }
            Err(panic) => panic::resume_unwind(panic),
        }
    }
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Computed {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + Sync> Invalidate for ComputedInner<T> {
    fn invalidate(&self) {
        // Only the first invalidation propagates; the cache stays stale
        // until the next read.
        if self.valid.swap(false, Ordering::AcqRel) {
            notify(&self.rt, &self.subs);
        }
    }
}

impl<T: Send + Sync> DependencySource for ComputedInner<T> {
    fn unsubscribe_fiber(&self, fiber: FiberId) {
        self.subs.lock().remove_fiber(fiber);
    }

    fn unsubscribe_computed(&self, key: u64) {
        self.subs.lock().remove_computed(key);
    }
}
