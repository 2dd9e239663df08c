//! Writable reactive values.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use vango_core::FiberId;

use crate::runtime::{notify, record_read, DependencySource, Runtime, RuntimeInner, Subs};

/// A writable value with a set of subscribed fibers.
///
/// Reads during a tracked render subscribe the rendering fiber; writes mark
/// every subscriber dirty (or add them to the active batch). All operations
/// are safe from any thread.
pub struct State<T: 'static> {
    inner: Arc<StateInner<T>>,
}

pub(crate) struct StateInner<T> {
    rt: Arc<RuntimeInner>,
    value: RwLock<T>,
    subs: Mutex<Subs>,
}

impl<T: Send + Sync + 'static> State<T> {
    pub fn new_in(rt: &Runtime, value: T) -> State<T> {
        State {
            inner: Arc::new(StateInner {
                rt: rt.inner.clone(),
                value: RwLock::new(value),
                subs: Mutex::new(Subs::default()),
            }),
        }
    }

    fn track(&self) {
        let source = Arc::downgrade(&self.inner) as Weak<dyn DependencySource>;
        record_read(&self.inner.rt, &self.inner.subs, source);
    }

    /// Tracked read.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.track();
        self.inner.value.read().clone()
    }

    /// Tracked borrowing read, for values too big to clone.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.inner.value.read())
    }

    /// Untracked read: no subscription, no re-render on change.
    pub fn peek(&self) -> T
    where
        T: Clone,
    {
        self.inner.value.read().clone()
    }

    pub fn set(&self, value: T) {
        *self.inner.value.write() = value;
        notify(&self.inner.rt, &self.inner.subs);
    }

    /// Atomic read-modify-write.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        {
            let mut value = self.inner.value.write();
            f(&mut value);
        }
        notify(&self.inner.rt, &self.inner.subs);
    }

    /// How many fibers are currently subscribed (stale entries included
    /// until the next write prunes them).
    pub fn subscriber_count(&self) -> usize {
        self.inner.subs.lock().fiber_count()
    }
}

impl<T> Clone for State<T> {
    fn clone(&self) -> Self {
        State {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + Sync> DependencySource for StateInner<T> {
    fn unsubscribe_fiber(&self, fiber: FiberId) {
        self.subs.lock().remove_fiber(fiber);
    }

    fn unsubscribe_computed(&self, key: u64) {
        self.subs.lock().remove_computed(key);
    }
}
