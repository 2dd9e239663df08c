//! The reactive runtime: dependency tracking scopes, subscriber sets, and
//! the bridge the scheduler drives around each render.
//!
//! Tracking uses a thread-local stack of scopes. The scheduler (or
//! [`Runtime::track_fiber`]) pushes a scope before a render thunk runs;
//! every signal read while the scope is on top records the scope's
//! subscriber in the signal's set and hands the scope a weak unsubscribe
//! handle. When the scope pops, the collected handles become the fiber's
//! dependency list, so the next render can drop the old subscriptions first.
//!
//! Signals and fibers reference each other cyclically; the cycle is broken
//! by keying fibers with plain ids and storing only weak handles on the
//! fiber side. Retired fibers left in a subscriber set are pruned lazily
//! during the next write.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;
use vango_core::{FiberId, ReactiveBridge};

static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_COMPUTED_KEY: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_computed_key() -> u64 {
    NEXT_COMPUTED_KEY.fetch_add(1, Ordering::Relaxed)
}

/// A signal's side of the back-edge: remove one subscriber.
pub(crate) trait DependencySource: Send + Sync {
    fn unsubscribe_fiber(&self, fiber: FiberId);
    fn unsubscribe_computed(&self, key: u64);
}

/// Cached nodes that must be told when a dependency changed.
pub(crate) trait Invalidate: Send + Sync {
    fn invalidate(&self);
}

/// Who is currently rendering / recomputing.
pub(crate) enum ScopeSubscriber {
    Fiber(FiberId),
    Computed { key: u64, hook: Weak<dyn Invalidate> },
}

pub(crate) struct TrackScope {
    runtime: u64,
    subscriber: ScopeSubscriber,
    collected: Vec<Weak<dyn DependencySource>>,
}

struct BatchScope {
    runtime: u64,
    fibers: FxHashSet<FiberId>,
}

thread_local! {
    static SCOPES: RefCell<Vec<TrackScope>> = const { RefCell::new(Vec::new()) };
    static BATCHES: RefCell<Vec<BatchScope>> = const { RefCell::new(Vec::new()) };
}

/// Subscribers of one signal.
#[derive(Default)]
pub(crate) struct Subs {
    fibers: FxHashSet<FiberId>,
    computeds: FxHashMap<u64, Weak<dyn Invalidate>>,
}

impl Subs {
    pub(crate) fn remove_fiber(&mut self, fiber: FiberId) {
        self.fibers.remove(&fiber);
    }

    pub(crate) fn remove_computed(&mut self, key: u64) {
        self.computeds.remove(&key);
    }

    pub(crate) fn fiber_count(&self) -> usize {
        self.fibers.len()
    }
}

pub(crate) struct RuntimeInner {
    pub(crate) id: u64,
    mark_dirty: Box<dyn Fn(FiberId) + Send + Sync>,
    /// Live fibers and the dependency handles collected by their most recent
    /// render.
    fibers: Mutex<FxHashMap<FiberId, Vec<Weak<dyn DependencySource>>>>,
}

impl RuntimeInner {
    /// Route a dirty mark through the innermost batch on this thread, if one
    /// is open for this runtime.
    fn dispatch_dirty(&self, fiber: FiberId) {
        let batched = BATCHES.with(|batches| {
            let mut batches = batches.borrow_mut();
            match batches.last_mut() {
                Some(top) if top.runtime == self.id => {
                    top.fibers.insert(fiber);
                    true
                }
                _ => false,
            }
        });
        if !batched {
            (self.mark_dirty)(fiber);
        }
    }

    fn is_live(&self, fiber: FiberId) -> bool {
        self.fibers.lock().contains_key(&fiber)
    }
}

/// Record a tracked read: subscribe the current scope to `subs` and hand it
/// the unsubscribe handle. Reads outside any scope, or under a scope of a
/// different runtime, subscribe nothing.
pub(crate) fn record_read(
    rt: &RuntimeInner,
    subs: &Mutex<Subs>,
    source: Weak<dyn DependencySource>,
) {
    SCOPES.with(|scopes| {
        let mut scopes = scopes.borrow_mut();
        let Some(top) = scopes.last_mut() else { return };
        if top.runtime != rt.id {
            return;
        }
        match &top.subscriber {
            ScopeSubscriber::Fiber(fiber) => {
                subs.lock().fibers.insert(*fiber);
            }
            ScopeSubscriber::Computed { key, hook } => {
                subs.lock().computeds.insert(*key, hook.clone());
            }
        }
        top.collected.push(source);
    });
}

/// Notify every subscriber of a changed signal: live fibers are marked dirty
/// (or batched), computeds are invalidated and propagate to their own
/// subscribers. Dead entries found along the way are pruned.
pub(crate) fn notify(rt: &RuntimeInner, subs: &Mutex<Subs>) {
    let (fibers, computeds) = {
        let subs = subs.lock();
        (
            subs.fibers.iter().copied().collect::<Vec<_>>(),
            subs.computeds.clone(),
        )
    };

    let mut dead_fibers = Vec::new();
    for fiber in fibers {
        if rt.is_live(fiber) {
            rt.dispatch_dirty(fiber);
        } else {
            dead_fibers.push(fiber);
        }
    }

    let mut dead_computeds = Vec::new();
    for (key, hook) in computeds {
        match hook.upgrade() {
            Some(computed) => computed.invalidate(),
            None => dead_computeds.push(key),
        }
    }

    if !dead_fibers.is_empty() || !dead_computeds.is_empty() {
        let mut subs = subs.lock();
        for fiber in dead_fibers {
            subs.fibers.remove(&fiber);
        }
        for key in dead_computeds {
            subs.computeds.remove(&key);
        }
    }
}

pub(crate) fn push_scope(runtime: u64, subscriber: ScopeSubscriber) {
    SCOPES.with(|scopes| {
        scopes.borrow_mut().push(TrackScope {
            runtime,
            subscriber,
            collected: Vec::new(),
        })
    });
}

pub(crate) fn pop_scope() -> Vec<Weak<dyn DependencySource>> {
    SCOPES.with(|scopes| {
        scopes
            .borrow_mut()
            .pop()
            .expect("tracking scope stack underflow")
            .collected
    })
}

pub(crate) fn unsubscribe_all(fiber: FiberId, deps: Vec<Weak<dyn DependencySource>>) {
    for dep in deps {
        if let Some(dep) = dep.upgrade() {
            dep.unsubscribe_fiber(fiber);
        }
    }
}

/// The reactive graph's shared state. Cheap to clone; all signals created
/// through a runtime keep it alive.
#[derive(Clone)]
pub struct Runtime {
    pub(crate) inner: Arc<RuntimeInner>,
}

impl Runtime {
    /// `mark_dirty` is how changed signals reach the scheduler - typically
    /// `SchedulerHandle::mark_dirty`, but any thread-safe callback works.
    pub fn new(mark_dirty: impl Fn(FiberId) + Send + Sync + 'static) -> Runtime {
        Runtime {
            inner: Arc::new(RuntimeInner {
                id: NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed),
                mark_dirty: Box::new(mark_dirty),
                fibers: Mutex::new(FxHashMap::default()),
            }),
        }
    }

    /// Run `f` with reads tracked for `fiber`, exactly as the scheduler does
    /// around a render thunk. Mostly useful in tests and custom embeddings.
    pub fn track_fiber<R>(&self, fiber: FiberId, f: impl FnOnce() -> R) -> R {
        struct Guard<'a>(&'a Runtime, FiberId);
        impl Drop for Guard<'_> {
            fn drop(&mut self) {
                self.0.end_render(self.1);
            }
        }
        self.begin_render(fiber);
        let _guard = Guard(self, fiber);
        f()
    }

    /// Number of live (registered) fibers.
    pub fn fiber_count(&self) -> usize {
        self.inner.fibers.lock().len()
    }
}

impl ReactiveBridge for Runtime {
    fn begin_render(&self, fiber: FiberId) {
        let old = self
            .inner
            .fibers
            .lock()
            .insert(fiber, Vec::new())
            .unwrap_or_default();
        unsubscribe_all(fiber, old);
        push_scope(self.inner.id, ScopeSubscriber::Fiber(fiber));
        trace!(%fiber, "tracking render");
    }

    fn end_render(&self, fiber: FiberId) {
        let collected = pop_scope();
        self.inner.fibers.lock().insert(fiber, collected);
    }

    fn retire(&self, fiber: FiberId) {
        if let Some(deps) = self.inner.fibers.lock().remove(&fiber) {
            unsubscribe_all(fiber, deps);
        }
        trace!(%fiber, "fiber forgotten");
    }
}

/// Group writes: every fiber dirtied inside `f` is collected and flushed
/// exactly once when the batch exits. An inner (nested) batch collects its
/// own marks and flushes on its own exit; the outer batch then resumes.
pub fn batch<R>(rt: &Runtime, f: impl FnOnce() -> R) -> R {
    BATCHES.with(|batches| {
        batches.borrow_mut().push(BatchScope {
            runtime: rt.inner.id,
            fibers: FxHashSet::default(),
        })
    });

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

    let scope = BATCHES.with(|batches| {
        batches
            .borrow_mut()
            .pop()
            .expect("batch stack underflow")
    });

    // Flush in ascending fiber order so the scheduler's working list is
    // deterministic regardless of write order inside the batch.
    let mut fibers: Vec<FiberId> = scope.fibers.into_iter().collect();
    fibers.sort_unstable();
    for fiber in fibers {
        if rt.inner.is_live(fiber) {
            (rt.inner.mark_dirty)(fiber);
        }
    }

    match result {
        Ok(value) => value,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
