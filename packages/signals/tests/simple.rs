// tests simple signal handling
use std::sync::{Arc, Mutex};

use vango_core::{FiberId, ReactiveBridge};
use vango_signals::{Runtime, State};

fn recording_runtime() -> (Runtime, Arc<Mutex<Vec<FiberId>>>) {
    let marked = Arc::new(Mutex::new(Vec::new()));
    let sink = marked.clone();
    let rt = Runtime::new(move |fiber| sink.lock().unwrap().push(fiber));
    (rt, marked)
}

#[test]
fn creation_and_updates() {
    let (rt, _) = recording_runtime();
    let signal = State::new_in(&rt, 0);
    assert_eq!(signal.get(), 0);
    signal.update(|v| *v = 1);
    assert_eq!(signal.get(), 1);
    signal.set(5);
    assert_eq!(signal.peek(), 5);
}

#[test]
fn reads_during_a_tracked_render_subscribe() {
    let (rt, marked) = recording_runtime();
    let signal = State::new_in(&rt, 0);

    rt.track_fiber(FiberId(3), || {
        let _ = signal.get();
    });
    assert_eq!(signal.subscriber_count(), 1);

    signal.set(1);
    assert_eq!(*marked.lock().unwrap(), vec![FiberId(3)]);
}

#[test]
fn untracked_reads_do_not_subscribe() {
    let (rt, marked) = recording_runtime();
    let signal = State::new_in(&rt, 0);

    let _ = signal.get();
    rt.track_fiber(FiberId(1), || {
        let _ = signal.peek();
    });

    signal.set(1);
    assert!(marked.lock().unwrap().is_empty());
}

#[test]
fn rerender_refreshes_subscriptions() {
    let (rt, marked) = recording_runtime();
    let a = State::new_in(&rt, 0);
    let b = State::new_in(&rt, 0);

    // First render reads `a`, second only `b`.
    rt.track_fiber(FiberId(0), || {
        let _ = a.get();
    });
    rt.track_fiber(FiberId(0), || {
        let _ = b.get();
    });

    a.set(1);
    assert!(
        marked.lock().unwrap().is_empty(),
        "stale subscription should have been dropped on re-render"
    );

    b.set(1);
    assert_eq!(*marked.lock().unwrap(), vec![FiberId(0)]);
}

#[test]
fn retired_fibers_are_pruned_lazily() {
    let (rt, marked) = recording_runtime();
    let signal = State::new_in(&rt, 0);

    rt.track_fiber(FiberId(0), || {
        let _ = signal.get();
    });
    assert_eq!(rt.fiber_count(), 1);
    rt.retire(FiberId(0));
    assert_eq!(rt.fiber_count(), 0);

    signal.set(1);
    assert!(marked.lock().unwrap().is_empty());
    assert_eq!(signal.subscriber_count(), 0, "dead subscriber pruned on write");
}

#[test]
fn writes_reach_every_subscriber() {
    let (rt, marked) = recording_runtime();
    let signal = State::new_in(&rt, 0);

    for fiber in 0..3 {
        rt.track_fiber(FiberId(fiber), || {
            let _ = signal.get();
        });
    }

    signal.set(7);
    let mut seen = marked.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec![FiberId(0), FiberId(1), FiberId(2)]);
}

#[test]
fn with_borrows_without_cloning() {
    let (rt, marked) = recording_runtime();
    let signal = State::new_in(&rt, vec![1, 2, 3]);

    let sum: i32 = rt.track_fiber(FiberId(0), || signal.with(|v| v.iter().sum()));
    assert_eq!(sum, 6);

    signal.update(|v| v.push(4));
    assert_eq!(*marked.lock().unwrap(), vec![FiberId(0)]);
}
