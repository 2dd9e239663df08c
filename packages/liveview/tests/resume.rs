//! The resume protocol end to end: a client that lost the tail of the
//! stream replays it after a Hello and converges on the same host state as
//! an uninterrupted client.

use vango_core::{NodeId, Patch, Props, VNode};
use vango_dom::{HostApplier, MemoryDom};
use vango_liveview::{ClientEvent, HelloOutcome, LiveClient, LiveSession};

fn batches() -> Vec<Vec<Patch>> {
    let row = |label: &str| {
        VNode::element("li", Props::new(), vec![VNode::text(label)]).with_key(label)
    };
    vec![
        // seq 1: mount <ul><li>a</li></ul>
        vec![Patch::InsertNode {
            parent: NodeId::ROOT,
            before: NodeId::ROOT,
            subtree: VNode::element("ul", Props::new(), vec![row("a")]),
        }],
        // seq 2: append <li>b</li>
        vec![Patch::InsertNode {
            parent: NodeId(1),
            before: NodeId::ROOT,
            subtree: row("b"),
        }],
        // seq 3: rewrite the first label
        vec![Patch::ReplaceText {
            node: NodeId(3),
            text: "a!".into(),
        }],
    ]
}

fn drive(client: &mut LiveClient, applier: &mut HostApplier<MemoryDom>, frame: &[u8]) {
    match client.feed(frame).unwrap() {
        ClientEvent::Patches(patches) => applier.apply(&patches).unwrap(),
        other => panic!("expected patches, got {other:?}"),
    }
}

#[test]
fn resume_after_interruption_converges() {
    let mut session = LiveSession::new();
    let frames: Vec<Vec<u8>> = batches().iter().map(|b| session.push_patches(b)).collect();

    // Baseline client sees everything.
    let mut baseline_client = LiveClient::new();
    let mut baseline = HostApplier::new(MemoryDom::new());
    for frame in &frames {
        drive(&mut baseline_client, &mut baseline, frame);
    }

    // Interrupted client processes 1 and 2; the transport dies before 3.
    let mut client = LiveClient::new();
    let mut applier = HostApplier::new(MemoryDom::new());
    drive(&mut client, &mut applier, &frames[0]);
    drive(&mut client, &mut applier, &frames[1]);
    assert_eq!(client.last_seq(), 2);

    // Reconnect: Hello{resumable, last_seq: 2} resumes at seq 3.
    let hello = client.hello();
    let decoded = vango_liveview::decode_frame(&hello).unwrap();
    assert_eq!(
        decoded,
        vango_liveview::Frame::Hello {
            resumable: true,
            last_seq: 2
        }
    );
    let outcome = session.handle_hello(true, 2);
    let HelloOutcome::Resume(replay) = outcome else {
        panic!("expected resume");
    };
    assert_eq!(replay.len(), 1);
    for frame in &replay {
        drive(&mut client, &mut applier, frame);
    }

    assert_eq!(applier.host().mirror(), baseline.host().mirror());
    assert_eq!(client.last_seq(), baseline_client.last_seq());
}

#[test]
fn caught_up_client_resumes_with_nothing() {
    let mut session = LiveSession::new();
    let frames: Vec<Vec<u8>> = batches().iter().map(|b| session.push_patches(b)).collect();
    assert_eq!(frames.len(), 3);

    assert_eq!(session.handle_hello(true, 3), HelloOutcome::Resume(vec![]));
}

#[test]
fn non_resumable_clients_get_full_resync() {
    let client = LiveClient::non_resumable();
    let hello = vango_liveview::decode_frame(&client.hello()).unwrap();
    let vango_liveview::Frame::Hello { resumable, .. } = hello else {
        panic!("expected hello");
    };
    assert!(!resumable);

    let mut session = LiveSession::new();
    session.push_patches(&batches()[0]);
    assert_eq!(session.handle_hello(resumable, 1), HelloOutcome::FullResync);
}

#[test]
fn evicted_history_forces_full_resync() {
    let mut session = LiveSession::with_window(1);
    for batch in batches() {
        session.push_patches(&batch);
    }
    // Only seq 3 is retained; a client at 1 cannot be replayed.
    assert_eq!(session.handle_hello(true, 1), HelloOutcome::FullResync);
    // A client at 2 can.
    assert!(matches!(
        session.handle_hello(true, 2),
        HelloOutcome::Resume(frames) if frames.len() == 1
    ));
}

#[test]
fn client_ahead_of_server_is_impossible_state() {
    let mut session = LiveSession::new();
    session.push_patches(&batches()[0]);
    assert_eq!(session.handle_hello(true, 9), HelloOutcome::FullResync);
}

#[test]
fn out_of_order_frames_are_not_applied() {
    let mut session = LiveSession::new();
    let frames: Vec<Vec<u8>> = batches().iter().map(|b| session.push_patches(b)).collect();

    let mut client = LiveClient::new();
    let mut applier = HostApplier::new(MemoryDom::new());
    drive(&mut client, &mut applier, &frames[0]);

    // Frame 3 arrives with 2 missing.
    let event = client.feed(&frames[2]).unwrap();
    assert_eq!(
        event,
        ClientEvent::OutOfSync {
            expected: 2,
            got: 3
        }
    );
    assert_eq!(client.last_seq(), 1, "gap must not advance the cursor");
}

#[test]
fn registry_hands_back_the_same_session() {
    use vango_liveview::SessionRegistry;

    let registry = SessionRegistry::new();
    let session = registry.get_or_create("sess-1");
    session.lock().unwrap().push_patches(&batches()[0]);

    // A reconnect under the same id sees the retained state.
    let again = registry.get_or_create("sess-1");
    assert_eq!(again.lock().unwrap().last_seq(), 1);
    assert_eq!(registry.len(), 1);

    registry.remove("sess-1");
    assert!(registry.is_empty());
    assert_eq!(registry.get_or_create("sess-1").lock().unwrap().last_seq(), 0);
}

#[test]
fn full_resync_resets_the_cursor() {
    let mut client = LiveClient::new();
    let mut session = LiveSession::new();
    let frame = session.push_patches(&batches()[0]);
    let mut applier = HostApplier::new(MemoryDom::new());
    drive(&mut client, &mut applier, &frame);

    let resync = vango_liveview::encode_frame(&vango_liveview::Frame::FullResync);
    assert_eq!(client.feed(&resync).unwrap(), ClientEvent::FullResync);
    assert_eq!(client.last_seq(), 0);

    // The embedding resets its applier and the fresh stream replays cleanly.
    applier.reset();
    session.reset();
    let frame = session.push_patches(&batches()[0]);
    drive(&mut client, &mut applier, &frame);
}
