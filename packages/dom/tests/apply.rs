//! Apply-faithfulness: a host that mirrored `prev`, fed `diff(prev, next)`,
//! mirrors `next`.

use vango_core::{diff::DiffSession, events, NodeId, Patch, Props, VNode};
use vango_dom::{ApplyError, HostApplier, MemoryDom};

/// What a host can know about a tree: no keys, no refs, no handler tokens.
fn normalized(node: &VNode) -> VNode {
    let children = node.children().iter().map(normalized).collect();
    match node {
        VNode::Element(el) => {
            let props: Props = el
                .props
                .iter()
                .filter(|(k, _)| *k != "key" && *k != "ref" && !events::is_event_prop(k))
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect();
            VNode::element(el.tag.clone(), props, children)
        }
        VNode::Text(t) => VNode::text(t.text.clone()),
        VNode::Fragment(_) => VNode::fragment(children),
        VNode::Portal(p) => VNode::portal(p.target.clone(), children),
    }
}

fn item(key: &str, label: &str) -> VNode {
    VNode::element("li", Props::new(), vec![VNode::text(label)]).with_key(key)
}

#[test]
fn mount_then_mutate_mirrors_next() {
    let prev = VNode::element(
        "div",
        Props::new().with("class", "old"),
        vec![VNode::text("hello")],
    );
    let next = VNode::element(
        "div",
        Props::new().with("class", "new").with("id", "x"),
        vec![VNode::text("goodbye"), VNode::element("hr", Props::new(), vec![])],
    );

    let mut session = DiffSession::new();
    let mut applier = HostApplier::new(MemoryDom::new());

    let (mount, shadow) = session.diff(None, Some(&prev));
    applier.apply(&mount).unwrap();
    assert_eq!(applier.host().mirror(), vec![normalized(&prev)]);

    let shadow = shadow.unwrap();
    let (patches, _) = session.diff(Some((&prev, &shadow)), Some(&next));
    applier.apply(&patches).unwrap();
    assert_eq!(applier.host().mirror(), vec![normalized(&next)]);
}

#[test]
fn keyed_reorder_preserves_host_identity() {
    let prev = VNode::element(
        "ul",
        Props::new(),
        vec![item("a", "one"), item("b", "two"), item("c", "three")],
    );
    let next = VNode::element(
        "ul",
        Props::new(),
        vec![item("c", "three"), item("a", "one"), item("b", "two")],
    );

    let mut session = DiffSession::new();
    let mut applier = HostApplier::new(MemoryDom::new());

    let (mount, shadow) = session.diff(None, Some(&prev));
    applier.apply(&mount).unwrap();

    // li "c" was third in preorder: ul=1, a=2, text=3, b=4, text=5, c=6.
    let c_before = applier.handle(NodeId(6)).copied().unwrap();

    let (patches, _) = session.diff(Some((&prev, &shadow.unwrap())), Some(&next));
    assert!(patches.iter().all(|p| matches!(p, Patch::MoveNode { .. })));
    applier.apply(&patches).unwrap();

    assert_eq!(applier.host().mirror(), vec![normalized(&next)]);
    // Moved, not recreated.
    assert_eq!(applier.handle(NodeId(6)).copied().unwrap(), c_before);
}

#[test]
fn event_updates_reach_the_host() {
    let prev = VNode::element(
        "button",
        Props::new().with("onClick", vango_core::HandlerId(5)),
        vec![],
    );
    let next = VNode::element("button", Props::new(), vec![]);

    let mut session = DiffSession::new();
    let mut applier = HostApplier::new(MemoryDom::new());

    let (mount, shadow) = session.diff(None, Some(&prev));
    applier.apply(&mount).unwrap();
    let button = applier.handle(NodeId(1)).copied().unwrap();
    assert_eq!(applier.host().subscriptions(button), 1 << 0);
    assert_eq!(applier.mask(NodeId(1)), 1 << 0);

    let (patches, _) = session.diff(Some((&prev, &shadow.unwrap())), Some(&next));
    applier.apply(&patches).unwrap();
    assert_eq!(applier.host().subscriptions(button), 0);
    assert_eq!(applier.mask(NodeId(1)), 0);
}

#[test]
fn removal_retires_the_whole_id_subtree() {
    let tree = VNode::element(
        "div",
        Props::new(),
        vec![VNode::element(
            "ul",
            Props::new(),
            vec![item("a", "one"), item("b", "two")],
        )],
    );

    let mut session = DiffSession::new();
    let mut applier = HostApplier::new(MemoryDom::new());
    let (mount, shadow) = session.diff(None, Some(&tree));
    applier.apply(&mount).unwrap();
    assert_eq!(applier.host().len(), 6);

    let empty = VNode::element("div", Props::new(), vec![]);
    let (patches, _) = session.diff(Some((&tree, &shadow.unwrap())), Some(&empty));
    applier.apply(&patches).unwrap();

    assert_eq!(applier.host().len(), 1);
    // The ul's ids are gone from the map: referencing one is now fatal.
    let err = applier
        .apply(&[Patch::RemoveNode { node: NodeId(2) }])
        .unwrap_err();
    assert_eq!(err, ApplyError::UnknownNode(NodeId(2)));
}

#[test]
fn unknown_ids_poison_the_batch_until_reset() {
    let mut applier = HostApplier::new(MemoryDom::new());
    let tree = VNode::element("div", Props::new(), vec![]);

    applier
        .apply(&vango_core::diff(None, Some(&tree)))
        .unwrap();
    assert!(!applier.needs_resync());

    let bad = Patch::ReplaceText {
        node: NodeId(40),
        text: "?".into(),
    };
    // The good patch after the bad one must not run.
    let also_good = Patch::SetAttribute {
        node: NodeId(1),
        key: "class".into(),
        value: "late".into(),
    };
    assert!(applier.apply(&[bad, also_good]).is_err());
    assert!(applier.needs_resync());
    assert_eq!(applier.host().mirror(), vec![tree.clone()]);

    // Full resync: forget everything, replay the insert stream.
    applier.reset();
    assert!(!applier.needs_resync());
    applier
        .apply(&vango_core::diff(None, Some(&tree)))
        .unwrap();
    assert_eq!(applier.host().mirror(), vec![tree.clone(), tree]);
}

#[test]
fn fragments_and_portals_are_first_class_host_nodes() {
    let tree = VNode::element(
        "div",
        Props::new(),
        vec![
            VNode::fragment(vec![VNode::text("a"), VNode::text("b")]),
            VNode::portal("#overlay", vec![VNode::text("toast")]),
        ],
    );

    let mut applier = HostApplier::new(MemoryDom::new());
    applier.apply(&vango_core::diff(None, Some(&tree))).unwrap();
    assert_eq!(applier.host().mirror(), vec![normalized(&tree)]);
}

#[test]
fn randomized_keyed_mutations_stay_faithful() {
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    let mut rng = SmallRng::seed_from_u64(0xA11D);
    for _ in 0..100 {
        let len = rng.gen_range(0..8);
        let prev_keys: Vec<u32> = (0..len).collect();
        let mut next_keys: Vec<u32> = prev_keys
            .iter()
            .copied()
            .filter(|_| rng.gen_bool(0.6))
            .collect();
        for i in (1..next_keys.len()).rev() {
            let j = rng.gen_range(0..=i);
            next_keys.swap(i, j);
        }
        for fresh in 0..rng.gen_range(0..3) {
            let pos = rng.gen_range(0..=next_keys.len());
            next_keys.insert(pos, 50 + fresh);
        }

        let build = |keys: &[u32]| {
            VNode::element(
                "ul",
                Props::new(),
                keys.iter()
                    .map(|k| item(&k.to_string(), &format!("row {k}")))
                    .collect(),
            )
        };
        let prev = build(&prev_keys);
        let next = build(&next_keys);

        let mut session = DiffSession::new();
        let mut applier = HostApplier::new(MemoryDom::new());
        let (mount, shadow) = session.diff(None, Some(&prev));
        applier.apply(&mount).unwrap();
        let (patches, _) = session.diff(Some((&prev, &shadow.unwrap())), Some(&next));
        applier.apply(&patches).unwrap();

        assert_eq!(
            applier.host().mirror(),
            vec![normalized(&next)],
            "{prev_keys:?} -> {next_keys:?}"
        );
    }
}
