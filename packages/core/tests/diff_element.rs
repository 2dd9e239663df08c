//! Diffing tests for single elements: text, attributes, and wholesale
//! replacement.

use vango_core::prelude::*;

#[test]
fn text_swap() {
    let prev = VNode::element("div", Props::new(), vec![VNode::text("a")]);
    let next = VNode::element("div", Props::new(), vec![VNode::text("b")]);

    // Root is id 1, the text child id 2.
    assert_eq!(
        diff(Some(&prev), Some(&next)),
        vec![Patch::ReplaceText {
            node: NodeId(2),
            text: "b".into(),
        }]
    );
}

#[test]
fn attribute_add_remove_change() {
    let prev = VNode::element(
        "div",
        Props::new().with("class", "old").with("id", "x"),
        vec![],
    );
    let next = VNode::element(
        "div",
        Props::new().with("class", "new").with("data-attr", "v"),
        vec![],
    );

    assert_eq!(
        diff(Some(&prev), Some(&next)),
        vec![
            Patch::SetAttribute {
                node: NodeId(1),
                key: "class".into(),
                value: "new".into(),
            },
            Patch::SetAttribute {
                node: NodeId(1),
                key: "data-attr".into(),
                value: "v".into(),
            },
            Patch::RemoveAttribute {
                node: NodeId(1),
                key: "id".into(),
            },
        ]
    );
}

#[test]
fn unchanged_attributes_are_skipped() {
    let prev = VNode::element("input", Props::new().with("disabled", true), vec![]);
    let next = VNode::element("input", Props::new().with("disabled", true), vec![]);
    assert!(diff(Some(&prev), Some(&next)).is_empty());
}

#[test]
fn key_and_ref_props_never_become_attributes() {
    let prev = VNode::element("li", Props::new(), vec![]);
    let next = VNode::element("li", Props::new().with("key", "k").with("ref", "r"), vec![]);
    assert!(diff(Some(&prev), Some(&next)).is_empty());
}

#[test]
fn tag_change_replaces_instead_of_recursing() {
    let prev = VNode::element(
        "div",
        Props::new(),
        vec![VNode::element(
            "span",
            Props::new(),
            vec![VNode::text("x")],
        )],
    );
    let inner = VNode::element("p", Props::new(), vec![VNode::text("x")]);
    let next = VNode::element("div", Props::new(), vec![inner.clone()]);

    // Ids: div=1, span=2, text=3. The replacement subtree is inserted fresh.
    assert_eq!(
        diff(Some(&prev), Some(&next)),
        vec![
            Patch::RemoveNode { node: NodeId(2) },
            Patch::InsertNode {
                parent: NodeId(1),
                before: NodeId::ROOT,
                subtree: inner,
            },
        ]
    );
}

#[test]
fn kind_change_replaces() {
    let prev = VNode::element("div", Props::new(), vec![VNode::text("x")]);
    let replacement = VNode::element("b", Props::new(), vec![]);
    let next = VNode::element("div", Props::new(), vec![replacement.clone()]);

    assert_eq!(
        diff(Some(&prev), Some(&next)),
        vec![
            Patch::RemoveNode { node: NodeId(2) },
            Patch::InsertNode {
                parent: NodeId(1),
                before: NodeId::ROOT,
                subtree: replacement,
            },
        ]
    );
}

#[test]
fn replacement_in_the_middle_anchors_on_the_next_sibling() {
    let prev = VNode::element(
        "div",
        Props::new(),
        vec![
            VNode::element("span", Props::new(), vec![]),
            VNode::element("p", Props::new(), vec![]),
            VNode::element("span", Props::new(), vec![]),
        ],
    );
    let swapped = VNode::element("em", Props::new(), vec![]);
    let next = VNode::element(
        "div",
        Props::new(),
        vec![
            VNode::element("span", Props::new(), vec![]),
            swapped.clone(),
            VNode::element("span", Props::new(), vec![]),
        ],
    );

    // Ids: div=1, span=2, p=3, span=4.
    assert_eq!(
        diff(Some(&prev), Some(&next)),
        vec![
            Patch::RemoveNode { node: NodeId(3) },
            Patch::InsertNode {
                parent: NodeId(1),
                before: NodeId(4),
                subtree: swapped,
            },
        ]
    );
}

#[test]
fn portal_retarget_replaces() {
    let prev = VNode::element(
        "div",
        Props::new(),
        vec![VNode::portal("#modal", vec![VNode::text("hi")])],
    );
    let moved = VNode::portal("#toast", vec![VNode::text("hi")]);
    let next = VNode::element("div", Props::new(), vec![moved.clone()]);

    assert_eq!(
        diff(Some(&prev), Some(&next)),
        vec![
            Patch::RemoveNode { node: NodeId(2) },
            Patch::InsertNode {
                parent: NodeId(1),
                before: NodeId::ROOT,
                subtree: moved,
            },
        ]
    );
}

#[test]
fn portal_same_target_diffs_children() {
    let prev = VNode::portal("#modal", vec![VNode::text("a")]);
    let next = VNode::portal("#modal", vec![VNode::text("b")]);

    assert_eq!(
        diff(Some(&prev), Some(&next)),
        vec![Patch::ReplaceText {
            node: NodeId(2),
            text: "b".into(),
        }]
    );
}

#[test]
fn static_subtrees_are_skipped() {
    let prev = VNode::element("div", Props::new().with("class", "a"), vec![]).mark_static();
    let next = VNode::element("div", Props::new().with("class", "b"), vec![]).mark_static();

    // Both sides promised static: the differ takes them at their word.
    assert!(diff(Some(&prev), Some(&next)).is_empty());
}
