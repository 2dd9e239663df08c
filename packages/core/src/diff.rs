//! The diff engine.
//!
//! `diff` turns a (previous, next) pair of trees into an ordered patch list.
//! Applying the patches in order to a host that mirrored the previous tree
//! yields a host that mirrors the next tree.
//!
//! Node ids are owned by a [`DiffSession`]: a monotonically increasing
//! counter plus, per retained tree, a *mounted shadow* - the id of every node
//! in the tree, in the same shape as the tree. Ids are allocated from 1
//! upward in the order nodes are first encountered, and a previous node keeps
//! its id in every later diff that pairs it. Fresh ids for inserted subtrees
//! are allocated in patch-emission order, preorder per subtree, which is
//! exactly the order an applier assigns ids while realizing the insert - the
//! wire never carries ids for new nodes.
//!
//! Keyed reconciliation is loosely based on the two-pass shape of Inferno-
//! style reconcilers: a forward pass pairs keys, diffs pairs in place, and
//! flags a node as displaced when its old index precedes the largest old
//! index already seen; a backward pass then emits inserts and moves, each
//! anchored before the sibling at the following position (0 = append). The
//! backward order guarantees every anchor is already in its final position
//! when it is used.

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::events;
use crate::node::{NodeFlags, Props, VNode};
use crate::patch::{NodeId, Patch};

/// Ids for one retained tree, in the shape of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountedNode {
    pub id: NodeId,
    pub children: Vec<MountedNode>,
}

/// Allocates node ids and diffs trees against their mounted shadows.
///
/// One session serves many consecutive diffs; the scheduler owns a single
/// session shared by every fiber so ids stay unique across the whole page.
#[derive(Debug)]
pub struct DiffSession {
    next_id: u32,
}

impl Default for DiffSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DiffSession {
    pub fn new() -> DiffSession {
        DiffSession { next_id: 1 }
    }

    fn alloc(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// The id the next allocation will receive. Appliers that adopt
    /// pre-existing content (hydration) seed their own counters from this.
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Assign ids over `tree` in preorder without emitting patches.
    ///
    /// This mirrors the assignment an applier performs while realizing an
    /// `InsertNode`, so a shadow seeded here agrees with a host that
    /// materialized the same tree from a patch stream.
    pub fn mount(&mut self, tree: &VNode) -> MountedNode {
        let id = self.alloc();
        let children = tree.children().iter().map(|c| self.mount(c)).collect();
        MountedNode { id, children }
    }

    /// Diff the retained `prev` (with its shadow) against `next`, producing
    /// the patch list and the shadow of `next`.
    pub fn diff(
        &mut self,
        prev: Option<(&VNode, &MountedNode)>,
        next: Option<&VNode>,
    ) -> (Vec<Patch>, Option<MountedNode>) {
        let mut patches = Vec::new();
        let shadow = match (prev, next) {
            (None, None) => None,
            (None, Some(next)) => Some(self.insert(next, NodeId::ROOT, NodeId::ROOT, &mut patches)),
            (Some((_, pm)), None) => {
                patches.push(Patch::RemoveNode { node: pm.id });
                None
            }
            (Some((prev, pm)), Some(next)) => {
                Some(self.diff_node(prev, pm, next, NodeId::ROOT, NodeId::ROOT, &mut patches))
            }
        };
        trace!(patches = patches.len(), "diff complete");
        (patches, shadow)
    }

    /// Allocate ids for `subtree` and emit the insert.
    fn insert(
        &mut self,
        subtree: &VNode,
        parent: NodeId,
        before: NodeId,
        patches: &mut Vec<Patch>,
    ) -> MountedNode {
        let mounted = self.mount(subtree);
        patches.push(Patch::InsertNode {
            parent,
            before,
            subtree: subtree.clone(),
        });
        mounted
    }

    /// Diff one matched position. `anchor` is the id of the sibling that
    /// follows this position in the host, used only when the position must be
    /// replaced wholesale.
    fn diff_node(
        &mut self,
        prev: &VNode,
        pm: &MountedNode,
        next: &VNode,
        parent: NodeId,
        anchor: NodeId,
        patches: &mut Vec<Patch>,
    ) -> MountedNode {
        // Static-to-static positions are promised unchanged.
        if prev.has_flag(NodeFlags::STATIC) && next.has_flag(NodeFlags::STATIC) {
            return pm.clone();
        }

        match (prev, next) {
            (VNode::Text(p), VNode::Text(n)) => {
                if p.text != n.text {
                    patches.push(Patch::ReplaceText {
                        node: pm.id,
                        text: n.text.clone(),
                    });
                }
                MountedNode {
                    id: pm.id,
                    children: Vec::new(),
                }
            }
            (VNode::Element(p), VNode::Element(n)) if p.tag == n.tag => {
                self.diff_props(pm.id, &p.props, &n.props, patches);
                let children =
                    self.diff_children(pm.id, &p.children, &pm.children, &n.children, patches);
                MountedNode {
                    id: pm.id,
                    children,
                }
            }
            (VNode::Fragment(p), VNode::Fragment(n)) => {
                let children =
                    self.diff_children(pm.id, &p.children, &pm.children, &n.children, patches);
                MountedNode {
                    id: pm.id,
                    children,
                }
            }
            (VNode::Portal(p), VNode::Portal(n)) if p.target == n.target => {
                let children =
                    self.diff_children(pm.id, &p.children, &pm.children, &n.children, patches);
                MountedNode {
                    id: pm.id,
                    children,
                }
            }
            // Kind mismatch, tag change, or portal retarget: replace, don't recurse.
            _ => {
                patches.push(Patch::RemoveNode { node: pm.id });
                self.insert(next, parent, anchor, patches)
            }
        }
    }

    fn diff_props(&mut self, id: NodeId, prev: &Props, next: &Props, patches: &mut Vec<Patch>) {
        for (key, value) in next.iter() {
            if key == "key" || key == "ref" || events::is_event_prop(key) {
                continue;
            }
            if prev.get(key) != Some(value) {
                patches.push(Patch::SetAttribute {
                    node: id,
                    key: key.to_string(),
                    value: value.clone(),
                });
            }
        }
        for (key, _) in prev.iter() {
            if key == "key" || key == "ref" || events::is_event_prop(key) {
                continue;
            }
            if next.get(key).is_none() {
                patches.push(Patch::RemoveAttribute {
                    node: id,
                    key: key.to_string(),
                });
            }
        }

        let prev_mask = events::mask_of(prev);
        let next_mask = events::mask_of(next);
        if prev_mask != next_mask {
            patches.push(Patch::UpdateEvents {
                node: id,
                mask: next_mask,
            });
        }
    }

    fn diff_children(
        &mut self,
        parent: NodeId,
        prev: &[VNode],
        prev_m: &[MountedNode],
        next: &[VNode],
        patches: &mut Vec<Patch>,
    ) -> Vec<MountedNode> {
        if next.iter().any(|child| !child.get_key().is_empty()) {
            self.diff_keyed_children(parent, prev, prev_m, next, patches)
        } else {
            self.diff_indexed_children(parent, prev, prev_m, next, patches)
        }
    }

    // Positional diffing for fully unkeyed lists: pairwise up to the shared
    // length, remove trailing prev, append trailing next.
    fn diff_indexed_children(
        &mut self,
        parent: NodeId,
        prev: &[VNode],
        prev_m: &[MountedNode],
        next: &[VNode],
        patches: &mut Vec<Patch>,
    ) -> Vec<MountedNode> {
        let shared = prev.len().min(next.len());
        let mut shadows = Vec::with_capacity(next.len());

        for i in 0..shared {
            // The node that follows position i still exists when a
            // replacement at i is applied; its own removal comes later.
            let anchor = prev_m.get(i + 1).map(|m| m.id).unwrap_or(NodeId::ROOT);
            shadows.push(self.diff_node(&prev[i], &prev_m[i], &next[i], parent, anchor, patches));
        }

        for removed in &prev_m[shared..] {
            patches.push(Patch::RemoveNode { node: removed.id });
        }
        for appended in &next[shared..] {
            shadows.push(self.insert(appended, parent, NodeId::ROOT, patches));
        }

        shadows
    }

    // Keyed reconciliation.
    //
    // Forward pass: pair each next position (by key, or by index for unkeyed
    // stragglers), diff pairs in next order, and flag a pair as displaced
    // when its old index precedes the largest old index already paired.
    // Unpaired prev children are removed. Backward pass: emit inserts and
    // moves anchored before the (already final) following sibling.
    fn diff_keyed_children(
        &mut self,
        parent: NodeId,
        prev: &[VNode],
        prev_m: &[MountedNode],
        next: &[VNode],
        patches: &mut Vec<Patch>,
    ) -> Vec<MountedNode> {
        debug_assert!(
            {
                let mut keys = rustc_hash::FxHashSet::default();
                next.iter()
                    .map(VNode::get_key)
                    .filter(|k| !k.is_empty())
                    .all(|k| keys.insert(k))
            },
            "keyed siblings must each have a unique key"
        );

        let prev_by_key: FxHashMap<&str, usize> = prev
            .iter()
            .enumerate()
            .filter(|(_, child)| !child.get_key().is_empty())
            .map(|(i, child)| (child.get_key(), i))
            .collect();

        enum Slot {
            Paired { prev_idx: usize, displaced: bool },
            Fresh,
        }

        let mut used = vec![false; prev.len()];
        let mut max_old_seen: Option<usize> = None;
        let mut plan = Vec::with_capacity(next.len());

        for (i, child) in next.iter().enumerate() {
            let key = child.get_key();
            let candidate = if !key.is_empty() {
                prev_by_key.get(key).copied()
            } else {
                // Unkeyed positions pair with the same position when it is
                // also unkeyed and still unclaimed.
                (i < prev.len() && prev[i].get_key().is_empty()).then_some(i)
            };

            match candidate {
                Some(pi) if !used[pi] && same_shape(&prev[pi], child) => {
                    used[pi] = true;
                    let displaced = max_old_seen.is_some_and(|max| pi < max);
                    if !displaced {
                        max_old_seen = Some(pi);
                    }
                    plan.push(Slot::Paired {
                        prev_idx: pi,
                        displaced,
                    });
                }
                _ => plan.push(Slot::Fresh),
            }
        }

        // In-place diffs for pairs, in next order.
        let mut shadows: Vec<Option<MountedNode>> = Vec::with_capacity(next.len());
        for (i, slot) in plan.iter().enumerate() {
            match slot {
                Slot::Paired { prev_idx, .. } => {
                    let shadow = self.diff_node(
                        &prev[*prev_idx],
                        &prev_m[*prev_idx],
                        &next[i],
                        parent,
                        NodeId::ROOT,
                        patches,
                    );
                    shadows.push(Some(shadow));
                }
                Slot::Fresh => shadows.push(None),
            }
        }

        // Remove any prev child nothing claimed.
        for (pi, was_used) in used.iter().enumerate() {
            if !was_used {
                patches.push(Patch::RemoveNode {
                    node: prev_m[pi].id,
                });
            }
        }

        // Backward placement pass. `anchor` is the id of the sibling at
        // position i + 1, already in its final spot.
        let mut anchor = NodeId::ROOT;
        for i in (0..next.len()).rev() {
            match &plan[i] {
                Slot::Fresh => {
                    let shadow = self.insert(&next[i], parent, anchor, patches);
                    anchor = shadow.id;
                    shadows[i] = Some(shadow);
                }
                Slot::Paired { displaced, .. } => {
                    let id = shadows[i]
                        .as_ref()
                        .expect("paired slot diffed in forward pass")
                        .id;
                    if *displaced {
                        patches.push(Patch::MoveNode {
                            node: id,
                            parent,
                            before: anchor,
                        });
                    }
                    anchor = id;
                }
            }
        }

        shadows.into_iter().flatten().collect()
    }
}

/// Shape compatibility for keyed pairing. Incompatible nodes are never
/// paired; the old one is removed and the new one inserted fresh.
fn same_shape(prev: &VNode, next: &VNode) -> bool {
    match (prev, next) {
        (VNode::Element(p), VNode::Element(n)) => p.tag == n.tag,
        (VNode::Portal(p), VNode::Portal(n)) => p.target == n.target,
        _ => prev.kind() == next.kind(),
    }
}

/// Diff two standalone trees in a fresh session.
///
/// Ids are seeded over `prev` in preorder from 1, identical to the ids a
/// host holds after materializing `prev` from an insert stream, so the
/// returned patches line up with such a host.
pub fn diff(prev: Option<&VNode>, next: Option<&VNode>) -> Vec<Patch> {
    let mut session = DiffSession::new();
    let mounted = prev.map(|tree| session.mount(tree));
    let pair = match (prev, &mounted) {
        (Some(tree), Some(shadow)) => Some((tree, shadow)),
        _ => None,
    };
    session.diff(pair, next).0
}
