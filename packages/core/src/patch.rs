//! The patch stream: targeted host mutations emitted by the diff engine.

use std::fmt;

use crate::node::{PropValue, VNode};

/// Stable 32-bit node identifier assigned by a diff session. `0` never names
/// a real node; it is the root parent and the "append" anchor sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    /// The append / root sentinel.
    pub fn is_sentinel(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single host mutation. Patches are applied strictly in order; each one
/// carries absolute targets so replaying a stream in order is idempotent.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Patch {
    /// Replace a text node's content.
    ReplaceText { node: NodeId, text: String },
    /// Add or overwrite an attribute.
    SetAttribute {
        node: NodeId,
        key: String,
        value: PropValue,
    },
    /// Remove an attribute.
    RemoveAttribute { node: NodeId, key: String },
    /// Materialize a new subtree under `parent`, before `before`
    /// (`before == 0` appends). The applier assigns ids to the subtree in
    /// preorder, mirroring the emitting session.
    InsertNode {
        parent: NodeId,
        before: NodeId,
        subtree: VNode,
    },
    /// Detach and discard a node and its descendants.
    RemoveNode { node: NodeId },
    /// Relocate an existing node, within the same parent or across.
    MoveNode {
        node: NodeId,
        parent: NodeId,
        before: NodeId,
    },
    /// Authoritative replacement of a node's subscribed-event set.
    UpdateEvents { node: NodeId, mask: u32 },
}

impl Patch {
    /// The node this patch targets (the parent, for inserts).
    pub fn target(&self) -> NodeId {
        match self {
            Patch::ReplaceText { node, .. }
            | Patch::SetAttribute { node, .. }
            | Patch::RemoveAttribute { node, .. }
            | Patch::RemoveNode { node }
            | Patch::MoveNode { node, .. }
            | Patch::UpdateEvents { node, .. } => *node,
            Patch::InsertNode { parent, .. } => *parent,
        }
    }

    /// Structural patches create, destroy, or relocate nodes. During
    /// hydration any structural patch signals drift.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Patch::InsertNode { .. } | Patch::RemoveNode { .. } | Patch::MoveNode { .. }
        )
    }
}
