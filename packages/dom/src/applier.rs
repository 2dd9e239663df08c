//! Applies ordered patch lists to a live host.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::{trace, warn};
use vango_core::{events, NodeId, Patch, VNode};

use crate::host::{Host, HostError};

/// Why a batch was abandoned. Any of these means the applier no longer
/// trusts its picture of the host and wants a full resync; it stays usable
/// after [`HostApplier::reset`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplyError {
    #[error("unknown node id {0} in patch stream")]
    UnknownNode(NodeId),
    #[error("insert under missing parent {0}")]
    MissingParent(NodeId),
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Owns the node-id -> host-handle map and the per-node event masks.
///
/// Ids for inserted subtrees are assigned here, preorder, from a counter
/// that mirrors the emitting diff session - the wire does not carry ids for
/// new nodes, both sides just count in the same order.
pub struct HostApplier<H: Host> {
    host: H,
    nodes: FxHashMap<NodeId, H::Handle>,
    masks: FxHashMap<NodeId, u32>,
    /// Parent / child-set bookkeeping so removals can retire whole id
    /// subtrees from the maps.
    parents: FxHashMap<NodeId, NodeId>,
    children: FxHashMap<NodeId, SmallVec<[NodeId; 4]>>,
    next_id: u32,
    needs_resync: bool,
}

impl<H: Host> HostApplier<H> {
    pub fn new(host: H) -> HostApplier<H> {
        HostApplier {
            host,
            nodes: FxHashMap::default(),
            masks: FxHashMap::default(),
            parents: FxHashMap::default(),
            children: FxHashMap::default(),
            next_id: 1,
            needs_resync: false,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    /// True after a failed batch: the stream must resynchronize before more
    /// patches can be trusted.
    pub fn needs_resync(&self) -> bool {
        self.needs_resync
    }

    /// Forget everything and start counting ids from 1 again, ready for a
    /// fresh insert stream. Clearing host content is the embedding's job.
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.masks.clear();
        self.parents.clear();
        self.children.clear();
        self.next_id = 1;
        self.needs_resync = false;
    }

    /// Apply a batch in order. On the first failure the rest of the batch is
    /// discarded and [`needs_resync`](Self::needs_resync) turns on.
    pub fn apply(&mut self, patches: &[Patch]) -> Result<(), ApplyError> {
        for patch in patches {
            if let Err(err) = self.apply_one(patch) {
                warn!(%err, "patch failed; requesting full resync");
                self.needs_resync = true;
                return Err(err);
            }
        }
        trace!(count = patches.len(), "batch applied");
        Ok(())
    }

    fn apply_one(&mut self, patch: &Patch) -> Result<(), ApplyError> {
        match patch {
            Patch::ReplaceText { node, text } => {
                let handle = self.lookup(*node)?;
                self.host.replace_text(&handle, text)?;
            }
            Patch::SetAttribute { node, key, value } => {
                let handle = self.lookup(*node)?;
                self.host.set_attribute(&handle, key, value)?;
            }
            Patch::RemoveAttribute { node, key } => {
                let handle = self.lookup(*node)?;
                self.host.remove_attribute(&handle, key)?;
            }
            Patch::InsertNode {
                parent,
                before,
                subtree,
            } => {
                let parent_handle = if parent.is_sentinel() {
                    self.host.root()
                } else {
                    self.nodes
                        .get(parent)
                        .cloned()
                        .ok_or(ApplyError::MissingParent(*parent))?
                };
                let before_handle = self.lookup_anchor(*before)?;
                let (root_id, handle) = self.realize(*parent, subtree)?;
                self.host
                    .insert_child(&parent_handle, &handle, before_handle.as_ref())?;
                trace!(id = %root_id, "subtree inserted");
            }
            Patch::RemoveNode { node } => {
                let handle = self.lookup(*node)?;
                self.host.remove(&handle)?;
                self.forget(*node);
            }
            Patch::MoveNode {
                node,
                parent,
                before,
            } => {
                let handle = self.lookup(*node)?;
                let parent_handle = if parent.is_sentinel() {
                    self.host.root()
                } else {
                    self.nodes
                        .get(parent)
                        .cloned()
                        .ok_or(ApplyError::MissingParent(*parent))?
                };
                let before_handle = self.lookup_anchor(*before)?;
                self.host
                    .insert_child(&parent_handle, &handle, before_handle.as_ref())?;
                self.reparent(*node, *parent);
            }
            Patch::UpdateEvents { node, mask } => {
                let handle = self.lookup(*node)?;
                let old = self.masks.get(node).copied().unwrap_or(0);
                let set = mask & !old;
                let cleared = old & !mask;
                for bit in 0..32u8 {
                    if set & (1 << bit) != 0 {
                        self.host.subscribe(&handle, bit, node.0);
                    }
                    if cleared & (1 << bit) != 0 {
                        self.host.unsubscribe(&handle, bit);
                    }
                }
                self.masks.insert(*node, *mask);
            }
        }
        Ok(())
    }

    fn lookup(&self, id: NodeId) -> Result<H::Handle, ApplyError> {
        self.nodes
            .get(&id)
            .cloned()
            .ok_or(ApplyError::UnknownNode(id))
    }

    fn lookup_anchor(&self, id: NodeId) -> Result<Option<H::Handle>, ApplyError> {
        if id.is_sentinel() {
            Ok(None)
        } else {
            self.lookup(id).map(Some)
        }
    }

    /// Build a detached subtree, assigning preorder ids, registering every
    /// node, and subscribing declared events.
    fn realize(&mut self, parent: NodeId, node: &VNode) -> Result<(NodeId, H::Handle), ApplyError> {
        let id = NodeId(self.next_id);
        self.next_id += 1;

        let handle = match node {
            VNode::Element(el) => {
                let handle = self.host.create_element(&el.tag);
                for (key, value) in el.props.iter() {
                    if key == "key" || key == "ref" || events::is_event_prop(key) {
                        continue;
                    }
                    self.host.set_attribute(&handle, key, value)?;
                }
                let mask = events::mask_of(&el.props);
                if mask != 0 {
                    for bit in 0..32u8 {
                        if mask & (1 << bit) != 0 {
                            self.host.subscribe(&handle, bit, id.0);
                        }
                    }
                    self.masks.insert(id, mask);
                }
                handle
            }
            VNode::Text(text) => self.host.create_text(&text.text),
            VNode::Fragment(_) => self.host.create_fragment(),
            VNode::Portal(portal) => self.host.create_portal(&portal.target),
        };

        self.nodes.insert(id, handle.clone());
        self.parents.insert(id, parent);
        self.children.entry(parent).or_default().push(id);

        for child in node.children() {
            let (_, child_handle) = self.realize(id, child)?;
            self.host.insert_child(&handle, &child_handle, None)?;
        }

        Ok((id, handle))
    }

    /// Drop an id subtree from every map.
    fn forget(&mut self, id: NodeId) {
        if let Some(parent) = self.parents.remove(&id) {
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.retain(|child| *child != id);
            }
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            self.nodes.remove(&current);
            self.masks.remove(&current);
            if current != id {
                self.parents.remove(&current);
            }
            if let Some(children) = self.children.remove(&current) {
                stack.extend(children);
            }
        }
    }

    fn reparent(&mut self, id: NodeId, new_parent: NodeId) {
        if let Some(old_parent) = self.parents.insert(id, new_parent) {
            if let Some(siblings) = self.children.get_mut(&old_parent) {
                siblings.retain(|child| *child != id);
            }
        }
        self.children.entry(new_parent).or_default().push(id);
    }

    /// Register an existing host node under an id, as the hydration bridge
    /// does while adopting server-rendered content.
    pub(crate) fn adopt(
        &mut self,
        parent: NodeId,
        id: NodeId,
        handle: H::Handle,
        mask: u32,
    ) {
        self.nodes.insert(id, handle);
        self.parents.insert(id, parent);
        self.children.entry(parent).or_default().push(id);
        if mask != 0 {
            self.masks.insert(id, mask);
        }
    }

    /// Continue id assignment from `next` (hydration seeds this from the
    /// diff session's counter).
    pub(crate) fn set_next_id(&mut self, next: u32) {
        self.next_id = next;
    }

    /// Current event mask of a node, 0 if none recorded.
    pub fn mask(&self, id: NodeId) -> u32 {
        self.masks.get(&id).copied().unwrap_or(0)
    }

    /// Handle registered for an id, if any.
    pub fn handle(&self, id: NodeId) -> Option<&H::Handle> {
        self.nodes.get(&id)
    }
}
