//! An in-memory host: the reference implementation of [`Host`].
//!
//! Useful for headless rendering, the apply-faithfulness tests, and
//! simulating a hydrated document without a browser. The tree can be
//! snapshotted back into `VNode`s with [`MemoryDom::mirror`] (host mirrors
//! are key-blind and hold no handler tokens - both are framework-side
//! concepts that never cross the capability interface).

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use slab::Slab;
use vango_core::{PropValue, Props, VNode};

use crate::host::{Host, HostError};
use crate::hydrate::{ScannedKind, ScannedNode};

/// Handle into a [`MemoryDom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemHandle(usize);

enum MemKind {
    Root,
    Element {
        tag: String,
        attrs: IndexMap<String, PropValue>,
    },
    Text(String),
    Fragment,
    Portal {
        target: String,
    },
}

struct MemNode {
    kind: MemKind,
    parent: Option<usize>,
    children: Vec<usize>,
    /// event bit -> callback token
    subscriptions: FxHashMap<u8, u32>,
}

pub struct MemoryDom {
    nodes: Slab<MemNode>,
    root: usize,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDom {
    pub fn new() -> MemoryDom {
        let mut nodes = Slab::new();
        let root = nodes.insert(MemNode {
            kind: MemKind::Root,
            parent: None,
            children: Vec::new(),
            subscriptions: FxHashMap::default(),
        });
        MemoryDom { nodes, root }
    }

    fn node(&self, handle: MemHandle) -> Result<&MemNode, HostError> {
        self.nodes
            .get(handle.0)
            .ok_or_else(|| HostError(format!("no such node {}", handle.0)))
    }

    fn node_mut(&mut self, handle: MemHandle) -> Result<&mut MemNode, HostError> {
        self.nodes
            .get_mut(handle.0)
            .ok_or_else(|| HostError(format!("no such node {}", handle.0)))
    }

    fn detach(&mut self, child: usize) {
        if let Some(parent) = self.nodes[child].parent.take() {
            self.nodes[parent].children.retain(|c| *c != child);
        }
    }

    /// Snapshot the root's children as a structural tree.
    pub fn mirror(&self) -> Vec<VNode> {
        self.nodes[self.root]
            .children
            .iter()
            .map(|child| self.mirror_node(*child))
            .collect()
    }

    fn mirror_node(&self, index: usize) -> VNode {
        let node = &self.nodes[index];
        let children: Vec<VNode> = node
            .children
            .iter()
            .map(|child| self.mirror_node(*child))
            .collect();
        match &node.kind {
            MemKind::Root => unreachable!("root is never a child"),
            MemKind::Element { tag, attrs } => {
                let props: Props = attrs
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                VNode::element(tag.clone(), props, children)
            }
            MemKind::Text(text) => VNode::text(text.clone()),
            MemKind::Fragment => VNode::fragment(children),
            MemKind::Portal { target } => VNode::portal(target.clone(), children),
        }
    }

    /// Event mask currently subscribed on a node.
    pub fn subscriptions(&self, handle: MemHandle) -> u32 {
        self.nodes
            .get(handle.0)
            .map(|node| {
                node.subscriptions
                    .keys()
                    .fold(0u32, |mask, bit| mask | (1 << bit))
            })
            .unwrap_or(0)
    }

    /// Total number of live nodes, the root excluded.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Walk the document into the hydration bridge's scan shape. Elements
    /// surrender their `data-hid` / `data-events` markers; everything else
    /// passes through structurally.
    pub fn scan(&self) -> Vec<ScannedNode<MemHandle>> {
        self.nodes[self.root]
            .children
            .iter()
            .map(|child| self.scan_node(*child))
            .collect()
    }

    fn scan_node(&self, index: usize) -> ScannedNode<MemHandle> {
        let node = &self.nodes[index];
        let children = node
            .children
            .iter()
            .map(|child| self.scan_node(*child))
            .collect();
        let kind = match &node.kind {
            MemKind::Root => unreachable!("root is never a child"),
            MemKind::Element { tag, attrs } => {
                // SSR serializes portals as marked placeholder divs; the
                // walker recognizes them the way a browser walker would.
                if let Some(PropValue::Text(target)) = attrs.get("data-vango-portal") {
                    ScannedKind::Portal {
                        target: target.clone(),
                    }
                } else {
                    let mut hid = None;
                    let mut events = 0;
                    let mut rest = Props::new();
                    for (key, value) in attrs {
                        match (key.as_str(), value) {
                            ("data-hid", PropValue::Text(v)) => hid = Some(v.clone()),
                            ("data-events", PropValue::Text(v)) => {
                                events = v.parse().unwrap_or(0);
                            }
                            _ => rest.insert(key.clone(), value.clone()),
                        }
                    }
                    ScannedKind::Element {
                        tag: tag.clone(),
                        attrs: rest,
                        hid,
                        events,
                    }
                }
            }
            MemKind::Text(text) => ScannedKind::Text(text.clone()),
            MemKind::Fragment => ScannedKind::Fragment,
            MemKind::Portal { target } => ScannedKind::Portal {
                target: target.clone(),
            },
        };
        ScannedNode {
            kind,
            handle: MemHandle(index),
            children,
        }
    }
}

impl Host for MemoryDom {
    type Handle = MemHandle;

    fn root(&self) -> MemHandle {
        MemHandle(self.root)
    }

    fn create_element(&mut self, tag: &str) -> MemHandle {
        MemHandle(self.nodes.insert(MemNode {
            kind: MemKind::Element {
                tag: tag.to_string(),
                attrs: IndexMap::new(),
            },
            parent: None,
            children: Vec::new(),
            subscriptions: FxHashMap::default(),
        }))
    }

    fn create_text(&mut self, value: &str) -> MemHandle {
        MemHandle(self.nodes.insert(MemNode {
            kind: MemKind::Text(value.to_string()),
            parent: None,
            children: Vec::new(),
            subscriptions: FxHashMap::default(),
        }))
    }

    fn create_fragment(&mut self) -> MemHandle {
        MemHandle(self.nodes.insert(MemNode {
            kind: MemKind::Fragment,
            parent: None,
            children: Vec::new(),
            subscriptions: FxHashMap::default(),
        }))
    }

    fn create_portal(&mut self, target: &str) -> MemHandle {
        MemHandle(self.nodes.insert(MemNode {
            kind: MemKind::Portal {
                target: target.to_string(),
            },
            parent: None,
            children: Vec::new(),
            subscriptions: FxHashMap::default(),
        }))
    }

    fn set_attribute(
        &mut self,
        handle: &MemHandle,
        key: &str,
        value: &PropValue,
    ) -> Result<(), HostError> {
        match &mut self.node_mut(*handle)?.kind {
            MemKind::Element { attrs, .. } => {
                attrs.insert(key.to_string(), value.clone());
                Ok(())
            }
            _ => Err(HostError("cannot set attribute on non-element".into())),
        }
    }

    fn remove_attribute(&mut self, handle: &MemHandle, key: &str) -> Result<(), HostError> {
        match &mut self.node_mut(*handle)?.kind {
            MemKind::Element { attrs, .. } => {
                attrs.shift_remove(key);
                Ok(())
            }
            _ => Err(HostError("cannot remove attribute on non-element".into())),
        }
    }

    fn replace_text(&mut self, handle: &MemHandle, value: &str) -> Result<(), HostError> {
        match &mut self.node_mut(*handle)?.kind {
            MemKind::Text(text) => {
                *text = value.to_string();
                Ok(())
            }
            _ => Err(HostError("replace_text on a non-text node".into())),
        }
    }

    fn insert_child(
        &mut self,
        parent: &MemHandle,
        child: &MemHandle,
        before: Option<&MemHandle>,
    ) -> Result<(), HostError> {
        self.node(*parent)?;
        self.node(*child)?;
        self.detach(child.0);
        let position = match before {
            Some(anchor) => self.nodes[parent.0]
                .children
                .iter()
                .position(|c| *c == anchor.0)
                .ok_or_else(|| HostError("anchor is not a child of parent".into()))?,
            None => self.nodes[parent.0].children.len(),
        };
        self.nodes[parent.0].children.insert(position, child.0);
        self.nodes[child.0].parent = Some(parent.0);
        Ok(())
    }

    fn remove(&mut self, handle: &MemHandle) -> Result<(), HostError> {
        self.node(*handle)?;
        self.detach(handle.0);
        let mut stack = vec![handle.0];
        while let Some(index) = stack.pop() {
            let node = self.nodes.remove(index);
            stack.extend(node.children);
        }
        Ok(())
    }

    fn subscribe(&mut self, handle: &MemHandle, event_bit: u8, callback_token: u32) {
        if let Ok(node) = self.node_mut(*handle) {
            node.subscriptions.insert(event_bit, callback_token);
        }
    }

    fn unsubscribe(&mut self, handle: &MemHandle, event_bit: u8) {
        if let Ok(node) = self.node_mut(*handle) {
            node.subscriptions.remove(&event_bit);
        }
    }
}
