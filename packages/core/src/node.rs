//! Virtual node support.
//!
//! VNodes are plain immutable values: cheap to build, cheap to clone, and
//! never mutated after construction. Everything downstream - the diff engine,
//! the HTML renderer, the host applier - consumes them read-only.

use indexmap::IndexMap;

use crate::error::StructureError;
use crate::events;

/// Opaque token naming an event handler.
///
/// The framework never calls or compares handlers directly; hosts resolve
/// tokens through their own registry keyed by node id and event bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct HandlerId(pub u32);

/// A typed prop value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum PropValue {
    Text(String),
    Bool(bool),
    Int(i64),
    Number(f64),
    Handler(HandlerId),
}

impl PropValue {
    /// Render the value the way it appears in markup. Handlers have no
    /// attribute form.
    pub fn as_attr_text(&self) -> Option<String> {
        match self {
            PropValue::Text(s) => Some(s.clone()),
            PropValue::Bool(b) => Some(b.to_string()),
            PropValue::Int(i) => Some(i.to_string()),
            PropValue::Number(n) => Some(n.to_string()),
            PropValue::Handler(_) => None,
        }
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        PropValue::Text(s.to_string())
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        PropValue::Text(s)
    }
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        PropValue::Bool(b)
    }
}

impl From<i64> for PropValue {
    fn from(i: i64) -> Self {
        PropValue::Int(i)
    }
}

impl From<f64> for PropValue {
    fn from(n: f64) -> Self {
        PropValue::Number(n)
    }
}

impl From<HandlerId> for PropValue {
    fn from(h: HandlerId) -> Self {
        PropValue::Handler(h)
    }
}

/// Per-node optimization flags, computed eagerly at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeFlags(u8);

impl NodeFlags {
    /// The subtree is known to never change; diffing may skip it entirely.
    pub const STATIC: NodeFlags = NodeFlags(1 << 0);
    pub const HAS_KEY: NodeFlags = NodeFlags(1 << 1);
    pub const HAS_REF: NodeFlags = NodeFlags(1 << 2);
    pub const HAS_EVENTS: NodeFlags = NodeFlags(1 << 3);
    pub const DIRTY: NodeFlags = NodeFlags(1 << 4);

    pub const fn empty() -> NodeFlags {
        NodeFlags(0)
    }

    pub const fn contains(self, other: NodeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: NodeFlags) {
        self.0 |= other.0;
    }

    pub const fn bits(self) -> u8 {
        self.0
    }
}

/// Attribute map with unique keys. Insertion order is preserved so that
/// identical inputs produce identical patch sequences, but appliers must not
/// assign meaning to the order.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Props {
    entries: IndexMap<String, PropValue>,
}

impl Props {
    pub fn new() -> Props {
        Props::default()
    }

    /// Builder-style insert. Re-inserting a key overwrites the previous value
    /// without changing its position.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Props {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<PropValue>> FromIterator<(K, V)> for Props {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Props {
        let mut props = Props::new();
        for (k, v) in iter {
            props.insert(k, v);
        }
        props
    }
}

/// Discriminant of a [`VNode`], used by the diff engine and the wire codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    Fragment,
    Portal,
}

/// An element node: tag, props, children.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct VElement {
    pub tag: String,
    pub key: String,
    pub props: Props,
    pub children: Vec<VNode>,
    pub flags: NodeFlags,
}

/// A text node. Carries no props and no children.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct VText {
    pub text: String,
}

/// A fragment is a virtual position in the tree - children without a wrapper.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct VFragment {
    pub key: String,
    pub children: Vec<VNode>,
}

/// A portal renders its children under a different host target.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct VPortal {
    pub key: String,
    pub target: String,
    pub children: Vec<VNode>,
}

/// An immutable UI node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum VNode {
    Element(VElement),
    Text(VText),
    Fragment(VFragment),
    Portal(VPortal),
}

impl VNode {
    /// Build an element. Flags are derived here, in the single pass that
    /// looks at every prop key.
    pub fn element(tag: impl Into<String>, props: Props, children: Vec<VNode>) -> VNode {
        let mut flags = NodeFlags::empty();
        let mut key = String::new();
        for (name, value) in props.iter() {
            match name {
                "key" => {
                    flags.insert(NodeFlags::HAS_KEY);
                    if let PropValue::Text(k) = value {
                        key = k.clone();
                    }
                }
                "ref" => flags.insert(NodeFlags::HAS_REF),
                _ if events::is_event_prop(name) => flags.insert(NodeFlags::HAS_EVENTS),
                _ => {}
            }
        }
        VNode::Element(VElement {
            tag: tag.into(),
            key,
            props,
            children,
            flags,
        })
    }

    pub fn text(text: impl Into<String>) -> VNode {
        VNode::Text(VText { text: text.into() })
    }

    pub fn fragment(children: Vec<VNode>) -> VNode {
        VNode::Fragment(VFragment {
            key: String::new(),
            children,
        })
    }

    pub fn portal(target: impl Into<String>, children: Vec<VNode>) -> VNode {
        VNode::Portal(VPortal {
            key: String::new(),
            target: target.into(),
            children,
        })
    }

    /// Attach a reconciliation key. Text nodes are always unkeyed.
    pub fn with_key(mut self, key: impl Into<String>) -> VNode {
        let key = key.into();
        match &mut self {
            VNode::Element(el) => {
                if !key.is_empty() {
                    el.flags.insert(NodeFlags::HAS_KEY);
                }
                el.key = key;
            }
            VNode::Fragment(frag) => frag.key = key,
            VNode::Portal(portal) => portal.key = key,
            VNode::Text(_) => {}
        }
        self
    }

    /// Promise that this subtree never changes. The diff engine skips
    /// static-to-static positions wholesale.
    pub fn mark_static(mut self) -> VNode {
        if let VNode::Element(el) = &mut self {
            el.flags.insert(NodeFlags::STATIC);
        }
        self
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            VNode::Element(_) => NodeKind::Element,
            VNode::Text(_) => NodeKind::Text,
            VNode::Fragment(_) => NodeKind::Fragment,
            VNode::Portal(_) => NodeKind::Portal,
        }
    }

    pub fn has_flag(&self, flag: NodeFlags) -> bool {
        match self {
            VNode::Element(el) => el.flags.contains(flag),
            _ => false,
        }
    }

    /// The reconciliation key: an explicit `key` prop wins over the node's
    /// own field. Empty means unkeyed.
    pub fn get_key(&self) -> &str {
        if let VNode::Element(el) = self {
            if let Some(PropValue::Text(k)) = el.props.get("key") {
                return k;
            }
        }
        match self {
            VNode::Element(el) => &el.key,
            VNode::Fragment(frag) => &frag.key,
            VNode::Portal(portal) => &portal.key,
            VNode::Text(_) => "",
        }
    }

    pub fn children(&self) -> &[VNode] {
        match self {
            VNode::Element(el) => &el.children,
            VNode::Fragment(frag) => &frag.children,
            VNode::Portal(portal) => &portal.children,
            VNode::Text(_) => &[],
        }
    }

    pub fn props(&self) -> Option<&Props> {
        match self {
            VNode::Element(el) => Some(&el.props),
            _ => None,
        }
    }

    /// The event bitmask derived from this node's props (elements only).
    pub fn event_mask(&self) -> u32 {
        match self.props() {
            Some(props) => events::mask_of(props),
            None => 0,
        }
    }
}

/// Check the sibling-key invariant over a whole tree: non-empty keys must be
/// unique among siblings. The diff engine itself stays panic-free and treats
/// duplicates as last-wins, so embeddings that want hard failures run this
/// first.
pub fn validate(tree: &VNode) -> Result<(), StructureError> {
    let mut seen = rustc_hash::FxHashSet::default();
    for child in tree.children() {
        let key = child.get_key();
        if !key.is_empty() && !seen.insert(key) {
            return Err(StructureError::DuplicateKey(key.to_string()));
        }
        validate(child)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_computed_on_construction() {
        let node = VNode::element(
            "button",
            Props::new()
                .with("onClick", HandlerId(7))
                .with("class", "primary"),
            vec![],
        );
        assert!(node.has_flag(NodeFlags::HAS_EVENTS));
        assert!(!node.has_flag(NodeFlags::HAS_KEY));
        assert_eq!(node.event_mask(), 1 << 0);
    }

    #[test]
    fn key_prop_wins_over_field() {
        let node = VNode::element("li", Props::new().with("key", "a"), vec![]).with_key("b");
        assert_eq!(node.get_key(), "a");
    }

    #[test]
    fn duplicate_sibling_keys_rejected() {
        let tree = VNode::element(
            "ul",
            Props::new(),
            vec![
                VNode::element("li", Props::new(), vec![]).with_key("a"),
                VNode::element("li", Props::new(), vec![]).with_key("a"),
            ],
        );
        assert!(matches!(
            validate(&tree),
            Err(StructureError::DuplicateKey(k)) if k == "a"
        ));
    }
}
