//! The host capability interface.
//!
//! A host is whatever actually owns UI nodes: a browser document behind FFI,
//! a native widget tree, or the in-memory tree in [`crate::memory`]. The
//! applier drives a host exclusively through this trait.

use vango_core::PropValue;

/// An operation the host refused (bad attribute key, detached node, ...).
/// Recoverable: the applier reports it upstream and asks for a full resync.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("host rejected operation: {0}")]
pub struct HostError(pub String);

/// Minimal mutation surface the applier needs.
///
/// `insert_child` has DOM `insertBefore` semantics: inserting a node that is
/// already attached moves it. Fragments and portals are first-class host
/// nodes here so structural patches treat every subtree uniformly; a browser
/// host is free to realize them as comment-delimited ranges.
pub trait Host {
    type Handle: Clone + PartialEq + std::fmt::Debug;

    /// The container every root-level node attaches under.
    fn root(&self) -> Self::Handle;

    fn create_element(&mut self, tag: &str) -> Self::Handle;
    fn create_text(&mut self, value: &str) -> Self::Handle;
    fn create_fragment(&mut self) -> Self::Handle;
    fn create_portal(&mut self, target: &str) -> Self::Handle;

    fn set_attribute(
        &mut self,
        handle: &Self::Handle,
        key: &str,
        value: &PropValue,
    ) -> Result<(), HostError>;
    fn remove_attribute(&mut self, handle: &Self::Handle, key: &str) -> Result<(), HostError>;
    fn replace_text(&mut self, handle: &Self::Handle, value: &str) -> Result<(), HostError>;

    /// Attach `child` under `parent`, before `before` (append when `None`).
    /// Moves the child if it is already attached somewhere.
    fn insert_child(
        &mut self,
        parent: &Self::Handle,
        child: &Self::Handle,
        before: Option<&Self::Handle>,
    ) -> Result<(), HostError>;

    /// Detach and discard a node and its descendants.
    fn remove(&mut self, handle: &Self::Handle) -> Result<(), HostError>;

    /// Start delivering `event_bit` events on this node. `callback_token`
    /// is how the host finds the handler in its own registry; the applier
    /// passes the node id.
    fn subscribe(&mut self, handle: &Self::Handle, event_bit: u8, callback_token: u32);
    fn unsubscribe(&mut self, handle: &Self::Handle, event_bit: u8);
}
