//! # vango-core
//!
//! The reactive rendering core of Vango: an immutable virtual-node model, a
//! keyed diff engine with stable node ids, and a cooperative fiber scheduler
//! that re-renders dirty components and streams targeted patches to whatever
//! is listening - a live host applier, the HTML renderer, or the binary
//! live-patch codec.
//!
//! This crate is renderer-agnostic. It knows nothing about HTML strings,
//! browsers, or websockets; those live in `vango-ssr`, `vango-dom`, and
//! `vango-liveview`.
//!
//! ```
//! use vango_core::prelude::*;
//!
//! let prev = VNode::element("div", Props::new(), vec![VNode::text("a")]);
//! let next = VNode::element("div", Props::new(), vec![VNode::text("b")]);
//!
//! let patches = vango_core::diff::diff(Some(&prev), Some(&next));
//! assert_eq!(
//!     patches,
//!     vec![Patch::ReplaceText { node: NodeId(2), text: "b".into() }]
//! );
//! ```

pub mod diff;
pub mod error;
pub mod events;
pub mod node;
pub mod patch;
pub mod scheduler;

pub use diff::{diff, DiffSession, MountedNode};
pub use error::{RenderError, SchedulerError, StructureError};
pub use node::{
    validate, HandlerId, NodeFlags, NodeKind, PropValue, Props, VElement, VFragment, VNode,
    VPortal, VText,
};
pub use patch::{NodeId, Patch};
pub use scheduler::{
    FiberId, PatchSink, ReactiveBridge, RenderResult, Scheduler, SchedulerHandle,
};

pub mod prelude {
    pub use crate::diff::diff;
    pub use crate::node::{HandlerId, NodeFlags, PropValue, Props, VNode};
    pub use crate::patch::{NodeId, Patch};
    pub use crate::scheduler::{FiberId, Scheduler, SchedulerHandle};
}
