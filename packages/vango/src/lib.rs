//! # Vango
//!
//! A fullstack UI framework core: components render immutable virtual-node
//! trees, a reactive signal graph decides what re-renders, a keyed diff
//! engine turns re-renders into targeted patches, and the patches flow to
//! whichever applier is listening - escaped HTML on the server, a live host
//! on the client, or the binary live-patch protocol in between.
//!
//! ```
//! use vango::prelude::*;
//!
//! let sink: Vec<(FiberId, Vec<Patch>)> = Vec::new();
//! let mut app = App::new(Box::new(sink));
//! let count = app.state(0);
//!
//! let reader = count.clone();
//! app.component(move || {
//!     VNode::element(
//!         "button",
//!         Props::new().with("onClick", HandlerId(1)),
//!         vec![VNode::text(format!("count: {}", reader.get()))],
//!     )
//! });
//!
//! app.run_until_idle();
//! count.set(1);
//! assert_eq!(app.tick(), 1);
//! ```

mod app;

pub use app::App;

pub use vango_core as core;
pub use vango_dom as dom;
pub use vango_liveview as liveview;
pub use vango_signals as signals;
pub use vango_ssr as ssr;

pub mod prelude {
    pub use crate::App;
    pub use vango_core::{
        diff, FiberId, HandlerId, NodeId, Patch, PropValue, Props, Scheduler, VNode,
    };
    pub use vango_dom::{hydrate, Host, HostApplier, HydrateConfig, MemoryDom};
    pub use vango_liveview::{LiveClient, LivePatchSink, LiveSession};
    pub use vango_signals::{batch, Computed, Runtime, State};
    pub use vango_ssr::render as render_html;
}
