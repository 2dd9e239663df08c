//! # vango-ssr
//!
//! Server-side rendering: serialize a VNode tree to escaped UTF-8 HTML in a
//! single pass, stamping hydration ids on event-bearing elements along the
//! way. There is no incremental mode here - the HTML applier renders from
//! scratch every time; live updates travel as patches, not markup.

mod escape;
mod renderer;

pub use escape::{escape_html, sanitize_url};
pub use renderer::Renderer;

use std::io::Write;

use vango_core::VNode;

/// Writing to the sink failed. The renderer itself has no other failure
/// modes.
#[derive(Debug, thiserror::Error)]
pub enum SsrError {
    #[error("failed writing to sink: {0}")]
    Io(#[from] std::io::Error),
}

/// Render one tree with a fresh hydration counter.
pub fn render(tree: &VNode) -> String {
    Renderer::new().render_to_string(tree)
}

/// Render one tree into an arbitrary byte sink.
pub fn render_to(tree: &VNode, sink: &mut impl Write) -> Result<(), SsrError> {
    Renderer::new().render(tree, sink)
}
