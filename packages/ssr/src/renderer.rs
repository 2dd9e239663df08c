//! One-shot HTML serialization of a VNode tree.

use std::io::Write;

use tracing::trace;
use vango_core::{events, PropValue, VElement, VNode};

use crate::escape::{escape_html, sanitize_url};
use crate::SsrError;

/// Elements with no closing tag and no children.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Attributes emitted as a bare name when the value is literally `true`, and
/// omitted entirely otherwise.
const BOOLEAN_ATTRIBUTES: &[&str] = &[
    "checked", "disabled", "readonly", "required", "selected", "defer", "async", "multiple",
    "autofocus",
];

/// Elements whose text children are emitted verbatim.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Streams a tree as UTF-8 HTML in a single pass.
///
/// The renderer owns the hydration-id counter, monotonically increasing
/// across everything it renders: each element carrying at least one event
/// prop is stamped `data-hid="h<N>"` (plus its `data-events` mask) so the
/// client can find it again without re-creating the DOM.
pub struct Renderer {
    next_hid: u32,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Renderer {
        Renderer { next_hid: 1 }
    }

    pub fn render(&mut self, tree: &VNode, sink: &mut impl Write) -> Result<(), SsrError> {
        self.render_node(tree, sink, false)?;
        Ok(())
    }

    pub fn render_to_string(&mut self, tree: &VNode) -> String {
        let mut buf = Vec::new();
        self.render(tree, &mut buf)
            .expect("rendering into a Vec cannot fail");
        String::from_utf8(buf).expect("renderer emits UTF-8")
    }

    fn render_node(&mut self, node: &VNode, sink: &mut impl Write, raw: bool) -> Result<(), SsrError> {
        match node {
            VNode::Text(text) => {
                if raw {
                    sink.write_all(text.text.as_bytes())?;
                } else {
                    escape_html(&text.text, sink)?;
                }
            }
            VNode::Element(el) => self.render_element(el, sink)?,
            VNode::Fragment(frag) => {
                // Boundary markers let hydration rebuild the fragment node.
                sink.write_all(b"<!--[-->")?;
                for child in &frag.children {
                    self.render_node(child, sink, raw)?;
                }
                sink.write_all(b"<!--]-->")?;
            }
            VNode::Portal(portal) => {
                // Portal content renders at its target on the client; the
                // document only carries a placeholder.
                sink.write_all(b"<div data-vango-portal=\"")?;
                escape_html(&portal.target, sink)?;
                sink.write_all(b"\" style=\"display:none\"></div>")?;
            }
        }
        Ok(())
    }

    fn render_element(&mut self, el: &VElement, sink: &mut impl Write) -> Result<(), SsrError> {
        sink.write_all(b"<")?;
        sink.write_all(el.tag.as_bytes())?;

        let mask = events::mask_of(&el.props);
        if mask != 0 {
            let hid = self.next_hid;
            self.next_hid += 1;
            write!(sink, " data-hid=\"h{hid}\" data-events=\"{mask}\"")?;
            trace!(tag = %el.tag, hid, "stamped hydration id");
        }

        for (name, value) in el.props.iter() {
            if name == "key" || name == "ref" || events::is_event_prop(name) {
                continue;
            }
            if BOOLEAN_ATTRIBUTES.contains(&name) {
                if matches!(value, PropValue::Bool(true)) {
                    sink.write_all(b" ")?;
                    sink.write_all(name.as_bytes())?;
                }
                continue;
            }
            let Some(mut text) = value.as_attr_text() else {
                continue;
            };
            if name == "href" || name == "src" {
                text = sanitize_url(&text).to_string();
            }
            sink.write_all(b" ")?;
            sink.write_all(name.as_bytes())?;
            sink.write_all(b"=\"")?;
            escape_html(&text, sink)?;
            sink.write_all(b"\"")?;
        }

        if VOID_ELEMENTS.contains(&el.tag.as_str()) {
            sink.write_all(b"/>")?;
            return Ok(());
        }

        sink.write_all(b">")?;
        let raw = RAW_TEXT_ELEMENTS.contains(&el.tag.as_str());
        for child in &el.children {
            self.render_node(child, sink, raw)?;
        }
        sink.write_all(b"</")?;
        sink.write_all(el.tag.as_bytes())?;
        sink.write_all(b">")?;
        Ok(())
    }
}
