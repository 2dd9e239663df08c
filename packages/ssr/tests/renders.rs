use vango_core::prelude::*;

#[test]
fn simple_tree() {
    let tree = VNode::element(
        "section",
        Props::new().with("class", "hero"),
        vec![
            VNode::element("h1", Props::new(), vec![VNode::text("Vango")]),
            VNode::element("p", Props::new(), vec![VNode::text("server-driven UI")]),
        ],
    );
    assert_eq!(
        vango_ssr::render(&tree),
        "<section class=\"hero\"><h1>Vango</h1><p>server-driven UI</p></section>"
    );
}

#[test]
fn void_elements_have_no_closing_tag() {
    let tree = VNode::element(
        "div",
        Props::new(),
        vec![
            VNode::element("br", Props::new(), vec![]),
            VNode::element("img", Props::new().with("src", "/logo.png"), vec![]),
            VNode::element("hr", Props::new(), vec![]),
        ],
    );
    assert_eq!(
        vango_ssr::render(&tree),
        "<div><br/><img src=\"/logo.png\"/><hr/></div>"
    );
}

#[test]
fn fragments_render_children_between_markers() {
    let tree = VNode::element(
        "ul",
        Props::new(),
        vec![VNode::fragment(vec![
            VNode::element("li", Props::new(), vec![VNode::text("a")]),
            VNode::element("li", Props::new(), vec![VNode::text("b")]),
        ])],
    );
    assert_eq!(
        vango_ssr::render(&tree),
        "<ul><!--[--><li>a</li><li>b</li><!--]--></ul>"
    );
}

#[test]
fn event_props_never_serialize_as_attributes() {
    let tree = VNode::element(
        "button",
        Props::new()
            .with("onClick", HandlerId(42))
            .with("id", "go"),
        vec![VNode::text("go")],
    );
    let html = vango_ssr::render(&tree);
    assert!(!html.contains("onClick"));
    assert!(!html.contains("42"));
    assert_eq!(
        html,
        "<button data-hid=\"h1\" data-events=\"1\" id=\"go\">go</button>"
    );
}

#[test]
fn key_and_ref_are_framework_internal() {
    let tree = VNode::element(
        "li",
        Props::new().with("key", "7").with("ref", "row"),
        vec![VNode::text("x")],
    );
    assert_eq!(vango_ssr::render(&tree), "<li>x</li>");
}

#[test]
fn numeric_and_boolean_values_render_textually() {
    let tree = VNode::element(
        "td",
        Props::new()
            .with("colspan", 2i64)
            .with("data-ratio", 0.5f64),
        vec![],
    );
    assert_eq!(
        vango_ssr::render(&tree),
        "<td colspan=\"2\" data-ratio=\"0.5\"></td>"
    );
}

#[test]
fn renders_into_any_byte_sink() {
    let tree = VNode::element("em", Props::new(), vec![VNode::text("hi")]);
    let mut sink = Vec::new();
    vango_ssr::render_to(&tree, &mut sink).unwrap();
    assert_eq!(sink, b"<em>hi</em>");
}
