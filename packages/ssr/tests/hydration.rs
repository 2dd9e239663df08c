use vango_core::prelude::*;

#[test]
fn event_bearing_elements_get_sequential_hids() {
    let tree = VNode::element(
        "div",
        Props::new(),
        vec![
            VNode::element("button", Props::new().with("onClick", HandlerId(1)), vec![]),
            VNode::element("span", Props::new(), vec![]),
            VNode::element(
                "input",
                Props::new()
                    .with("onInput", HandlerId(2))
                    .with("onBlur", HandlerId(3)),
                vec![],
            ),
        ],
    );

    assert_eq!(
        vango_ssr::render(&tree),
        concat!(
            "<div>",
            "<button data-hid=\"h1\" data-events=\"1\"></button>",
            "<span></span>",
            "<input data-hid=\"h2\" data-events=\"36\"/>",
            "</div>"
        )
    );
}

#[test]
fn hid_counter_spans_the_whole_render() {
    let mut renderer = vango_ssr::Renderer::new();
    let button = VNode::element("button", Props::new().with("onClick", HandlerId(1)), vec![]);

    assert_eq!(
        renderer.render_to_string(&button),
        "<button data-hid=\"h1\" data-events=\"1\"></button>"
    );
    // Same renderer keeps counting.
    assert_eq!(
        renderer.render_to_string(&button),
        "<button data-hid=\"h2\" data-events=\"1\"></button>"
    );
}

#[test]
fn hid_count_equals_event_bearing_element_count() {
    let tree = VNode::element(
        "form",
        Props::new().with("onSubmit", HandlerId(1)),
        vec![
            VNode::element("input", Props::new().with("onInput", HandlerId(2)), vec![]),
            VNode::fragment(vec![VNode::element(
                "button",
                Props::new().with("onClick", HandlerId(3)),
                vec![VNode::text("go")],
            )]),
            VNode::element("p", Props::new(), vec![VNode::text("no events here")]),
        ],
    );

    let html = vango_ssr::render(&tree);
    assert_eq!(html.matches("data-hid=").count(), 3);
    for hid in ["h1", "h2", "h3"] {
        assert!(html.contains(&format!("data-hid=\"{hid}\"")));
    }
}

#[test]
fn hid_comes_right_after_the_tag_name() {
    let tree = VNode::element(
        "button",
        Props::new().with("class", "cta").with("onClick", HandlerId(1)),
        vec![],
    );
    assert_eq!(
        vango_ssr::render(&tree),
        "<button data-hid=\"h1\" data-events=\"1\" class=\"cta\"></button>"
    );
}

#[test]
fn portals_render_as_hidden_placeholders() {
    let tree = VNode::element(
        "div",
        Props::new(),
        vec![VNode::portal("#modal", vec![VNode::text("content")])],
    );
    assert_eq!(
        vango_ssr::render(&tree),
        "<div><div data-vango-portal=\"#modal\" style=\"display:none\"></div></div>"
    );
}
