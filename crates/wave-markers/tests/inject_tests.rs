use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::HashSet;
use wave_markers::html::Fragment;
use wave_markers::{inject, mount, placeholder_ids};
use wave_model::{BlipId, InlineChild};

const CONTENT: &str = "<p>Hello world, this is the parent.</p><ul><li>first point</li><li>second</li></ul>";

fn expanded(ids: &[&str]) -> HashSet<BlipId> {
    ids.iter().map(|id| BlipId::from(*id)).collect()
}

#[test]
fn test_unread_child_gets_one_collapsed_marker() {
    let children = [InlineChild::new("c1", 5, false)];
    let out = inject(CONTENT, &children, &expanded(&[]));

    assert_eq!(out.matches(r#"data-blip-thread="c1""#).count(), 1);
    assert!(out.contains(
        r#"<span class="blip-thread-marker has-unread" data-blip-thread="c1">+</span>"#
    ));
    assert!(!out.contains("inline-child-portal"));
}

#[test]
fn test_expanding_flips_glyph_and_adds_one_placeholder() {
    let children = [InlineChild::new("c1", 5, false)];
    let collapsed = inject(CONTENT, &children, &expanded(&[]));
    let out = inject(&collapsed, &children, &expanded(&["c1"]));

    assert!(out.contains(
        "<span class=\"blip-thread-marker has-unread expanded\" data-blip-thread=\"c1\">\u{2212}</span>"
    ));
    assert_eq!(placeholder_ids(&out), vec![BlipId::from("c1")]);
    // placeholder sits right after the paragraph holding the marker
    assert!(out.contains(
        "</p><div class=\"inline-child-portal\" data-portal-for=\"c1\"></div><ul>"
    ));
}

#[test]
fn test_marker_inside_list_item() {
    // "Hello world, this is the parent." is 32 units, "first" ends at 37
    let children = [InlineChild::new("c2", 37, true)];
    let out = inject(CONTENT, &children, &expanded(&["c2"]));
    assert!(out.contains("<li>first<span"));
    assert!(out.contains(" point</li><div class=\"inline-child-portal\" data-portal-for=\"c2\"></div><li>second"));
}

#[test]
fn test_surrogate_pairs_count_twice() {
    let children = [InlineChild::new("c1", 3, true)];
    let out = inject("<p>\u{1F600}ab</p>", &children, &expanded(&[]));
    assert!(out.starts_with("<p>\u{1F600}a<span"));
}

#[test]
fn test_mount_full_cycle() {
    let children = [InlineChild::new("c1", 5, true)];
    let parent = inject(CONTENT, &children, &expanded(&["c1"]));
    let rendered = [(BlipId::from("c1"), "<p>inline reply</p>".to_string())]
        .into_iter()
        .collect();
    let mounted = mount(&parent, &rendered);
    assert_eq!(mounted.mounted, vec![BlipId::from("c1")]);
    assert!(mounted.html.contains("<p>inline reply</p></div>"));

    // re-injecting mounted markup drops the stale subtree with the placeholder
    let collapsed = inject(&mounted.html, &children, &expanded(&[]));
    assert!(!collapsed.contains("inline reply"));
}

fn content_strategy() -> impl Strategy<Value = String> {
    let word = "[a-zA-Z\u{e9}\u{1F600} ]{0,12}";
    prop::collection::vec(
        (word, prop_oneof![Just("p"), Just("li"), Just("em"), Just("")]),
        1..6,
    )
    .prop_map(|parts| {
        let mut html = String::new();
        for (text, tag) in parts {
            if tag.is_empty() {
                html.push_str(&text);
            } else if tag == "li" {
                html.push_str(&format!("<ul><li>{text}</li></ul>"));
            } else {
                html.push_str(&format!("<{tag}>{text}</{tag}>"));
            }
        }
        html
    })
}

fn children_strategy() -> impl Strategy<Value = Vec<InlineChild>> {
    prop::collection::vec((0u32..60, any::<bool>()), 0..5).prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (anchor, read))| InlineChild::new(format!("c{i}"), anchor, read))
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_injection_is_idempotent(
        content in content_strategy(),
        children in children_strategy(),
        mask in any::<u8>(),
    ) {
        let open: HashSet<BlipId> = children
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, c)| c.id.clone())
            .collect();
        let once = inject(&content, &children, &open);
        let twice = inject(&once, &children, &open);
        prop_assert_eq!(&twice, &once);
    }

    #[test]
    fn prop_every_child_has_exactly_one_marker(
        content in content_strategy(),
        children in children_strategy(),
    ) {
        let out = inject(&content, &children, &HashSet::new());
        for child in &children {
            let needle = format!("data-blip-thread=\"{}\"", child.id);
            prop_assert_eq!(out.matches(&needle).count(), 1);
        }
    }

    #[test]
    fn prop_visible_text_is_preserved(
        content in content_strategy(),
        children in children_strategy(),
    ) {
        let strip = |html: &str| -> String {
            let frag = Fragment::parse(html);
            let mut text = String::new();
            frag.walk(|_, node| match node {
                wave_markers::html::Node::Text(t) => { text.push_str(t); false }
                wave_markers::html::Node::Element(el) => !el.attrs.iter().any(|(k, _)| k == "data-blip-thread"),
                wave_markers::html::Node::Comment(_) => false,
            });
            text
        };
        let out = inject(&content, &children, &HashSet::new());
        prop_assert_eq!(strip(&out), strip(&content));
    }
}
