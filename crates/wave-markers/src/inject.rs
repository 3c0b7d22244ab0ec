//! Marker injection
//!
//! Rewrites a parent blip's content so that every inline child has exactly
//! one marker at its anchor and every expanded child has one placeholder to
//! render into. Existing markers are refreshed in place; markers whose child
//! is unknown are kept and flagged orphaned. The output of [`inject`] is a
//! fixed point: injecting it again with the same arguments returns it
//! unchanged.

use crate::html::{Element, Fragment, Node};
use crate::marker::{
    is_orphan, is_placeholder, marker, marker_id, orphan_marker, placeholder, THREAD_ATTR,
};
use crate::text_index::{byte_index, Position, TextIndex};
use std::collections::{HashMap, HashSet};
use wave_model::{BlipId, InlineChild};

/// Inject markers and placeholders into `content`
///
/// Never fails: anchors past the end of the text append the marker at the
/// very end, and unparseable markup is repaired leniently.
#[must_use]
pub fn inject(content: &str, children: &[InlineChild], expanded: &HashSet<BlipId>) -> String {
    if content.is_empty() || (children.is_empty() && !content.contains(THREAD_ATTR)) {
        return content.to_string();
    }

    let mut known: HashMap<&str, &InlineChild> = HashMap::with_capacity(children.len());
    for child in children {
        known.entry(child.id.as_str()).or_insert(child);
    }

    let mut fragment = Fragment::parse(content);
    fragment.retain_elements(|el| !is_placeholder(el));
    fragment.normalize();

    let mut present = HashSet::new();
    refresh_markers(&mut fragment.nodes, &known, expanded, &mut present);

    let mut missing: Vec<&InlineChild> = known
        .values()
        .filter(|c| !present.contains(c.id.as_str()))
        .copied()
        .collect();
    missing.sort_by(|a, b| (a.anchor_position, &a.id).cmp(&(b.anchor_position, &b.id)));
    let mut groups: Vec<(usize, Vec<Element>)> = Vec::new();
    for child in missing {
        let el = marker(&child.id, !child.is_read, expanded.contains(&child.id));
        let offset = child.anchor_position as usize;
        match groups.last_mut() {
            Some((at, els)) if *at == offset => els.push(el),
            _ => groups.push((offset, vec![el])),
        }
    }
    // Markers carry no text, so inserting the last anchor first keeps earlier offsets valid
    for (offset, els) in groups.into_iter().rev() {
        insert_at_offset(&mut fragment, offset, els);
    }
    tracing::trace!(
        "Injected markers: {} refreshed, {} children",
        present.len(),
        known.len()
    );

    place_placeholders(&mut fragment, expanded);
    fragment.normalize();
    fragment.to_html()
}

fn refresh_markers(
    nodes: &mut [Node],
    known: &HashMap<&str, &InlineChild>,
    expanded: &HashSet<BlipId>,
    present: &mut HashSet<String>,
) {
    for node in nodes.iter_mut() {
        let Node::Element(el) = node else {
            continue;
        };
        match marker_id(el).map(str::to_owned) {
            Some(id) => {
                *el = match known.get(id.as_str()) {
                    Some(child) => marker(&child.id, !child.is_read, expanded.contains(&child.id)),
                    None => orphan_marker(&id),
                };
                present.insert(id);
            }
            None => refresh_markers(&mut el.children, known, expanded, present),
        }
    }
}

/// Insert `els` side by side at a text offset, in the given order
fn insert_at_offset(fragment: &mut Fragment, offset: usize, els: Vec<Element>) {
    let index = TextIndex::build(fragment);
    if let Position::Text { span, offset: local } = index.locate(offset) {
        let path = &index.spans()[span].path;
        if let Some((&at, parent)) = path.split_last() {
            if let Some(siblings) = fragment.children_mut(parent) {
                let split = match siblings.get(at) {
                    Some(Node::Text(text)) => {
                        let cut = byte_index(text, local);
                        Some((text[..cut].to_string(), text[cut..].to_string()))
                    }
                    _ => None,
                };
                if let Some((head, tail)) = split {
                    let mut replacement = Vec::with_capacity(els.len() + 2);
                    if !head.is_empty() {
                        replacement.push(Node::Text(head));
                    }
                    replacement.extend(els.into_iter().map(Node::Element));
                    if !tail.is_empty() {
                        replacement.push(Node::Text(tail));
                    }
                    siblings.splice(at..=at, replacement);
                    return;
                }
            }
        }
    }
    fragment.nodes.extend(els.into_iter().map(Node::Element));
}

fn place_placeholders(fragment: &mut Fragment, expanded: &HashSet<BlipId>) {
    if expanded.is_empty() {
        return;
    }
    let mut targets: Vec<(Vec<usize>, BlipId)> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    fragment.walk(|path, node| {
        let Some(el) = node.as_element() else {
            return false;
        };
        match marker_id(el) {
            Some(id) => {
                if !is_orphan(el) && expanded.contains(id) && seen.insert(id.to_string()) {
                    targets.push((path.to_vec(), BlipId::from(id)));
                }
                false
            }
            None => true,
        }
    });

    // Reverse document order keeps earlier paths valid while inserting
    for (marker_path, id) in targets.into_iter().rev() {
        let anchor = placeholder_anchor(fragment, &marker_path);
        if let Some((&at, parent)) = anchor.split_last() {
            if let Some(siblings) = fragment.children_mut(parent) {
                siblings.insert(at + 1, Node::Element(placeholder(&id)));
            }
        }
    }
}

/// Node the placeholder for the marker at `marker_path` goes after
///
/// The nearest `li` ancestor, else the nearest `p`, else the marker's parent.
/// A top-level marker is its own anchor.
fn placeholder_anchor(fragment: &Fragment, marker_path: &[usize]) -> Vec<usize> {
    if marker_path.len() <= 1 {
        return marker_path.to_vec();
    }
    let ancestor_named = |tag: &str| {
        (1..marker_path.len())
            .rev()
            .map(|n| &marker_path[..n])
            .find(|p| {
                fragment
                    .node(p)
                    .and_then(Node::as_element)
                    .is_some_and(|el| el.name == tag)
            })
    };
    ancestor_named("li")
        .or_else(|| ancestor_named("p"))
        .unwrap_or(&marker_path[..marker_path.len() - 1])
        .to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn child(id: &str, anchor: u32, is_read: bool) -> InlineChild {
        InlineChild::new(id, anchor, is_read)
    }

    fn set(ids: &[&str]) -> HashSet<BlipId> {
        ids.iter().map(|id| BlipId::from(*id)).collect()
    }

    const M: &str = r#"<span class="blip-thread-marker" data-blip-thread="#;

    #[test]
    fn fast_paths_return_input() {
        assert_eq!(inject("", &[child("c", 0, true)], &set(&[])), "");
        assert_eq!(inject("<P>raw</P>", &[], &set(&["c"])), "<P>raw</P>");
    }

    #[test]
    fn inserts_marker_at_anchor() {
        let out = inject("<p>Hello world</p>", &[child("c1", 5, true)], &set(&[]));
        assert_eq!(out, format!(r#"<p>Hello{M}"c1">+</span> world</p>"#));
    }

    #[test]
    fn anchor_zero_and_past_end() {
        let out = inject("<p>ab</p>", &[child("a", 0, true), child("z", 99, true)], &set(&[]));
        assert_eq!(out, format!(r#"<p>{M}"a">+</span>ab</p>{M}"z">+</span>"#));
    }

    #[test]
    fn unread_child_gets_class() {
        let out = inject("<p>ab</p>", &[child("c1", 1, false)], &set(&[]));
        assert!(out.contains(r#"class="blip-thread-marker has-unread""#));
    }

    #[test]
    fn shared_anchor_orders_by_id() {
        let out = inject("<p>ab</p>", &[child("y", 1, true), child("x", 1, true)], &set(&[]));
        assert_eq!(out, format!(r#"<p>a{M}"x">+</span>{M}"y">+</span>b</p>"#));
    }

    #[test]
    fn shared_anchor_at_span_edges_orders_by_id() {
        let start = inject("<p>ab</p>", &[child("y", 0, true), child("x", 0, true)], &set(&[]));
        assert_eq!(start, format!(r#"<p>{M}"x">+</span>{M}"y">+</span>ab</p>"#));

        let past_end = inject("<p>ab</p>", &[child("q", 50, true), child("p", 50, true)], &set(&[]));
        assert_eq!(past_end, format!(r#"<p>ab</p>{M}"p">+</span>{M}"q">+</span>"#));
    }

    #[test]
    fn expanded_child_in_paragraph_gets_placeholder_after_paragraph() {
        let out = inject("<p>Hello world</p><p>next</p>", &[child("c1", 5, true)], &set(&["c1"]));
        assert_eq!(
            out,
            "<p>Hello<span class=\"blip-thread-marker expanded\" data-blip-thread=\"c1\">\u{2212}</span> world</p>\
             <div class=\"inline-child-portal\" data-portal-for=\"c1\"></div><p>next</p>"
        );
    }

    #[test]
    fn list_item_wins_over_paragraph() {
        let out = inject("<ul><li><p>item</p></li></ul>", &[child("c1", 2, true)], &set(&["c1"]));
        assert!(out.contains("</p></li><div class=\"inline-child-portal\" data-portal-for=\"c1\"></div></ul>"));
    }

    #[test]
    fn placeholder_follows_direct_parent_or_top_level_marker() {
        let nested = inject("<div><em>ab</em></div>", &[child("c1", 1, true)], &set(&["c1"]));
        assert!(nested.contains("</span>b</em><div class=\"inline-child-portal\""));

        let top = inject("ab", &[child("c1", 1, true)], &set(&["c1"]));
        assert_eq!(
            top,
            "a<span class=\"blip-thread-marker expanded\" data-blip-thread=\"c1\">\u{2212}</span>\
             <div class=\"inline-child-portal\" data-portal-for=\"c1\"></div>b"
        );
    }

    #[test]
    fn existing_markers_are_refreshed_and_unknown_ones_orphaned() {
        let content = format!(r#"<p>a{M}"c1">+</span>b{M}"gone">+</span></p>"#);
        let out = inject(&content, &[child("c1", 1, false)], &set(&["c1"]));
        assert!(out.contains("blip-thread-marker has-unread expanded\" data-blip-thread=\"c1\">\u{2212}"));
        assert!(out.contains(r#"<span class="blip-thread-marker orphaned" data-blip-thread="gone" data-orphaned="true">+</span>"#));
        assert_eq!(out.matches("data-blip-thread=\"c1\"").count(), 1);
    }

    #[test]
    fn orphans_survive_without_children() {
        let content = format!(r#"<p>x{M}"gone">+</span></p>"#);
        let out = inject(&content, &[], &set(&[]));
        assert!(out.contains("orphaned"));
    }

    #[test]
    fn stale_placeholders_are_removed() {
        let content = "<p>ab</p><div class=\"inline-child-portal\" data-portal-for=\"old\"></div>";
        let out = inject(content, &[child("c1", 1, true)], &set(&[]));
        assert!(!out.contains("inline-child-portal"));
    }

    #[test]
    fn collapsing_removes_placeholder() {
        let children = [child("c1", 1, true)];
        let expanded = inject("<p>ab</p>", &children, &set(&["c1"]));
        let collapsed = inject(&expanded, &children, &set(&[]));
        assert_eq!(collapsed, format!(r#"<p>a{M}"c1">+</span>b</p>"#));
    }

    #[test]
    fn offsets_ignore_existing_markers() {
        let content = format!(r#"<p>ab{M}"c1">+</span>cd</p>"#);
        let out = inject(&content, &[child("c1", 2, true), child("c2", 3, true)], &set(&[]));
        assert_eq!(out, format!(r#"<p>ab{M}"c1">+</span>c{M}"c2">+</span>d</p>"#));
    }

    #[test]
    fn reinjection_is_a_fixed_point() {
        let children = [child("c1", 3, false), child("c2", 7, true), child("c3", 40, true)];
        let expanded = set(&["c1", "c3"]);
        let once = inject("<ul><li>one two</li><li>three</li></ul>", &children, &expanded);
        assert_eq!(inject(&once, &children, &expanded), once);
    }
}
