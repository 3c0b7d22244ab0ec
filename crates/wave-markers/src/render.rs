//! Render-target resolution
//!
//! After a parent's markup exists, expanded inline children are rendered
//! separately and mounted into the placeholders the injector left behind.

use crate::html::{Fragment, Node};
use crate::marker::{is_placeholder, placeholder_id, PLACEHOLDER_ATTR};
use std::collections::HashMap;
use wave_model::BlipId;

/// Result of mounting rendered children into parent markup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mounted {
    /// Parent markup with children mounted
    pub html: String,
    /// Children that found their placeholder, document order
    pub mounted: Vec<BlipId>,
    /// Placeholders left empty because no rendering was supplied
    pub unresolved: Vec<BlipId>,
}

/// Placeholder ids of `html`, document order
#[must_use]
pub fn placeholder_ids(html: &str) -> Vec<BlipId> {
    if !html.contains(PLACEHOLDER_ATTR) {
        return Vec::new();
    }
    let mut ids = Vec::new();
    Fragment::parse(html).walk(|_, node| match node.as_element() {
        Some(el) if is_placeholder(el) => {
            if let Some(id) = placeholder_id(el) {
                ids.push(BlipId::from(id));
            }
            false
        }
        Some(_) => true,
        None => false,
    });
    ids
}

/// Mount rendered children into their placeholders
///
/// A placeholder's existing content is replaced, so mounting the same
/// rendering twice is harmless.
#[must_use]
pub fn mount(html: &str, rendered: &HashMap<BlipId, String>) -> Mounted {
    if !html.contains(PLACEHOLDER_ATTR) {
        return Mounted {
            html: html.to_string(),
            ..Mounted::default()
        };
    }
    let mut fragment = Fragment::parse(html);
    let mut result = Mounted::default();
    mount_nodes(&mut fragment.nodes, rendered, &mut result);
    result.html = fragment.to_html();
    result
}

fn mount_nodes(nodes: &mut [Node], rendered: &HashMap<BlipId, String>, out: &mut Mounted) {
    for node in nodes.iter_mut() {
        let Some(el) = node.as_element_mut() else {
            continue;
        };
        if !is_placeholder(el) {
            mount_nodes(&mut el.children, rendered, out);
            continue;
        }
        let Some(id) = placeholder_id(el).map(BlipId::from) else {
            continue;
        };
        match rendered.get(&id) {
            Some(child_html) => {
                el.children = Fragment::parse(child_html).nodes;
                out.mounted.push(id);
            }
            None => out.unresolved.push(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inject::inject;
    use std::collections::HashSet;
    use wave_model::InlineChild;

    #[test]
    fn mounts_into_injected_placeholders() {
        let expanded: HashSet<BlipId> = [BlipId::from("c1")].into_iter().collect();
        let parent = inject("<p>ab</p>", &[InlineChild::new("c1", 1, true)], &expanded);
        assert_eq!(placeholder_ids(&parent), vec![BlipId::from("c1")]);

        let rendered: HashMap<BlipId, String> =
            [(BlipId::from("c1"), "<p>child</p>".to_string())].into_iter().collect();
        let mounted = mount(&parent, &rendered);
        assert_eq!(mounted.mounted, vec![BlipId::from("c1")]);
        assert!(mounted.unresolved.is_empty());
        assert!(mounted
            .html
            .ends_with(r#"<div class="inline-child-portal" data-portal-for="c1"><p>child</p></div>"#));
    }

    #[test]
    fn reports_unresolved_placeholders() {
        let html = r#"<p>x</p><div class="inline-child-portal" data-portal-for="c9"></div>"#;
        let mounted = mount(html, &HashMap::new());
        assert_eq!(mounted.unresolved, vec![BlipId::from("c9")]);
        assert_eq!(mounted.html, html);
    }

    #[test]
    fn markup_without_placeholders_is_untouched() {
        let mounted = mount("<P>x", &HashMap::new());
        assert_eq!(mounted.html, "<P>x");
        assert!(placeholder_ids("<p>x</p>").is_empty());
    }
}
