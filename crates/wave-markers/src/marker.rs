//! Marker and placeholder markup
//!
//! A marker is the `+`/`−` glyph rendered inside a parent's text where an
//! inline child is anchored. A placeholder is the empty element an expanded
//! child's rendered subtree is mounted into.

use crate::html::Element;
use wave_model::BlipId;

/// Class every marker carries
pub const MARKER_CLASS: &str = "blip-thread-marker";
/// Marker class for a child the user has not read
pub const HAS_UNREAD_CLASS: &str = "has-unread";
/// Marker class for an expanded child
pub const EXPANDED_CLASS: &str = "expanded";
/// Marker class for a marker whose child is gone
pub const ORPHANED_CLASS: &str = "orphaned";
/// Class of render-target placeholders
pub const PLACEHOLDER_CLASS: &str = "inline-child-portal";

/// Attribute carrying the child id of a marker
pub const THREAD_ATTR: &str = "data-blip-thread";
/// Attribute flagging an orphaned marker
pub const ORPHANED_ATTR: &str = "data-orphaned";
/// Attribute carrying the child id of a placeholder
pub const PLACEHOLDER_ATTR: &str = "data-portal-for";

/// Glyph of a collapsed marker
pub const GLYPH_COLLAPSED: &str = "+";
/// Glyph of an expanded marker (U+2212 MINUS SIGN)
pub const GLYPH_EXPANDED: &str = "\u{2212}";

/// Marker for a known inline child
#[must_use]
pub fn marker(id: &BlipId, has_unread: bool, expanded: bool) -> Element {
    let mut class = String::from(MARKER_CLASS);
    if has_unread {
        class.push(' ');
        class.push_str(HAS_UNREAD_CLASS);
    }
    if expanded {
        class.push(' ');
        class.push_str(EXPANDED_CLASS);
    }
    Element::new("span")
        .with_attr("class", class)
        .with_attr(THREAD_ATTR, id.as_str())
        .with_text(if expanded { GLYPH_EXPANDED } else { GLYPH_COLLAPSED })
}

/// Marker whose child no longer exists
#[must_use]
pub fn orphan_marker(id: &str) -> Element {
    Element::new("span")
        .with_attr("class", format!("{MARKER_CLASS} {ORPHANED_CLASS}"))
        .with_attr(THREAD_ATTR, id)
        .with_attr(ORPHANED_ATTR, "true")
        .with_text(GLYPH_COLLAPSED)
}

/// Empty render target for an expanded child
#[must_use]
pub fn placeholder(id: &BlipId) -> Element {
    Element::new("div")
        .with_attr("class", PLACEHOLDER_CLASS)
        .with_attr(PLACEHOLDER_ATTR, id.as_str())
}

/// Child id of a marker element
#[inline]
#[must_use]
pub fn marker_id(el: &Element) -> Option<&str> {
    el.attr(THREAD_ATTR)
}

/// Whether a marker element is orphaned
#[inline]
#[must_use]
pub fn is_orphan(el: &Element) -> bool {
    el.has_class(ORPHANED_CLASS) || el.attr(ORPHANED_ATTR) == Some("true")
}

/// Whether an element is a render-target placeholder
#[inline]
#[must_use]
pub fn is_placeholder(el: &Element) -> bool {
    el.attr(PLACEHOLDER_ATTR).is_some() || el.has_class(PLACEHOLDER_CLASS)
}

/// Child id of a placeholder element
#[inline]
#[must_use]
pub fn placeholder_id(el: &Element) -> Option<&str> {
    el.attr(PLACEHOLDER_ATTR)
}
