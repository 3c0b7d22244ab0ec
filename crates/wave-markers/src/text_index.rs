//! Flattened text index
//!
//! Maps offsets in a fragment's visible text to text nodes. Offsets count
//! UTF-16 code units over the text nodes in document order. Marker glyphs,
//! placeholders, comments and raw-text element bodies are not visible text.

use crate::html::{Fragment, Node};
use crate::marker::{is_placeholder, marker_id};

/// One text node of the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    /// Path of the text node inside the fragment
    pub path: Vec<usize>,
    /// First offset covered
    pub start: usize,
    /// One past the last offset covered
    pub end: usize,
}

/// Where an offset lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Inside or at the end of a text span
    Text {
        /// Index into [`TextIndex::spans`]
        span: usize,
        /// Offset relative to the span start
        offset: usize,
    },
    /// Past all visible text
    End,
}

/// Ordered text spans of a fragment
#[derive(Debug, Clone, Default)]
pub struct TextIndex {
    spans: Vec<TextSpan>,
    len: usize,
}

impl TextIndex {
    /// Index a fragment
    #[must_use]
    pub fn build(fragment: &Fragment) -> Self {
        let mut spans = Vec::new();
        let mut len = 0;
        fragment.walk(|path, node| match node {
            Node::Text(text) => {
                let units = utf16_len(text);
                if units > 0 {
                    spans.push(TextSpan {
                        path: path.to_vec(),
                        start: len,
                        end: len + units,
                    });
                    len += units;
                }
                false
            }
            Node::Element(el) => marker_id(el).is_none() && !is_placeholder(el) && !el.is_raw_text(),
            Node::Comment(_) => false,
        });
        Self { spans, len }
    }

    /// Visible text length
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether there is no visible text
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Spans in document order
    #[inline]
    #[must_use]
    pub fn spans(&self) -> &[TextSpan] {
        &self.spans
    }

    /// Resolve an offset
    ///
    /// An offset on a boundary between two spans resolves to the end of the
    /// earlier one.
    #[must_use]
    pub fn locate(&self, offset: usize) -> Position {
        self.spans
            .iter()
            .position(|span| offset <= span.end)
            .map_or(Position::End, |i| Position::Text {
                span: i,
                offset: offset.saturating_sub(self.spans[i].start),
            })
    }
}

/// Length of `text` in UTF-16 code units
#[inline]
#[must_use]
pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Byte index of a UTF-16 offset into `text`
///
/// Offsets inside a surrogate pair snap forward to the next character
/// boundary; offsets past the end clamp to `text.len()`.
#[must_use]
pub fn byte_index(text: &str, units: usize) -> usize {
    let mut seen = 0;
    for (i, c) in text.char_indices() {
        if seen >= units {
            return i;
        }
        seen += c.len_utf16();
    }
    text.len()
}
