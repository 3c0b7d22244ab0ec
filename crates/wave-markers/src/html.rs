//! Lenient HTML fragment model
//!
//! Blip content is a serialized rich-text fragment. This module covers the
//! subset of HTML that content uses:
//! - Elements with attributes, including void and raw-text elements
//! - Text, with entities decoded on parse and re-encoded on output
//! - Comments
//!
//! Parsing never fails. Unclosed tags are closed at the end of input, stray
//! end tags are dropped, and a `<p>` or `<li>` opened directly inside another
//! one closes it first. Serialization is canonical: every attribute is
//! double-quoted and every non-void element gets an end tag, so parsing the
//! output again produces the same tree.

use std::fmt::Write as _;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// A node of a fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Element with attributes and children
    Element(Element),
    /// Decoded text
    Text(String),
    /// Comment body
    Comment(String),
}

impl Node {
    /// Element, if this node is one
    #[inline]
    #[must_use]
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Mutable element, if this node is one
    #[inline]
    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Self::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Text, if this node is a text node
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }
}

/// An element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lowercase tag name
    pub name: String,
    /// Attributes in source order, names lowercase, values decoded
    pub attrs: Vec<(String, String)>,
    /// Child nodes
    pub children: Vec<Node>,
}

impl Element {
    /// Create element without attributes or children
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// With attribute
    #[inline]
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// With child node
    #[inline]
    #[must_use]
    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// With text child
    #[inline]
    #[must_use]
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_child(Node::Text(text.into()))
    }

    /// Attribute value
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set or replace an attribute
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_ascii_lowercase();
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name, value)),
        }
    }

    /// Whether the `class` attribute lists `class`
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|c| c.split_ascii_whitespace().any(|c| c == class))
    }

    /// Void elements have no children and no end tag
    #[inline]
    #[must_use]
    pub fn is_void(&self) -> bool {
        VOID_ELEMENTS.contains(&self.name.as_str())
    }

    /// Raw-text elements keep their body verbatim and contribute no visible text
    #[inline]
    #[must_use]
    pub fn is_raw_text(&self) -> bool {
        RAW_TEXT_ELEMENTS.contains(&self.name.as_str())
    }

    /// Concatenated descendant text
    #[must_use]
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Element(el) => collect_text(&el.children, out),
            Node::Comment(_) => {}
        }
    }
}

/// A parsed fragment: a forest of top-level nodes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fragment {
    /// Top-level nodes
    pub nodes: Vec<Node>,
}

impl Fragment {
    /// Parse a fragment
    #[must_use]
    pub fn parse(input: &str) -> Self {
        Parser::new(input).run()
    }

    /// Serialize canonically
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            write_node(&mut out, node, false);
        }
        out
    }

    /// Node at a path of child indexes
    #[must_use]
    pub fn node(&self, path: &[usize]) -> Option<&Node> {
        let (first, rest) = path.split_first()?;
        let mut node = self.nodes.get(*first)?;
        for &i in rest {
            node = node.as_element()?.children.get(i)?;
        }
        Some(node)
    }

    /// Mutable node at a path
    pub fn node_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        let (first, rest) = path.split_first()?;
        let mut node = self.nodes.get_mut(*first)?;
        for &i in rest {
            node = node.as_element_mut()?.children.get_mut(i)?;
        }
        Some(node)
    }

    /// Child list of the element at `parent`; the empty path is the top level
    pub fn children_mut(&mut self, parent: &[usize]) -> Option<&mut Vec<Node>> {
        if parent.is_empty() {
            return Some(&mut self.nodes);
        }
        self.node_mut(parent)?.as_element_mut().map(|el| &mut el.children)
    }

    /// Pre-order walk with paths
    ///
    /// `visit` returns whether to descend into an element's children.
    pub fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(&[usize], &Node) -> bool,
    {
        let mut path = Vec::new();
        walk_nodes(&self.nodes, &mut path, &mut visit);
    }

    /// Remove every element, at any depth, for which `keep` is false
    pub fn retain_elements<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Element) -> bool,
    {
        retain_nodes(&mut self.nodes, &mut keep);
    }

    /// Merge adjacent text nodes and drop empty ones
    pub fn normalize(&mut self) {
        normalize_nodes(&mut self.nodes);
    }
}

fn walk_nodes<F>(nodes: &[Node], path: &mut Vec<usize>, visit: &mut F)
where
    F: FnMut(&[usize], &Node) -> bool,
{
    for (i, node) in nodes.iter().enumerate() {
        path.push(i);
        if visit(path, node) {
            if let Node::Element(el) = node {
                walk_nodes(&el.children, path, visit);
            }
        }
        path.pop();
    }
}

fn retain_nodes<F>(nodes: &mut Vec<Node>, keep: &mut F)
where
    F: FnMut(&Element) -> bool,
{
    nodes.retain(|node| node.as_element().map_or(true, |el| keep(el)));
    for node in nodes.iter_mut() {
        if let Node::Element(el) = node {
            retain_nodes(&mut el.children, keep);
        }
    }
}

fn normalize_nodes(nodes: &mut Vec<Node>) {
    let mut merged: Vec<Node> = Vec::with_capacity(nodes.len());
    for mut node in nodes.drain(..) {
        match &mut node {
            Node::Text(t) if t.is_empty() => continue,
            Node::Text(t) => {
                if let Some(Node::Text(prev)) = merged.last_mut() {
                    prev.push_str(t);
                    continue;
                }
            }
            Node::Element(el) => normalize_nodes(&mut el.children),
            Node::Comment(_) => {}
        }
        merged.push(node);
    }
    *nodes = merged;
}

fn write_node(out: &mut String, node: &Node, raw: bool) {
    match node {
        Node::Text(t) if raw => out.push_str(t),
        Node::Text(t) => out.push_str(&html_escape::encode_text(t)),
        Node::Comment(c) => {
            out.push_str("<!--");
            out.push_str(c);
            out.push_str("-->");
        }
        Node::Element(el) => {
            out.push('<');
            out.push_str(&el.name);
            for (name, value) in &el.attrs {
                let _ = write!(
                    out,
                    " {}=\"{}\"",
                    name,
                    html_escape::encode_double_quoted_attribute(value)
                );
            }
            out.push('>');
            if el.is_void() {
                return;
            }
            let raw = el.is_raw_text();
            for child in &el.children {
                write_node(out, child, raw);
            }
            let _ = write!(out, "</{}>", el.name);
        }
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    stack: Vec<Element>,
    roots: Vec<Node>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            stack: Vec::new(),
            roots: Vec::new(),
        }
    }

    fn run(mut self) -> Fragment {
        let input = self.input;
        while self.pos < input.len() {
            let rest = &input[self.pos..];
            match rest.find('<') {
                Some(0) => self.markup(),
                Some(i) => {
                    self.text(&rest[..i]);
                    self.pos += i;
                }
                None => {
                    self.text(rest);
                    self.pos = input.len();
                }
            }
        }
        while let Some(el) = self.stack.pop() {
            self.attach(Node::Element(el));
        }
        Fragment { nodes: self.roots }
    }

    fn text(&mut self, raw: &str) {
        let decoded = html_escape::decode_html_entities(raw);
        self.attach(Node::Text(decoded.into_owned()));
    }

    fn attach(&mut self, node: Node) {
        let target = match self.stack.last_mut() {
            Some(el) => &mut el.children,
            None => &mut self.roots,
        };
        if let Node::Text(t) = &node {
            if t.is_empty() {
                return;
            }
            if let Some(Node::Text(prev)) = target.last_mut() {
                prev.push_str(t);
                return;
            }
        }
        target.push(node);
    }

    /// Handle input starting at a `<`
    fn markup(&mut self) {
        let input = self.input;
        let rest = &input[self.pos..];
        if let Some(body) = rest.strip_prefix("<!--") {
            let (comment, consumed) = match body.find("-->") {
                Some(end) => (&body[..end], 4 + end + 3),
                None => (body, rest.len()),
            };
            self.attach(Node::Comment(comment.to_string()));
            self.pos += consumed;
        } else if rest.starts_with("</") {
            match rest.find('>') {
                Some(end) => {
                    let name = rest[2..end].trim().to_ascii_lowercase();
                    self.close(&name);
                    self.pos += end + 1;
                }
                None => {
                    self.text(rest);
                    self.pos = input.len();
                }
            }
        } else if rest.starts_with("<!") || rest.starts_with("<?") {
            // doctype or processing instruction
            self.pos += rest.find('>').map_or(rest.len(), |end| end + 1);
        } else if rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
            self.start_tag();
        } else {
            self.attach(Node::Text("<".to_string()));
            self.pos += 1;
        }
    }

    fn start_tag(&mut self) {
        let input = self.input;
        let bytes = input.as_bytes();
        let len = bytes.len();
        let mut i = self.pos + 1;

        let name_start = i;
        while i < len && !(bytes[i].is_ascii_whitespace() || matches!(bytes[i], b'>' | b'/')) {
            i += 1;
        }
        let mut el = Element::new(&input[name_start..i]);
        let mut self_closing = false;

        loop {
            while i < len && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i >= len {
                break;
            }
            match bytes[i] {
                b'>' => {
                    i += 1;
                    break;
                }
                b'/' => {
                    i += 1;
                    if i < len && bytes[i] == b'>' {
                        self_closing = true;
                        i += 1;
                        break;
                    }
                    continue;
                }
                _ => {}
            }

            let attr_start = i;
            while i < len && !(bytes[i].is_ascii_whitespace() || matches!(bytes[i], b'=' | b'>' | b'/')) {
                i += 1;
            }
            if i == attr_start {
                // stray '='
                i += 1;
                continue;
            }
            let attr_name = input[attr_start..i].to_ascii_lowercase();

            while i < len && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            let mut value = String::new();
            if i < len && bytes[i] == b'=' {
                i += 1;
                while i < len && bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                if i < len && matches!(bytes[i], b'"' | b'\'') {
                    let quote = bytes[i];
                    i += 1;
                    let value_start = i;
                    while i < len && bytes[i] != quote {
                        i += 1;
                    }
                    value = html_escape::decode_html_entities(&input[value_start..i]).into_owned();
                    if i < len {
                        i += 1;
                    }
                } else {
                    let value_start = i;
                    while i < len && !(bytes[i].is_ascii_whitespace() || bytes[i] == b'>') {
                        i += 1;
                    }
                    value = html_escape::decode_html_entities(&input[value_start..i]).into_owned();
                }
            }
            if el.attr(&attr_name).is_none() {
                el.attrs.push((attr_name, value));
            }
        }
        self.pos = i;

        if self_closing || el.is_void() {
            self.attach(Node::Element(el));
        } else if el.is_raw_text() {
            self.raw_text(el);
        } else {
            if matches!(el.name.as_str(), "p" | "li")
                && self.stack.last().is_some_and(|top| top.name == el.name)
            {
                self.close(&el.name);
            }
            self.stack.push(el);
        }
    }

    fn raw_text(&mut self, mut el: Element) {
        let input = self.input;
        let rest = &input[self.pos..];
        let end_tag = format!("</{}", el.name);
        let (body, consumed) = match rest.to_ascii_lowercase().find(&end_tag) {
            Some(end) => {
                let after = rest[end..].find('>').map_or(rest.len(), |gt| end + gt + 1);
                (&rest[..end], after)
            }
            None => (rest, rest.len()),
        };
        if !body.is_empty() {
            el.children.push(Node::Text(body.to_string()));
        }
        self.pos += consumed;
        self.attach(Node::Element(el));
    }

    /// Close the innermost open element named `name`, and everything opened after it
    fn close(&mut self, name: &str) {
        let Some(at) = self.stack.iter().rposition(|el| el.name == name) else {
            return;
        };
        while self.stack.len() > at {
            if let Some(el) = self.stack.pop() {
                self.attach(Node::Element(el));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn roundtrip(input: &str) -> String {
        Fragment::parse(input).to_html()
    }

    #[test]
    fn parses_nested_elements_and_text() {
        let frag = Fragment::parse("<p>Hello <b>world</b></p>");
        assert_eq!(frag.nodes.len(), 1);
        let p = frag.nodes[0].as_element().unwrap();
        assert_eq!(p.name, "p");
        assert_eq!(p.text_content(), "Hello world");
    }

    #[test]
    fn canonicalizes_attributes() {
        assert_eq!(
            roundtrip("<A HREF=/x title='a \"q\"' disabled>x</A>"),
            r#"<a href="/x" title="a &quot;q&quot;" disabled="">x</a>"#
        );
    }

    #[test]
    fn decodes_and_reencodes_entities() {
        let frag = Fragment::parse("<p>a &amp; b &lt; c</p>");
        assert_eq!(frag.nodes[0].as_element().unwrap().text_content(), "a & b < c");
        assert_eq!(frag.to_html(), "<p>a &amp; b &lt; c</p>");
    }

    #[test]
    fn void_and_self_closing_elements() {
        assert_eq!(roundtrip("a<br>b<img src=x />c"), r#"a<br>b<img src="x">c"#);
    }

    #[test]
    fn repairs_malformed_markup() {
        assert_eq!(roundtrip("<p>one<p>two"), "<p>one</p><p>two</p>");
        assert_eq!(roundtrip("<ul><li>a<li>b</ul>"), "<ul><li>a</li><li>b</li></ul>");
        assert_eq!(roundtrip("x</span>y"), "xy");
        assert_eq!(roundtrip("<div><b>bold</div>"), "<div><b>bold</b></div>");
        assert_eq!(roundtrip("1 < 2"), "1 &lt; 2");
    }

    #[test]
    fn keeps_comments_and_raw_text() {
        assert_eq!(
            roundtrip("<!-- note --><script>if (a < b) {}</script>"),
            "<!-- note --><script>if (a < b) {}</script>"
        );
    }

    #[test]
    fn serialization_is_stable() {
        let messy = "<P CLASS=x>a<b>b<i>c</P>d &nbsp; <!--c--><br/>";
        let once = roundtrip(messy);
        assert_eq!(roundtrip(&once), once);
    }

    #[test]
    fn paths_address_nodes() {
        let mut frag = Fragment::parse("<p>a<b>b</b></p>");
        assert_eq!(frag.node(&[0, 1, 0]).and_then(Node::as_text), Some("b"));
        assert!(frag.node(&[0, 5]).is_none());
        frag.children_mut(&[0]).unwrap().push(Node::Text("c".into()));
        assert_eq!(frag.to_html(), "<p>a<b>b</b>c</p>");
    }

    #[test]
    fn retain_and_normalize() {
        let mut frag = Fragment::parse("a<span class=\"drop\"></span>b<em>c</em>");
        frag.retain_elements(|el| !el.has_class("drop"));
        assert_eq!(frag.nodes.len(), 3);
        frag.normalize();
        assert_eq!(frag.nodes.len(), 2);
        assert_eq!(frag.nodes[0].as_text(), Some("ab"));
    }
}
