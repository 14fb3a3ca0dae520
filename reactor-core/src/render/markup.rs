//! Markup Model
//!
//! Rendered markup is parsed into a small tree of elements, text and comments.
//! The diff engine compares trees, patches address nodes by child-index paths,
//! and the tree serializes back to markup for the wire.
//!
//! Parsing is tolerant in the ways server-rendered HTML needs:
//!
//! - void elements (`input`, `br`, ...) never take children
//! - valueless attributes parse as empty strings
//! - an end tag closes the nearest matching open element, stray ones are ignored
//! - character references are decoded one at a time against the HTML5 table;
//!   an unknown one stays verbatim without affecting its neighbours
//! - adjacent text merges into one node

use std::borrow::Cow;
use std::fmt;

use indexmap::IndexMap;
use quick_xml::escape::{resolve_html5_entity, unescape_with};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Errors raised while parsing markup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("markup syntax error at byte {position}: {message}")]
pub struct MarkupError {
    pub position: u64,
    pub message: String,
}

/// Escape text or an attribute value for markup output.
pub fn escape(raw: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(raw)
}

/// A node in a markup tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

impl Node {
    /// Stable identity used when matching siblings: the `id` attribute, or
    /// `data-key` for elements that carry no id.
    pub fn key(&self) -> Option<&str> {
        match self {
            Node::Element(element) => element.key(),
            _ => None,
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Serialize this node to markup.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out);
        out
    }

    fn write_markup(&self, out: &mut String) {
        match self {
            Node::Element(element) => element.write_markup(out),
            Node::Text(text) => out.push_str(&escape(text)),
            Node::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
        }
    }

    fn text_content_into(&self, out: &mut String) {
        match self {
            Node::Element(element) => {
                for child in &element.children {
                    child.text_content_into(out);
                }
            }
            Node::Text(text) => out.push_str(text),
            Node::Comment(_) => {}
        }
    }
}

/// An element with ordered attributes and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub(crate) tag: String,
    pub(crate) attrs: IndexMap<String, String>,
    pub(crate) children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: IndexMap::new(),
            children: Vec::new(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn key(&self) -> Option<&str> {
        self.attr("id").or_else(|| self.attr("data-key"))
    }

    pub(crate) fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(name.into(), value.into());
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|classes| classes.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    /// Concatenated text of all descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            child.text_content_into(&mut out);
        }
        out
    }

    fn is_void(&self) -> bool {
        is_void(&self.tag)
    }

    fn write_markup(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (name, value) in &self.attrs {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape(value));
            out.push('"');
        }
        out.push('>');
        if self.is_void() && self.children.is_empty() {
            return;
        }
        for child in &self.children {
            child.write_markup(out);
        }
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }
}

/// A parsed markup document: a list of top-level nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    pub(crate) children: Vec<Node>,
}

impl Fragment {
    pub fn new(children: Vec<Node>) -> Self {
        Self { children }
    }

    /// Parse markup into a fragment.
    pub fn parse(markup: &str) -> Result<Self, MarkupError> {
        parse(markup)
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// The first top-level element, normally the component root.
    pub fn root(&self) -> Option<&Element> {
        self.children.iter().find_map(Node::as_element)
    }

    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            child.write_markup(&mut out);
        }
        out
    }

    /// All elements in document order (pre-order).
    pub fn elements(&self) -> Vec<&Element> {
        let mut found = Vec::new();
        collect_elements(&self.children, &mut found);
        found
    }

    /// Elements matching a simple selector, in document order.
    ///
    /// Supports compound selectors made of a tag, `#id` and `.class` parts,
    /// joined by the descendant combinator: `x-todo-item li.completed`.
    pub fn select(&self, selector: &str) -> Vec<&Element> {
        let steps: Vec<Compound<'_>> = selector.split_whitespace().map(Compound::parse).collect();
        let Some((last, ancestors)) = steps.split_last() else {
            return Vec::new();
        };

        let mut found = Vec::new();
        let mut path = Vec::new();
        select_into(&self.children, last, ancestors, &mut path, &mut found);
        found
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_markup())
    }
}

fn collect_elements<'a>(nodes: &'a [Node], found: &mut Vec<&'a Element>) {
    for node in nodes {
        if let Node::Element(element) = node {
            found.push(element);
            collect_elements(&element.children, found);
        }
    }
}

// ----------------------------------------------------------------------------
// Selectors
// ----------------------------------------------------------------------------

struct Compound<'s> {
    tag: Option<&'s str>,
    id: Option<&'s str>,
    classes: Vec<&'s str>,
}

impl<'s> Compound<'s> {
    fn parse(text: &'s str) -> Self {
        let mut compound = Compound {
            tag: None,
            id: None,
            classes: Vec::new(),
        };

        let mut rest = text;
        let tag_end = rest.find(['.', '#']).unwrap_or(rest.len());
        if tag_end > 0 {
            compound.tag = Some(&rest[..tag_end]);
        }
        rest = &rest[tag_end..];

        while let Some(marker) = rest.chars().next() {
            let body = &rest[1..];
            let end = body.find(['.', '#']).unwrap_or(body.len());
            match marker {
                '#' => compound.id = Some(&body[..end]),
                _ => compound.classes.push(&body[..end]),
            }
            rest = &body[end..];
        }
        compound
    }

    fn matches(&self, element: &Element) -> bool {
        self.tag.map_or(true, |tag| element.tag == tag)
            && self.id.map_or(true, |id| element.attr("id") == Some(id))
            && self.classes.iter().all(|class| element.has_class(class))
    }
}

fn select_into<'a>(
    nodes: &'a [Node],
    last: &Compound<'_>,
    ancestors: &[Compound<'_>],
    path: &mut Vec<&'a Element>,
    found: &mut Vec<&'a Element>,
) {
    for node in nodes {
        let Node::Element(element) = node else {
            continue;
        };
        if last.matches(element) && ancestors_match(ancestors, path) {
            found.push(element);
        }
        path.push(element);
        select_into(&element.children, last, ancestors, path, found);
        path.pop();
    }
}

/// Match ancestor steps right to left against the open element path.
fn ancestors_match(steps: &[Compound<'_>], path: &[&Element]) -> bool {
    let mut remaining = path;
    for step in steps.iter().rev() {
        match remaining.iter().rposition(|element| step.matches(element)) {
            Some(index) => remaining = &remaining[..index],
            None => return false,
        }
    }
    true
}

// ----------------------------------------------------------------------------
// Parsing
// ----------------------------------------------------------------------------

fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.iter().any(|void| void.eq_ignore_ascii_case(tag))
}

/// Parse markup into a [`Fragment`].
pub fn parse(markup: &str) -> Result<Fragment, MarkupError> {
    let mut reader = Reader::from_str(markup);
    {
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        config.trim_text(false);
    }

    let mut open: Vec<Element> = Vec::new();
    let mut roots: Vec<Node> = Vec::new();

    loop {
        let event = reader.read_event().map_err(|e| MarkupError {
            position: reader.buffer_position() as u64,
            message: e.to_string(),
        })?;

        match event {
            Event::Start(start) => {
                let element = element_from(&start, &reader)?;
                if element.is_void() {
                    append(&mut open, &mut roots, Node::Element(element));
                } else {
                    open.push(element);
                }
            }
            Event::Empty(start) => {
                let element = element_from(&start, &reader)?;
                append(&mut open, &mut roots, Node::Element(element));
            }
            Event::End(end) => {
                let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                if is_void(&name) {
                    continue;
                }
                // Close everything down to the nearest element with this name.
                if let Some(depth) = open.iter().rposition(|e| e.tag == name) {
                    while open.len() > depth {
                        if let Some(element) = open.pop() {
                            append(&mut open, &mut roots, Node::Element(element));
                        }
                    }
                }
            }
            Event::Text(text) => {
                let raw = String::from_utf8_lossy(&text);
                append_text(&mut open, &mut roots, decode_entities(&raw).into_owned());
            }
            Event::CData(data) => {
                append_text(&mut open, &mut roots, String::from_utf8_lossy(&data).into_owned());
            }
            Event::Comment(comment) => {
                let content = String::from_utf8_lossy(&comment).into_owned();
                append(&mut open, &mut roots, Node::Comment(content));
            }
            Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            Event::Eof => break,
        }
    }

    // Unclosed elements end at the end of input.
    while let Some(element) = open.pop() {
        append(&mut open, &mut roots, Node::Element(element));
    }

    Ok(Fragment::new(roots))
}

fn element_from(start: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Element, MarkupError> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());

    for attribute in start.html_attributes() {
        let attribute = attribute.map_err(|e| MarkupError {
            position: reader.buffer_position() as u64,
            message: e.to_string(),
        })?;
        let name = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let raw = String::from_utf8_lossy(&attribute.value);
        element.attrs.insert(name, decode_entities(&raw).into_owned());
    }
    Ok(element)
}

/// Decode character references in `raw`.
///
/// Each `&...;` is resolved on its own, so an unknown name or a bare `&`
/// stays as written while the references around it are still decoded.
pub(crate) fn decode_entities(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];

        let reference = tail[1..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '#'))
            .filter(|&end| end > 0 && tail[1 + end..].starts_with(';'))
            .map(|end| &tail[..end + 2]);
        match reference.and_then(|reference| unescape_with(reference, resolve_html5_entity).ok()) {
            Some(decoded) => {
                out.push_str(&decoded);
                rest = &tail[reference.map_or(1, str::len)..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn append(open: &mut [Element], roots: &mut Vec<Node>, node: Node) {
    match open.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

fn append_text(open: &mut [Element], roots: &mut Vec<Node>, text: String) {
    if text.is_empty() {
        return;
    }
    let siblings = match open.last_mut() {
        Some(parent) => &mut parent.children,
        None => roots,
    };
    match siblings.last_mut() {
        Some(Node::Text(previous)) => previous.push_str(&text),
        _ => siblings.push(Node::Text(text)),
    }
}
