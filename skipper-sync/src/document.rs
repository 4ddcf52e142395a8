//! Immutable XML document model for job configurations.
//!
//! Parsing keeps elements, attributes (in source order), text and comments.
//! Whitespace-only text that contains a line break is layout and is dropped;
//! CDATA sections become plain text; the XML declaration is replaced by a
//! canonical one on output.
//!
//! [`Document::to_xml`] emits a canonical form: two-space indentation,
//! self-closed empty elements, text-bearing elements on one line. Parsing
//! canonical output and serializing it again yields identical bytes.
//!
//! Every edit returns a new value; nothing mutates in place.

use quick_xml::escape::{escape, partial_escape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// Declaration emitted at the top of every serialized document.
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

const INDENT: &str = "  ";

/// Errors raised while parsing a document.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    /// The XML is not well-formed.
    #[error("malformed XML at byte {position}: {message}")]
    Malformed { position: usize, message: String },

    /// The input has no root element.
    #[error("document has no root element")]
    Empty,
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// A child of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

/// An XML element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// An element whose only content is `text`. Empty text gives an empty
    /// element.
    pub fn with_text(name: impl Into<String>, text: &str) -> Self {
        Self::new(name).with_text_content(text)
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Replace all content with `text`.
    pub fn with_text_content(mut self, text: &str) -> Self {
        self.children.clear();
        if !text.is_empty() {
            self.children.push(Node::Text(text.to_string()));
        }
        self
    }

    /// Concatenated text of a text-only element. `Some("")` for an empty
    /// element, `None` when the element has element or comment children.
    pub fn text(&self) -> Option<String> {
        let mut out = String::new();
        for child in &self.children {
            match child {
                Node::Text(text) => out.push_str(text),
                _ => return None,
            }
        }
        Some(out)
    }

    /// Direct element children.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    /// First direct child named `name`.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|el| el.name == name)
    }

    /// Text of the first direct child named `name`.
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name).and_then(Element::text)
    }

    /// First element named `name` in document order, `self` included.
    pub fn find(&self, name: &str) -> Option<&Element> {
        if self.name == name {
            return Some(self);
        }
        self.elements().find_map(|el| el.find(name))
    }

    /// Copy of `self` with the first descendant named `name` removed, along
    /// with the removed element. Siblings are untouched.
    pub fn without_descendant(&self, name: &str) -> (Option<Element>, Element) {
        let mut removed = None;
        let mut children = Vec::with_capacity(self.children.len());
        for child in &self.children {
            match child {
                Node::Element(el) if removed.is_none() => {
                    if el.name == name {
                        removed = Some(el.clone());
                        continue;
                    }
                    let (found, rest) = el.without_descendant(name);
                    removed = found;
                    children.push(Node::Element(rest));
                }
                other => children.push(other.clone()),
            }
        }
        let element = Element {
            name: self.name.clone(),
            attributes: self.attributes.clone(),
            children,
        };
        (removed, element)
    }

    /// Copy of `self` with the first element named `name` (in document
    /// order, `self` included) replaced by `edit(element)`. `None` when no
    /// element matches.
    pub fn replace_first(&self, name: &str, edit: &dyn Fn(&Element) -> Element) -> Option<Element> {
        if self.name == name {
            return Some(edit(self));
        }
        let mut replaced = false;
        let mut children = Vec::with_capacity(self.children.len());
        for child in &self.children {
            match child {
                Node::Element(el) if !replaced => match el.replace_first(name, edit) {
                    Some(new) => {
                        replaced = true;
                        children.push(Node::Element(new));
                    }
                    None => children.push(Node::Element(el.clone())),
                },
                other => children.push(other.clone()),
            }
        }
        replaced.then(|| Element {
            name: self.name.clone(),
            attributes: self.attributes.clone(),
            children,
        })
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A parsed configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: Element,
}

impl Document {
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// First element named `name` in document order.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.root.find(name)
    }

    /// Parse `xml`. Line endings are normalized to `\n` first.
    pub fn parse(xml: &str) -> Result<Self, DocumentError> {
        let xml = xml.replace("\r\n", "\n");
        let mut reader = Reader::from_str(&xml);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let position = reader.buffer_position();
            let malformed = |message: String| DocumentError::Malformed { position, message };
            match reader.read_event() {
                Ok(Event::Start(ref start)) => {
                    stack.push(open_element(start).map_err(malformed)?);
                }
                Ok(Event::Empty(ref start)) => {
                    let element = open_element(start).map_err(malformed)?;
                    attach(&mut stack, &mut root, element).map_err(malformed)?;
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| malformed("unexpected closing tag".to_string()))?;
                    attach(&mut stack, &mut root, element).map_err(malformed)?;
                }
                Ok(Event::Text(ref text)) => {
                    let text = text.unescape().map_err(|e| malformed(e.to_string()))?;
                    push_text(&mut stack, &text, false).map_err(malformed)?;
                }
                Ok(Event::CData(cdata)) => {
                    let bytes = cdata.into_inner();
                    let text = String::from_utf8_lossy(&bytes);
                    push_text(&mut stack, &text, true).map_err(malformed)?;
                }
                Ok(Event::Comment(ref comment)) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(comment).into_owned();
                        parent.children.push(Node::Comment(text));
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(malformed(e.to_string())),
            }
        }

        if let Some(open) = stack.last() {
            return Err(DocumentError::Malformed {
                position: xml.len(),
                message: format!("unclosed element <{}>", open.name),
            });
        }
        root.map(Document::new).ok_or(DocumentError::Empty)
    }

    /// Canonical serialization.
    pub fn to_xml(&self) -> String {
        let mut out = String::with_capacity(256);
        out.push_str(XML_DECLARATION);
        out.push('\n');
        write_element(&mut out, &self.root, 0, false);
        out.push('\n');
        out
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

fn open_element(start: &BytesStart<'_>) -> Result<Element, String> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = Element::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| e.to_string())?;
        element.attributes.push((key, value.into_owned()));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<(), String> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(format!("second root element <{}>", element.name)),
    }
}

fn push_text(stack: &mut [Element], text: &str, verbatim: bool) -> Result<(), String> {
    let layout = text.trim().is_empty() && text.contains('\n');
    let Some(parent) = stack.last_mut() else {
        if text.trim().is_empty() {
            return Ok(());
        }
        return Err("text outside the root element".to_string());
    };
    if layout && !verbatim {
        return Ok(());
    }
    if text.is_empty() {
        return Ok(());
    }
    match parent.children.last_mut() {
        Some(Node::Text(previous)) => previous.push_str(text),
        _ => parent.children.push(Node::Text(text.to_string())),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

fn write_element(out: &mut String, element: &Element, depth: usize, inline: bool) {
    out.push('<');
    out.push_str(&element.name);
    for (key, value) in &element.attributes {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape(value));
        out.push('"');
    }
    if element.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');

    let has_text = element.children.iter().any(|c| matches!(c, Node::Text(_)));
    let has_markup = element.children.iter().any(|c| !matches!(c, Node::Text(_)));
    if inline || has_text || !has_markup {
        // Mixed or text-only content is written as-is; indentation would
        // change the text.
        for child in &element.children {
            write_node(out, child, depth, true);
        }
    } else {
        for child in &element.children {
            out.push('\n');
            push_indent(out, depth + 1);
            write_node(out, child, depth + 1, false);
        }
        out.push('\n');
        push_indent(out, depth);
    }
    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
}

fn write_node(out: &mut String, node: &Node, depth: usize, inline: bool) {
    match node {
        Node::Element(el) => write_element(out, el, depth, inline),
        Node::Text(text) => out.push_str(&partial_escape(text)),
        Node::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
    }
}

fn push_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
