//! Small element tree over quick-xml events.
//!
//! Annotated sentences are a single root element with mixed content:
//! text runs interleaved with tagged spans. The tree keeps that content
//! in document order so a span's inner text can be rebuilt exactly.

use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarkupError {
    #[error("malformed markup: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed attribute: {0}")]
    Attribute(#[from] AttrError),

    #[error("closing tag without a matching opening tag")]
    UnexpectedClose,

    #[error("element <{0}> is never closed")]
    Unclosed(String),

    #[error("no root element")]
    NoRoot,

    #[error("more than one root element")]
    MultipleRoots,

    #[error("text outside the root element")]
    TextOutsideRoot,
}

// ── Tree ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Element(Element),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Local name (namespace prefix dropped)
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    fn from_start(start: &BytesStart) -> Result<Self, MarkupError> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(quick_xml::Error::from)?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
        })
    }

    /// This element and every element below it, in document order.
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = vec![self];
        for child in &self.children {
            if let Node::Element(e) = child {
                out.extend(e.descendants());
            }
        }
        out
    }

    /// Content with child elements serialized as markup and text left as-is.
    pub fn inner_markup(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            match child {
                Node::Text(t) => out.push_str(t),
                Node::Element(e) => e.write_markup(&mut out),
            }
        }
        out
    }

    fn write_markup(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (k, v) in &self.attributes {
            out.push(' ');
            out.push_str(k);
            out.push_str("=\"");
            out.push_str(&escape(v, true));
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                Node::Text(t) => out.push_str(&escape(t, false)),
                Node::Element(e) => e.write_markup(out),
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

fn escape(raw: &str, in_attribute: bool) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

// ── Parsing ──────────────────────────────────────────────────────────

/// Parse a single-rooted markup string into an element tree.
pub fn parse(input: &str) -> Result<Element, MarkupError> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                if stack.is_empty() && root.is_some() {
                    return Err(MarkupError::MultipleRoots);
                }
                stack.push(Element::from_start(&start)?);
            }
            Event::Empty(start) => {
                let element = Element::from_start(&start)?;
                attach(&mut stack, &mut root, Node::Element(element))?;
            }
            Event::End(_) => {
                let element = stack.pop().ok_or(MarkupError::UnexpectedClose)?;
                attach(&mut stack, &mut root, Node::Element(element))?;
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(quick_xml::Error::from)?.into_owned();
                attach(&mut stack, &mut root, Node::Text(text))?;
            }
            Event::CData(data) => {
                let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                attach(&mut stack, &mut root, Node::Text(text))?;
            }
            Event::Eof => break,
            // declarations, comments, processing instructions, doctype
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(MarkupError::Unclosed(open.name));
    }
    root.ok_or(MarkupError::NoRoot)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    node: Node,
) -> Result<(), MarkupError> {
    if let Some(parent) = stack.last_mut() {
        // merge adjacent text runs so mixed content stays canonical
        if let Node::Text(t) = &node
            && let Some(Node::Text(prev)) = parent.children.last_mut()
        {
            prev.push_str(t);
            return Ok(());
        }
        parent.children.push(node);
        return Ok(());
    }
    match node {
        Node::Text(t) if t.trim().is_empty() => Ok(()),
        Node::Text(_) => Err(MarkupError::TextOutsideRoot),
        Node::Element(e) => {
            if root.is_some() {
                return Err(MarkupError::MultipleRoots);
            }
            *root = Some(e);
            Ok(())
        }
    }
}
