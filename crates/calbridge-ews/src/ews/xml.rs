//! XML plumbing shared by SOAP and autodiscover.
//!
//! Requests are written with [`XmlWriter`], a thin wrapper over the
//! quick-xml writer that turns write failures into transport errors.
//! Responses are small, so they are read into an [`XmlNode`] tree keyed by
//! local names, which keeps namespace prefixes out of the parsers.

use std::borrow::Cow;
use std::io::Cursor;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Reader;

use crate::remote::{TransportError, TransportResult};

/// Streaming XML writer for request bodies.
pub struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    /// Starts a document with an XML declaration.
    pub fn new() -> TransportResult<Self> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(write_error)?;
        Ok(Self { writer })
    }

    /// Opens `name` with the given attributes.
    pub fn start(&mut self, name: &str, attributes: &[(&str, &str)]) -> TransportResult<()> {
        let mut element = BytesStart::new(name);
        for attribute in attributes {
            element.push_attribute(*attribute);
        }
        self.writer
            .write_event(Event::Start(element))
            .map_err(write_error)
    }

    pub fn end(&mut self, name: &str) -> TransportResult<()> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(write_error)
    }

    /// Writes a self-closing element.
    pub fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> TransportResult<()> {
        let mut element = BytesStart::new(name);
        for attribute in attributes {
            element.push_attribute(*attribute);
        }
        self.writer
            .write_event(Event::Empty(element))
            .map_err(write_error)
    }

    /// Writes `<name>text</name>`, escaping the text.
    pub fn text_element(
        &mut self,
        name: &str,
        attributes: &[(&str, &str)],
        text: &str,
    ) -> TransportResult<()> {
        self.start(name, attributes)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(write_error)?;
        self.end(name)
    }

    pub fn finish(self) -> TransportResult<String> {
        String::from_utf8(self.writer.into_inner().into_inner())
            .map_err(|e| TransportError::internal(format!("request body is not UTF-8: {}", e)))
    }
}

fn write_error(err: impl std::fmt::Display) -> TransportError {
    TransportError::internal(format!("failed to write request XML: {}", err))
}

/// One element of a parsed response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    /// Local name, without namespace prefix.
    pub name: String,
    /// Attributes by local name.
    pub attributes: Vec<(String, String)>,
    /// Concatenated, trimmed text content.
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    fn from_start(start: &BytesStart<'_>) -> TransportResult<Self> {
        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(read_error)?;
            let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
            let value = attribute.unescape_value().map_err(read_error)?.into_owned();
            attributes.push((key, value));
        }

        Ok(Self {
            name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            attributes,
            text: String::new(),
            children: Vec::new(),
        })
    }

    /// First direct child named `name`.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Direct children named `name`.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Follows a path of direct children.
    pub fn path(&self, names: &[&str]) -> Option<&XmlNode> {
        names.iter().try_fold(self, |node, name| node.child(name))
    }

    /// Text of the child at `names`, if present and non-empty.
    pub fn text_at(&self, names: &[&str]) -> Option<&str> {
        self.path(names)
            .map(|node| node.text.as_str())
            .filter(|text| !text.is_empty())
    }

    /// All descendants named `name`, depth first.
    pub fn descendants<'a>(&'a self, name: &str) -> Vec<&'a XmlNode> {
        let mut found = Vec::new();
        self.collect_descendants(name, &mut found);
        found
    }

    fn collect_descendants<'a>(&'a self, name: &str, found: &mut Vec<&'a XmlNode>) {
        for child in &self.children {
            if child.name == name {
                found.push(child);
            }
            child.collect_descendants(name, found);
        }
    }

    /// First descendant named `name`.
    pub fn find(&self, name: &str) -> Option<&XmlNode> {
        self.children
            .iter()
            .find_map(|child| if child.name == name { Some(child) } else { child.find(name) })
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Parses a document and returns its root element.
pub fn parse_document(xml: &str) -> TransportResult<XmlNode> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => stack.push(XmlNode::from_start(&e)?),
            Ok(Event::Empty(e)) => {
                let node = XmlNode::from_start(&e)?;
                attach(&mut stack, &mut root, node);
            }
            Ok(Event::End(_)) => {
                if let Some(node) = stack.pop() {
                    attach(&mut stack, &mut root, node);
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(read_error)?;
                append_text(&mut stack, text);
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                append_text(&mut stack, Cow::Owned(text));
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(TransportError::invalid_response(format!(
                    "malformed XML at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(TransportError::invalid_response(
            "malformed XML: unexpected end of document",
        ));
    }
    root.ok_or_else(|| TransportError::invalid_response("empty XML document"))
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => {
            if root.is_none() {
                *root = Some(node);
            }
        }
    }
}

fn append_text(stack: &mut [XmlNode], text: Cow<'_, str>) {
    if let Some(node) = stack.last_mut() {
        node.text.push_str(&text);
    }
}

fn read_error(err: impl std::fmt::Display) -> TransportError {
    TransportError::invalid_response(format!("malformed XML: {}", err))
}
