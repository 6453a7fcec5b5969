//! Minimal XML document model for the service's request and response bodies.
//!
//! Responses are read into a small element tree with the `quick-xml` event
//! reader; request bodies are written with [`XmlWriter`]. The service only
//! uses elements and text (no attributes we care about, no mixed content), so
//! the tree keeps just names, text and children.

use crate::error::QueueStorageError;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::str::FromStr;

#[cfg(test)]
#[path = "xml_tests.rs"]
mod tests;

/// Element node of a parsed XML document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct XmlNode {
    pub name: String,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    fn new(name: String) -> Self {
        Self {
            name,
            text: String::new(),
            children: Vec::new(),
        }
    }

    /// First child element with the given name
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All child elements with the given name, in document order
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text of the first child element with the given name
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }

    /// Child element that must be present
    pub fn required_child(&self, name: &str) -> Result<&XmlNode, QueueStorageError> {
        self.child(name).ok_or_else(|| self.missing(name))
    }

    /// Text of a child element that must be present
    pub fn required_text(&self, name: &str) -> Result<&str, QueueStorageError> {
        Ok(self.required_child(name)?.text.as_str())
    }

    /// Parse the text of an optional child element
    pub fn parse_child<T>(&self, name: &str) -> Result<Option<T>, QueueStorageError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.child_text(name) {
            None => Ok(None),
            Some(text) => text.trim().parse::<T>().map(Some).map_err(|e| {
                QueueStorageError::xml(format!("<{}> has invalid value '{}': {}", name, text, e))
            }),
        }
    }

    /// Parse the text of a child element that must be present
    pub fn parse_required<T>(&self, name: &str) -> Result<T, QueueStorageError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.parse_child(name)?.ok_or_else(|| self.missing(name))
    }

    /// Interpret the text of a child element as a `true`/`false` flag
    pub fn bool_child(&self, name: &str) -> Result<Option<bool>, QueueStorageError> {
        match self.child_text(name).map(str::trim) {
            None => Ok(None),
            Some(text) if text.eq_ignore_ascii_case("true") => Ok(Some(true)),
            Some(text) if text.eq_ignore_ascii_case("false") => Ok(Some(false)),
            Some(text) => Err(QueueStorageError::xml(format!(
                "<{}> has invalid boolean '{}'",
                name, text
            ))),
        }
    }

    fn missing(&self, name: &str) -> QueueStorageError {
        QueueStorageError::xml(format!("<{}> is missing <{}>", self.name, name))
    }
}

/// Parse an XML document and return its root element
///
/// Text of elements that have child elements is discarded (it is only
/// formatting whitespace in service payloads); leaf text is kept verbatim so
/// message bodies with surrounding spaces survive.
pub(crate) fn parse_document(xml: &str) -> Result<XmlNode, QueueStorageError> {
    // The service prefixes some payloads with a UTF-8 byte order mark.
    let xml = xml.trim_start_matches('\u{feff}');

    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                stack.push(XmlNode::new(name));
            }
            Ok(Event::Empty(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                let node = XmlNode::new(name);
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(current) = stack.last_mut() {
                    let text = e.unescape().map_err(|e| {
                        QueueStorageError::xml(format!("Failed to unescape text: {}", e))
                    })?;
                    current.text.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(current) = stack.last_mut() {
                    current
                        .text
                        .push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                let mut node = stack
                    .pop()
                    .ok_or_else(|| QueueStorageError::xml("Unbalanced closing tag"))?;
                if !node.children.is_empty() {
                    node.text.clear();
                }
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(QueueStorageError::xml(format!(
                    "XML parsing error at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(QueueStorageError::xml("Unexpected end of document"));
    }

    root.ok_or_else(|| QueueStorageError::xml("Document has no root element"))
}

/// Parse a document and check the root element name
pub(crate) fn parse_root(xml: &str, expected: &str) -> Result<XmlNode, QueueStorageError> {
    let root = parse_document(xml)?;
    if root.name != expected {
        return Err(QueueStorageError::xml(format!(
            "Expected <{}> root element, found <{}>",
            expected, root.name
        )));
    }
    Ok(root)
}

/// Append-only writer for request bodies
#[derive(Debug)]
pub(crate) struct XmlWriter {
    buf: String,
}

impl XmlWriter {
    pub fn new() -> Self {
        Self {
            buf: String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>"),
        }
    }

    pub fn open(&mut self, name: &str) -> &mut Self {
        self.buf.push('<');
        self.buf.push_str(name);
        self.buf.push('>');
        self
    }

    pub fn close(&mut self, name: &str) -> &mut Self {
        self.buf.push_str("</");
        self.buf.push_str(name);
        self.buf.push('>');
        self
    }

    /// Write `<name>value</name>` with the value escaped
    pub fn element(&mut self, name: &str, value: &str) -> &mut Self {
        self.open(name);
        self.buf.push_str(&escape(value));
        self.close(name)
    }

    pub fn finish(self) -> String {
        self.buf
    }
}
