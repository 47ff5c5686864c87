//!
//! Internal APIs for the XML side of XDMF documents.
//!
//! XDMF light data is a small XML tree walked by tag and attribute. This
//! module materializes that tree as an owned [`Element`] value, parsed from
//! and serialized to text with `quick_xml` events.

use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::Error;

/// An owned XML element with ordered attributes, text content and children.
#[derive(Clone, PartialEq, Debug, Default)]
pub(crate) struct Element {
    pub tag: String,
    /// Attributes in document order.
    pub attribs: Vec<(String, String)>,
    /// Concatenated text content of the element.
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Element {
        Element {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_attrib(mut self, name: impl Into<String>, value: impl Into<String>) -> Element {
        self.attribs.push((name.into(), value.into()));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Element {
        self.text = text.into();
        self
    }

    pub fn with_child(mut self, child: Element) -> Element {
        self.children.push(child);
        self
    }

    /// Get an attribute value by name.
    pub fn attrib(&self, name: &str) -> Option<&str> {
        self.attribs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get an attribute value by name, failing if it is absent.
    pub fn req_attrib(&self, name: &str) -> Result<&str, Error> {
        self.attrib(name).ok_or_else(|| {
            Error::MalformedDocument(format!(
                "missing attribute {:?} on <{}>",
                name, self.tag
            ))
        })
    }
}

fn element_from_tag(e: &BytesStart) -> Result<Element, Error> {
    let mut el = Element::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        el.attribs.push((key, value));
    }
    Ok(el)
}

fn attach(el: Element, stack: &mut Vec<Element>, root: &mut Option<Element>) -> Result<(), Error> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(el),
        None if root.is_none() => *root = Some(el),
        None => {
            return Err(Error::MalformedDocument(
                "document has more than one root element".into(),
            ))
        }
    }
    Ok(())
}

/// Parse an XML document into its root element.
///
/// Comments, processing instructions and the document prolog are skipped.
pub(crate) fn parse_str(xml: &str) -> Result<Element, Error> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) => stack.push(element_from_tag(&e)?),
            Event::Empty(e) => {
                let el = element_from_tag(&e)?;
                attach(el, &mut stack, &mut root)?;
            }
            Event::End(_) => {
                // quick_xml rejects mismatched closing tags; an unbalanced
                // end only occurs at the top level.
                let el = stack.pop().ok_or_else(|| {
                    Error::MalformedDocument("closing tag without an open element".into())
                })?;
                attach(el, &mut stack, &mut root)?;
            }
            Event::Text(t) => {
                if let Some(parent) = stack.last_mut() {
                    parent.text.push_str(&t.unescape()?);
                }
            }
            Event::CData(t) => {
                if let Some(parent) = stack.last_mut() {
                    parent.text.push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if !stack.is_empty() {
        return Err(Error::MalformedDocument("unclosed element".into()));
    }
    root.ok_or_else(|| Error::MalformedDocument("document has no root element".into()))
}

fn write_element<W: std::io::Write>(writer: &mut Writer<W>, el: &Element) -> Result<(), Error> {
    let mut start = BytesStart::new(el.tag.as_str());
    for (name, value) in &el.attribs {
        start.push_attribute((name.as_str(), value.as_str()));
    }
    if el.children.is_empty() && el.text.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }
    writer.write_event(Event::Start(start))?;
    if !el.text.is_empty() {
        writer.write_event(Event::Text(BytesText::new(&el.text)))?;
    }
    for child in &el.children {
        write_element(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(el.tag.as_str())))?;
    Ok(())
}

fn write_doc<W: std::io::Write>(writer: &mut Writer<W>, root: &Element) -> Result<(), Error> {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", None, None)))?;
    write_element(writer, root)
}

/// Serialize a document tree to a string.
pub(crate) fn to_xml_string(root: &Element, pretty: bool) -> Result<String, Error> {
    let mut buf: Vec<u8> = Vec::new();
    if pretty {
        write_doc(&mut Writer::new_with_indent(&mut buf, b' ', 2), root)?;
    } else {
        write_doc(&mut Writer::new(&mut buf), root)?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Serialize a document tree to a file.
pub(crate) fn write_file(root: &Element, file_path: &Path, pretty: bool) -> Result<(), Error> {
    std::fs::write(file_path, to_xml_string(root, pretty)?)?;
    Ok(())
}
