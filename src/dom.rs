//! A small mutable XML tree for SVG documents.
//!
//! `quick-xml` is event-based, so this module materializes its events into an owned
//! [`Document`][] that can be searched and mutated in place and serialized back to a string.
//! Serialization is deterministic: attribute order is preserved as parsed and no whitespace is
//! added or removed, so serializing an unchanged document twice yields byte-identical output.
//!
//! [`Document`]: struct.Document.html

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{Context as _, Error, ErrorKind};

/// A node in the document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// An element with attributes and child nodes.
    Element(Element),
    /// A text node (unescaped content).
    Text(String),
    /// A CDATA section.
    CData(String),
    /// A comment (raw content between `<!--` and `-->`).
    Comment(String),
}

/// An XML element: qualified name, attributes in document order, and child nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// The qualified tag name, including any namespace prefix.
    pub name: String,
    /// Attribute name/value pairs in the order they appeared.
    pub attributes: Vec<(String, String)>,
    /// Child nodes in document order.
    pub children: Vec<Node>,
}

impl Element {
    /// Creates an empty element with the given tag name.
    pub fn new(name: impl Into<String>) -> Element {
        Element {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Returns the tag name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    /// Returns the value of the given attribute, if present.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Sets an attribute, replacing an existing value or appending a new pair.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self.attributes.iter_mut().find(|(key, _)| *key == name) {
            entry.1 = value;
        } else {
            self.attributes.push((name, value));
        }
    }

    /// Replaces all children with a single text node.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children = vec![Node::Text(text.into())];
    }

    /// Iterates over the direct child elements.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    /// Returns the number of direct child elements.
    pub fn child_element_count(&self) -> usize {
        self.child_elements().count()
    }

    /// Returns the first direct child element, if any.
    pub fn first_child_element(&self) -> Option<&Element> {
        self.child_elements().next()
    }

    /// Returns the last direct child element, if any.
    pub fn last_child_element(&self) -> Option<&Element> {
        self.child_elements().last()
    }

    /// Concatenates all descendant text and CDATA content, in document order.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Element(el) => el.collect_text(out),
                Node::Text(text) | Node::CData(text) => out.push_str(text),
                Node::Comment(_) => {}
            }
        }
    }

    /// Returns the first element (in document order, self included) matching the predicate.
    pub fn find(&self, predicate: &dyn Fn(&Element) -> bool) -> Option<&Element> {
        if predicate(self) {
            return Some(self);
        }
        for child in self.child_elements() {
            if let Some(found) = child.find(predicate) {
                return Some(found);
            }
        }
        None
    }

    /// Mutable variant of [`find`](#method.find).
    pub fn find_mut(&mut self, predicate: &dyn Fn(&Element) -> bool) -> Option<&mut Element> {
        if predicate(self) {
            return Some(self);
        }
        for child in self.children.iter_mut() {
            if let Node::Element(el) = child {
                if let Some(found) = el.find_mut(predicate) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Visits every element (self included) in document order.
    pub fn for_each_element(&self, visit: &mut dyn FnMut(&Element)) {
        visit(self);
        for child in self.child_elements() {
            child.for_each_element(visit);
        }
    }

    fn write(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), Error> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        if self.children.is_empty() {
            return writer
                .write_event(Event::Empty(start))
                .context("failed to serialize element");
        }
        writer
            .write_event(Event::Start(start))
            .context("failed to serialize element")?;
        for child in &self.children {
            match child {
                Node::Element(el) => el.write(writer)?,
                Node::Text(text) => {
                    writer
                        .write_event(Event::Text(BytesText::new(text)))
                        .context("failed to serialize text node")?;
                }
                Node::CData(text) => {
                    writer
                        .write_event(Event::CData(BytesCData::new(text.as_str())))
                        .context("failed to serialize CDATA section")?;
                }
                Node::Comment(text) => {
                    writer
                        .write_event(Event::Comment(BytesText::from_escaped(text.as_str())))
                        .context("failed to serialize comment")?;
                }
            }
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .context("failed to serialize element")
    }
}

#[derive(Debug, Clone, PartialEq)]
struct XmlDecl {
    version: String,
    encoding: Option<String>,
    standalone: Option<String>,
}

/// A parsed XML document: optional prolog plus the root element.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    decl: Option<XmlDecl>,
    doctype: Option<String>,
    root: Element,
}

impl Document {
    /// Parses an XML string into a mutable document tree.
    ///
    /// Entity references are resolved while parsing and re-escaped on serialization.
    /// Processing instructions and content outside the root element are dropped.
    pub fn parse(input: &str) -> Result<Document, Error> {
        let mut reader = Reader::from_str(input);
        let mut decl = None;
        let mut doctype = None;
        let mut root: Option<Element> = None;
        let mut stack: Vec<Element> = Vec::new();

        loop {
            let event = reader
                .read_event()
                .map_err(|err| Error::new("malformed XML document", ErrorKind::Xml(err)))?;
            match event {
                Event::Start(e) => {
                    stack.push(element_from_start(&e));
                }
                Event::Empty(e) => {
                    let element = element_from_start(&e);
                    attach_element(element, &mut stack, &mut root)?;
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        Error::new("unexpected closing tag", ErrorKind::InvalidData)
                    })?;
                    attach_element(element, &mut stack, &mut root)?;
                }
                Event::Text(e) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(&e).into_owned();
                        parent.children.push(Node::Text(text));
                    }
                }
                Event::CData(e) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(&e).into_owned();
                        parent.children.push(Node::CData(text));
                    }
                }
                Event::GeneralRef(e) => {
                    if let Some(parent) = stack.last_mut() {
                        let name = e.decode().map_err(|err| {
                            Error::new(
                                format!("entity reference decode error: {:?}", err),
                                ErrorKind::InvalidData,
                            )
                        })?;
                        let raw = format!("&{};", name);
                        let text = match quick_xml::escape::unescape(&raw) {
                            Ok(resolved) => resolved.into_owned(),
                            // Unknown entity: keep the reference text as-is.
                            Err(_) => raw,
                        };
                        parent.children.push(Node::Text(text));
                    }
                }
                Event::Comment(e) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(&e).into_owned();
                        parent.children.push(Node::Comment(text));
                    }
                }
                Event::Decl(e) => {
                    let version = e
                        .version()
                        .map(|v| String::from_utf8_lossy(&v).into_owned())
                        .unwrap_or_else(|_| String::from("1.0"));
                    let encoding = e
                        .encoding()
                        .and_then(|enc| enc.ok())
                        .map(|v| String::from_utf8_lossy(&v).into_owned());
                    let standalone = e
                        .standalone()
                        .and_then(|sa| sa.ok())
                        .map(|v| String::from_utf8_lossy(&v).into_owned());
                    decl = Some(XmlDecl {
                        version,
                        encoding,
                        standalone,
                    });
                }
                Event::DocType(e) => {
                    doctype = Some(String::from_utf8_lossy(&e).into_owned());
                }
                Event::Eof => break,
                // Processing instructions and anything else outside the model are dropped.
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(Error::new("unclosed element", ErrorKind::InvalidData));
        }
        let root =
            root.ok_or_else(|| Error::new("document has no root element", ErrorKind::InvalidData))?;
        Ok(Document {
            decl,
            doctype,
            root,
        })
    }

    /// Returns the root element.
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Returns the root element for mutation.
    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Returns the first descendant element with the given local name.
    pub fn first_element_named(&self, local_name: &str) -> Option<&Element> {
        self.root.find(&|el: &Element| el.local_name() == local_name)
    }

    /// Serializes the document back to a string.
    pub fn to_xml(&self) -> Result<String, Error> {
        let mut writer = Writer::new(Vec::new());
        if let Some(decl) = &self.decl {
            writer
                .write_event(Event::Decl(BytesDecl::new(
                    &decl.version,
                    decl.encoding.as_deref(),
                    decl.standalone.as_deref(),
                )))
                .context("failed to serialize XML declaration")?;
        }
        if let Some(doctype) = &self.doctype {
            writer
                .write_event(Event::DocType(BytesText::from_escaped(doctype.as_str())))
                .context("failed to serialize doctype")?;
        }
        self.root.write(&mut writer)?;
        String::from_utf8(writer.into_inner())
            .map_err(|_| Error::new("serialized document is not UTF-8", ErrorKind::InvalidData))
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Element {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = Element::new(name);
    for attr in start.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = match attr.unescape_value() {
            Ok(value) => value.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        };
        element.attributes.push((key, value));
    }
    element
}

fn attach_element(
    element: Element,
    stack: &mut Vec<Element>,
    root: &mut Option<Element>,
) -> Result<(), Error> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(Node::Element(element));
    } else if root.is_none() {
        *root = Some(element);
    } else {
        return Err(Error::new(
            "document has more than one root element",
            ErrorKind::InvalidData,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 400 200"><defs><clipPath id="frame"><rect width="400" height="200"/></clipPath></defs><text data-role="brand" font-size="50" y="100"><tspan dy="0">Brand &amp; Co</tspan></text></svg>"#;

    #[test]
    fn test_parse_preserves_structure() {
        let doc = Document::parse(SVG).unwrap();
        assert_eq!(doc.root().name, "svg");
        assert_eq!(doc.root().attribute("viewBox"), Some("0 0 400 200"));
        let text = doc.first_element_named("text").unwrap();
        assert_eq!(text.attribute("data-role"), Some("brand"));
        assert_eq!(text.child_element_count(), 1);
    }

    #[test]
    fn test_entities_resolved_and_reescaped() {
        let doc = Document::parse(SVG).unwrap();
        let text = doc.first_element_named("text").unwrap();
        assert_eq!(text.text_content(), "Brand & Co");
        let out = doc.to_xml().unwrap();
        assert!(out.contains("Brand &amp; Co"));
    }

    #[test]
    fn test_serialization_is_idempotent() {
        let doc = Document::parse(SVG).unwrap();
        let first = doc.to_xml().unwrap();
        let second = doc.to_xml().unwrap();
        assert_eq!(first, second);
        // Round-tripping the output parses to the same tree.
        let reparsed = Document::parse(&first).unwrap();
        assert_eq!(reparsed.to_xml().unwrap(), first);
    }

    #[test]
    fn test_xml_decl_round_trip() {
        let input = r#"<?xml version="1.0" encoding="UTF-8"?><svg viewBox="0 0 10 10"/>"#;
        let doc = Document::parse(input).unwrap();
        let out = doc.to_xml().unwrap();
        assert!(out.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
    }

    #[test]
    fn test_set_attribute_replaces_in_place() {
        let mut doc = Document::parse(SVG).unwrap();
        doc.root_mut().set_attribute("viewBox", "0 0 1 1");
        doc.root_mut().set_attribute("width", "100%");
        assert_eq!(doc.root().attribute("viewBox"), Some("0 0 1 1"));
        assert_eq!(doc.root().attribute("width"), Some("100%"));
        // Replacement keeps the original position, appends go last.
        assert_eq!(doc.root().attributes[1].0, "viewBox");
        assert_eq!(doc.root().attributes.last().unwrap().0, "width");
    }

    #[test]
    fn test_find_mut_reaches_nested_elements() {
        let mut doc = Document::parse(SVG).unwrap();
        let tspan = doc
            .root_mut()
            .find_mut(&|el: &Element| el.local_name() == "tspan")
            .unwrap();
        tspan.set_text("Replaced");
        tspan.set_attribute("dy", "12");
        let out = doc.to_xml().unwrap();
        assert!(out.contains(">Replaced</tspan>"));
        assert!(out.contains(r#"dy="12""#));
    }

    #[test]
    fn test_malformed_input_is_rejected() {
        assert!(Document::parse("<svg><g></svg>").is_err());
        assert!(Document::parse("no markup at all").is_err());
    }

    #[test]
    fn test_whitespace_between_elements_survives() {
        let input = "<svg>\n  <g id=\"a\"/>\n</svg>";
        let doc = Document::parse(input).unwrap();
        assert_eq!(doc.to_xml().unwrap(), input);
    }
}
