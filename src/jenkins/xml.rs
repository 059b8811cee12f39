//! Element tree over Jenkins XML documents.
//!
//! Jenkins build records nest plugin-specific sub-trees whose presence and
//! shape vary between plugin versions. Rather than binding the document to a
//! fixed schema, it is read once into a tree of [`Element`]s and queried by
//! path, so missing sections simply resolve to nothing.

use std::ops::Range;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{OELensError, Result};

/// One XML element with its text content and child elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub text: String,
    pub children: Vec<Element>,
    /// Byte range of the raw content between the start and end tags.
    inner: Range<usize>,
}

impl Element {
    fn open(start: &BytesStart<'_>, content_start: usize) -> Self {
        Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            text: String::new(),
            children: Vec::new(),
            inner: content_start..content_start,
        }
    }

    /// First child element called `name`.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    /// All child elements called `name`, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Follows a path of child names, taking the first match at every step.
    pub fn path(&self, path: &[&str]) -> Option<&Element> {
        path.iter()
            .try_fold(self, |element, name| element.child(name))
    }

    /// Trimmed text at `path`, or an empty string when the path is absent.
    pub fn text_at(&self, path: &[&str]) -> &str {
        self.path(path).map_or("", |element| element.text.trim())
    }

    /// Integer at `path`; absent or malformed values read as zero.
    pub fn int_at(&self, path: &[&str]) -> i64 {
        self.text_at(path).parse().unwrap_or(0)
    }
}

/// A parsed XML document that keeps its source for raw-content access.
#[derive(Debug)]
pub struct XmlDocument {
    source: String,
    root: Element,
}

impl XmlDocument {
    /// Parses `source` into an element tree.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed markup, mismatched tags, a document
    /// without a root element, or a document that ends inside an element.
    pub fn parse(source: String) -> Result<Self> {
        let root = parse_tree(&source)?;
        Ok(Self { source, root })
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Raw markup between the start and end tag of `element`, verbatim.
    pub fn inner_xml(&self, element: &Element) -> &str {
        self.source
            .get(element.inner.clone())
            .map_or("", str::trim)
    }
}

fn parse_tree(source: &str) -> Result<Element> {
    let mut reader = Reader::from_str(source);
    reader.trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        let before = reader.buffer_position();
        match reader.read_event()? {
            Event::Start(start) => stack.push(Element::open(&start, reader.buffer_position())),
            Event::Empty(start) => {
                let element = Element::open(&start, reader.buffer_position());
                attach(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                let mut element = stack
                    .pop()
                    .ok_or_else(|| OELensError::Report("unbalanced end tag".into()))?;
                element.inner.end = before;
                attach(&mut stack, &mut root, element);
            }
            Event::Text(text) => {
                if let Some(open) = stack.last_mut() {
                    let unescaped = text
                        .unescape()
                        .map(|cow| cow.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&text).into_owned());
                    open.text.push_str(&unescaped);
                }
            }
            Event::CData(data) => {
                if let Some(open) = stack.last_mut() {
                    open.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(OELensError::Report(format!(
            "document ends inside <{}>",
            open.name
        )));
    }

    root.ok_or_else(|| OELensError::Report("document has no root element".into()))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> XmlDocument {
        XmlDocument::parse(source.to_string()).unwrap()
    }

    #[test]
    fn test_parse_nested_elements() {
        let doc = parse(
            "<?xml version='1.0' encoding='UTF-8'?>\n\
             <build>\n  <result>SUCCESS</result>\n  <actions>\n    <a><b>1</b></a>\n  </actions>\n</build>",
        );

        let root = doc.root();
        assert_eq!(root.name, "build");
        assert_eq!(root.text_at(&["result"]), "SUCCESS");
        assert_eq!(root.int_at(&["actions", "a", "b"]), 1);
    }

    #[test]
    fn test_missing_paths_resolve_to_defaults() {
        let doc = parse("<build><duration>oops</duration></build>");
        let root = doc.root();

        assert!(root.path(&["actions", "missing"]).is_none());
        assert_eq!(root.text_at(&["nothing"]), "");
        assert_eq!(root.int_at(&["nothing"]), 0);
        assert_eq!(root.int_at(&["duration"]), 0);
    }

    #[test]
    fn test_entities_and_cdata_are_decoded() {
        let doc = parse("<build><d>a &amp; b &lt;c&gt;</d><e><![CDATA[<raw>]]></e></build>");
        assert_eq!(doc.root().text_at(&["d"]), "a & b <c>");
        assert_eq!(doc.root().text_at(&["e"]), "<raw>");
    }

    #[test]
    fn test_inner_xml_is_verbatim() {
        let doc = parse(
            "<causes><hudson.model.Cause_-UserIdCause>\n  <userId>bob</userId>\n</hudson.model.Cause_-UserIdCause><empty/></causes>",
        );
        let root = doc.root();

        assert_eq!(doc.inner_xml(&root.children[0]), "<userId>bob</userId>");
        assert_eq!(doc.inner_xml(&root.children[1]), "");
    }

    #[test]
    fn test_children_named_keeps_document_order() {
        let doc = parse("<p><s>1</s><x/><s>2</s></p>");
        let values: Vec<&str> = doc
            .root()
            .children_named("s")
            .map(|s| s.text.as_str())
            .collect();
        assert_eq!(values, vec!["1", "2"]);
    }

    #[test]
    fn test_malformed_documents_are_errors() {
        assert!(XmlDocument::parse("<build><a></b></build>".to_string()).is_err());
        assert!(XmlDocument::parse("<build><a>".to_string()).is_err());
        assert!(XmlDocument::parse("just text".to_string()).is_err());
    }
}
