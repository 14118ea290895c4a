//! Nested document construction and serialization.
//!
//! [`DocumentBuilder`] assembles a tree of elements through a stack of open
//! groups. Groups hold child elements; leaves hold a single text payload that
//! is either escaped or written verbatim in a CDATA section (code and
//! template bodies). The builder knows nothing about projects.

use crate::error::DocumentError;

/// Payload of an [`Element`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Content {
    Group(Vec<Element>),
    Leaf { text: String, raw: bool },
}

/// A single node of a [`Document`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    content: Content,
}

impl Element {
    fn new(tag: &str, attrs: &[(&str, &str)], content: Content) -> Self {
        Self {
            tag: tag.to_string(),
            attributes: attrs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            content,
        }
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    #[must_use]
    pub const fn content(&self) -> &Content {
        &self.content
    }

    /// Child elements of a group; empty for leaves.
    #[must_use]
    pub fn children(&self) -> &[Element] {
        match &self.content {
            Content::Group(children) => children,
            Content::Leaf { .. } => &[],
        }
    }

    /// Text of a leaf; `None` for groups.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Content::Leaf { text, .. } => Some(text),
            Content::Group(_) => None,
        }
    }

    #[must_use]
    pub const fn is_raw(&self) -> bool {
        matches!(self.content, Content::Leaf { raw: true, .. })
    }

    /// First direct child with the given tag.
    #[must_use]
    pub fn find(&self, tag: &str) -> Option<&Element> {
        self.children().iter().find(|child| child.tag == tag)
    }

    /// All direct children with the given tag.
    pub fn find_all<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children().iter().filter(move |child| child.tag == tag)
    }
}

/// A finished document: the top-level elements in document order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Document {
    elements: Vec<Element>,
}

impl Document {
    #[must_use]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// The first top-level element.
    #[must_use]
    pub fn root(&self) -> Option<&Element> {
        self.elements.first()
    }

    /// Serialize the document, one element per line with tab indentation.
    #[must_use]
    pub fn to_xml(&self) -> String {
        serialize(&self.elements)
    }
}

/// Incremental document writer with a stack of open groups.
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    root: Vec<Element>,
    stack: Vec<Element>,
}

impl DocumentBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently open groups.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn push(&mut self, element: Element) {
        match self.stack.last_mut() {
            Some(Element {
                content: Content::Group(children),
                ..
            }) => children.push(element),
            _ => self.root.push(element),
        }
    }

    /// Open a group under the current group (or at the top level).
    pub fn open_group(&mut self, tag: &str, attrs: &[(&str, &str)]) {
        self.stack
            .push(Element::new(tag, attrs, Content::Group(Vec::new())));
    }

    /// Append a leaf to the current group.
    ///
    /// `raw` leaves are written verbatim (CDATA); others are escaped.
    pub fn add_leaf(&mut self, tag: &str, text: &str, attrs: &[(&str, &str)], raw: bool) {
        let leaf = Element::new(
            tag,
            attrs,
            Content::Leaf {
                text: text.to_string(),
                raw,
            },
        );
        self.push(leaf);
    }

    /// Like [`add_leaf`](Self::add_leaf), but nothing is added when `text` is empty.
    pub fn add_leaf_if_present(
        &mut self,
        tag: &str,
        text: &str,
        attrs: &[(&str, &str)],
        raw: bool,
    ) {
        if !text.is_empty() {
            self.add_leaf(tag, text, attrs, raw);
        }
    }

    /// Close the innermost open group.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::UnbalancedGroup`] if no group is open.
    pub fn close_group(&mut self) -> Result<(), DocumentError> {
        let finished = self.stack.pop().ok_or(DocumentError::UnbalancedGroup)?;
        self.push(finished);
        Ok(())
    }

    fn check_closed(&self) -> Result<(), DocumentError> {
        if self.stack.is_empty() {
            Ok(())
        } else {
            Err(DocumentError::UnclosedGroup {
                open: self.stack.iter().map(|e| e.tag.clone()).collect(),
            })
        }
    }

    /// Serialize everything written so far.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::UnclosedGroup`] if any group is still open.
    pub fn output(&self) -> Result<String, DocumentError> {
        self.check_closed()?;
        Ok(serialize(&self.root))
    }

    /// Finish building and return the element tree.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::UnclosedGroup`] if any group is still open.
    pub fn into_document(self) -> Result<Document, DocumentError> {
        self.check_closed()?;
        Ok(Document {
            elements: self.root,
        })
    }
}

fn serialize(elements: &[Element]) -> String {
    let mut out = String::new();
    for element in elements {
        write_element(&mut out, element, 0);
    }
    out
}

fn write_element(out: &mut String, element: &Element, depth: usize) {
    let indent = "\t".repeat(depth);

    out.push_str(&indent);
    out.push('<');
    out.push_str(&element.tag);
    for (name, value) in &element.attributes {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape(value));
        out.push('"');
    }

    match &element.content {
        Content::Group(children) => {
            out.push_str(">\n");
            for child in children {
                write_element(out, child, depth + 1);
            }
            out.push_str(&indent);
            out.push_str("</");
            out.push_str(&element.tag);
            out.push_str(">\n");
        }
        Content::Leaf { text, .. } if text.is_empty() => out.push_str(" />\n"),
        Content::Leaf { text, raw } => {
            out.push('>');
            if *raw {
                out.push_str("<![CDATA[");
                out.push_str(&text.replace("]]>", "]]]]><![CDATA[>"));
                out.push_str("]]>");
            } else {
                out.push_str(&escape(text));
            }
            out.push_str("</");
            out.push_str(&element.tag);
            out.push_str(">\n");
        }
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
