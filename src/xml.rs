//! Read XML source into a small owned element tree.
//!
//! Well-formedness, entities, character references, CDATA and the doctype are
//! handled by `roxmltree`. The tree kept here holds only what the schema layer
//! in [`crate::raw`] looks at: element names, attributes in document order,
//! child elements and character data.

use roxmltree::{Document, ParsingOptions};

/// Deepest element nesting accepted. Descriptions nest a handful of levels.
const MAX_DEPTH: usize = 128;

/// A node inside an element: a child element or a run of character data.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An XML element with its attributes in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute that must be present; error names the element and attribute.
    pub fn required_attr(&self, name: &str) -> Result<&str, String> {
        self.attr(name)
            .ok_or_else(|| format!("<{}> is missing attribute '{}'", self.name, name))
    }

    /// Child elements, skipping text.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|c| match c {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// Concatenated character data of the direct children, trimmed.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for c in &self.children {
            if let Node::Text(t) = c {
                out.push_str(t);
            }
        }
        out.trim().to_string()
    }
}

/// Parse a whole document and return its root element.
pub fn parse_document(source: &str) -> Result<Element, String> {
    let mut options = ParsingOptions::default();
    options.allow_dtd = true;
    let document = Document::parse_with_options(source, options)
        .map_err(|e| format!("XML syntax error: {}", e))?;
    build_element(document.root_element(), 0)
}

fn build_element(node: roxmltree::Node<'_, '_>, depth: usize) -> Result<Element, String> {
    let name = node.tag_name().name().to_string();
    if depth >= MAX_DEPTH {
        return Err(format!("<{}> is nested more than {} levels deep", name, MAX_DEPTH));
    }
    let attrs = node
        .attributes()
        .map(|a| (a.name().to_string(), a.value().to_string()))
        .collect();
    let mut children = Vec::new();
    for child in node.children() {
        if child.is_element() {
            children.push(Node::Element(build_element(child, depth + 1)?));
        } else if child.is_text() {
            if let Some(text) = child.text() {
                children.push(Node::Text(text.to_string()));
            }
        }
    }
    Ok(Element {
        name,
        attrs,
        children,
    })
}
