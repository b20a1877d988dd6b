//! Structured export of person records into hierarchical documents.
//!
//! # Responsibility
//! - Define the document-builder contract the core writes through.
//! - Emit the person node shape: void/dead flags plus optional birthdate.
//! - Provide an in-memory element tree builder.
//!
//! # Invariants
//! - Export is a tree: user and concept references are never emitted.
//! - Builder failures propagate unchanged; export adds no error kinds.
//! - Import from a document is not supported.

use crate::model::person::PersonRecord;
use log::debug;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const PERSON_NODE: &str = "person";
pub const PERSON_VOIDED_ATTR: &str = "personvoided";
pub const PERSON_DEAD_ATTR: &str = "dead";
pub const BIRTHDATE_NODE: &str = "birthdate";
pub const BIRTHDATE_ESTIMATED_ATTR: &str = "birthdateestimated";

/// Generic hierarchical-document builder.
///
/// Nodes are addressed by copyable handles issued by the builder.
pub trait DocumentBuilder {
    type Node: Copy;
    type Error;

    /// Creates a node named `name` under `parent`, or a root when `None`.
    fn create_node(
        &mut self,
        parent: Option<Self::Node>,
        name: &str,
    ) -> Result<Self::Node, Self::Error>;

    fn set_attribute(&mut self, node: Self::Node, name: &str, value: &str)
        -> Result<(), Self::Error>;

    /// Appends text content to `node`.
    fn create_text(&mut self, node: Self::Node, text: &str) -> Result<(), Self::Error>;
}

/// Records that can write themselves into a document.
pub trait ToDocument {
    fn export<B: DocumentBuilder>(
        &self,
        builder: &mut B,
        parent: Option<B::Node>,
    ) -> Result<B::Node, B::Error>;
}

impl ToDocument for PersonRecord {
    fn export<B: DocumentBuilder>(
        &self,
        builder: &mut B,
        parent: Option<B::Node>,
    ) -> Result<B::Node, B::Error> {
        let node = builder.create_node(parent, PERSON_NODE)?;
        builder.set_attribute(node, PERSON_VOIDED_ATTR, bool_text(self.is_voided()))?;
        builder.set_attribute(node, PERSON_DEAD_ATTR, bool_text(self.is_dead()))?;

        if let Some(birth_date) = self.birth_date {
            let birthdate_node = builder.create_node(Some(node), BIRTHDATE_NODE)?;
            builder.create_text(birthdate_node, &birth_date.format("%Y-%m-%d").to_string())?;
            builder.set_attribute(
                birthdate_node,
                BIRTHDATE_ESTIMATED_ATTR,
                bool_text(self.birth_date_estimated),
            )?;
        }

        debug!(
            "event=person_export module=export status=ok person={} birthdate={}",
            self.guid(),
            self.birth_date.is_some()
        );
        Ok(node)
    }
}

fn bool_text(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Handle of one element in an `ElementTree`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

/// One element: name, ordered attributes, text and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<NodeId>,
}

/// Errors raised by `ElementTree`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    UnknownNode(NodeId),
    InvalidName(String),
}

impl Display for DocumentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownNode(id) => write!(f, "unknown document node: {}", id.0),
            Self::InvalidName(name) => write!(f, "invalid element or attribute name: `{name}`"),
        }
    }
}

impl Error for DocumentError {}

/// Arena-backed in-memory document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementTree {
    nodes: Vec<Element>,
    roots: Vec<NodeId>,
}

impl ElementTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        self.nodes.get(id.0)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Value of attribute `name` on `id`.
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First child of `id` named `name`.
    pub fn child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.element(id)?
            .children
            .iter()
            .copied()
            .find(|child| self.element(*child).is_some_and(|element| element.name == name))
    }

    /// Renders the subtree at `id` as compact XML.
    pub fn render(&self, id: NodeId) -> Option<String> {
        let mut out = String::new();
        self.render_into(id, &mut out)?;
        Some(out)
    }

    fn render_into(&self, id: NodeId, out: &mut String) -> Option<()> {
        let element = self.element(id)?;
        out.push('<');
        out.push_str(&element.name);
        for (key, value) in &element.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value));
            out.push('"');
        }
        if element.text.is_empty() && element.children.is_empty() {
            out.push_str("/>");
            return Some(());
        }
        out.push('>');
        out.push_str(&escape(&element.text));
        for child in &element.children {
            self.render_into(*child, out)?;
        }
        out.push_str("</");
        out.push_str(&element.name);
        out.push('>');
        Some(())
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut Element, DocumentError> {
        self.nodes.get_mut(id.0).ok_or(DocumentError::UnknownNode(id))
    }
}

impl DocumentBuilder for ElementTree {
    type Node = NodeId;
    type Error = DocumentError;

    fn create_node(&mut self, parent: Option<NodeId>, name: &str) -> Result<NodeId, DocumentError> {
        validate_name(name)?;
        let id = NodeId(self.nodes.len());
        match parent {
            Some(parent) => self.element_mut(parent)?.children.push(id),
            None => self.roots.push(id),
        }
        self.nodes.push(Element {
            name: name.to_string(),
            attributes: Vec::new(),
            text: String::new(),
            children: Vec::new(),
        });
        Ok(id)
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DocumentError> {
        validate_name(name)?;
        let element = self.element_mut(node)?;
        match element.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, current)) => *current = value.to_string(),
            None => element
                .attributes
                .push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    fn create_text(&mut self, node: NodeId, text: &str) -> Result<(), DocumentError> {
        self.element_mut(node)?.text.push_str(text);
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), DocumentError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(DocumentError::InvalidName(name.to_string()))
    }
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}
