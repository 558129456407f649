//! XPath 1.0 value domain.
//!
//! Every expression evaluates to a [`Value`]: a node-set, boolean, number,
//! or string (plus the undefined placeholder). Conversions follow XPath 1.0
//! §4.1–4.4; number formatting follows the `string()` rules of §4.2.
//!
//! Node-sets hold [`XNode`]s: either a tree node or an attribute addressed
//! by its element and index, so attribute and namespace nodes participate
//! in node-sets without living in the arena.

use crate::tree::{Document, NodeId, NodeKind};

/// A node reference inside an XPath node-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XNode {
    /// A node in the document arena.
    Tree(NodeId),
    /// An attribute (or namespace declaration), addressed as the owning
    /// element plus the attribute index.
    Attribute(NodeId, usize),
}

impl XNode {
    /// The underlying tree node, if this is one.
    #[must_use]
    pub fn node_id(self) -> Option<NodeId> {
        match self {
            Self::Tree(id) => Some(id),
            Self::Attribute(..) => None,
        }
    }

    /// The element owning this node: the node itself, or the attribute's
    /// element.
    #[must_use]
    pub fn anchor(self) -> NodeId {
        match self {
            Self::Tree(id) | Self::Attribute(id, _) => id,
        }
    }

    /// Document-order sort key. Nodes are allocated in document order, and
    /// an element's attributes sort right after the element, before its
    /// children (which always have larger ids).
    #[must_use]
    pub fn order_key(self) -> (NodeId, usize) {
        match self {
            Self::Tree(id) => (id, 0),
            Self::Attribute(id, index) => (id, index + 1),
        }
    }

    /// The string-value of this node per XPath 1.0 §5.
    #[must_use]
    pub fn string_value(self, doc: &Document) -> String {
        match self {
            Self::Tree(id) => match &doc.node(id).kind {
                NodeKind::Document | NodeKind::Element { .. } => doc.text_content(id),
                NodeKind::Text { content }
                | NodeKind::CData { content }
                | NodeKind::Comment { content } => content.clone(),
                NodeKind::ProcessingInstruction { data, .. } => {
                    data.clone().unwrap_or_default()
                }
            },
            Self::Attribute(elem, index) => doc
                .attributes(elem)
                .get(index)
                .map(|a| a.value.clone())
                .unwrap_or_default(),
        }
    }
}

/// An XPath 1.0 value.
#[derive(Debug, Clone)]
pub enum Value {
    /// No value; converts like an empty string / NaN / false.
    Undef,
    /// An ordered set of nodes, in document order, without duplicates.
    NodeSet(Vec<XNode>),
    /// A boolean.
    Boolean(bool),
    /// An IEEE 754 double.
    Number(f64),
    /// A string.
    String(String),
}

impl Value {
    /// Converts to boolean per §4.3: non-empty node-set, non-zero
    /// non-NaN number, non-empty string, the boolean itself.
    #[must_use]
    pub fn to_boolean(&self) -> bool {
        match self {
            Self::Undef => false,
            Self::Boolean(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::NodeSet(nodes) => !nodes.is_empty(),
        }
    }

    /// Converts to a number per §4.4. Node-sets take the string-value of
    /// their first node in document order; unparseable strings are NaN.
    #[must_use]
    pub fn to_number(&self, doc: &Document) -> f64 {
        match self {
            Self::Undef => f64::NAN,
            Self::Number(n) => *n,
            Self::Boolean(b) => f64::from(*b),
            Self::String(s) => parse_xpath_number(s),
            Self::NodeSet(nodes) => nodes
                .first()
                .map_or(f64::NAN, |n| parse_xpath_number(&n.string_value(doc))),
        }
    }

    /// Converts to a string per §4.2.
    #[must_use]
    pub fn to_xpath_string(&self, doc: &Document) -> String {
        match self {
            Self::Undef => String::new(),
            Self::String(s) => s.clone(),
            Self::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
            Self::Number(n) => format_xpath_number(*n),
            Self::NodeSet(nodes) => nodes
                .first()
                .map_or_else(String::new, |n| n.string_value(doc)),
        }
    }

    /// The inner node-set, if this is one.
    #[must_use]
    pub fn as_node_set(&self) -> Option<&[XNode]> {
        match self {
            Self::NodeSet(nodes) => Some(nodes),
            _ => None,
        }
    }

    /// A short name for the value's type, for error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undef => "undefined",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::NodeSet(_) => "node-set",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

/// Formats a number per the XPath 1.0 `string()` rules:
/// `NaN`, `Infinity`, `-Infinity`, integers without a decimal point,
/// `-0` as `"0"`, and minimal round-trip decimals otherwise.
#[must_use]
pub fn format_xpath_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n.is_sign_positive() {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        };
    }
    if n == 0.0 {
        return "0".to_string();
    }
    #[allow(clippy::float_cmp, clippy::cast_possible_truncation)]
    if n.fract() == 0.0 && n.abs() < 1e18 {
        return format!("{}", n as i64);
    }
    format!("{n}")
}

/// Parses a string as an XPath number: trimmed, sign + digits + optional
/// fraction; anything else is NaN.
#[must_use]
pub fn parse_xpath_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}
