//! Node type definitions.
//!
//! The `NodeKind` enum represents all node types in an XML document tree.
//! Navigation links (parent, children, siblings) are stored in `NodeData`,
//! not here; each variant carries only its payload.

use super::Attribute;

/// The kind of an XML node and its associated data.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// The document node — there is exactly one per `Document`.
    Document,

    /// An element node, e.g., `<z:foo class="x">`.
    Element {
        /// The element's local name (the part after any `:`).
        name: String,
        /// Namespace prefix (e.g., `"z"` in `z:foo`), if any.
        prefix: Option<String>,
        /// Namespace URI after resolution, if any.
        namespace: Option<String>,
        /// Attributes on this element, in document order.
        attributes: Vec<Attribute>,
    },

    /// A text node containing character data (references already resolved).
    Text {
        /// The decoded text content.
        content: String,
    },

    /// A CDATA section, e.g., `<![CDATA[...]]>`.
    ///
    /// Only produced when the document was parsed with `preserve_cdata`;
    /// otherwise CDATA content is folded into plain text nodes.
    CData {
        /// The CDATA content, verbatim.
        content: String,
    },

    /// A comment node, e.g., `<!-- ... -->`.
    Comment {
        /// The comment text (without the delimiters).
        content: String,
    },

    /// A processing instruction, e.g., `<?target data?>`.
    ProcessingInstruction {
        /// The PI target (e.g., `"xml-stylesheet"`).
        target: String,
        /// The PI data, if any.
        data: Option<String>,
    },
}

impl NodeKind {
    /// Returns `true` for text and CDATA nodes whose content is entirely
    /// ASCII whitespace. Used by structural equality, where inter-element
    /// whitespace is not significant.
    #[must_use]
    pub fn is_blank_text(&self) -> bool {
        match self {
            Self::Text { content } | Self::CData { content } => {
                content.chars().all(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
            }
            _ => false,
        }
    }
}
