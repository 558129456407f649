//! SAX-style event interface emitted by the parser.
//!
//! The grammar-directed parser pushes events into a [`SaxHandler`] as it
//! consumes input. The DOM builder is one such handler; callers that only
//! need to extract data can implement the trait directly and skip tree
//! construction.
//!
//! All callbacks have default no-op implementations, so a handler overrides
//! only what it needs.

use std::io::Read;

use crate::encoding::Encoding;
use crate::error::Result;
use crate::tree::XmlVersion;

/// An attribute reported with a `start_element` event.
///
/// The namespace is the resolved URI (empty when the attribute has no
/// prefix, or its prefix is unbound and namespace checks are off).
#[derive(Debug, Clone)]
pub struct SaxAttribute {
    /// The resolved namespace URI, or empty.
    pub namespace: String,
    /// The qualified name as written (`prefix:local` or `local`).
    pub name: String,
    /// The normalized attribute value, references resolved.
    pub value: String,
    /// Whether the DTD declares this attribute with type `ID`.
    pub is_id: bool,
}

impl SaxAttribute {
    /// The local part of the qualified name.
    #[must_use]
    pub fn local_name(&self) -> &str {
        crate::util::split_name(&self.name).1
    }

    /// The prefix of the qualified name, if any.
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        crate::util::split_name(&self.name).0
    }
}

/// Receiver for parser events.
///
/// `start_element` may fail, letting tree-building handlers surface
/// structural errors (an unbound prefix, for instance) through the parse
/// call.
#[allow(unused_variables)]
pub trait SaxHandler {
    /// The XML declaration, when present.
    fn xml_decl(&mut self, version: XmlVersion, encoding: Encoding, standalone: bool) {}

    /// The DOCTYPE declaration, before any DTD content is processed.
    fn doctype_decl(&mut self, root: &str, public_id: Option<&str>, system_id: Option<&str>) {}

    /// An element start tag. `uri` is the element's resolved namespace
    /// (empty when it has none). Attributes appear in document order,
    /// namespace declarations included, defaulted attributes materialized.
    ///
    /// # Errors
    ///
    /// A handler may reject the element; the parser aborts with the error.
    fn start_element(&mut self, name: &str, uri: &str, attrs: &[SaxAttribute]) -> Result<()> {
        Ok(())
    }

    /// An element end tag (also fired for empty-element tags).
    fn end_element(&mut self, name: &str, uri: &str) {}

    /// Character data, after entity and character-reference expansion.
    fn character_data(&mut self, text: &str) {}

    /// A processing instruction.
    fn processing_instruction(&mut self, target: &str, data: &str) {}

    /// A comment.
    fn comment(&mut self, text: &str) {}

    /// The start of a CDATA section; subsequent `character_data` belongs
    /// to it until `end_cdata_section`.
    fn start_cdata_section(&mut self) {}

    /// The end of a CDATA section.
    fn end_cdata_section(&mut self) {}

    /// A namespace declaration coming into scope on the current element.
    fn start_namespace_decl(&mut self, prefix: &str, uri: &str) {}

    /// A namespace declaration going out of scope.
    fn end_namespace_decl(&mut self, prefix: &str) {}

    /// A notation declaration from the DTD.
    fn notation_decl(&mut self, name: &str, system_id: Option<&str>, public_id: Option<&str>) {}

    /// An external entity reference. Return a reader to have its content
    /// parsed in place, or `None` to skip the reference.
    fn external_entity_ref(
        &mut self,
        base: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Option<Box<dyn Read>> {
        None
    }

    /// A validation failure. The parser keeps going and raises a combined
    /// `Invalid` error at end of document.
    fn report_invalidation(&mut self, message: &str) {}
}

/// A no-op handler, useful as a base and in tests.
pub struct DefaultHandler;

impl SaxHandler for DefaultHandler {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sax_attribute_name_parts() {
        let attr = SaxAttribute {
            namespace: "urn:x".to_string(),
            name: "x:id".to_string(),
            value: "1".to_string(),
            is_id: false,
        };
        assert_eq!(attr.local_name(), "id");
        assert_eq!(attr.prefix(), Some("x"));

        let plain = SaxAttribute {
            namespace: String::new(),
            name: "id".to_string(),
            value: "1".to_string(),
            is_id: true,
        };
        assert_eq!(plain.local_name(), "id");
        assert_eq!(plain.prefix(), None);
    }

    #[test]
    fn test_default_handler_accepts_everything() {
        let mut h = DefaultHandler;
        assert!(h.start_element("a", "", &[]).is_ok());
        assert!(h.external_entity_ref("", None, Some("x.dtd")).is_none());
    }
}
