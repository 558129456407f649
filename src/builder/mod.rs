//! DOM construction from SAX events.
//!
//! [`TreeBuilder`] is the standard [`SaxHandler`]: it keeps a stack of
//! insertion points and materializes every event into the document tree.
//! Character data extends a trailing text node; CDATA sections become
//! distinct nodes only when the document was parsed with `preserve_cdata`.

use crate::encoding::Encoding;
use crate::error::{Error, Result, SourceLocation};
use crate::sax::{SaxAttribute, SaxHandler};
use crate::tree::{Attribute, Document, NodeId, NodeKind, Notation, XmlVersion};
use crate::util::split_name;

/// Builds a [`Document`] from parser events.
pub struct TreeBuilder {
    doc: Document,
    /// Insertion-point stack; the document node sits at the bottom.
    stack: Vec<NodeId>,
    /// Whether CDATA sections become distinct nodes.
    preserve_cdata: bool,
    /// The CDATA node currently receiving characters, if a section is open
    /// and being preserved.
    open_cdata: Option<NodeId>,
    /// Whether a CDATA section is open (even when not preserved).
    in_cdata: bool,
}

impl TreeBuilder {
    /// Creates a builder; `preserve_cdata` keeps CDATA sections as
    /// distinct nodes.
    #[must_use]
    pub fn new(preserve_cdata: bool) -> Self {
        let doc = Document::new();
        let root = doc.root();
        Self {
            doc,
            stack: vec![root],
            preserve_cdata,
            open_cdata: None,
            in_cdata: false,
        }
    }

    /// Consumes the builder, returning the finished document.
    #[must_use]
    pub fn into_document(self) -> Document {
        self.doc
    }

    fn insertion_point(&self) -> NodeId {
        *self.stack.last().unwrap_or(&self.doc.root())
    }
}

impl SaxHandler for TreeBuilder {
    fn xml_decl(&mut self, version: XmlVersion, encoding: Encoding, standalone: bool) {
        self.doc.version = version;
        self.doc.encoding = encoding;
        self.doc.standalone = standalone;
        // The input carried a declaration, so the output gets one too.
        self.doc.set_write_xml_decl(true);
    }

    fn doctype_decl(&mut self, root: &str, public_id: Option<&str>, system_id: Option<&str>) {
        self.doc.set_doctype(
            root,
            public_id.map(String::from),
            system_id.map(String::from),
        );
    }

    fn start_element(&mut self, name: &str, uri: &str, attrs: &[SaxAttribute]) -> Result<()> {
        let (prefix, local) = split_name(name);

        // An element or attribute prefix that resolved to nothing means the
        // prefix is unbound in scope.
        if let Some(pfx) = prefix {
            if pfx != "xml" && uri.is_empty() {
                return Err(Error::namespace(
                    format!("unbound namespace prefix '{pfx}'"),
                    SourceLocation::default(),
                ));
            }
        }

        let mut attributes = Vec::with_capacity(attrs.len());
        for attr in attrs {
            let (attr_prefix, attr_local) = split_name(&attr.name);
            let is_ns_decl =
                attr_prefix == Some("xmlns") || (attr_prefix.is_none() && attr_local == "xmlns");
            if let Some(pfx) = attr_prefix {
                if !is_ns_decl && pfx != "xml" && attr.namespace.is_empty() {
                    return Err(Error::namespace(
                        format!("unbound namespace prefix '{pfx}' on attribute"),
                        SourceLocation::default(),
                    ));
                }
            }
            attributes.push(Attribute {
                name: attr_local.to_string(),
                prefix: attr_prefix.map(String::from),
                namespace: if attr.namespace.is_empty() {
                    None
                } else {
                    Some(attr.namespace.clone())
                },
                value: attr.value.clone(),
                is_id: attr.is_id,
            });
        }

        let elem = self.doc.create_node(NodeKind::Element {
            name: local.to_string(),
            prefix: prefix.map(String::from),
            namespace: if uri.is_empty() {
                None
            } else {
                Some(uri.to_string())
            },
            attributes,
        });
        let parent = self.insertion_point();
        self.doc.append(parent, elem)?;

        for attr in attrs {
            if attr.is_id {
                self.doc.set_id(&attr.value, elem);
            }
        }

        self.stack.push(elem);
        Ok(())
    }

    fn end_element(&mut self, _name: &str, _uri: &str) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    fn character_data(&mut self, text: &str) {
        if self.in_cdata && self.preserve_cdata {
            let cdata = match self.open_cdata {
                Some(id) => id,
                None => {
                    let id = self.doc.create_node(NodeKind::CData {
                        content: String::new(),
                    });
                    let parent = self.insertion_point();
                    self.doc.link_last(parent, id);
                    self.open_cdata = Some(id);
                    id
                }
            };
            if let NodeKind::CData { content } = &mut self.doc.node_mut(cdata).kind {
                content.push_str(text);
            }
            return;
        }

        // Character data outside any element (stray prolog whitespace) is
        // not part of the tree.
        let parent = self.insertion_point();
        if parent == self.doc.root() {
            return;
        }
        self.doc.add_text(parent, text);
    }

    fn processing_instruction(&mut self, target: &str, data: &str) {
        let pi = self.doc.create_node(NodeKind::ProcessingInstruction {
            target: target.to_string(),
            data: if data.is_empty() {
                None
            } else {
                Some(data.to_string())
            },
        });
        let parent = self.insertion_point();
        self.doc.link_last(parent, pi);
    }

    fn comment(&mut self, text: &str) {
        let comment = self.doc.create_node(NodeKind::Comment {
            content: text.to_string(),
        });
        let parent = self.insertion_point();
        self.doc.link_last(parent, comment);
    }

    fn start_cdata_section(&mut self) {
        self.in_cdata = true;
        self.open_cdata = None;
    }

    fn end_cdata_section(&mut self) {
        self.in_cdata = false;
        self.open_cdata = None;
    }

    fn notation_decl(&mut self, name: &str, system_id: Option<&str>, public_id: Option<&str>) {
        self.doc.add_notation(Notation {
            name: name.to_string(),
            system_id: system_id.map(String::from),
            public_id: public_id.map(String::from),
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_simple_tree() {
        let mut builder = TreeBuilder::new(false);
        builder.start_element("root", "", &[]).unwrap();
        builder.character_data("hi");
        builder.end_element("root", "");
        let doc = builder.into_document();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.node_name(root), Some("root"));
        assert_eq!(doc.text_content(root), "hi");
    }

    #[test]
    fn test_adjacent_character_data_merges() {
        let mut builder = TreeBuilder::new(false);
        builder.start_element("r", "", &[]).unwrap();
        builder.character_data("a");
        builder.character_data("b");
        builder.end_element("r", "");
        let doc = builder.into_document();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.children(root).count(), 1);
        assert_eq!(doc.text_content(root), "ab");
    }

    #[test]
    fn test_cdata_routed_to_text_without_preserve() {
        let mut builder = TreeBuilder::new(false);
        builder.start_element("r", "", &[]).unwrap();
        builder.character_data("a");
        builder.start_cdata_section();
        builder.character_data("b");
        builder.end_cdata_section();
        builder.end_element("r", "");
        let doc = builder.into_document();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.children(root).count(), 1);
        assert_eq!(doc.text_content(root), "ab");
    }

    #[test]
    fn test_cdata_preserved_as_node() {
        let mut builder = TreeBuilder::new(true);
        builder.start_element("r", "", &[]).unwrap();
        builder.start_cdata_section();
        builder.character_data("raw");
        builder.end_cdata_section();
        builder.end_element("r", "");
        let doc = builder.into_document();
        let root = doc.root_element().unwrap();
        let child = doc.first_child(root).unwrap();
        assert!(matches!(doc.node(child).kind, NodeKind::CData { .. }));
        assert_eq!(doc.text_content(root), "raw");
    }

    #[test]
    fn test_unbound_prefix_raises_namespace_error() {
        let mut builder = TreeBuilder::new(false);
        let err = builder.start_element("p:root", "", &[]).unwrap_err();
        assert!(matches!(err, Error::Namespace { .. }));
    }

    #[test]
    fn test_id_attributes_registered() {
        let mut builder = TreeBuilder::new(false);
        let attrs = vec![SaxAttribute {
            namespace: String::new(),
            name: "id".to_string(),
            value: "n1".to_string(),
            is_id: true,
        }];
        builder.start_element("item", "", &attrs).unwrap();
        builder.end_element("item", "");
        let doc = builder.into_document();
        let item = doc.root_element().unwrap();
        assert_eq!(doc.element_by_id("n1"), Some(item));
    }

    #[test]
    fn test_notation_recorded_on_document() {
        let mut builder = TreeBuilder::new(false);
        builder.notation_decl("gif", Some("image/gif"), None);
        builder.start_element("r", "", &[]).unwrap();
        builder.end_element("r", "");
        let doc = builder.into_document();
        assert_eq!(doc.notations.len(), 1);
        assert_eq!(doc.notations[0].name, "gif");
    }
}
