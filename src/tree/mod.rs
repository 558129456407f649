//! Arena-based XML document tree.
//!
//! This module implements the core tree representation using arena allocation
//! with typed indices. All nodes live in a contiguous `Vec<NodeData>` owned by
//! the [`Document`], and are referenced by [`NodeId`] — a newtype over
//! `NonZeroU32`.
//!
//! This design provides O(1) node access, cache-friendly layout, and safe bulk
//! deallocation: dropping the `Document` frees every node without recursing
//! over the tree. Nodes are allocated in document order during parsing, so a
//! `NodeId` comparison doubles as a document-order comparison.
//!
//! The `Document` also carries the prolog state that belongs to the document
//! rather than to any node: XML version, detected encoding, standalone flag,
//! the DOCTYPE record, notation declarations, and serialization preferences.

mod node;

pub use node::NodeKind;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::Read;
use std::num::NonZeroU32;

use crate::encoding::Encoding;
use crate::error::{Error, Result};
use crate::parser::ParseOptions;
use crate::serial::FormatInfo;

/// A typed index into the document's node arena.
///
/// `NodeId` is a newtype over `NonZeroU32`, so `Option<NodeId>` is the same
/// size as `NodeId` (niche optimization). Ordering follows allocation order,
/// which for parsed documents is document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(NonZeroU32);

impl NodeId {
    #[allow(clippy::expect_used, clippy::cast_possible_truncation)]
    fn from_index(index: usize) -> Self {
        Self(NonZeroU32::new(index as u32).expect("NodeId index must be non-zero"))
    }

    fn as_index(self) -> usize {
        self.0.get() as usize
    }
}

/// The XML version a document declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XmlVersion {
    /// XML 1.0 (the default).
    #[default]
    V1_0,
    /// XML 1.1.
    V1_1,
}

impl XmlVersion {
    /// Returns the version string as written in an XML declaration.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1_0 => "1.0",
            Self::V1_1 => "1.1",
        }
    }

    /// Parses a version string from an XML declaration.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1.0" => Some(Self::V1_0),
            "1.1" => Some(Self::V1_1),
            _ => None,
        }
    }

    /// Returns whether `c` may appear literally in a document of this
    /// version.
    #[must_use]
    pub fn is_valid_char(self, c: char) -> bool {
        match self {
            Self::V1_0 => crate::util::is_valid_xml_1_0_char(c),
            Self::V1_1 => crate::util::is_valid_xml_1_1_char(c),
        }
    }

    /// Returns whether `c` may be produced by a character reference in this
    /// version. XML 1.1 admits the restricted controls here.
    #[must_use]
    pub fn is_valid_char_ref(self, c: char) -> bool {
        match self {
            Self::V1_0 => crate::util::is_valid_xml_1_0_char(c),
            Self::V1_1 => crate::util::is_valid_xml_1_1_char_ref(c),
        }
    }
}

impl fmt::Display for XmlVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An XML attribute on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// The attribute's local name (e.g., `"lang"` for `xml:lang`).
    pub name: String,
    /// Namespace prefix, if any (e.g., `"xml"` for `xml:lang`).
    pub prefix: Option<String>,
    /// Namespace URI after resolution, if any.
    pub namespace: Option<String>,
    /// The attribute value (fully expanded — entity references resolved).
    pub value: String,
    /// Set when the DTD declared this attribute with type `ID`.
    pub is_id: bool,
}

impl Attribute {
    /// Creates a plain attribute with no prefix and no namespace.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: None,
            namespace: None,
            value: value.into(),
            is_id: false,
        }
    }

    /// Returns the qualified name (`prefix:local` or `local`).
    #[must_use]
    pub fn qname(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{p}:{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Returns `true` if this attribute is a namespace declaration
    /// (`xmlns` or `xmlns:prefix`).
    #[must_use]
    pub fn is_namespace_decl(&self) -> bool {
        self.prefix.as_deref() == Some("xmlns") || (self.prefix.is_none() && self.name == "xmlns")
    }

    /// For a namespace declaration, the prefix being declared: `""` for the
    /// default namespace, the local name for `xmlns:prefix`.
    ///
    /// Returns `None` for ordinary attributes.
    #[must_use]
    pub fn declared_prefix(&self) -> Option<&str> {
        if self.prefix.as_deref() == Some("xmlns") {
            Some(&self.name)
        } else if self.prefix.is_none() && self.name == "xmlns" {
            Some("")
        } else {
            None
        }
    }
}

/// The DOCTYPE record of a document: root name plus external identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocType {
    /// The root element name declared in the DOCTYPE.
    pub root: String,
    /// The PUBLIC identifier, if any.
    pub public_id: Option<String>,
    /// The SYSTEM identifier (the DTD location), if any.
    pub system_id: Option<String>,
}

/// A notation declaration carried over from the DTD.
///
/// Notations are serialized back into an internal DOCTYPE subset when the
/// document is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notation {
    /// The notation name.
    pub name: String,
    /// The SYSTEM identifier, if any.
    pub system_id: Option<String>,
    /// The PUBLIC identifier, if any.
    pub public_id: Option<String>,
}

/// Storage for a single node in the document arena.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// What kind of node this is and its payload.
    pub kind: NodeKind,
    /// Parent node, if any. The document node has no parent.
    pub parent: Option<NodeId>,
    /// First child node.
    pub first_child: Option<NodeId>,
    /// Last child node (for O(1) append).
    pub last_child: Option<NodeId>,
    /// Next sibling.
    pub next_sibling: Option<NodeId>,
    /// Previous sibling.
    pub prev_sibling: Option<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            next_sibling: None,
            prev_sibling: None,
        }
    }
}

/// An XML document.
///
/// The `Document` owns all nodes in an arena and provides tree navigation,
/// mutation, namespace resolution, serialization, and the parse entry
/// points. Parsing, DOM mutation, and XPath evaluation on one document must
/// be serialized by the caller; distinct documents are fully independent.
///
/// # Examples
///
/// ```
/// use ferroxml::Document;
///
/// let doc = Document::parse_str("<root><child>Hello</child></root>").unwrap();
/// let root = doc.root_element().unwrap();
/// assert_eq!(doc.node_name(root), Some("root"));
/// assert_eq!(doc.text_content(root), "Hello");
/// ```
#[derive(Debug, Clone)]
pub struct Document {
    /// The node arena. Index 0 is unused (placeholder for `NonZeroU32`).
    nodes: Vec<NodeData>,
    /// The document node id (not the root element).
    root: NodeId,
    /// XML version from the XML declaration.
    pub version: XmlVersion,
    /// Encoding detected on input. Output is always UTF-8.
    pub encoding: Encoding,
    /// Standalone flag from the XML declaration.
    pub standalone: bool,
    /// The DOCTYPE record, if the document has one.
    pub doctype: Option<DocType>,
    /// Notation declarations from the DTD, serialized back into the
    /// internal subset on write.
    pub notations: Vec<Notation>,
    /// Default formatting for `Display` and `to_xml`.
    pub fmt: FormatInfo,
    /// Whether to emit the XML declaration when writing.
    write_xml_decl: bool,
    /// Whether to emit the DOCTYPE declaration when writing.
    write_doctype: bool,
    /// Whether to emit a newline after the prolog.
    wrap_prolog: bool,
    /// Mapping from ID attribute values to element nodes, populated during
    /// DTD validation.
    id_map: HashMap<String, NodeId>,
}

impl Document {
    /// Creates a new empty document.
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = Vec::with_capacity(64);
        // Index 0: placeholder (NodeId uses NonZeroU32)
        nodes.push(NodeData::new(NodeKind::Document));
        // Index 1: the document node
        nodes.push(NodeData::new(NodeKind::Document));
        let root = NodeId::from_index(1);
        Self {
            nodes,
            root,
            version: XmlVersion::V1_0,
            encoding: Encoding::Utf8,
            standalone: false,
            doctype: None,
            notations: Vec::new(),
            fmt: FormatInfo::default(),
            write_xml_decl: false,
            write_doctype: false,
            wrap_prolog: true,
            id_map: HashMap::new(),
        }
    }

    // --- Parse entry points ---

    /// Parses an XML string into a `Document` with default options.
    ///
    /// # Errors
    ///
    /// Returns `NotWellFormed`, `Namespace`, or `Invalid` errors per the
    /// parse options.
    pub fn parse_str(input: &str) -> Result<Self> {
        crate::parser::parse_str(input, &ParseOptions::default())
    }

    /// Parses an XML string with the given options.
    ///
    /// # Errors
    ///
    /// See [`parse_str`](Self::parse_str).
    pub fn parse_str_with(input: &str, options: &ParseOptions) -> Result<Self> {
        crate::parser::parse_str(input, options)
    }

    /// Parses XML from raw bytes, detecting the encoding from the BOM and
    /// the XML declaration.
    ///
    /// # Errors
    ///
    /// See [`parse_str`](Self::parse_str); also fails on malformed byte
    /// sequences for the detected encoding.
    pub fn parse_bytes(input: &[u8], options: &ParseOptions) -> Result<Self> {
        crate::parser::parse_bytes(input, options)
    }

    /// Parses XML from a reader. The reader is consumed to the end before
    /// parsing begins; a reader error aborts the parse and no partial
    /// document is returned.
    ///
    /// # Errors
    ///
    /// Returns `Io` for reader failures, otherwise see
    /// [`parse_str`](Self::parse_str).
    pub fn parse_reader(reader: &mut dyn Read, options: &ParseOptions) -> Result<Self> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        crate::parser::parse_bytes(&buf, options)
    }

    // --- Serialization ---

    /// Writes the document as UTF-8 XML text.
    ///
    /// # Errors
    ///
    /// Returns `Io` for writer failures, or a serialization error if the
    /// tree contains a NUL character.
    pub fn write(&self, writer: &mut dyn std::io::Write, fmt: &FormatInfo) -> Result<()> {
        crate::serial::write_document(self, writer, fmt)
    }

    /// Serializes the document to a `String` using its own format settings.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the tree contains a NUL character.
    pub fn to_xml(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write(&mut buf, &self.fmt)?;
        String::from_utf8(buf).map_err(|_| Error::invariant("serializer produced invalid UTF-8"))
    }

    // --- Prolog configuration ---

    /// Sets the DOCTYPE record written when `write_doctype` is enabled.
    pub fn set_doctype(
        &mut self,
        root: impl Into<String>,
        public_id: Option<String>,
        system_id: Option<String>,
    ) {
        self.doctype = Some(DocType {
            root: root.into(),
            public_id,
            system_id,
        });
    }

    /// Controls whether the XML declaration is written.
    pub fn set_write_xml_decl(&mut self, yes: bool) {
        self.write_xml_decl = yes;
    }

    /// Returns whether the XML declaration is written.
    #[must_use]
    pub fn write_xml_decl(&self) -> bool {
        self.write_xml_decl
    }

    /// Controls whether the DOCTYPE declaration is written.
    pub fn set_write_doctype(&mut self, yes: bool) {
        self.write_doctype = yes;
    }

    /// Returns whether the DOCTYPE declaration is written.
    #[must_use]
    pub fn write_doctype(&self) -> bool {
        self.write_doctype
    }

    /// Controls whether a newline follows the prolog.
    pub fn set_wrap_prolog(&mut self, yes: bool) {
        self.wrap_prolog = yes;
    }

    /// Returns whether a newline follows the prolog.
    #[must_use]
    pub fn wrap_prolog(&self) -> bool {
        self.wrap_prolog
    }

    /// Sets the declared XML version.
    pub fn set_version(&mut self, version: XmlVersion) {
        self.version = version;
    }

    /// Sets the recorded input encoding. Output remains UTF-8.
    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.encoding = encoding;
    }

    /// Sets the standalone flag.
    pub fn set_standalone(&mut self, standalone: bool) {
        self.standalone = standalone;
    }

    /// Records a notation declaration for DOCTYPE serialization.
    pub fn add_notation(&mut self, notation: Notation) {
        self.notations.push(notation);
    }

    // --- Node access ---

    /// Returns the document node id.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the document element (the single top-level element), if any.
    #[must_use]
    pub fn root_element(&self) -> Option<NodeId> {
        self.children(self.root)
            .find(|&id| matches!(self.node(id).kind, NodeKind::Element { .. }))
    }

    /// Returns a reference to the `NodeData` for the given node.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not refer to a valid node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.as_index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.as_index()]
    }

    /// Returns the local name of an element or the target of a PI.
    #[must_use]
    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { name, .. }
            | NodeKind::ProcessingInstruction { target: name, .. } => Some(name),
            _ => None,
        }
    }

    /// Returns the namespace prefix of an element node, if any.
    #[must_use]
    pub fn node_prefix(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { prefix, .. } => prefix.as_deref(),
            _ => None,
        }
    }

    /// Returns the qualified name (`prefix:local`) of an element node.
    #[must_use]
    pub fn node_qname(&self, id: NodeId) -> Option<String> {
        match &self.node(id).kind {
            NodeKind::Element { name, prefix, .. } => Some(match prefix {
                Some(p) => format!("{p}:{name}"),
                None => name.clone(),
            }),
            NodeKind::ProcessingInstruction { target, .. } => Some(target.clone()),
            _ => None,
        }
    }

    /// Returns the resolved namespace URI of an element node, if any.
    #[must_use]
    pub fn node_namespace(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { namespace, .. } => namespace.as_deref(),
            _ => None,
        }
    }

    /// Returns the text content of a text, CDATA, or comment node, or the
    /// data of a PI.
    #[must_use]
    pub fn node_text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Text { content }
            | NodeKind::Comment { content }
            | NodeKind::CData { content } => Some(content),
            NodeKind::ProcessingInstruction { data, .. } => data.as_deref(),
            _ => None,
        }
    }

    /// Returns the concatenated text of all descendant text and CDATA nodes,
    /// in document order.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        let mut result = String::new();
        let mut stack = vec![id];
        // Depth-first with an explicit stack; tree depth is caller-controlled.
        while let Some(current) = stack.pop() {
            match &self.node(current).kind {
                NodeKind::Text { content } | NodeKind::CData { content } => {
                    result.push_str(content);
                }
                _ => {
                    let children: Vec<NodeId> = self.children(current).collect();
                    for child in children.into_iter().rev() {
                        stack.push(child);
                    }
                }
            }
        }
        result
    }

    // --- Attributes ---

    /// Returns the attributes of an element node (empty for other kinds).
    #[must_use]
    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        match &self.node(id).kind {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    /// Returns the value of an attribute by qualified name.
    #[must_use]
    pub fn attribute(&self, id: NodeId, qname: &str) -> Option<&str> {
        let (prefix, local) = crate::util::split_name(qname);
        self.attributes(id)
            .iter()
            .find(|a| a.name == local && a.prefix.as_deref() == prefix)
            .map(|a| a.value.as_str())
    }

    /// Sets an attribute value, replacing an existing attribute with the
    /// same qualified name or appending a new one.
    pub fn set_attribute(&mut self, id: NodeId, qname: &str, value: impl Into<String>) {
        let (prefix, local) = crate::util::split_name(qname);
        let (prefix, local) = (prefix.map(String::from), local.to_string());
        let value = value.into();
        if let NodeKind::Element { attributes, .. } = &mut self.node_mut(id).kind {
            if let Some(attr) = attributes
                .iter_mut()
                .find(|a| a.name == local && a.prefix.as_deref() == prefix.as_deref())
            {
                attr.value = value;
            } else {
                attributes.push(Attribute {
                    name: local,
                    prefix,
                    namespace: None,
                    value,
                    is_id: false,
                });
            }
        }
    }

    /// Removes an attribute by qualified name. Returns `true` if one was
    /// removed.
    pub fn remove_attribute(&mut self, id: NodeId, qname: &str) -> bool {
        let (prefix, local) = crate::util::split_name(qname);
        let (prefix, local) = (prefix.map(String::from), local.to_string());
        if let NodeKind::Element { attributes, .. } = &mut self.node_mut(id).kind {
            let before = attributes.len();
            attributes.retain(|a| !(a.name == local && a.prefix.as_deref() == prefix.as_deref()));
            return attributes.len() != before;
        }
        false
    }

    pub(crate) fn push_attribute(&mut self, id: NodeId, attr: Attribute) {
        if let NodeKind::Element { attributes, .. } = &mut self.node_mut(id).kind {
            attributes.push(attr);
        }
    }

    // --- ID lookup ---

    /// Associates an ID value with an element node. Called during DTD
    /// validation when an attribute of type ID is seen.
    pub fn set_id(&mut self, id: &str, node: NodeId) {
        self.id_map.insert(id.to_string(), node);
    }

    /// Looks up an element by its ID attribute value.
    #[must_use]
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.id_map.get(id).copied()
    }

    // --- Navigation ---

    /// Returns the parent of a node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Returns the first child of a node.
    #[must_use]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).first_child
    }

    /// Returns the last child of a node.
    #[must_use]
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).last_child
    }

    /// Returns the next sibling of a node.
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).next_sibling
    }

    /// Returns the previous sibling of a node.
    #[must_use]
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).prev_sibling
    }

    /// Returns an iterator over the children of a node.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            doc: self,
            next: self.node(id).first_child,
        }
    }

    /// Returns an iterator over the element children of a node.
    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .filter(|&c| matches!(self.node(c).kind, NodeKind::Element { .. }))
    }

    /// Returns an iterator over a node and its ancestors (walking up).
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: Some(id),
        }
    }

    /// Returns a depth-first iterator over all descendants of a node
    /// (excluding the node itself).
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            root: id,
            next: self.first_child(id),
        }
    }

    // --- Mutation ---

    /// Allocates a new node in the arena and returns its `NodeId`.
    pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
        let index = self.nodes.len();
        self.nodes.push(NodeData::new(kind));
        NodeId::from_index(index)
    }

    /// Appends `child` to the end of `parent`'s child list.
    ///
    /// # Errors
    ///
    /// Returns `InvariantViolation` if `child` already has a parent, or if
    /// appending an element to the document node when it already has a
    /// document element.
    pub fn append(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check_insertable(parent, child)?;
        self.link_last(parent, child);
        Ok(())
    }

    /// Inserts `child` immediately before `reference`.
    ///
    /// # Errors
    ///
    /// Returns `InvariantViolation` under the same conditions as
    /// [`append`](Self::append), or if `reference` has no parent.
    pub fn insert_before(&mut self, reference: NodeId, child: NodeId) -> Result<()> {
        let Some(parent) = self.node(reference).parent else {
            return Err(Error::invariant("reference node has no parent"));
        };
        self.check_insertable(parent, child)?;

        self.node_mut(child).parent = Some(parent);
        match self.node(reference).prev_sibling {
            Some(prev) => {
                self.node_mut(prev).next_sibling = Some(child);
                self.node_mut(child).prev_sibling = Some(prev);
            }
            None => self.node_mut(parent).first_child = Some(child),
        }
        self.node_mut(child).next_sibling = Some(reference);
        self.node_mut(reference).prev_sibling = Some(child);
        Ok(())
    }

    /// Prepends `child` as the first child of `parent`.
    ///
    /// # Errors
    ///
    /// See [`append`](Self::append).
    pub fn prepend(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        match self.first_child(parent) {
            Some(first) => self.insert_before(first, child),
            None => self.append(parent, child),
        }
    }

    fn check_insertable(&self, parent: NodeId, child: NodeId) -> Result<()> {
        if self.node(child).parent.is_some() {
            return Err(Error::invariant(
                "node already has a parent; detach it first",
            ));
        }
        if parent == self.root
            && matches!(self.node(child).kind, NodeKind::Element { .. })
            && self.root_element().is_some()
        {
            return Err(Error::invariant(
                "only one child element is allowed in a document",
            ));
        }
        Ok(())
    }

    /// Links a fresh orphan node as the last child. The caller guarantees
    /// the insertion invariants hold.
    pub(crate) fn link_last(&mut self, parent: NodeId, child: NodeId) {
        self.node_mut(child).parent = Some(parent);
        if let Some(last) = self.node(parent).last_child {
            self.node_mut(last).next_sibling = Some(child);
            self.node_mut(child).prev_sibling = Some(last);
            self.node_mut(parent).last_child = Some(child);
        } else {
            self.node_mut(parent).first_child = Some(child);
            self.node_mut(parent).last_child = Some(child);
        }
    }

    /// Detaches a node from its parent. The node stays allocated in the
    /// arena but becomes unreachable from the document.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).parent else {
            return;
        };

        let prev = self.node(id).prev_sibling;
        let next = self.node(id).next_sibling;

        match prev {
            Some(p) => self.node_mut(p).next_sibling = next,
            None => self.node_mut(parent).first_child = next,
        }
        match next {
            Some(n) => self.node_mut(n).prev_sibling = prev,
            None => self.node_mut(parent).last_child = prev,
        }

        self.node_mut(id).parent = None;
        self.node_mut(id).prev_sibling = None;
        self.node_mut(id).next_sibling = None;
    }

    /// Unlinks a node and releases the payloads of its entire subtree.
    ///
    /// Uses an explicit work-stack so the cost is bounded by subtree size,
    /// not stack depth. References to erased nodes must not be used again.
    pub fn erase(&mut self, id: NodeId) {
        self.detach(id);
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let mut child = self.node(current).first_child;
            while let Some(c) = child {
                child = self.node(c).next_sibling;
                stack.push(c);
            }
            let data = self.node_mut(current);
            data.first_child = None;
            data.last_child = None;
            data.parent = None;
            data.prev_sibling = None;
            data.next_sibling = None;
            data.kind = NodeKind::Text {
                content: String::new(),
            };
        }
    }

    /// Returns the number of live nodes in the arena, including the
    /// document node.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 1
    }

    // --- Content helpers ---

    /// Returns the concatenated text of the element's *direct* text and
    /// CDATA children.
    #[must_use]
    pub fn get_content(&self, id: NodeId) -> String {
        let mut result = String::new();
        for child in self.children(id) {
            if let NodeKind::Text { content } | NodeKind::CData { content } =
                &self.node(child).kind
            {
                result.push_str(content);
            }
        }
        result
    }

    /// Replaces the element's text content: removes all direct text and
    /// CDATA children and appends one text node with `content`.
    pub fn set_content(&mut self, id: NodeId, content: impl Into<String>) {
        let text_children: Vec<NodeId> = self
            .children(id)
            .filter(|&c| {
                matches!(
                    self.node(c).kind,
                    NodeKind::Text { .. } | NodeKind::CData { .. }
                )
            })
            .collect();
        for child in text_children {
            self.erase(child);
        }
        let text = self.create_node(NodeKind::Text {
            content: content.into(),
        });
        self.link_last(id, text);
    }

    /// Appends text to the element, extending a trailing text node when one
    /// exists.
    pub fn add_text(&mut self, id: NodeId, text: &str) {
        if let Some(last) = self.last_child(id) {
            if let NodeKind::Text { content } = &mut self.node_mut(last).kind {
                content.push_str(text);
                return;
            }
        }
        let node = self.create_node(NodeKind::Text {
            content: text.to_string(),
        });
        self.link_last(id, node);
    }

    /// Merges adjacent text node children of the element into single nodes.
    pub fn flatten_text(&mut self, id: NodeId) {
        let mut current = self.first_child(id);
        while let Some(node) = current {
            let next = self.next_sibling(node);
            let both_text = matches!(self.node(node).kind, NodeKind::Text { .. })
                && next.is_some_and(|n| matches!(self.node(n).kind, NodeKind::Text { .. }));
            if both_text {
                let Some(next_id) = next else { break };
                let appended = match &self.node(next_id).kind {
                    NodeKind::Text { content } => content.clone(),
                    _ => String::new(),
                };
                if let NodeKind::Text { content } = &mut self.node_mut(node).kind {
                    content.push_str(&appended);
                }
                self.erase(next_id);
                // Stay on the same node; there may be another text sibling.
            } else {
                current = next;
            }
        }
    }

    /// Returns the language of a node: the value of the nearest enclosing
    /// `xml:lang` attribute, if any.
    #[must_use]
    pub fn lang(&self, id: NodeId) -> Option<&str> {
        for ancestor in self.ancestors(id) {
            let lang = self
                .attributes(ancestor)
                .iter()
                .find(|a| a.prefix.as_deref() == Some("xml") && a.name == "lang");
            if let Some(attr) = lang {
                return Some(&attr.value);
            }
        }
        None
    }

    // --- Namespace resolution ---

    /// Resolves a namespace prefix to its URI by walking the node and its
    /// ancestors for a matching declaration. The empty prefix resolves via
    /// `xmlns`.
    #[must_use]
    pub fn namespace_for_prefix(&self, id: NodeId, prefix: &str) -> Option<&str> {
        for ancestor in self.ancestors(id) {
            for attr in self.attributes(ancestor) {
                match attr.declared_prefix() {
                    Some(declared) if declared == prefix => {
                        if attr.value.is_empty() {
                            // xmlns="" undeclares the default namespace
                            return None;
                        }
                        return Some(&attr.value);
                    }
                    _ => {}
                }
            }
        }
        None
    }

    /// Finds the prefix bound to a namespace URI in scope at the node.
    ///
    /// Returns `Some("")` when the default namespace binds the URI, and
    /// `None` when the URI is unbound.
    #[must_use]
    pub fn prefix_for_namespace(&self, id: NodeId, uri: &str) -> Option<String> {
        for ancestor in self.ancestors(id) {
            for attr in self.attributes(ancestor) {
                if attr.declared_prefix().is_some() && attr.value == uri {
                    return attr.declared_prefix().map(String::from);
                }
            }
        }
        None
    }

    /// Moves an element (and optionally its subtree and attributes) into a
    /// namespace, installing a declaration when necessary.
    ///
    /// # Errors
    ///
    /// Returns `InvariantViolation` if the URI is already bound to a
    /// different prefix in scope, or if an attribute's namespace cannot be
    /// resolved to a prefix after the move.
    pub fn move_to_namespace(
        &mut self,
        id: NodeId,
        prefix: &str,
        uri: &str,
        recursive: bool,
        including_attributes: bool,
    ) -> Result<()> {
        match self.prefix_for_namespace(id, uri) {
            Some(known) if known != prefix => {
                return Err(Error::invariant(format!(
                    "namespace already bound to prefix '{known}'"
                )));
            }
            Some(_) => {}
            None => {
                // Update an existing declaration for this prefix, or add one.
                let qname = if prefix.is_empty() {
                    "xmlns".to_string()
                } else {
                    format!("xmlns:{prefix}")
                };
                self.set_attribute(id, &qname, uri);
            }
        }

        if let NodeKind::Element {
            prefix: elem_prefix,
            namespace,
            ..
        } = &mut self.node_mut(id).kind
        {
            *elem_prefix = if prefix.is_empty() {
                None
            } else {
                Some(prefix.to_string())
            };
            *namespace = Some(uri.to_string());
        }

        if including_attributes {
            let count = self.attributes(id).len();
            for i in 0..count {
                let attr = &self.attributes(id)[i];
                if attr.is_namespace_decl() {
                    continue;
                }
                let new_prefix = match &attr.namespace {
                    None => {
                        if prefix.is_empty() {
                            None
                        } else {
                            Some(prefix.to_string())
                        }
                    }
                    Some(ns) => {
                        let ns = ns.clone();
                        match self.prefix_for_namespace(id, &ns) {
                            Some(p) if !p.is_empty() => Some(p),
                            Some(_) => None,
                            None => {
                                return Err(Error::invariant(format!(
                                    "cannot move attribute to new namespace, \
                                     namespace not found: {ns}"
                                )));
                            }
                        }
                    }
                };
                if let NodeKind::Element { attributes, .. } = &mut self.node_mut(id).kind {
                    attributes[i].prefix = new_prefix;
                    if attributes[i].namespace.is_none() {
                        attributes[i].namespace = Some(uri.to_string());
                    }
                }
            }
        }

        if recursive {
            let children: Vec<NodeId> = self.child_elements(id).collect();
            for child in children {
                self.move_to_namespace(child, prefix, uri, recursive, including_attributes)?;
            }
        }

        Ok(())
    }

    // --- Cross-document grafting ---

    /// Deep-copies a subtree from another document under `parent`, then
    /// fixes namespace bindings: every prefix the subtree actually uses is
    /// either already bound compatibly at the destination or gets a new
    /// declaration on the copied root, renaming on conflict.
    ///
    /// # Errors
    ///
    /// Returns `InvariantViolation` if `parent` cannot accept the copied
    /// root (e.g., a second document element).
    pub fn graft(&mut self, parent: NodeId, source: &Document, node: NodeId) -> Result<NodeId> {
        let copied = self.deep_copy(source, node);
        self.append(parent, copied)?;
        self.fix_namespaces(copied, source, node);
        Ok(copied)
    }

    fn deep_copy(&mut self, source: &Document, node: NodeId) -> NodeId {
        let root_copy = self.create_node(source.node(node).kind.clone());
        let mut stack = vec![(node, root_copy)];
        while let Some((src, dst)) = stack.pop() {
            let children: Vec<NodeId> = source.children(src).collect();
            for child in children {
                let copy = self.create_node(source.node(child).kind.clone());
                self.link_last(dst, copy);
                stack.push((child, copy));
            }
        }
        root_copy
    }

    /// Rebinds the prefixes used inside a freshly grafted subtree.
    ///
    /// Walks the subtree once collecting `prefix → uri` pairs (from the
    /// resolved namespaces recorded on elements and attributes, falling
    /// back to the source scope), then renames to the destination's
    /// existing prefix where one binds the same URI, or installs a new
    /// declaration on the subtree root — under a fresh name if the prefix
    /// is taken.
    fn fix_namespaces(&mut self, copied_root: NodeId, source: &Document, source_root: NodeId) {
        let mut mapped: HashMap<String, String> = HashMap::new();
        let mut to_declare: Vec<(String, String)> = Vec::new();

        let mut stack = vec![copied_root];
        let mut nodes_in_subtree = Vec::new();
        while let Some(id) = stack.pop() {
            nodes_in_subtree.push(id);
            let children: Vec<NodeId> = self.children(id).collect();
            stack.extend(children);
        }

        for &id in &nodes_in_subtree {
            let prefixes: Vec<(String, Option<String>)> = {
                let mut ps = Vec::new();
                if let NodeKind::Element {
                    prefix: Some(p),
                    namespace,
                    ..
                } = &self.node(id).kind
                {
                    ps.push((p.clone(), namespace.clone()));
                }
                for attr in self.attributes(id) {
                    if attr.is_namespace_decl() {
                        continue;
                    }
                    if let Some(p) = &attr.prefix {
                        if p != "xml" {
                            ps.push((p.clone(), attr.namespace.clone()));
                        }
                    }
                }
                ps
            };

            for (prefix, recorded_ns) in prefixes {
                if mapped.contains_key(&prefix) {
                    continue;
                }
                let uri = recorded_ns
                    .or_else(|| {
                        source
                            .namespace_for_prefix(source_root, &prefix)
                            .map(String::from)
                    })
                    .unwrap_or_default();
                if uri.is_empty() {
                    mapped.insert(prefix.clone(), prefix.clone());
                    continue;
                }
                match self.prefix_for_namespace(copied_root, &uri) {
                    Some(dest_prefix) if !dest_prefix.is_empty() => {
                        mapped.insert(prefix.clone(), dest_prefix);
                    }
                    _ => {
                        // Pick a prefix that is free at the destination.
                        let mut candidate = prefix.clone();
                        let mut n = 1;
                        while self.namespace_for_prefix(copied_root, &candidate).is_some()
                            || to_declare.iter().any(|(p, _)| *p == candidate)
                        {
                            candidate = format!("{prefix}{n}");
                            n += 1;
                        }
                        mapped.insert(prefix.clone(), candidate.clone());
                        to_declare.push((candidate, uri));
                    }
                }
            }
        }

        // Apply the prefix renames throughout the subtree.
        for &id in &nodes_in_subtree {
            if let NodeKind::Element {
                prefix: Some(p), ..
            } = &self.node(id).kind
            {
                if let Some(new) = mapped.get(p).filter(|new| *new != p).cloned() {
                    if let NodeKind::Element { prefix, .. } = &mut self.node_mut(id).kind {
                        *prefix = Some(new);
                    }
                }
            }
            let renames: Vec<(usize, String)> = self
                .attributes(id)
                .iter()
                .enumerate()
                .filter(|(_, a)| !a.is_namespace_decl())
                .filter_map(|(i, a)| {
                    let p = a.prefix.as_ref()?;
                    mapped.get(p).filter(|new| *new != p).map(|new| (i, new.clone()))
                })
                .collect();
            for (i, new) in renames {
                if let NodeKind::Element { attributes, .. } = &mut self.node_mut(id).kind {
                    attributes[i].prefix = Some(new);
                }
            }
        }

        for (prefix, uri) in to_declare {
            let qname = if prefix.is_empty() {
                "xmlns".to_string()
            } else {
                format!("xmlns:{prefix}")
            };
            self.set_attribute(copied_root, &qname, uri);
        }
    }

    // --- Structural equality ---

    /// Structural comparison of two documents: their root-level children
    /// compare pairwise, with whitespace-only text nodes skippable.
    #[must_use]
    pub fn equals(&self, other: &Document) -> bool {
        self.nodes_equal(self.root, other, other.root)
    }

    /// Structural comparison of two nodes, possibly across documents.
    ///
    /// Elements compare by expanded name, by children (in order, with
    /// whitespace-only text skippable on either side), and by attributes as
    /// a set — except that namespace declarations are compared as sets of
    /// URIs, so two trees differing only in prefix spellings are equal.
    #[must_use]
    pub fn nodes_equal(&self, a: NodeId, other: &Document, b: NodeId) -> bool {
        let (na, nb) = (&self.node(a).kind, &other.node(b).kind);
        match (na, nb) {
            (NodeKind::Document, NodeKind::Document) => {
                self.children_equal(a, other, b)
            }
            (NodeKind::Element { .. }, NodeKind::Element { .. }) => {
                self.elements_equal(a, other, b)
            }
            (NodeKind::Text { content: ca }, NodeKind::Text { content: cb })
            | (NodeKind::CData { content: ca }, NodeKind::CData { content: cb })
            | (NodeKind::Comment { content: ca }, NodeKind::Comment { content: cb }) => ca == cb,
            (
                NodeKind::ProcessingInstruction {
                    target: ta,
                    data: da,
                },
                NodeKind::ProcessingInstruction {
                    target: tb,
                    data: db,
                },
            ) => ta == tb && da == db,
            _ => false,
        }
    }

    fn elements_equal(&self, a: NodeId, other: &Document, b: NodeId) -> bool {
        let (NodeKind::Element {
            name: name_a,
            namespace: ns_a,
            attributes: attrs_a,
            ..
        }, NodeKind::Element {
            name: name_b,
            namespace: ns_b,
            attributes: attrs_b,
            ..
        }) = (&self.node(a).kind, &other.node(b).kind)
        else {
            return false;
        };

        if name_a != name_b || ns_a != ns_b {
            return false;
        }
        if !self.children_equal(a, other, b) {
            return false;
        }

        // Attributes: unordered comparison of (name, namespace, value)
        // triples, with namespace declarations reduced to their URI set.
        let mut plain_a: Vec<(&str, Option<&str>, &str)> = Vec::new();
        let mut plain_b: Vec<(&str, Option<&str>, &str)> = Vec::new();
        let mut uris_a: HashSet<&str> = HashSet::new();
        let mut uris_b: HashSet<&str> = HashSet::new();

        for attr in attrs_a {
            if attr.is_namespace_decl() {
                uris_a.insert(&attr.value);
            } else {
                plain_a.push((&attr.name, attr.namespace.as_deref(), &attr.value));
            }
        }
        for attr in attrs_b {
            if attr.is_namespace_decl() {
                uris_b.insert(&attr.value);
            } else {
                plain_b.push((&attr.name, attr.namespace.as_deref(), &attr.value));
            }
        }
        plain_a.sort_unstable();
        plain_b.sort_unstable();

        plain_a == plain_b && uris_a == uris_b
    }

    fn children_equal(&self, a: NodeId, other: &Document, b: NodeId) -> bool {
        let mut ca = self.first_child(a);
        let mut cb = other.first_child(b);

        loop {
            match (ca, cb) {
                (None, None) => return true,
                (Some(x), Some(y)) if self.nodes_equal(x, other, y) => {
                    ca = self.next_sibling(x);
                    cb = other.next_sibling(y);
                }
                (Some(x), _) if self.node(x).kind.is_blank_text() => {
                    ca = self.next_sibling(x);
                }
                (_, Some(y)) if other.node(y).kind.is_blank_text() => {
                    cb = other.next_sibling(y);
                }
                _ => return false,
            }
        }
    }

    // --- XPath conveniences ---

    /// Evaluates an XPath expression from this node and returns the
    /// matching elements.
    ///
    /// # Errors
    ///
    /// Returns `XPathCompile` or `XPathEval` errors from the engine.
    pub fn find(&self, id: NodeId, path: &str) -> Result<Vec<NodeId>> {
        let xp = crate::xpath::XPath::compile(path)?;
        xp.evaluate_elements(self, id, &crate::xpath::Context::new())
    }

    /// Evaluates an XPath expression and returns the first matching
    /// element, if any.
    ///
    /// # Errors
    ///
    /// See [`find`](Self::find).
    pub fn find_first(&self, id: NodeId, path: &str) -> Result<Option<NodeId>> {
        Ok(self.find(id, path)?.into_iter().next())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.to_xml().map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

// --- Iterators ---

/// Iterator over the children of a node.
pub struct Children<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.node(current).next_sibling;
        Some(current)
    }
}

/// Iterator over a node and its ancestors.
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.node(current).parent;
        Some(current)
    }
}

/// Depth-first, pre-order iterator over all descendants of a node.
pub struct Descendants<'a> {
    doc: &'a Document,
    root: NodeId,
    next: Option<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;

        if let Some(child) = self.doc.first_child(current) {
            self.next = Some(child);
            return Some(current);
        }
        if let Some(sibling) = self.doc.next_sibling(current) {
            self.next = Some(sibling);
            return Some(current);
        }

        let mut ancestor = self.doc.parent(current);
        while let Some(anc) = ancestor {
            if anc == self.root {
                self.next = None;
                return Some(current);
            }
            if let Some(sibling) = self.doc.next_sibling(anc) {
                self.next = Some(sibling);
                return Some(current);
            }
            ancestor = self.doc.parent(anc);
        }

        self.next = None;
        Some(current)
    }
}
