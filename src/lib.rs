//! # ferroxml
//!
//! A self-contained XML toolkit: a validating, namespace-aware XML 1.0/1.1
//! parser producing an in-memory tree, and an XPath 1.0 engine over that
//! tree.
//!
//! ## Quick start
//!
//! ```
//! use ferroxml::Document;
//!
//! let doc = Document::parse_str("<root><child>Hello</child></root>").unwrap();
//! let root = doc.root_element().unwrap();
//! assert_eq!(doc.node_name(root), Some("root"));
//! assert_eq!(doc.text_content(root), "Hello");
//! ```
//!
//! ## Querying with XPath
//!
//! ```
//! use ferroxml::Document;
//!
//! let doc = Document::parse_str(
//!     r#"<persons><person id="1"><firstname>John</firstname></person></persons>"#,
//! ).unwrap();
//! let root = doc.root_element().unwrap();
//! let people = doc.find(root, "//person").unwrap();
//! assert_eq!(people.len(), 1);
//! assert_eq!(doc.attribute(people[0], "id"), Some("1"));
//! ```

pub mod builder;
pub mod dtd;
pub mod encoding;
pub mod error;
pub mod parser;
pub mod sax;
pub mod serial;
pub mod tree;
pub mod util;
pub mod xpath;

// Primary types re-exported at the crate root.
pub use error::{Error, Result};
pub use parser::ParseOptions;
pub use serial::FormatInfo;
pub use tree::{Attribute, Document, NodeId, NodeKind, XmlVersion};
pub use xpath::XPath;
