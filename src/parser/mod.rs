//! XML 1.0/1.1 parser.
//!
//! A hand-rolled recursive descent parser over the XML productions,
//! emitting SAX events into a handler. The default handler is the DOM
//! builder, giving the `bytes → tokenizer → parser → events → tree`
//! pipeline; bare-SAX use goes through [`parse_sax`].
//!
//! The parser is hand-rolled (not combinator-based): DTD validation and
//! entity expansion need fine-grained control over parse state, and error
//! messages need exact source locations.

pub(crate) mod input;
mod xml;

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use crate::builder::TreeBuilder;
use crate::error::Result;
use crate::sax::SaxHandler;
use crate::tree::Document;

use input::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_ENTITY_EXPANSIONS};

/// Callback resolving an external entity `(base, public_id, system_id)` to
/// a byte stream.
///
/// Return `None` to decline; the parser then falls back to resolving the
/// system identifier as a file under the configured base directory.
pub type EntityLoader =
    Arc<dyn Fn(&str, Option<&str>, Option<&str>) -> Option<Box<dyn Read>> + Send + Sync>;

/// Parse options controlling validation, CDATA handling, and entity
/// resolution.
///
/// ```
/// use ferroxml::parser::ParseOptions;
///
/// let opts = ParseOptions::default().validating(true).preserve_cdata(true);
/// ```
pub struct ParseOptions {
    /// Validate against the DTD and raise `Invalid` at end of document on
    /// failures.
    pub validating: bool,
    /// Treat an unbound namespace prefix as a parse-time error. Namespace
    /// resolution itself is always performed.
    pub validating_ns: bool,
    /// Keep CDATA sections as distinct nodes instead of folding them into
    /// text.
    pub preserve_cdata: bool,
    /// Keep whitespace-only text between elements. Off by default; mixed
    /// content is unaffected either way.
    pub preserve_whitespace: bool,
    /// Base directory for resolving external entities by system ID.
    pub base_dir: Option<PathBuf>,
    /// External entity loader; consulted before the file-system fallback.
    pub entity_loader: Option<EntityLoader>,
    /// Maximum element nesting depth.
    pub max_depth: u32,
    /// Maximum number of entity expansions per document.
    pub max_entity_expansions: u32,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            validating: false,
            validating_ns: false,
            preserve_cdata: false,
            preserve_whitespace: false,
            base_dir: None,
            entity_loader: None,
            max_depth: DEFAULT_MAX_DEPTH,
            max_entity_expansions: DEFAULT_MAX_ENTITY_EXPANSIONS,
        }
    }
}

impl Clone for ParseOptions {
    fn clone(&self) -> Self {
        Self {
            validating: self.validating,
            validating_ns: self.validating_ns,
            preserve_cdata: self.preserve_cdata,
            preserve_whitespace: self.preserve_whitespace,
            base_dir: self.base_dir.clone(),
            entity_loader: self.entity_loader.clone(),
            max_depth: self.max_depth,
            max_entity_expansions: self.max_entity_expansions,
        }
    }
}

impl std::fmt::Debug for ParseOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseOptions")
            .field("validating", &self.validating)
            .field("validating_ns", &self.validating_ns)
            .field("preserve_cdata", &self.preserve_cdata)
            .field("preserve_whitespace", &self.preserve_whitespace)
            .field("base_dir", &self.base_dir)
            .field("entity_loader", &self.entity_loader.as_ref().map(|_| "..."))
            .field("max_depth", &self.max_depth)
            .field("max_entity_expansions", &self.max_entity_expansions)
            .finish()
    }
}

impl ParseOptions {
    /// Enables or disables DTD validation.
    #[must_use]
    pub fn validating(mut self, yes: bool) -> Self {
        self.validating = yes;
        self
    }

    /// Enables or disables strict namespace checking.
    #[must_use]
    pub fn validating_ns(mut self, yes: bool) -> Self {
        self.validating_ns = yes;
        self
    }

    /// Enables or disables CDATA preservation.
    #[must_use]
    pub fn preserve_cdata(mut self, yes: bool) -> Self {
        self.preserve_cdata = yes;
        self
    }

    /// Enables or disables preservation of whitespace-only text between
    /// elements.
    #[must_use]
    pub fn preserve_whitespace(mut self, yes: bool) -> Self {
        self.preserve_whitespace = yes;
        self
    }

    /// Sets the base directory for external entity resolution.
    #[must_use]
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Sets the external entity loader callback.
    #[must_use]
    pub fn entity_loader(
        mut self,
        loader: impl Fn(&str, Option<&str>, Option<&str>) -> Option<Box<dyn Read>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.entity_loader = Some(Arc::new(loader));
        self
    }

    /// Sets the maximum element nesting depth.
    #[must_use]
    pub fn max_depth(mut self, max: u32) -> Self {
        self.max_depth = max;
        self
    }

    /// Sets the maximum number of entity expansions.
    #[must_use]
    pub fn max_entity_expansions(mut self, max: u32) -> Self {
        self.max_entity_expansions = max;
        self
    }
}

/// Parses a UTF-8 string into a [`Document`].
///
/// # Errors
///
/// `NotWellFormed`, `Namespace`, or (in validating mode) `Invalid`.
pub fn parse_str(input: &str, options: &ParseOptions) -> Result<Document> {
    // A leading BOM is encoding metadata, not content (XML 1.0 §4.3.3).
    let input = input.strip_prefix('\u{FEFF}').unwrap_or(input);
    let mut builder = TreeBuilder::new(options.preserve_cdata);
    xml::XmlParser::new(options, &mut builder).parse(input)?;
    Ok(builder.into_document())
}

/// Parses raw bytes, detecting the encoding from the BOM and the XML
/// declaration, then building a [`Document`].
///
/// # Errors
///
/// See [`parse_str`]; also fails on malformed byte sequences.
pub fn parse_bytes(input: &[u8], options: &ParseOptions) -> Result<Document> {
    let (text, encoding) = crate::encoding::decode_to_utf8(input)?;
    let text = text.strip_prefix('\u{FEFF}').unwrap_or(&text);
    let mut builder = TreeBuilder::new(options.preserve_cdata);
    xml::XmlParser::new(options, &mut builder).parse(text)?;
    let mut doc = builder.into_document();
    doc.encoding = encoding;
    Ok(doc)
}

/// Parses a UTF-8 string, firing SAX events on the provided handler
/// without building a tree.
///
/// # Errors
///
/// See [`parse_str`].
pub fn parse_sax(input: &str, options: &ParseOptions, handler: &mut dyn SaxHandler) -> Result<()> {
    let input = input.strip_prefix('\u{FEFF}').unwrap_or(input);
    xml::XmlParser::new(options, handler).parse(input)
}
