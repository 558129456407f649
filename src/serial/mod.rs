//! XML serializer.
//!
//! Writes a [`Document`] back to UTF-8 text. Output shape is controlled by
//! [`FormatInfo`] plus the document-level prolog flags (`write_xml_decl`,
//! `write_doctype`, `wrap_prolog`). UTF-8 is the only output encoding.

use std::fmt::Write as _;
use std::io::Write;

use crate::error::{Error, Result};
use crate::tree::{Document, NodeId, NodeKind, XmlVersion};

/// The HTML void elements, the only ones collapsed in `html` mode.
const HTML_VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Serialization options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatInfo {
    /// Indent nested elements, one line per element.
    pub indent: bool,
    /// Spaces per indent level.
    pub indent_width: usize,
    /// Put each attribute after the first on its own line, aligned.
    pub indent_attributes: bool,
    /// Write childless elements as `<x/>`.
    pub collapse_tags: bool,
    /// HTML mode: collapse only the HTML void element set, never others.
    pub html: bool,
    /// Drop comment nodes from the output.
    pub suppress_comments: bool,
    /// Emit tab, newline, and carriage return as numeric references.
    pub escape_whitespace: bool,
    /// Escape `"` in text content (attribute values always escape it).
    pub escape_double_quote: bool,
    /// The version whose character range governs escaping.
    pub version: XmlVersion,
}

impl Default for FormatInfo {
    fn default() -> Self {
        Self {
            indent: false,
            indent_width: 0,
            indent_attributes: false,
            collapse_tags: true,
            html: false,
            suppress_comments: false,
            escape_whitespace: false,
            escape_double_quote: true,
            version: XmlVersion::V1_0,
        }
    }
}

impl FormatInfo {
    /// Indented output with the given width.
    #[must_use]
    pub fn indented(width: usize) -> Self {
        Self {
            indent: true,
            indent_width: width,
            ..Self::default()
        }
    }
}

/// Writes the document to `writer` as UTF-8 XML.
///
/// # Errors
///
/// Returns `Io` for writer failures. A NUL character anywhere in the tree
/// aborts with an error — it is unrepresentable in XML output.
pub fn write_document(doc: &Document, writer: &mut dyn Write, fmt: &FormatInfo) -> Result<()> {
    let mut out = String::new();

    if doc.version == XmlVersion::V1_1 || doc.write_xml_decl() {
        out.push_str("<?xml version=\"");
        out.push_str(doc.version.as_str());
        out.push('"');
        if doc.standalone {
            out.push_str(" standalone=\"yes\"");
        }
        out.push_str("?>");
        if doc.wrap_prolog() {
            out.push('\n');
        }
    }

    if !doc.notations.is_empty() || doc.write_doctype() {
        let root_name = doc
            .root_element()
            .and_then(|e| doc.node_qname(e))
            .or_else(|| doc.doctype.as_ref().map(|d| d.root.clone()))
            .unwrap_or_default();
        out.push_str("<!DOCTYPE ");
        out.push_str(&root_name);

        if doc.write_doctype() {
            if let Some(dt) = &doc.doctype {
                if let Some(system_id) = &dt.system_id {
                    match &dt.public_id {
                        Some(public_id) => {
                            out.push_str(" PUBLIC \"");
                            out.push_str(public_id);
                            out.push_str("\" \"");
                        }
                        None => out.push_str(" SYSTEM \""),
                    }
                    out.push_str(system_id);
                    out.push('"');
                }
            }
        }

        if !doc.notations.is_empty() {
            out.push_str(" [\n");
            let mut notations = doc.notations.clone();
            notations.sort_by(|a, b| a.name.cmp(&b.name));
            for notation in &notations {
                out.push_str("<!NOTATION ");
                out.push_str(&notation.name);
                match (&notation.public_id, &notation.system_id) {
                    (Some(public_id), Some(system_id)) => {
                        let _ = write!(out, " PUBLIC '{public_id}' '{system_id}'");
                    }
                    (Some(public_id), None) => {
                        let _ = write!(out, " PUBLIC '{public_id}'");
                    }
                    (None, Some(system_id)) => {
                        let _ = write!(out, " SYSTEM '{system_id}'");
                    }
                    (None, None) => {}
                }
                out.push_str(">\n");
            }
            out.push(']');
        }

        out.push_str(">\n");
    }

    for child in doc.children(doc.root()) {
        write_node(doc, child, &mut out, fmt, 0)?;
    }

    writer.write_all(out.as_bytes())?;
    Ok(())
}

fn write_node(
    doc: &Document,
    id: NodeId,
    out: &mut String,
    fmt: &FormatInfo,
    level: usize,
) -> Result<()> {
    match &doc.node(id).kind {
        NodeKind::Element { .. } => write_element(doc, id, out, fmt, level),
        NodeKind::Text { content } => {
            write_escaped_text(out, content, fmt, false)
        }
        NodeKind::CData { content } => {
            if content.contains('\u{0}') {
                return Err(nul_error());
            }
            out.push_str("<![CDATA[");
            // A ]]> inside the payload must be split across two sections.
            out.push_str(&content.replace("]]>", "]]]]><![CDATA[>"));
            out.push_str("]]>");
            Ok(())
        }
        NodeKind::Comment { content } => {
            if fmt.suppress_comments {
                return Ok(());
            }
            if content.contains('\u{0}') {
                return Err(nul_error());
            }
            out.push_str("<!--");
            out.push_str(content);
            out.push_str("-->");
            Ok(())
        }
        NodeKind::ProcessingInstruction { target, data } => {
            out.push_str("<?");
            out.push_str(target);
            if let Some(data) = data {
                if data.contains('\u{0}') {
                    return Err(nul_error());
                }
                out.push(' ');
                out.push_str(data);
            }
            out.push_str("?>");
            Ok(())
        }
        NodeKind::Document => Ok(()),
    }
}

fn write_element(
    doc: &Document,
    id: NodeId,
    out: &mut String,
    fmt: &FormatInfo,
    level: usize,
) -> Result<()> {
    let NodeKind::Element {
        name,
        prefix,
        attributes,
        ..
    } = &doc.node(id).kind
    else {
        return Ok(());
    };

    let qname = match prefix {
        Some(p) => format!("{p}:{name}"),
        None => name.clone(),
    };
    let indentation = level * fmt.indent_width;

    if fmt.indent {
        if level > 0 {
            out.push('\n');
        }
        push_spaces(out, indentation);
    }

    out.push('<');
    out.push_str(&qname);

    // Attribute alignment column: after `<qname `.
    let attr_column = indentation + 1 + qname.len() + 1;
    for (i, attr) in attributes.iter().enumerate() {
        if i > 0 && fmt.indent_attributes {
            out.push('\n');
            push_spaces(out, attr_column);
        } else {
            out.push(' ');
        }
        out.push_str(&attr.qname());
        out.push_str("=\"");
        write_escaped_text(out, &attr.value, fmt, true)?;
        out.push('"');
    }

    let childless = doc.first_child(id).is_none();
    let collapse = if fmt.html {
        HTML_VOID_ELEMENTS.contains(&qname.as_str())
    } else {
        fmt.collapse_tags && childless
    };

    if collapse {
        out.push_str("/>");
        return Ok(());
    }

    out.push('>');

    let mut wrote_element = false;
    for child in doc.children(id) {
        write_node(doc, child, out, fmt, level + 1)?;
        wrote_element = matches!(doc.node(child).kind, NodeKind::Element { .. });
    }

    if wrote_element && fmt.indent {
        out.push('\n');
        push_spaces(out, indentation);
    }

    out.push_str("</");
    out.push_str(&qname);
    out.push('>');
    Ok(())
}

/// Escapes character data for output.
///
/// `&`, `<`, `>` always use the named references; `"` does in attribute
/// values and, when requested, in text. Whitespace goes out as decimal
/// references when `escape_whitespace`. Characters outside the version's
/// range become decimal references. NUL aborts.
fn write_escaped_text(
    out: &mut String,
    text: &str,
    fmt: &FormatInfo,
    in_attribute: bool,
) -> Result<()> {
    for c in text.chars() {
        match c {
            '\u{0}' => return Err(nul_error()),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attribute || fmt.escape_double_quote => out.push_str("&quot;"),
            '\t' | '\n' | '\r' if fmt.escape_whitespace || in_attribute => {
                let _ = write!(out, "&#{};", c as u32);
            }
            _ if !fmt.version.is_valid_char(c) => {
                let _ = write!(out, "&#{};", c as u32);
            }
            _ => out.push(c),
        }
    }
    Ok(())
}

fn push_spaces(out: &mut String, count: usize) {
    for _ in 0..count {
        out.push(' ');
    }
}

fn nul_error() -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        "NUL character cannot be serialized",
    ))
}
