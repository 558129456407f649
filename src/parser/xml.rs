//! Core XML 1.0/1.1 parser state machine.
//!
//! A hand-rolled recursive descent parser over the XML productions
//! (<https://www.w3.org/TR/xml/>), including the DTD grammar. Events are
//! pushed into a [`SaxHandler`] as input is consumed; the parser itself
//! builds no tree.
//!
//! In validating mode the parser drives a content-model state machine per
//! open element, materializes defaulted attributes, and type-checks
//! attribute values. Invalidation messages accumulate and surface as one
//! `Invalid` error at end of document; well-formedness errors abort
//! immediately and take priority.

use std::collections::HashSet;
use std::io::Read;

use crate::dtd::{
    AttributeDecl, AttributeDefault, AttributeType, ContentSpec, Dtd, EntityDecl, NotationDecl,
    Repeat, Validator,
};
use crate::error::{Error, Result};
use crate::sax::{SaxAttribute, SaxHandler};
use crate::tree::XmlVersion;
use crate::util::{split_name, validate_qname};

use super::input::{Cursor, NamespaceStack, XMLNS_NAMESPACE, XML_NAMESPACE};
use super::ParseOptions;

/// Where a run of content ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentEnd {
    /// Content runs until the enclosing element's end tag.
    EndTag,
    /// Content runs to the end of the input (entity replacement text).
    Eof,
}

/// An attribute as parsed from a start tag, before namespace resolution.
struct RawAttr {
    qname: String,
    value: String,
    is_id: bool,
    defaulted: bool,
}

/// The core XML parser.
pub(crate) struct XmlParser<'o, 'h> {
    options: &'o ParseOptions,
    handler: &'h mut dyn SaxHandler,
    /// Namespace scope stack, mirroring element nesting.
    ns: NamespaceStack,
    /// DTD declarations accumulated from the internal and external subsets.
    dtd: Dtd,
    /// Root element name from the DOCTYPE, for the root-type validity check.
    doctype_root: Option<String>,
    /// Whether the DOCTYPE referenced an external subset.
    has_external_subset: bool,
    /// Whether the DTD contained parameter entity references; affects the
    /// undeclared-entity well-formedness rule (XML 1.0 §4.1).
    has_pe_references: bool,
    /// Content validators for the open elements, innermost last.
    validators: Vec<(String, Validator)>,
    /// Accumulated validation failures.
    invalidations: Vec<String>,
    /// ID attribute values seen, for duplicate detection.
    ids_seen: HashSet<String>,
    /// Names of entities currently being expanded (loop prevention).
    active_entities: HashSet<String>,
    /// Total entity expansions, bounded by the options.
    entity_expansions: u32,
    /// Element nesting depth, bounded by the options.
    depth: u32,
    /// Declared XML version.
    version: XmlVersion,
    /// Declared standalone flag.
    standalone: bool,
}

impl<'o, 'h> XmlParser<'o, 'h> {
    pub fn new(options: &'o ParseOptions, handler: &'h mut dyn SaxHandler) -> Self {
        Self {
            options,
            handler,
            ns: NamespaceStack::new(),
            dtd: Dtd::default(),
            doctype_root: None,
            has_external_subset: false,
            has_pe_references: false,
            validators: Vec::new(),
            invalidations: Vec::new(),
            ids_seen: HashSet::new(),
            active_entities: HashSet::new(),
            entity_expansions: 0,
            depth: 0,
            version: XmlVersion::V1_0,
            standalone: false,
        }
    }

    /// Parses an entire document, firing events into the handler.
    pub fn parse(&mut self, input: &str) -> Result<()> {
        let mut cur = Cursor::new(input);

        // XML declaration must sit at the very start (XML 1.0 §2.8).
        if looking_at_xml_decl(&cur) {
            self.parse_xml_declaration(&mut cur)?;
        } else {
            let had_ws = cur.skip_whitespace();
            if had_ws && looking_at_xml_decl(&cur) {
                return Err(cur.fatal("XML declaration must be at the start of the document"));
            }
        }

        self.parse_misc(&mut cur)?;

        if cur.looking_at(b"<!DOCTYPE") {
            self.parse_doctype(&mut cur)?;
            self.parse_misc(&mut cur)?;
        }

        // The document element is required (XML 1.0 §2.1).
        if cur.peek() == Some(b'<')
            && cur.peek_at(1).is_some_and(|b| b != b'!' && b != b'?')
        {
            self.parse_element(&mut cur)?;
        } else {
            return Err(cur.fatal("missing document element"));
        }

        self.parse_misc(&mut cur)?;
        cur.skip_whitespace();
        if !cur.at_end() {
            return Err(cur.fatal("content after document element"));
        }

        if self.options.validating && !self.invalidations.is_empty() {
            return Err(Error::Invalid {
                messages: std::mem::take(&mut self.invalidations),
            });
        }
        Ok(())
    }

    fn invalid(&mut self, message: String) {
        self.handler.report_invalidation(&message);
        self.invalidations.push(message);
    }

    // --- XML declaration ---
    // See XML 1.0 §2.8 [23] XMLDecl

    fn parse_xml_declaration(&mut self, cur: &mut Cursor<'_>) -> Result<()> {
        cur.expect_str(b"<?xml")?;
        cur.skip_whitespace_required()?;

        cur.expect_str(b"version")?;
        cur.skip_whitespace();
        cur.expect_byte(b'=')?;
        cur.skip_whitespace();
        let version_str = cur.parse_quoted_value()?;
        let Some(version) = XmlVersion::parse(&version_str) else {
            return Err(cur.fatal(format!("unsupported XML version '{version_str}'")));
        };
        self.version = version;
        cur.set_version(version);

        let had_ws = cur.skip_whitespace();
        let encoding = if cur.looking_at(b"encoding") {
            if !had_ws {
                return Err(cur.fatal("whitespace required before 'encoding'"));
            }
            cur.expect_str(b"encoding")?;
            cur.skip_whitespace();
            cur.expect_byte(b'=')?;
            cur.skip_whitespace();
            let name = cur.parse_quoted_value()?;
            if !is_valid_encoding_name(&name) {
                return Err(cur.fatal(format!("invalid encoding name '{name}'")));
            }
            crate::encoding::Encoding::for_label(&name)
        } else {
            None
        };

        let had_ws2 = cur.skip_whitespace() || (encoding.is_none() && had_ws);
        if cur.looking_at(b"standalone") {
            if !had_ws2 {
                return Err(cur.fatal("whitespace required before 'standalone'"));
            }
            cur.expect_str(b"standalone")?;
            cur.skip_whitespace();
            cur.expect_byte(b'=')?;
            cur.skip_whitespace();
            let value = cur.parse_quoted_value()?;
            self.standalone = match value.as_str() {
                "yes" => true,
                "no" => false,
                _ => return Err(cur.fatal("standalone must be 'yes' or 'no'")),
            };
        }

        cur.skip_whitespace();
        cur.expect_str(b"?>")?;

        self.handler.xml_decl(
            version,
            encoding.unwrap_or_default(),
            self.standalone,
        );
        Ok(())
    }

    // --- Misc (comments, PIs, whitespace outside the document element) ---

    fn parse_misc(&mut self, cur: &mut Cursor<'_>) -> Result<()> {
        loop {
            cur.skip_whitespace();
            if cur.looking_at(b"<!--") {
                let comment = self.parse_comment_text(cur)?;
                self.handler.comment(&comment);
            } else if cur.looking_at(b"<?") && !looking_at_xml_decl(cur) {
                let (target, data) = self.parse_pi_text(cur)?;
                self.handler.processing_instruction(&target, &data);
            } else {
                break;
            }
        }
        Ok(())
    }

    // --- DOCTYPE ---
    // See XML 1.0 §2.8 [28] doctypedecl

    fn parse_doctype(&mut self, cur: &mut Cursor<'_>) -> Result<()> {
        cur.expect_str(b"<!DOCTYPE")?;
        cur.skip_whitespace_required()?;
        let root = cur.parse_name()?;
        cur.skip_whitespace();

        let (public_id, system_id) = self.parse_external_id(cur, false)?;
        cur.skip_whitespace();

        self.doctype_root = Some(root.clone());
        self.has_external_subset = system_id.is_some();
        self.handler
            .doctype_decl(&root, public_id.as_deref(), system_id.as_deref());

        if cur.peek() == Some(b'[') {
            cur.advance(1);
            self.parse_markup_decls(cur, false, true)?;
            cur.expect_byte(b']')?;
            cur.skip_whitespace();
        }
        cur.expect_byte(b'>')?;

        // Load and parse the external subset when validating.
        if self.options.validating && system_id.is_some() {
            if let Some(text) =
                self.load_external_entity(public_id.as_deref(), system_id.as_deref())?
            {
                let text = strip_text_decl(&text).to_string();
                let mut sub = Cursor::new(&text);
                sub.set_version(self.version);
                self.parse_markup_decls(&mut sub, true, false)?;
            }
        }

        // VC: Notation Declared — unparsed entities must name a declared
        // notation. Checked once both subsets are in.
        if self.options.validating {
            let mut messages = Vec::new();
            for entity in self.dtd.entities.values() {
                if let Some(notation) = &entity.ndata {
                    if !self.dtd.notations.contains_key(notation) {
                        messages.push(format!(
                            "entity '{}' references unknown notation '{notation}'",
                            entity.name
                        ));
                    }
                }
            }
            for message in messages {
                self.invalid(message);
            }
        }

        Ok(())
    }

    fn parse_external_id(
        &mut self,
        cur: &mut Cursor<'_>,
        system_required_after_public: bool,
    ) -> Result<(Option<String>, Option<String>)> {
        if cur.looking_at(b"SYSTEM") {
            cur.expect_str(b"SYSTEM")?;
            cur.skip_whitespace_required()?;
            let sysid = cur.parse_quoted_value()?;
            Ok((None, Some(sysid)))
        } else if cur.looking_at(b"PUBLIC") {
            cur.expect_str(b"PUBLIC")?;
            cur.skip_whitespace_required()?;
            let pubid = cur.parse_public_id()?;
            let had_ws = cur.skip_whitespace();
            if matches!(cur.peek(), Some(b'"' | b'\'')) {
                if !had_ws {
                    return Err(cur.fatal("whitespace required before system literal"));
                }
                let sysid = cur.parse_quoted_value()?;
                Ok((Some(pubid), Some(sysid)))
            } else if system_required_after_public {
                Err(cur.fatal("system literal required after public ID"))
            } else {
                Ok((Some(pubid), None))
            }
        } else {
            Ok((None, None))
        }
    }

    // --- DTD markup declarations ---

    /// Parses a run of markup declarations. For the internal subset the
    /// run stops at `]`; for external subsets and parameter entity
    /// replacement it runs to end of input.
    fn parse_markup_decls(
        &mut self,
        cur: &mut Cursor<'_>,
        external: bool,
        internal_subset: bool,
    ) -> Result<()> {
        loop {
            cur.skip_whitespace();
            if cur.at_end() {
                if internal_subset {
                    return Err(cur.fatal("unexpected end of input in internal subset"));
                }
                return Ok(());
            }
            if internal_subset && cur.peek() == Some(b']') {
                return Ok(());
            }

            if cur.looking_at(b"<!--") {
                self.parse_comment_text(cur)?;
            } else if cur.looking_at(b"<!ELEMENT") {
                self.parse_element_decl(cur, external)?;
            } else if cur.looking_at(b"<!ATTLIST") {
                self.parse_attlist_decl(cur, external)?;
            } else if cur.looking_at(b"<!ENTITY") {
                self.parse_entity_decl(cur, external)?;
            } else if cur.looking_at(b"<!NOTATION") {
                self.parse_notation_decl(cur, external)?;
            } else if cur.looking_at(b"<![") && external {
                self.parse_conditional_section(cur)?;
            } else if cur.looking_at(b"<?") {
                self.parse_pi_text(cur)?;
            } else if cur.peek() == Some(b'%') {
                // WFC: PEs in Internal Subset — references may appear only
                // between declarations, which is exactly here.
                self.has_pe_references = true;
                cur.advance(1);
                let name = cur.parse_name()?;
                cur.expect_byte(b';')?;
                if let Some(replacement) = self.resolve_parameter_entity(&name)? {
                    self.check_expansion_budget(cur)?;
                    if !self.active_entities.insert(name.clone()) {
                        return Err(cur.fatal(format!("recursive parameter entity '%{name};'")));
                    }
                    let mut sub = Cursor::new(&replacement);
                    sub.set_version(self.version);
                    let result = self.parse_markup_decls(&mut sub, external, false);
                    self.active_entities.remove(&name);
                    result?;
                }
            } else {
                return Err(cur.fatal("unexpected content in DTD"));
            }
        }
    }

    /// `<![INCLUDE[ ... ]]>` / `<![IGNORE[ ... ]]>` in the external subset.
    fn parse_conditional_section(&mut self, cur: &mut Cursor<'_>) -> Result<()> {
        cur.expect_str(b"<![")?;
        cur.skip_whitespace();
        let keyword = cur.parse_name()?;
        cur.skip_whitespace();
        cur.expect_byte(b'[')?;
        match keyword.as_str() {
            "INCLUDE" => {
                // Collect the section body up to its matching ]]> and
                // process it as declarations, respecting nesting.
                let mut body = String::new();
                let mut depth = 1u32;
                loop {
                    if cur.at_end() {
                        return Err(cur.fatal("unterminated conditional section"));
                    }
                    if cur.looking_at(b"<![") {
                        depth += 1;
                        body.push_str("<![");
                        cur.advance(3);
                    } else if cur.looking_at(b"]]>") {
                        depth -= 1;
                        cur.advance(3);
                        if depth == 0 {
                            break;
                        }
                        body.push_str("]]>");
                    } else {
                        body.push(cur.next_char()?);
                    }
                }
                let mut sub = Cursor::new(&body);
                sub.set_version(self.version);
                self.parse_markup_decls(&mut sub, true, false)
            }
            "IGNORE" => {
                let mut depth = 1u32;
                loop {
                    if cur.at_end() {
                        return Err(cur.fatal("unterminated conditional section"));
                    }
                    if cur.looking_at(b"<![") {
                        depth += 1;
                        cur.advance(3);
                    } else if cur.looking_at(b"]]>") {
                        depth -= 1;
                        cur.advance(3);
                        if depth == 0 {
                            return Ok(());
                        }
                    } else {
                        cur.next_char()?;
                    }
                }
            }
            _ => Err(cur.fatal(format!("unknown conditional section keyword '{keyword}'"))),
        }
    }

    // --- <!ELEMENT> ---
    // See XML 1.0 §3.2 [45] elementdecl

    fn parse_element_decl(&mut self, cur: &mut Cursor<'_>, external: bool) -> Result<()> {
        cur.expect_str(b"<!ELEMENT")?;
        cur.skip_whitespace_required()?;
        let name = cur.parse_name()?;
        cur.skip_whitespace_required()?;
        let spec = self.parse_content_spec(cur)?;
        cur.skip_whitespace();
        cur.expect_byte(b'>')?;

        let already_declared = self.dtd.element(&name).is_some_and(|d| d.declared);
        if already_declared {
            if self.options.validating {
                self.invalid(format!("element '{name}' declared more than once"));
            }
        } else {
            let decl = self.dtd.element_mut(&name, external);
            decl.declared = true;
            decl.external = external;
            decl.content = Some(spec);
        }
        Ok(())
    }

    fn parse_content_spec(&mut self, cur: &mut Cursor<'_>) -> Result<ContentSpec> {
        if cur.looking_at(b"EMPTY") {
            cur.expect_str(b"EMPTY")?;
            return Ok(ContentSpec::Empty);
        }
        if cur.looking_at(b"ANY") {
            cur.expect_str(b"ANY")?;
            return Ok(ContentSpec::Any);
        }
        cur.expect_byte(b'(')?;
        cur.skip_whitespace();
        if cur.looking_at(b"#PCDATA") {
            cur.expect_str(b"#PCDATA")?;
            cur.skip_whitespace();
            let mut names = Vec::new();
            while cur.peek() == Some(b'|') {
                cur.advance(1);
                cur.skip_whitespace();
                names.push(ContentSpec::Element(cur.parse_name()?));
                cur.skip_whitespace();
            }
            cur.expect_byte(b')')?;
            let repeated = cur.peek() == Some(b'*');
            if repeated {
                cur.advance(1);
            } else if !names.is_empty() {
                return Err(cur.fatal("mixed content with element names requires '*'"));
            }
            let choice = ContentSpec::Choice(names, true);
            if repeated {
                Ok(ContentSpec::Repeated(Box::new(choice), Repeat::ZeroOrMore))
            } else {
                Ok(choice)
            }
        } else {
            self.parse_particle_group(cur)
        }
    }

    /// Parses a `children` group after its opening `(` was consumed.
    fn parse_particle_group(&mut self, cur: &mut Cursor<'_>) -> Result<ContentSpec> {
        let mut items = vec![self.parse_particle(cur)?];
        cur.skip_whitespace();
        let mut separator: Option<u8> = None;
        loop {
            match cur.peek() {
                Some(b')') => {
                    cur.advance(1);
                    break;
                }
                Some(sep @ (b',' | b'|')) => {
                    if separator.is_some_and(|s| s != sep) {
                        return Err(cur.fatal("cannot mix ',' and '|' in a content group"));
                    }
                    separator = Some(sep);
                    cur.advance(1);
                    cur.skip_whitespace();
                    items.push(self.parse_particle(cur)?);
                    cur.skip_whitespace();
                }
                _ => return Err(cur.fatal("expected ',', '|' or ')' in content model")),
            }
        }
        let group = match separator {
            Some(b'|') => ContentSpec::Choice(items, false),
            _ if items.len() == 1 => items.remove(0),
            _ => ContentSpec::Seq(items),
        };
        Ok(self.apply_occurrence(cur, group))
    }

    fn parse_particle(&mut self, cur: &mut Cursor<'_>) -> Result<ContentSpec> {
        if cur.peek() == Some(b'(') {
            cur.advance(1);
            cur.skip_whitespace();
            self.parse_particle_group(cur)
        } else {
            let name = cur.parse_name()?;
            Ok(self.apply_occurrence(cur, ContentSpec::Element(name)))
        }
    }

    fn apply_occurrence(&mut self, cur: &mut Cursor<'_>, spec: ContentSpec) -> ContentSpec {
        let rep = match cur.peek() {
            Some(b'?') => Repeat::Optional,
            Some(b'*') => Repeat::ZeroOrMore,
            Some(b'+') => Repeat::OneOrMore,
            _ => return spec,
        };
        cur.advance(1);
        ContentSpec::Repeated(Box::new(spec), rep)
    }

    // --- <!ATTLIST> ---
    // See XML 1.0 §3.3 [52] AttlistDecl

    fn parse_attlist_decl(&mut self, cur: &mut Cursor<'_>, external: bool) -> Result<()> {
        cur.expect_str(b"<!ATTLIST")?;
        cur.skip_whitespace_required()?;
        let element_name = cur.parse_name()?;

        loop {
            let had_ws = cur.skip_whitespace();
            if cur.peek() == Some(b'>') {
                cur.advance(1);
                break;
            }
            if !had_ws {
                return Err(cur.fatal("whitespace required between attribute definitions"));
            }
            let attr_name = cur.parse_name()?;
            cur.skip_whitespace_required()?;
            let (attr_type, enumeration) = self.parse_attribute_type(cur)?;
            cur.skip_whitespace_required()?;
            let (default, default_value) = self.parse_attribute_default(cur)?;

            let decl = AttributeDecl {
                name: attr_name,
                attr_type,
                default,
                default_value,
                enumeration,
                external,
            };
            self.dtd.element_mut(&element_name, external).add_attribute(decl);
        }
        Ok(())
    }

    fn parse_attribute_type(
        &mut self,
        cur: &mut Cursor<'_>,
    ) -> Result<(AttributeType, Vec<String>)> {
        if cur.peek() == Some(b'(') {
            // Enumerated type: ( nmtoken | nmtoken | ... )
            cur.advance(1);
            let values = self.parse_enumeration(cur, false)?;
            return Ok((AttributeType::Enumerated, values));
        }

        let keyword = cur.parse_name()?;
        let attr_type = match keyword.as_str() {
            "CDATA" => AttributeType::CData,
            "ID" => AttributeType::Id,
            "IDREF" => AttributeType::IdRef,
            "IDREFS" => AttributeType::IdRefs,
            "ENTITY" => AttributeType::Entity,
            "ENTITIES" => AttributeType::Entities,
            "NMTOKEN" => AttributeType::NmToken,
            "NMTOKENS" => AttributeType::NmTokens,
            "NOTATION" => {
                cur.skip_whitespace_required()?;
                cur.expect_byte(b'(')?;
                let values = self.parse_enumeration(cur, true)?;
                return Ok((AttributeType::Notation, values));
            }
            other => return Err(cur.fatal(format!("unknown attribute type '{other}'"))),
        };
        Ok((attr_type, Vec::new()))
    }

    fn parse_enumeration(&mut self, cur: &mut Cursor<'_>, names: bool) -> Result<Vec<String>> {
        let mut values = Vec::new();
        loop {
            cur.skip_whitespace();
            let value = if names {
                cur.parse_name()?
            } else {
                cur.parse_nmtoken()?
            };
            values.push(value);
            cur.skip_whitespace();
            match cur.next_byte()? {
                b'|' => {}
                b')' => break,
                other => {
                    return Err(cur.fatal(format!(
                        "expected '|' or ')' in enumeration, found '{}'",
                        other as char
                    )))
                }
            }
        }
        Ok(values)
    }

    fn parse_attribute_default(
        &mut self,
        cur: &mut Cursor<'_>,
    ) -> Result<(AttributeDefault, Option<String>)> {
        if cur.looking_at(b"#REQUIRED") {
            cur.expect_str(b"#REQUIRED")?;
            return Ok((AttributeDefault::Required, None));
        }
        if cur.looking_at(b"#IMPLIED") {
            cur.expect_str(b"#IMPLIED")?;
            return Ok((AttributeDefault::Implied, None));
        }
        if cur.looking_at(b"#FIXED") {
            cur.expect_str(b"#FIXED")?;
            cur.skip_whitespace_required()?;
            let value = self.parse_default_value(cur)?;
            return Ok((AttributeDefault::Fixed, Some(value)));
        }
        let value = self.parse_default_value(cur)?;
        Ok((AttributeDefault::Default, Some(value)))
    }

    /// A default attribute value literal. Character and built-in entity
    /// references are expanded; other general entities stay literal until
    /// the default is used.
    fn parse_default_value(&mut self, cur: &mut Cursor<'_>) -> Result<String> {
        let quote = cur.next_byte()?;
        if quote != b'"' && quote != b'\'' {
            return Err(cur.fatal("attribute default must be quoted"));
        }
        let mut value = String::new();
        loop {
            if cur.at_end() {
                return Err(cur.fatal("unexpected end of input in attribute default"));
            }
            if cur.peek() == Some(quote) {
                cur.advance(1);
                break;
            }
            if cur.peek() == Some(b'<') {
                return Err(cur.fatal("'<' not allowed in attribute values"));
            }
            if cur.peek() == Some(b'&') {
                if cur.peek_at(1) == Some(b'#') {
                    value.push(self.parse_char_reference(cur)?);
                    continue;
                }
                cur.advance(1);
                let name = cur.parse_name()?;
                cur.expect_byte(b';')?;
                match builtin_entity(&name) {
                    Some(c) => value.push(c),
                    None => {
                        value.push('&');
                        value.push_str(&name);
                        value.push(';');
                    }
                }
                continue;
            }
            let c = cur.next_char()?;
            value.push(if matches!(c, '\t' | '\n') { ' ' } else { c });
        }
        Ok(value)
    }

    // --- <!ENTITY> ---
    // See XML 1.0 §4.2 [70] EntityDecl

    fn parse_entity_decl(&mut self, cur: &mut Cursor<'_>, external: bool) -> Result<()> {
        cur.expect_str(b"<!ENTITY")?;
        cur.skip_whitespace_required()?;

        let parameter = if cur.peek() == Some(b'%') {
            cur.advance(1);
            cur.skip_whitespace_required()?;
            true
        } else {
            false
        };

        let name = cur.parse_name()?;
        cur.skip_whitespace_required()?;

        let mut decl;
        if matches!(cur.peek(), Some(b'"' | b'\'')) {
            let value = self.parse_entity_value(cur)?;
            decl = EntityDecl::internal(name, value);
        } else {
            let (public_id, system_id) = self.parse_external_id(cur, true)?;
            if system_id.is_none() {
                return Err(cur.fatal("entity declaration requires a value or an external ID"));
            }
            decl = EntityDecl::external(name, system_id, public_id);
            cur.skip_whitespace();
            if cur.looking_at(b"NDATA") {
                if parameter {
                    return Err(cur.fatal("parameter entities cannot be unparsed"));
                }
                cur.expect_str(b"NDATA")?;
                cur.skip_whitespace_required()?;
                let notation = cur.parse_name()?;
                decl.parsed = false;
                decl.ndata = Some(notation);
            }
        }
        cur.skip_whitespace();
        cur.expect_byte(b'>')?;

        decl.parameter = parameter;
        decl.externally_defined = external;
        if parameter {
            self.dtd.add_parameter_entity(decl);
        } else {
            self.dtd.add_entity(decl);
        }
        Ok(())
    }

    /// An entity value literal. Character references are expanded now
    /// (XML 1.0 §4.4.2); parameter entity references are expanded now;
    /// general entity references are bypassed (kept literally).
    fn parse_entity_value(&mut self, cur: &mut Cursor<'_>) -> Result<String> {
        let quote = cur.next_byte()?;
        let mut value = String::new();
        loop {
            if cur.at_end() {
                return Err(cur.fatal("unexpected end of input in entity value"));
            }
            if cur.peek() == Some(quote) {
                cur.advance(1);
                break;
            }
            match cur.peek() {
                Some(b'&') if cur.peek_at(1) == Some(b'#') => {
                    value.push(self.parse_char_reference(cur)?);
                }
                Some(b'&') => {
                    // Bypassed — expanded when the entity is referenced.
                    cur.advance(1);
                    let name = cur.parse_name()?;
                    cur.expect_byte(b';')?;
                    value.push('&');
                    value.push_str(&name);
                    value.push(';');
                }
                Some(b'%') => {
                    cur.advance(1);
                    let name = cur.parse_name()?;
                    cur.expect_byte(b';')?;
                    if let Some(replacement) = self.resolve_parameter_entity(&name)? {
                        value.push_str(&replacement);
                    }
                }
                _ => value.push(cur.next_char()?),
            }
        }
        Ok(value)
    }

    fn resolve_parameter_entity(&mut self, name: &str) -> Result<Option<String>> {
        let Some(decl) = self.dtd.parameter_entity(name) else {
            if self.options.validating {
                let message = format!("undeclared parameter entity '%{name};'");
                self.invalid(message);
            }
            return Ok(None);
        };
        if !decl.external {
            return Ok(Some(decl.replacement.clone()));
        }
        let (public_id, system_id) = (decl.public_id.clone(), decl.system_id.clone());
        match self.load_external_entity(public_id.as_deref(), system_id.as_deref())? {
            Some(text) => Ok(Some(strip_text_decl(&text).to_string())),
            None => {
                if self.options.validating {
                    self.invalid(format!("cannot resolve parameter entity '%{name};'"));
                }
                Ok(None)
            }
        }
    }

    // --- <!NOTATION> ---
    // See XML 1.0 §4.7 [82] NotationDecl

    fn parse_notation_decl(&mut self, cur: &mut Cursor<'_>, _external: bool) -> Result<()> {
        cur.expect_str(b"<!NOTATION")?;
        cur.skip_whitespace_required()?;
        let name = cur.parse_name()?;
        cur.skip_whitespace_required()?;

        let (public_id, system_id) = if cur.looking_at(b"SYSTEM") {
            cur.expect_str(b"SYSTEM")?;
            cur.skip_whitespace_required()?;
            (None, Some(cur.parse_quoted_value()?))
        } else if cur.looking_at(b"PUBLIC") {
            cur.expect_str(b"PUBLIC")?;
            cur.skip_whitespace_required()?;
            let pubid = cur.parse_public_id()?;
            cur.skip_whitespace();
            if matches!(cur.peek(), Some(b'"' | b'\'')) {
                (Some(pubid), Some(cur.parse_quoted_value()?))
            } else {
                (Some(pubid), None)
            }
        } else {
            return Err(cur.fatal("notation declaration requires SYSTEM or PUBLIC"));
        };
        cur.skip_whitespace();
        cur.expect_byte(b'>')?;

        self.handler
            .notation_decl(&name, system_id.as_deref(), public_id.as_deref());
        self.dtd.notations.insert(
            name.clone(),
            NotationDecl {
                name,
                system_id,
                public_id,
            },
        );
        Ok(())
    }

    // --- Elements ---
    // See XML 1.0 §3.1 [40] STag, [42] ETag, [44] EmptyElemTag

    fn parse_element(&mut self, cur: &mut Cursor<'_>) -> Result<()> {
        self.depth += 1;
        if self.depth > self.options.max_depth {
            return Err(cur.fatal(format!(
                "maximum nesting depth exceeded ({})",
                self.options.max_depth
            )));
        }

        cur.expect_byte(b'<')?;
        let name = cur.parse_name()?;
        let mut attrs: Vec<RawAttr> = Vec::new();

        loop {
            let had_ws = cur.skip_whitespace();
            if cur.peek() == Some(b'>') || cur.looking_at(b"/>") {
                break;
            }
            if !had_ws {
                return Err(cur.fatal("whitespace required between attributes"));
            }
            let attr_name = cur.parse_name()?;
            cur.skip_whitespace();
            cur.expect_byte(b'=')?;
            cur.skip_whitespace();
            let value = self.parse_attribute_value(cur)?;
            if attrs.iter().any(|a| a.qname == attr_name) {
                return Err(cur.fatal(format!("duplicate attribute '{attr_name}'")));
            }
            attrs.push(RawAttr {
                qname: attr_name,
                value,
                is_id: false,
                defaulted: false,
            });
        }

        self.process_dtd_attributes(&name, &mut attrs);

        // --- Namespace processing (Namespaces in XML 1.0 §3) ---
        self.ns.push_scope();
        let mut declared_here: Vec<(String, String)> = Vec::new();

        if let Some(message) = validate_qname(&name) {
            return Err(Error::namespace(message, cur.location()));
        }
        let (prefix, _local) = split_name(&name);
        if prefix == Some("xmlns") {
            return Err(Error::namespace(
                "elements must not have the prefix 'xmlns'",
                cur.location(),
            ));
        }

        for attr in &attrs {
            if let Some(message) = validate_qname(&attr.qname) {
                return Err(Error::namespace(message, cur.location()));
            }
            let (attr_prefix, attr_local) = split_name(&attr.qname);
            let declared = if attr_prefix == Some("xmlns") {
                Some(attr_local.to_string())
            } else if attr_prefix.is_none() && attr_local == "xmlns" {
                Some(String::new())
            } else {
                None
            };
            let Some(declared_prefix) = declared else {
                continue;
            };
            self.check_namespace_decl(cur, &declared_prefix, &attr.value)?;
            let key = if declared_prefix.is_empty() {
                None
            } else {
                Some(declared_prefix.clone())
            };
            self.ns.bind(key, attr.value.clone());
            declared_here.push((declared_prefix.clone(), attr.value.clone()));
            self.handler
                .start_namespace_decl(&declared_prefix, &attr.value);
        }

        // Resolve the element's namespace.
        let elem_uri = self.ns.resolve(prefix).map(String::from);
        if let Some(pfx) = prefix {
            if pfx != "xml" && elem_uri.is_none() && self.options.validating_ns {
                return Err(Error::namespace(
                    format!("unbound namespace prefix '{pfx}'"),
                    cur.location(),
                ));
            }
        }

        // Resolve attribute namespaces and build the event list.
        let mut sax_attrs: Vec<SaxAttribute> = Vec::with_capacity(attrs.len());
        for attr in &attrs {
            let (attr_prefix, _) = split_name(&attr.qname);
            let uri = match attr_prefix {
                Some("xmlns") => String::new(),
                None => String::new(),
                Some(pfx) => match self.ns.resolve(Some(pfx)) {
                    Some(uri) => uri.to_string(),
                    None => {
                        if pfx != "xml" && self.options.validating_ns {
                            return Err(Error::namespace(
                                format!("unbound namespace prefix '{pfx}' on attribute"),
                                cur.location(),
                            ));
                        }
                        String::new()
                    }
                },
            };
            sax_attrs.push(SaxAttribute {
                namespace: uri,
                name: attr.qname.clone(),
                value: attr.value.clone(),
                is_id: attr.is_id,
            });
        }

        // Namespace-aware duplicate detection (Namespaces in XML 1.0 §6.3):
        // the same local name bound to the same URI via different prefixes.
        {
            let mut seen: HashSet<(String, String)> = HashSet::new();
            for attr in &sax_attrs {
                let (p, local) = split_name(&attr.name);
                if p == Some("xmlns") || (p.is_none() && local == "xmlns") {
                    continue;
                }
                if !seen.insert((attr.namespace.clone(), local.to_string())) {
                    return Err(cur.fatal(format!(
                        "duplicate attribute '{local}' after namespace expansion"
                    )));
                }
            }
        }

        // --- Validation ---
        if self.options.validating {
            self.validate_element_start(&name);
        }

        self.handler
            .start_element(&name, elem_uri.as_deref().unwrap_or(""), &sax_attrs)?;

        if cur.looking_at(b"/>") {
            cur.advance(2);
            self.finish_element(&name, elem_uri.as_deref().unwrap_or(""), declared_here);
            self.depth -= 1;
            return Ok(());
        }

        cur.expect_byte(b'>')?;
        self.parse_content(cur, ContentEnd::EndTag)?;

        cur.expect_str(b"</")?;
        let end_name = cur.parse_name()?;
        if end_name != name {
            return Err(cur.fatal(format!(
                "mismatched end tag: expected </{name}>, found </{end_name}>"
            )));
        }
        cur.skip_whitespace();
        cur.expect_byte(b'>')?;

        self.finish_element(&name, elem_uri.as_deref().unwrap_or(""), declared_here);
        self.depth -= 1;
        Ok(())
    }

    fn finish_element(
        &mut self,
        name: &str,
        uri: &str,
        declared_here: Vec<(String, String)>,
    ) {
        if self.options.validating {
            if let Some((elem_name, validator)) = self.validators.pop() {
                if !validator.done() {
                    self.invalid(format!(
                        "content of element '{elem_name}' is incomplete"
                    ));
                }
            }
        }
        self.handler.end_element(name, uri);
        self.ns.pop_scope();
        for (prefix, _) in declared_here.into_iter().rev() {
            self.handler.end_namespace_decl(&prefix);
        }
    }

    /// Applies DTD knowledge to a start tag's attributes: ID flags,
    /// defaulted attributes, and — when validating — required checks and
    /// type validation with normalization.
    fn process_dtd_attributes(&mut self, element_name: &str, attrs: &mut Vec<RawAttr>) {
        let Some(decl) = self.dtd.element(element_name) else {
            return;
        };

        // Clone the declarations we need; validation mutates self.
        let attr_decls: Vec<AttributeDecl> = decl.attributes.clone();

        for attr_decl in &attr_decls {
            let present = attrs.iter_mut().find(|a| a.qname == attr_decl.name);
            match present {
                Some(attr) => {
                    attr.is_id = attr_decl.attr_type == AttributeType::Id;
                    if self.options.validating {
                        let mut value = attr.value.clone();
                        if attr_decl.validate_value(&mut value, &self.dtd) {
                            attr.value = value;
                        } else {
                            let message = format!(
                                "invalid value for attribute '{}' of element '{}'",
                                attr_decl.name, element_name
                            );
                            self.invalid(message);
                        }
                        if attr_decl.attr_type == AttributeType::Id
                            && !self.ids_seen.insert(attr.value.clone())
                        {
                            let message =
                                format!("duplicate ID value '{}'", attr.value);
                            self.invalid(message);
                        }
                    }
                }
                None => match attr_decl.default {
                    AttributeDefault::Required if self.options.validating => {
                        let message = format!(
                            "required attribute '{}' of element '{}' is missing",
                            attr_decl.name, element_name
                        );
                        self.invalid(message);
                    }
                    AttributeDefault::Default | AttributeDefault::Fixed
                        if self.options.validating =>
                    {
                        if let Some(default_value) = &attr_decl.default_value {
                            attrs.push(RawAttr {
                                qname: attr_decl.name.clone(),
                                value: default_value.clone(),
                                is_id: attr_decl.attr_type == AttributeType::Id,
                                defaulted: true,
                            });
                        }
                    }
                    _ => {}
                },
            }
        }

        // Attributes not declared at all are a validity error.
        if self.options.validating {
            let undeclared: Vec<String> = attrs
                .iter()
                .filter(|a| !a.defaulted)
                .filter(|a| {
                    let (p, local) = split_name(&a.qname);
                    // Namespace declarations need no ATTLIST entry.
                    if p == Some("xmlns") || (p.is_none() && local == "xmlns") {
                        return false;
                    }
                    attr_decls.iter().all(|d| d.name != a.qname)
                })
                .map(|a| a.qname.clone())
                .collect();
            for qname in undeclared {
                let message = format!(
                    "attribute '{qname}' of element '{element_name}' is not declared"
                );
                self.invalid(message);
            }
        }
    }

    fn validate_element_start(&mut self, name: &str) {
        let mut messages: Vec<String> = Vec::new();

        match self.validators.last_mut() {
            Some((parent_name, validator)) => {
                if !validator.allow(name) {
                    messages.push(format!(
                        "element '{name}' not allowed in content of element '{parent_name}'"
                    ));
                }
            }
            None => {
                if let Some(root) = &self.doctype_root {
                    if root != name {
                        messages.push(format!(
                            "document element '{name}' does not match DOCTYPE '{root}'"
                        ));
                    }
                }
            }
        }

        let undeclared = self.dtd.element(name).map_or(true, |d| !d.declared);
        if self.doctype_root.is_some() && undeclared {
            messages.push(format!("element '{name}' is not declared"));
        }
        for message in messages {
            self.invalid(message);
        }

        let validator = Validator::new(self.dtd.element(name).and_then(|d| d.content.as_ref()));
        self.validators.push((name.to_string(), validator));
    }

    /// Checks the reserved-name constraints on a namespace declaration.
    fn check_namespace_decl(
        &self,
        cur: &Cursor<'_>,
        declared_prefix: &str,
        uri: &str,
    ) -> Result<()> {
        let location = cur.location();
        if declared_prefix.is_empty() {
            if uri == XML_NAMESPACE {
                return Err(Error::namespace(
                    "the xml namespace must not be the default namespace",
                    location,
                ));
            }
            if uri == XMLNS_NAMESPACE {
                return Err(Error::namespace(
                    "the xmlns namespace must not be the default namespace",
                    location,
                ));
            }
            return Ok(());
        }

        if uri.is_empty() && self.version == XmlVersion::V1_0 {
            // XML 1.1 permits undeclaring prefixes; 1.0 does not.
            return Err(Error::namespace(
                format!("namespace prefix '{declared_prefix}' cannot be undeclared in XML 1.0"),
                location,
            ));
        }
        if declared_prefix == "xmlns" {
            return Err(Error::namespace(
                "the 'xmlns' prefix must not be declared",
                location,
            ));
        }
        if declared_prefix == "xml" && uri != XML_NAMESPACE {
            return Err(Error::namespace(
                "the 'xml' prefix must be bound to the XML namespace",
                location,
            ));
        }
        if declared_prefix != "xml" && uri == XML_NAMESPACE {
            return Err(Error::namespace(
                "only the 'xml' prefix may be bound to the XML namespace",
                location,
            ));
        }
        if uri == XMLNS_NAMESPACE {
            return Err(Error::namespace(
                "the xmlns namespace must not be bound to any prefix",
                location,
            ));
        }
        Ok(())
    }

    // --- Content ---
    // See XML 1.0 §3.1 [43] content

    fn parse_content(&mut self, cur: &mut Cursor<'_>, end: ContentEnd) -> Result<()> {
        let mut text = String::new();
        loop {
            if cur.at_end() {
                self.flush_character_data(&mut text);
                match end {
                    ContentEnd::Eof => return Ok(()),
                    ContentEnd::EndTag => {
                        return Err(cur.fatal("unexpected end of input in element content"))
                    }
                }
            }
            if cur.looking_at(b"</") {
                self.flush_character_data(&mut text);
                match end {
                    ContentEnd::EndTag => return Ok(()),
                    ContentEnd::Eof => {
                        return Err(
                            cur.fatal("entity replacement text is not well-balanced")
                        )
                    }
                }
            }

            if cur.looking_at(b"<![CDATA[") {
                self.flush_character_data(&mut text);
                self.parse_cdata_section(cur)?;
            } else if cur.looking_at(b"<!--") {
                self.flush_character_data(&mut text);
                let comment = self.parse_comment_text(cur)?;
                self.handler.comment(&comment);
            } else if cur.looking_at(b"<?") {
                self.flush_character_data(&mut text);
                let (target, data) = self.parse_pi_text(cur)?;
                self.handler.processing_instruction(&target, &data);
            } else if cur.peek() == Some(b'<') {
                self.flush_character_data(&mut text);
                self.parse_element(cur)?;
            } else if cur.peek() == Some(b'&') {
                self.parse_content_reference(cur, &mut text)?;
            } else {
                if cur.looking_at(b"]]>") {
                    return Err(cur.fatal("']]>' not allowed in character data"));
                }
                text.push(cur.next_char()?);
            }
        }
    }

    /// Emits accumulated character data, applying whitespace policy and
    /// content-model checks.
    fn flush_character_data(&mut self, text: &mut String) {
        if text.is_empty() {
            return;
        }
        let blank = text
            .chars()
            .all(|c| matches!(c, ' ' | '\t' | '\r' | '\n'));

        if self.options.validating && !blank {
            let message = match self.validators.last() {
                Some((elem_name, validator)) if !validator.allow_char_data() => Some(format!(
                    "character data not allowed in content of element '{elem_name}'"
                )),
                _ => None,
            };
            if let Some(message) = message {
                self.invalid(message);
            }
        }

        if !(blank && !self.options.preserve_whitespace) {
            self.handler.character_data(text);
        }
        text.clear();
    }

    fn parse_cdata_section(&mut self, cur: &mut Cursor<'_>) -> Result<()> {
        cur.expect_str(b"<![CDATA[")?;
        let mut content = String::new();
        loop {
            if cur.at_end() {
                return Err(cur.fatal("unterminated CDATA section"));
            }
            if cur.looking_at(b"]]>") {
                cur.advance(3);
                break;
            }
            content.push(cur.next_char()?);
        }

        if self.options.validating {
            let message = match self.validators.last() {
                Some((elem_name, validator)) if !validator.allow_char_data() => Some(format!(
                    "character data not allowed in content of element '{elem_name}'"
                )),
                _ => None,
            };
            if let Some(message) = message {
                self.invalid(message);
            }
        }

        self.handler.start_cdata_section();
        self.handler.character_data(&content);
        self.handler.end_cdata_section();
        Ok(())
    }

    fn parse_comment_text(&mut self, cur: &mut Cursor<'_>) -> Result<String> {
        cur.expect_str(b"<!--")?;
        let mut content = String::new();
        loop {
            if cur.at_end() {
                return Err(cur.fatal("unterminated comment"));
            }
            if cur.looking_at(b"-->") {
                cur.advance(3);
                break;
            }
            if cur.looking_at(b"--") {
                return Err(cur.fatal("'--' not allowed inside comments"));
            }
            content.push(cur.next_char()?);
        }
        Ok(content)
    }

    fn parse_pi_text(&mut self, cur: &mut Cursor<'_>) -> Result<(String, String)> {
        cur.expect_str(b"<?")?;
        let target = cur.parse_name()?;
        if target.eq_ignore_ascii_case("xml") {
            return Err(cur.fatal("PI target 'xml' is reserved"));
        }
        if target.contains(':') {
            return Err(Error::namespace(
                "PI target must not contain a colon",
                cur.location(),
            ));
        }

        let mut data = String::new();
        if cur.skip_whitespace() {
            loop {
                if cur.at_end() {
                    return Err(cur.fatal("unterminated processing instruction"));
                }
                if cur.looking_at(b"?>") {
                    cur.advance(2);
                    break;
                }
                data.push(cur.next_char()?);
            }
        } else {
            cur.expect_str(b"?>")?;
        }
        Ok((target, data))
    }

    // --- References ---
    // See XML 1.0 §4.1

    fn parse_char_reference(&mut self, cur: &mut Cursor<'_>) -> Result<char> {
        cur.expect_str(b"&#")?;
        let value = if cur.peek() == Some(b'x') {
            cur.advance(1);
            let digits = cur.take_while(|b| b.is_ascii_hexdigit());
            if digits.is_empty() {
                return Err(cur.fatal("empty hexadecimal character reference"));
            }
            u32::from_str_radix(&digits, 16)
                .map_err(|_| cur.fatal("invalid hexadecimal character reference"))?
        } else {
            let digits = cur.take_while(|b| b.is_ascii_digit());
            if digits.is_empty() {
                return Err(cur.fatal("empty decimal character reference"));
            }
            digits
                .parse::<u32>()
                .map_err(|_| cur.fatal("invalid decimal character reference"))?
        };
        cur.expect_byte(b';')?;

        let c = char::from_u32(value)
            .ok_or_else(|| cur.fatal(format!("invalid character reference: &#{value};")))?;
        if !self.version.is_valid_char_ref(c) {
            return Err(cur.fatal(format!(
                "character reference &#x{value:X}; is not a valid XML {} character",
                self.version
            )));
        }
        Ok(c)
    }

    /// A `&...;` reference inside element content.
    fn parse_content_reference(
        &mut self,
        cur: &mut Cursor<'_>,
        text: &mut String,
    ) -> Result<()> {
        if cur.peek_at(1) == Some(b'#') {
            text.push(self.parse_char_reference(cur)?);
            return Ok(());
        }
        cur.advance(1);
        let name = cur.parse_name()?;
        cur.expect_byte(b';')?;

        if let Some(c) = builtin_entity(&name) {
            text.push(c);
            return Ok(());
        }

        self.check_expansion_budget(cur)?;

        let Some(decl) = self.dtd.entity(&name).cloned() else {
            return self.undeclared_entity(cur, &name);
        };
        if !decl.parsed {
            return Err(cur.fatal(format!(
                "reference to unparsed entity '&{name};' in content"
            )));
        }

        // Flush pending text so event order matches input order.
        self.flush_character_data(text);

        // VC: Standalone Document Declaration — entities declared in the
        // external subset are off-limits to standalone documents.
        if self.options.validating && self.standalone && decl.externally_defined {
            self.invalid(format!(
                "standalone document references externally declared entity '{}'",
                decl.name
            ));
        }

        if !self.active_entities.insert(name.clone()) {
            return Err(cur.fatal(format!("recursive entity reference '&{name};'")));
        }
        let result = if decl.external {
            self.expand_external_entity(&decl)
        } else {
            self.parse_entity_body(&decl.replacement)
        };
        self.active_entities.remove(&name);
        result
    }

    fn expand_external_entity(&mut self, decl: &EntityDecl) -> Result<()> {
        let loaded =
            self.load_external_entity(decl.public_id.as_deref(), decl.system_id.as_deref())?;
        match loaded {
            Some(content) => {
                let body = strip_text_decl(&content).to_string();
                self.parse_entity_body(&body)
            }
            None => {
                if self.options.validating {
                    self.invalid(format!("cannot resolve external entity '{}'", decl.name));
                }
                Ok(())
            }
        }
    }

    /// Parses entity replacement text as element content in the current
    /// handler and validation context.
    fn parse_entity_body(&mut self, replacement: &str) -> Result<()> {
        let mut sub = Cursor::new(replacement);
        sub.set_version(self.version);
        self.parse_content(&mut sub, ContentEnd::Eof)
    }

    fn undeclared_entity(&mut self, cur: &Cursor<'_>, name: &str) -> Result<()> {
        // XML 1.0 §4.1 WFC: Entity Declared. When an external subset or
        // parameter entities exist and the document is not standalone, the
        // entity could be declared out of reach; that demotes the failure
        // to a validity error.
        let may_be_external =
            (self.has_external_subset || self.has_pe_references) && !self.standalone;
        if may_be_external {
            if self.options.validating {
                self.invalid(format!("undeclared entity '&{name};'"));
            }
            Ok(())
        } else {
            Err(cur.fatal(format!("undeclared entity '&{name};'")))
        }
    }

    fn check_expansion_budget(&mut self, cur: &Cursor<'_>) -> Result<()> {
        self.entity_expansions += 1;
        if self.entity_expansions > self.options.max_entity_expansions {
            return Err(cur.fatal(format!(
                "entity expansion limit exceeded ({})",
                self.options.max_entity_expansions
            )));
        }
        Ok(())
    }

    // --- Attribute values ---
    // See XML 1.0 §3.3.3

    fn parse_attribute_value(&mut self, cur: &mut Cursor<'_>) -> Result<String> {
        let quote = cur.next_byte()?;
        if quote != b'"' && quote != b'\'' {
            return Err(cur.fatal("attribute value must be quoted"));
        }

        let mut value = String::new();
        loop {
            if cur.at_end() {
                return Err(cur.fatal("unexpected end of input in attribute value"));
            }
            if cur.peek() == Some(quote) {
                cur.advance(1);
                break;
            }
            match cur.peek() {
                Some(b'<') => {
                    return Err(cur.fatal("'<' not allowed in attribute values"));
                }
                Some(b'&') => {
                    self.parse_attr_reference(cur, &mut value)?;
                }
                _ => {
                    let c = cur.next_char()?;
                    // Whitespace normalization (XML 1.0 §3.3.3): literal
                    // tab/newline become spaces; referenced ones do not.
                    value.push(if matches!(c, '\t' | '\n') { ' ' } else { c });
                }
            }
        }
        Ok(value)
    }

    fn parse_attr_reference(&mut self, cur: &mut Cursor<'_>, value: &mut String) -> Result<()> {
        if cur.peek_at(1) == Some(b'#') {
            value.push(self.parse_char_reference(cur)?);
            return Ok(());
        }
        cur.advance(1);
        let name = cur.parse_name()?;
        cur.expect_byte(b';')?;

        if let Some(c) = builtin_entity(&name) {
            value.push(c);
            return Ok(());
        }

        self.check_expansion_budget(cur)?;
        let expansion = self.expand_entity_in_attribute(cur, &name)?;
        value.push_str(&expansion);
        Ok(())
    }

    /// Expands a general entity inside an attribute value to plain text.
    fn expand_entity_in_attribute(&mut self, cur: &Cursor<'_>, name: &str) -> Result<String> {
        let Some(decl) = self.dtd.entity(name).cloned() else {
            self.undeclared_entity(cur, name)?;
            return Ok(String::new());
        };
        if decl.external {
            // WFC: No External Entity References (XML 1.0 §3.1).
            return Err(cur.fatal(format!(
                "external entity '&{name};' not allowed in attribute values"
            )));
        }
        if !decl.parsed {
            return Err(cur.fatal(format!(
                "unparsed entity '&{name};' not allowed in attribute values"
            )));
        }

        if !self.active_entities.insert(name.to_string()) {
            return Err(cur.fatal(format!("recursive entity reference '&{name};'")));
        }
        let result = self.expand_attr_replacement(cur, &decl.replacement);
        self.active_entities.remove(name);
        result
    }

    /// Expands the replacement text of an internal entity in attribute
    /// context: nested references resolve recursively, and a literal `<`
    /// is a well-formedness error.
    fn expand_attr_replacement(&mut self, cur: &Cursor<'_>, replacement: &str) -> Result<String> {
        let mut out = String::new();
        let mut sub = Cursor::new(replacement);
        sub.set_version(self.version);
        loop {
            if sub.at_end() {
                break;
            }
            match sub.peek() {
                Some(b'<') => {
                    return Err(cur.fatal(
                        "'<' in entity replacement text is not allowed in attribute values",
                    ));
                }
                Some(b'&') => {
                    if sub.peek_at(1) == Some(b'#') {
                        out.push(self.parse_char_reference(&mut sub)?);
                    } else {
                        sub.advance(1);
                        let name = sub.parse_name()?;
                        sub.expect_byte(b';')?;
                        if let Some(c) = builtin_entity(&name) {
                            out.push(c);
                        } else {
                            self.check_expansion_budget(cur)?;
                            let nested = self.expand_entity_in_attribute(cur, &name)?;
                            out.push_str(&nested);
                        }
                    }
                }
                _ => {
                    let c = sub.next_char()?;
                    out.push(if matches!(c, '\t' | '\n') { ' ' } else { c });
                }
            }
        }
        Ok(out)
    }

    // --- External entity loading ---

    /// Resolves an external entity to its decoded text: the SAX handler
    /// first, then the configured loader, then the base-directory file
    /// fallback.
    fn load_external_entity(
        &mut self,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Result<Option<String>> {
        let base = self
            .options
            .base_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        let mut stream = self
            .handler
            .external_entity_ref(&base, public_id, system_id);

        if stream.is_none() {
            if let Some(loader) = &self.options.entity_loader {
                stream = loader(&base, public_id, system_id);
            }
        }

        if stream.is_none() {
            if let Some(sysid) = system_id {
                let path = match &self.options.base_dir {
                    Some(dir) => dir.join(sysid),
                    None => std::path::PathBuf::from(sysid),
                };
                if let Ok(file) = std::fs::File::open(path) {
                    stream = Some(Box::new(file));
                }
            }
        }

        let Some(mut reader) = stream else {
            return Ok(None);
        };
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let (text, _) = crate::encoding::decode_to_utf8(&bytes)?;
        Ok(Some(text))
    }
}

/// Returns the replacement character for the five built-in entities.
fn builtin_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        _ => None,
    }
}

/// Whether the cursor sits on an XML declaration (`<?xml` + whitespace).
fn looking_at_xml_decl(cur: &Cursor<'_>) -> bool {
    cur.looking_at(b"<?xml ")
        || cur.looking_at(b"<?xml\t")
        || cur.looking_at(b"<?xml\r")
        || cur.looking_at(b"<?xml\n")
}

/// Validates an encoding name per XML 1.0 §4.3.3:
/// `EncName ::= [A-Za-z] ([A-Za-z0-9._] | '-')*`
fn is_valid_encoding_name(s: &str) -> bool {
    let bytes = s.as_bytes();
    match bytes.first() {
        Some(b) if b.is_ascii_alphabetic() => bytes[1..]
            .iter()
            .all(|&b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-')),
        _ => false,
    }
}

/// Strips a leading text declaration (`<?xml ...?>`) from external entity
/// or external subset content (XML 1.0 §4.3.1).
fn strip_text_decl(text: &str) -> &str {
    let rest = text.strip_prefix('\u{FEFF}').unwrap_or(text);
    if rest.starts_with("<?xml")
        && rest[5..]
            .chars()
            .next()
            .is_some_and(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
    {
        if let Some(end) = rest.find("?>") {
            return &rest[end + 2..];
        }
    }
    rest
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tree::Document;
    use pretty_assertions::assert_eq;

    fn parse(input: &str) -> Document {
        Document::parse_str(input).unwrap_or_else(|e| panic!("parse failed: {e}"))
    }

    fn parse_validating(input: &str) -> crate::error::Result<Document> {
        Document::parse_str_with(input, &ParseOptions::default().validating(true))
    }

    #[test]
    fn test_parse_empty_element() {
        let doc = parse("<root/>");
        let root = doc.root_element().unwrap();
        assert_eq!(doc.node_name(root), Some("root"));
        assert_eq!(doc.first_child(root), None);
    }

    #[test]
    fn test_parse_element_with_text() {
        let doc = parse("<greeting>Hello, world!</greeting>");
        let root = doc.root_element().unwrap();
        assert_eq!(doc.text_content(root), "Hello, world!");
    }

    #[test]
    fn test_parse_nested_elements() {
        let doc = parse("<a><b><c/></b></a>");
        let a = doc.root_element().unwrap();
        let b = doc.first_child(a).unwrap();
        let c = doc.first_child(b).unwrap();
        assert_eq!(doc.node_name(b), Some("b"));
        assert_eq!(doc.node_name(c), Some("c"));
    }

    #[test]
    fn test_parse_attributes() {
        let doc = parse("<div id=\"main\" class='big'/>");
        let root = doc.root_element().unwrap();
        assert_eq!(doc.attribute(root, "id"), Some("main"));
        assert_eq!(doc.attribute(root, "class"), Some("big"));
    }

    #[test]
    fn test_attribute_whitespace_normalization() {
        let doc = parse("<r attr=\"a\tb\nc\"/>");
        let root = doc.root_element().unwrap();
        assert_eq!(doc.attribute(root, "attr"), Some("a b c"));
    }

    #[test]
    fn test_parse_xml_declaration() {
        let doc = parse("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?><r/>");
        assert_eq!(doc.version, XmlVersion::V1_0);
        assert!(doc.standalone);
    }

    #[test]
    fn test_parse_xml_1_1_declaration() {
        let doc = parse("<?xml version=\"1.1\"?><r>&#x1;</r>");
        assert_eq!(doc.version, XmlVersion::V1_1);
        let root = doc.root_element().unwrap();
        assert_eq!(doc.text_content(root), "\u{1}");
    }

    #[test]
    fn test_control_char_ref_rejected_in_1_0() {
        assert!(Document::parse_str("<r>&#x1;</r>").is_err());
    }

    #[test]
    fn test_xml_decl_must_be_first() {
        assert!(Document::parse_str(" <?xml version=\"1.0\"?><r/>").is_err());
    }

    #[test]
    fn test_parse_comment_and_pi() {
        let doc = parse("<?my-pi some data?><root><!-- hello --></root>");
        let pi = doc.first_child(doc.root()).unwrap();
        assert_eq!(doc.node_name(pi), Some("my-pi"));
        assert_eq!(doc.node_text(pi), Some("some data"));

        let root = doc.root_element().unwrap();
        let comment = doc.first_child(root).unwrap();
        assert_eq!(doc.node_text(comment), Some(" hello "));
    }

    #[test]
    fn test_double_hyphen_in_comment_rejected() {
        assert!(Document::parse_str("<r><!-- a -- b --></r>").is_err());
    }

    #[test]
    fn test_builtin_entities() {
        let doc = parse("<r>&amp; &lt; &gt; &apos; &quot;</r>");
        let root = doc.root_element().unwrap();
        assert_eq!(doc.text_content(root), "& < > ' \"");
    }

    #[test]
    fn test_char_references() {
        let doc = parse("<r>&#65;&#x42;</r>");
        let root = doc.root_element().unwrap();
        assert_eq!(doc.text_content(root), "AB");
    }

    #[test]
    fn test_cdata_not_preserved_by_default() {
        let doc = parse("<r><![CDATA[x < 1]]></r>");
        let root = doc.root_element().unwrap();
        let child = doc.first_child(root).unwrap();
        assert!(matches!(
            doc.node(child).kind,
            crate::tree::NodeKind::Text { .. }
        ));
        assert_eq!(doc.text_content(root), "x < 1");
    }

    #[test]
    fn test_cdata_preserved_when_requested() {
        let doc = Document::parse_str_with(
            "<r><![CDATA[x < 1]]></r>",
            &ParseOptions::default().preserve_cdata(true),
        )
        .unwrap();
        let root = doc.root_element().unwrap();
        let child = doc.first_child(root).unwrap();
        assert!(matches!(
            doc.node(child).kind,
            crate::tree::NodeKind::CData { .. }
        ));
    }

    #[test]
    fn test_cdata_merges_with_text_by_default() {
        let doc = parse("<r>a<![CDATA[b]]>c</r>");
        let root = doc.root_element().unwrap();
        assert_eq!(doc.children(root).count(), 1);
        assert_eq!(doc.text_content(root), "abc");
    }

    #[test]
    fn test_cdata_end_marker_in_char_data_rejected() {
        assert!(Document::parse_str("<r>a]]>b</r>").is_err());
    }

    #[test]
    fn test_mismatched_tags_rejected() {
        assert!(Document::parse_str("<a></b>").is_err());
    }

    #[test]
    fn test_unexpected_eof_rejected() {
        assert!(Document::parse_str("<a>").is_err());
        assert!(Document::parse_str("<a").is_err());
    }

    #[test]
    fn test_missing_root_rejected() {
        assert!(Document::parse_str("").is_err());
        assert!(Document::parse_str("<!-- only a comment -->").is_err());
    }

    #[test]
    fn test_content_after_root_rejected() {
        assert!(Document::parse_str("<a/><b/>").is_err());
        assert!(Document::parse_str("<a/>text").is_err());
    }

    #[test]
    fn test_duplicate_attribute_rejected() {
        assert!(Document::parse_str("<a x=\"1\" x=\"2\"/>").is_err());
    }

    #[test]
    fn test_duplicate_attribute_after_ns_expansion_rejected() {
        let input = r#"<a xmlns:p="urn:x" xmlns:q="urn:x" p:id="1" q:id="2"/>"#;
        assert!(Document::parse_str(input).is_err());
    }

    #[test]
    fn test_whitespace_between_elements_dropped_by_default() {
        let doc = parse("<t>  <x>1</x>  <x>2</x></t>");
        let t = doc.root_element().unwrap();
        assert_eq!(doc.children(t).count(), 2);
    }

    #[test]
    fn test_whitespace_preserved_on_request() {
        let doc = Document::parse_str_with(
            "<t>  <x>1</x></t>",
            &ParseOptions::default().preserve_whitespace(true),
        )
        .unwrap();
        let t = doc.root_element().unwrap();
        assert_eq!(doc.children(t).count(), 2);
        assert_eq!(doc.text_content(t), "  1");
    }

    #[test]
    fn test_mixed_content_keeps_significant_whitespace() {
        let doc = parse("<p>hello <b>world</b>!</p>");
        let p = doc.root_element().unwrap();
        let children: Vec<_> = doc.children(p).collect();
        assert_eq!(children.len(), 3);
        assert_eq!(doc.node_text(children[0]), Some("hello "));
        assert_eq!(doc.node_text(children[2]), Some("!"));
    }

    // --- Namespaces ---

    #[test]
    fn test_default_namespace() {
        let doc = parse("<root xmlns=\"http://example.com\"><child/></root>");
        let root = doc.root_element().unwrap();
        assert_eq!(doc.node_namespace(root), Some("http://example.com"));
        let child = doc.first_child(root).unwrap();
        assert_eq!(doc.node_namespace(child), Some("http://example.com"));
    }

    #[test]
    fn test_prefixed_namespace() {
        let doc = parse("<z:root xmlns:z=\"urn:z\"/>");
        let root = doc.root_element().unwrap();
        assert_eq!(doc.node_name(root), Some("root"));
        assert_eq!(doc.node_prefix(root), Some("z"));
        assert_eq!(doc.node_namespace(root), Some("urn:z"));
    }

    #[test]
    fn test_namespace_override() {
        let doc = parse(
            "<root xmlns=\"urn:outer\"><child xmlns=\"urn:inner\"/></root>",
        );
        let root = doc.root_element().unwrap();
        let child = doc.first_child(root).unwrap();
        assert_eq!(doc.node_namespace(root), Some("urn:outer"));
        assert_eq!(doc.node_namespace(child), Some("urn:inner"));
    }

    #[test]
    fn test_attribute_namespace_resolution() {
        let doc = parse("<r xmlns:app=\"urn:app\" app:version=\"2\"/>");
        let root = doc.root_element().unwrap();
        let attr = doc
            .attributes(root)
            .iter()
            .find(|a| a.name == "version")
            .unwrap();
        assert_eq!(attr.namespace.as_deref(), Some("urn:app"));
        assert_eq!(attr.prefix.as_deref(), Some("app"));
    }

    #[test]
    fn test_xml_prefix_prebound() {
        let doc = parse("<r xml:lang=\"en\"/>");
        let root = doc.root_element().unwrap();
        let attr = &doc.attributes(root)[0];
        assert_eq!(attr.prefix.as_deref(), Some("xml"));
        assert_eq!(attr.namespace.as_deref(), Some(XML_NAMESPACE));
    }

    #[test]
    fn test_unbound_prefix_rejected() {
        assert!(Document::parse_str("<x:foo/>").is_err());
        let strict = ParseOptions::default().validating_ns(true);
        assert!(Document::parse_str_with("<x:foo/>", &strict).is_err());
    }

    #[test]
    fn test_reserved_prefix_constraints() {
        assert!(Document::parse_str("<r xmlns:xml=\"urn:wrong\"/>").is_err());
        assert!(Document::parse_str(
            "<r xmlns:xml=\"http://www.w3.org/XML/1998/namespace\"/>"
        )
        .is_ok());
        assert!(Document::parse_str("<r xmlns:xmlns=\"urn:x\"/>").is_err());
        assert!(Document::parse_str(
            "<r xmlns:p=\"http://www.w3.org/XML/1998/namespace\"/>"
        )
        .is_err());
        assert!(Document::parse_str("<r xmlns:p=\"\"/>").is_err());
    }

    #[test]
    fn test_xmlns_prefix_element_rejected() {
        assert!(Document::parse_str("<xmlns:r/>").is_err());
    }

    // --- DTD & entities ---

    #[test]
    fn test_internal_entity_expansion() {
        let doc = parse(
            "<!DOCTYPE r [<!ENTITY who \"world\">]><r>hello &who;</r>",
        );
        let root = doc.root_element().unwrap();
        assert_eq!(doc.text_content(root), "hello world");
    }

    #[test]
    fn test_entity_with_markup_builds_elements() {
        let doc = parse(
            "<!DOCTYPE r [<!ENTITY e \"<b>bold</b>\">]><r>&e;</r>",
        );
        let root = doc.root_element().unwrap();
        let b = doc.first_child(root).unwrap();
        assert_eq!(doc.node_name(b), Some("b"));
        assert_eq!(doc.text_content(b), "bold");
    }

    #[test]
    fn test_nested_entity_expansion() {
        let doc = parse(
            "<!DOCTYPE r [<!ENTITY a \"A&b;\"><!ENTITY b \"B\">]><r>&a;</r>",
        );
        let root = doc.root_element().unwrap();
        assert_eq!(doc.text_content(root), "AB");
    }

    #[test]
    fn test_recursive_entity_rejected() {
        let input = "<!DOCTYPE r [<!ENTITY a \"&b;\"><!ENTITY b \"&a;\">]><r>&a;</r>";
        assert!(Document::parse_str(input).is_err());
    }

    #[test]
    fn test_undeclared_entity_rejected() {
        assert!(Document::parse_str("<r>&nope;</r>").is_err());
    }

    #[test]
    fn test_entity_in_attribute_value() {
        let doc = parse(
            "<!DOCTYPE r [<!ENTITY v \"1.0\">]><r version=\"&v;\"/>",
        );
        let root = doc.root_element().unwrap();
        assert_eq!(doc.attribute(root, "version"), Some("1.0"));
    }

    #[test]
    fn test_entity_with_lt_rejected_in_attribute() {
        let input = "<!DOCTYPE r [<!ENTITY e \"&#60;\">]><r a=\"&e;\"/>";
        assert!(Document::parse_str(input).is_err());
    }

    #[test]
    fn test_unbalanced_entity_content_rejected() {
        let input = "<!DOCTYPE r [<!ENTITY e \"<b>\">]><r>&e;</r>";
        assert!(Document::parse_str(input).is_err());
    }

    #[test]
    fn test_entity_value_char_refs_expanded_at_declaration() {
        let doc = parse(
            "<!DOCTYPE r [<!ENTITY e \"&#65;\">]><r>&e;</r>",
        );
        let root = doc.root_element().unwrap();
        assert_eq!(doc.text_content(root), "A");
    }

    #[test]
    fn test_parameter_entity_declares_markup() {
        let input = "<!DOCTYPE r [\
            <!ENTITY % decls \"<!ENTITY who 'world'>\">\
            %decls;\
        ]><r>&who;</r>";
        let doc = parse(input);
        let root = doc.root_element().unwrap();
        assert_eq!(doc.text_content(root), "world");
    }

    #[test]
    fn test_doctype_with_ids() {
        let doc = parse(
            "<!DOCTYPE r SYSTEM \"r.dtd\"><r/>",
        );
        assert!(doc.root_element().is_some());
    }

    // --- Validation ---

    #[test]
    fn test_validating_sequence_accepts() {
        let input = "<!DOCTYPE r [<!ELEMENT r (a,b)> <!ELEMENT a EMPTY> <!ELEMENT b EMPTY>]>\
                     <r><a/><b/></r>";
        assert!(parse_validating(input).is_ok());
    }

    #[test]
    fn test_validating_sequence_rejects_wrong_order() {
        let input = "<!DOCTYPE r [<!ELEMENT r (a,b)> <!ELEMENT a EMPTY> <!ELEMENT b EMPTY>]>\
                     <r><b/><a/></r>";
        let err = parse_validating(input).unwrap_err();
        match err {
            Error::Invalid { messages } => {
                assert!(
                    messages.iter().any(|m| m.contains("element 'r'")),
                    "messages should mention element 'r': {messages:?}"
                );
            }
            other => panic!("expected Invalid, got {other}"),
        }
    }

    #[test]
    fn test_validating_incomplete_content() {
        let input = "<!DOCTYPE r [<!ELEMENT r (a,b)> <!ELEMENT a EMPTY> <!ELEMENT b EMPTY>]>\
                     <r><a/></r>";
        let err = parse_validating(input).unwrap_err();
        assert!(matches!(err, Error::Invalid { .. }));
    }

    #[test]
    fn test_validating_text_in_element_content() {
        let input = "<!DOCTYPE r [<!ELEMENT r (a)> <!ELEMENT a EMPTY>]><r>text<a/></r>";
        let err = parse_validating(input).unwrap_err();
        assert!(matches!(err, Error::Invalid { .. }));
    }

    #[test]
    fn test_validating_empty_element_rejects_content() {
        let input = "<!DOCTYPE r [<!ELEMENT r EMPTY>]><r>oops</r>";
        let err = parse_validating(input).unwrap_err();
        assert!(matches!(err, Error::Invalid { .. }));
    }

    #[test]
    fn test_validating_mixed_content() {
        let input = "<!DOCTYPE r [<!ELEMENT r (#PCDATA|b)*> <!ELEMENT b (#PCDATA)>]>\
                     <r>some <b>mixed</b> text</r>";
        assert!(parse_validating(input).is_ok());
    }

    #[test]
    fn test_validating_required_attribute() {
        let input = "<!DOCTYPE r [<!ELEMENT r EMPTY><!ATTLIST r id CDATA #REQUIRED>]><r/>";
        let err = parse_validating(input).unwrap_err();
        match err {
            Error::Invalid { messages } => {
                assert!(messages.iter().any(|m| m.contains("required")));
            }
            other => panic!("expected Invalid, got {other}"),
        }
    }

    #[test]
    fn test_validating_defaults_materialized() {
        let input =
            "<!DOCTYPE r [<!ELEMENT r EMPTY><!ATTLIST r mode CDATA \"fast\">]><r/>";
        let doc = parse_validating(input).unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.attribute(root, "mode"), Some("fast"));
    }

    #[test]
    fn test_validating_fixed_mismatch() {
        let input = "<!DOCTYPE r [<!ELEMENT r EMPTY>\
                     <!ATTLIST r v CDATA #FIXED \"1\">]><r v=\"2\"/>";
        let err = parse_validating(input).unwrap_err();
        assert!(matches!(err, Error::Invalid { .. }));
    }

    #[test]
    fn test_validating_enumeration() {
        let ok = "<!DOCTYPE r [<!ELEMENT r EMPTY>\
                  <!ATTLIST r dir (ltr|rtl) #IMPLIED>]><r dir=\"ltr\"/>";
        assert!(parse_validating(ok).is_ok());

        let bad = "<!DOCTYPE r [<!ELEMENT r EMPTY>\
                   <!ATTLIST r dir (ltr|rtl) #IMPLIED>]><r dir=\"up\"/>";
        assert!(parse_validating(bad).is_err());
    }

    #[test]
    fn test_validating_id_attributes_registered() {
        let input = "<!DOCTYPE r [<!ELEMENT r (item*)> <!ELEMENT item EMPTY>\
                     <!ATTLIST item id ID #REQUIRED>]>\
                     <r><item id=\"a\"/><item id=\"b\"/></r>";
        let doc = parse_validating(input).unwrap();
        let a = doc.element_by_id("a").unwrap();
        assert_eq!(doc.node_name(a), Some("item"));
        assert!(doc.element_by_id("c").is_none());
    }

    #[test]
    fn test_validating_duplicate_id() {
        let input = "<!DOCTYPE r [<!ELEMENT r (item*)> <!ELEMENT item EMPTY>\
                     <!ATTLIST item id ID #REQUIRED>]>\
                     <r><item id=\"a\"/><item id=\"a\"/></r>";
        let err = parse_validating(input).unwrap_err();
        match err {
            Error::Invalid { messages } => {
                assert!(messages.iter().any(|m| m.contains("duplicate ID")));
            }
            other => panic!("expected Invalid, got {other}"),
        }
    }

    #[test]
    fn test_validating_undeclared_element() {
        let input = "<!DOCTYPE r [<!ELEMENT r ANY>]><r><mystery/></r>";
        let err = parse_validating(input).unwrap_err();
        match err {
            Error::Invalid { messages } => {
                assert!(messages.iter().any(|m| m.contains("not declared")));
            }
            other => panic!("expected Invalid, got {other}"),
        }
    }

    #[test]
    fn test_validating_root_name_mismatch() {
        let input = "<!DOCTYPE other [<!ELEMENT other EMPTY>]><r/>";
        let err = parse_validating(input).unwrap_err();
        assert!(matches!(err, Error::Invalid { .. }));
    }

    #[test]
    fn test_not_validating_ignores_content_models() {
        let input = "<!DOCTYPE r [<!ELEMENT r (a,b)> <!ELEMENT a EMPTY> <!ELEMENT b EMPTY>]>\
                     <r><b/><a/></r>";
        assert!(Document::parse_str(input).is_ok());
    }

    #[test]
    fn test_notation_recorded() {
        let input = "<!DOCTYPE r [<!NOTATION gif SYSTEM \"image/gif\"><!ELEMENT r EMPTY>]><r/>";
        let doc = parse(input);
        assert_eq!(doc.notations.len(), 1);
        assert_eq!(doc.notations[0].name, "gif");
        assert_eq!(doc.notations[0].system_id.as_deref(), Some("image/gif"));
    }

    #[test]
    fn test_doctype_recorded() {
        let doc = parse(
            "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0//EN\" \
             \"http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd\"><html/>",
        );
        let dt = doc.doctype.as_ref().unwrap();
        assert_eq!(dt.root, "html");
        assert_eq!(dt.public_id.as_deref(), Some("-//W3C//DTD XHTML 1.0//EN"));
        assert!(dt.system_id.as_deref().unwrap().contains("xhtml1-strict"));
    }

    #[test]
    fn test_nesting_depth_limit() {
        let options = ParseOptions::default().max_depth(4);
        let deep = "<a><a><a><a><a/></a></a></a></a>";
        assert!(Document::parse_str_with(deep, &options).is_err());
        let shallow = "<a><a><a/></a></a>";
        assert!(Document::parse_str_with(shallow, &options).is_ok());
    }

    #[test]
    fn test_entity_expansion_limit() {
        let options = ParseOptions::default().max_entity_expansions(3);
        let input = "<!DOCTYPE r [<!ENTITY e \"x\">]><r>&e;&e;&e;&e;</r>";
        assert!(Document::parse_str_with(input, &options).is_err());
    }

    #[test]
    fn test_external_entity_via_loader() {
        let options = ParseOptions::default().entity_loader(|_base, _pubid, sysid| {
            if sysid == Some("chapter.xml") {
                Some(Box::new(std::io::Cursor::new(b"<p>loaded</p>".to_vec()))
                    as Box<dyn Read>)
            } else {
                None
            }
        });
        let input = "<!DOCTYPE r [<!ENTITY chap SYSTEM \"chapter.xml\">]><r>&chap;</r>";
        let doc = Document::parse_str_with(input, &options).unwrap();
        let root = doc.root_element().unwrap();
        let p = doc.first_child(root).unwrap();
        assert_eq!(doc.node_name(p), Some("p"));
        assert_eq!(doc.text_content(p), "loaded");
    }

    #[test]
    fn test_external_subset_loaded_when_validating() {
        let options = ParseOptions::default()
            .validating(true)
            .entity_loader(|_base, _pubid, sysid| {
                if sysid == Some("r.dtd") {
                    Some(Box::new(std::io::Cursor::new(
                        b"<!ELEMENT r EMPTY>".to_vec(),
                    )) as Box<dyn Read>)
                } else {
                    None
                }
            });
        let ok = Document::parse_str_with("<!DOCTYPE r SYSTEM \"r.dtd\"><r/>", &options);
        assert!(ok.is_ok(), "{ok:?}");

        let bad = Document::parse_str_with(
            "<!DOCTYPE r SYSTEM \"r.dtd\"><r>content</r>",
            &options,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_external_text_decl_stripped() {
        assert_eq!(strip_text_decl("<?xml version=\"1.0\"?><p/>"), "<p/>");
        assert_eq!(strip_text_decl("<p/>"), "<p/>");
        assert_eq!(strip_text_decl("<?xml-stylesheet x?>"), "<?xml-stylesheet x?>");
    }

    #[test]
    fn test_invalid_version_rejected() {
        assert!(Document::parse_str("<?xml version=\"2.0\"?><r/>").is_err());
    }

    #[test]
    fn test_pi_target_xml_reserved() {
        assert!(Document::parse_str("<r><?xml bad?></r>").is_err());
        assert!(Document::parse_str("<r><?ns:pi bad?></r>").is_err());
    }
}
