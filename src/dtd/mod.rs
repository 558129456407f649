//! DTD data model: element, attribute, entity, and notation declarations.
//!
//! The [`Dtd`] is built per parse (there is no process-wide DOCTYPE state)
//! and consulted by the parser for entity expansion, attribute defaulting,
//! and — in validating mode — content-model and attribute-type checks.
//!
//! Content-model matching lives in [`content`]; this module holds the
//! declaration tables and the attribute value transforms.

pub mod content;

pub use content::{ContentKind, ContentSpec, ContentState, Repeat, Validator};

use std::collections::HashMap;

use crate::util::{is_name_char, is_name_start_char, trim};

/// A parsed DTD: every declaration from the internal and (when loaded)
/// external subsets.
#[derive(Debug, Default)]
pub struct Dtd {
    /// Element declarations, keyed by element name.
    pub elements: HashMap<String, ElementDecl>,
    /// General entity declarations, keyed by entity name.
    pub entities: HashMap<String, EntityDecl>,
    /// Parameter entity declarations, keyed by name (without `%`/`;`).
    pub parameter_entities: HashMap<String, EntityDecl>,
    /// Notation declarations, keyed by notation name.
    pub notations: HashMap<String, NotationDecl>,
}

impl Dtd {
    /// Returns the declaration for an element, if any.
    #[must_use]
    pub fn element(&self, name: &str) -> Option<&ElementDecl> {
        self.elements.get(name)
    }

    /// Returns the element declaration, creating an undeclared placeholder
    /// when absent. An `<!ATTLIST>` may precede its `<!ELEMENT>`.
    pub fn element_mut(&mut self, name: &str, external: bool) -> &mut ElementDecl {
        self.elements
            .entry(name.to_string())
            .or_insert_with(|| ElementDecl {
                name: name.to_string(),
                content: None,
                attributes: Vec::new(),
                declared: false,
                external,
            })
    }

    /// Returns a general entity declaration, if any.
    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&EntityDecl> {
        self.entities.get(name)
    }

    /// Returns a parameter entity declaration, if any.
    #[must_use]
    pub fn parameter_entity(&self, name: &str) -> Option<&EntityDecl> {
        self.parameter_entities.get(name)
    }

    /// Records a general entity. The first declaration wins (XML 1.0 §4.2).
    pub fn add_entity(&mut self, decl: EntityDecl) {
        self.entities.entry(decl.name.clone()).or_insert(decl);
    }

    /// Records a parameter entity. The first declaration wins.
    pub fn add_parameter_entity(&mut self, decl: EntityDecl) {
        self.parameter_entities
            .entry(decl.name.clone())
            .or_insert(decl);
    }

    /// Returns `true` if `name` names a declared unparsed (NDATA) entity.
    #[must_use]
    pub fn is_unparsed_entity(&self, name: &str) -> bool {
        self.entities.get(name).is_some_and(|e| !e.parsed)
    }
}

/// An element declaration plus its accumulated attribute list.
#[derive(Debug)]
pub struct ElementDecl {
    /// The element name.
    pub name: String,
    /// The declared content model; `None` while only an ATTLIST was seen.
    pub content: Option<ContentSpec>,
    /// Attribute declarations, in declaration order. The first declaration
    /// of a name wins (XML 1.0 §3.3).
    pub attributes: Vec<AttributeDecl>,
    /// Whether an `<!ELEMENT>` declaration was actually seen.
    pub declared: bool,
    /// Whether the declaration came from the external subset.
    pub external: bool,
}

impl ElementDecl {
    /// Returns the declaration for an attribute of this element.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeDecl> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Adds an attribute declaration unless the name is already declared.
    pub fn add_attribute(&mut self, decl: AttributeDecl) {
        if self.attribute(&decl.name).is_none() {
            self.attributes.push(decl);
        }
    }
}

/// The declared type of an attribute (XML 1.0 §3.3.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeType {
    /// Character data; no transform, no constraint.
    CData,
    /// A unique identifier; must be a Name.
    Id,
    /// A reference to an ID; must be a Name.
    IdRef,
    /// Whitespace-separated list of ID references.
    IdRefs,
    /// The name of an unparsed entity.
    Entity,
    /// Whitespace-separated list of unparsed entity names.
    Entities,
    /// A name token.
    NmToken,
    /// Whitespace-separated list of name tokens.
    NmTokens,
    /// One of the declared notation names.
    Notation,
    /// One of an enumerated list of name tokens.
    Enumerated,
}

/// The default behavior of an attribute (XML 1.0 §3.3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributeDefault {
    /// No default specification.
    #[default]
    None,
    /// `#REQUIRED` — the attribute must be present.
    Required,
    /// `#IMPLIED` — optional, no default.
    Implied,
    /// `#FIXED "value"` — present values must equal the default.
    Fixed,
    /// `"value"` — materialized when absent.
    Default,
}

/// An attribute declaration from an `<!ATTLIST>`.
#[derive(Debug, Clone)]
pub struct AttributeDecl {
    /// The attribute name (qualified as written).
    pub name: String,
    /// The declared type.
    pub attr_type: AttributeType,
    /// The default behavior.
    pub default: AttributeDefault,
    /// The default value, for `Fixed` and `Default`.
    pub default_value: Option<String>,
    /// Allowed values for `Notation` and `Enumerated` types.
    pub enumeration: Vec<String>,
    /// Whether the declaration came from the external subset.
    pub external: bool,
}

impl AttributeDecl {
    /// Validates `value` against the declared type, normalizing it in
    /// place where the type calls for it (trim, single-space separators).
    ///
    /// Returns `false` when the value violates the type or a `Fixed`
    /// default.
    #[must_use]
    pub fn validate_value(&self, value: &mut String, dtd: &Dtd) -> bool {
        let mut ok = match self.attr_type {
            AttributeType::CData => true,
            AttributeType::Id | AttributeType::IdRef => is_name(value),
            AttributeType::IdRefs => is_names(value),
            AttributeType::Entity => is_name(value) && dtd.is_unparsed_entity(value),
            AttributeType::Entities => {
                is_names(value) && value.split(' ').all(|t| dtd.is_unparsed_entity(t))
            }
            AttributeType::NmToken => is_nmtoken(value),
            AttributeType::NmTokens => is_nmtokens(value),
            AttributeType::Notation | AttributeType::Enumerated => {
                trim(value);
                self.enumeration.iter().any(|e| e == value)
            }
        };

        if ok && self.default == AttributeDefault::Fixed {
            ok = self.default_value.as_deref() == Some(value.as_str());
        }

        ok
    }
}

/// A general or parameter entity declaration.
#[derive(Debug, Clone)]
pub struct EntityDecl {
    /// The entity name (without `&`/`%` and `;`).
    pub name: String,
    /// The replacement text. Empty for unparsed and unresolved external
    /// entities.
    pub replacement: String,
    /// `true` for parameter entities (`<!ENTITY % name ...>`).
    pub parameter: bool,
    /// `false` for unparsed (NDATA) entities.
    pub parsed: bool,
    /// `true` when declared with a SYSTEM/PUBLIC identifier.
    pub external: bool,
    /// Set when the declaration came from the external subset; such
    /// entities are suspect in standalone documents.
    pub externally_defined: bool,
    /// The notation name from an `NDATA` clause.
    pub ndata: Option<String>,
    /// The SYSTEM identifier for external entities.
    pub system_id: Option<String>,
    /// The PUBLIC identifier for external entities.
    pub public_id: Option<String>,
}

impl EntityDecl {
    /// Creates an internal parsed entity.
    #[must_use]
    pub fn internal(name: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            replacement: replacement.into(),
            parameter: false,
            parsed: true,
            external: false,
            externally_defined: false,
            ndata: None,
            system_id: None,
            public_id: None,
        }
    }

    /// Creates an external entity (parsed unless an NDATA clause follows).
    #[must_use]
    pub fn external(
        name: impl Into<String>,
        system_id: Option<String>,
        public_id: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            replacement: String::new(),
            parameter: false,
            parsed: true,
            external: true,
            externally_defined: false,
            ndata: None,
            system_id,
            public_id,
        }
    }
}

/// A notation declaration from `<!NOTATION name ...>`.
#[derive(Debug, Clone)]
pub struct NotationDecl {
    /// The notation name.
    pub name: String,
    /// The SYSTEM identifier, if any.
    pub system_id: Option<String>,
    /// The PUBLIC identifier, if any.
    pub public_id: Option<String>,
}

// --- Attribute value transforms (XML 1.0 §3.3.1) ---

/// Trims, then checks that the value is a single Name.
fn is_name(s: &mut String) -> bool {
    trim(s);
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if is_name_start_char(c) => chars.all(is_name_char),
        _ => false,
    }
}

/// Trims and normalizes separators to single spaces, then checks that the
/// value is a whitespace-separated list of Names.
fn is_names(s: &mut String) -> bool {
    normalize_tokens(s, |token| {
        let mut chars = token.chars();
        match chars.next() {
            Some(c) if is_name_start_char(c) => chars.all(is_name_char),
            _ => false,
        }
    })
}

/// Trims, then checks that every character is a name character.
fn is_nmtoken(s: &mut String) -> bool {
    trim(s);
    !s.is_empty() && s.chars().all(is_name_char)
}

/// Trims and normalizes separators, then checks each token is an Nmtoken.
fn is_nmtokens(s: &mut String) -> bool {
    normalize_tokens(s, |token| {
        !token.is_empty() && token.chars().all(is_name_char)
    })
}

/// Shared list normalization: trims the value, splits on runs of
/// whitespace, validates each token, and rejoins with single spaces.
fn normalize_tokens(s: &mut String, valid: impl Fn(&str) -> bool) -> bool {
    trim(s);
    if s.is_empty() {
        return false;
    }
    let tokens: Vec<&str> = s.split_ascii_whitespace().collect();
    if !tokens.iter().all(|t| valid(t)) {
        return false;
    }
    *s = tokens.join(" ");
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(attr_type: AttributeType) -> AttributeDecl {
        AttributeDecl {
            name: "x".to_string(),
            attr_type,
            default: AttributeDefault::None,
            default_value: None,
            enumeration: Vec::new(),
            external: false,
        }
    }

    #[test]
    fn test_cdata_passthrough() {
        let d = decl(AttributeType::CData);
        let mut v = "  anything at all  ".to_string();
        assert!(d.validate_value(&mut v, &Dtd::default()));
        assert_eq!(v, "  anything at all  ");
    }

    #[test]
    fn test_id_requires_name() {
        let d = decl(AttributeType::Id);
        let mut v = "  n1  ".to_string();
        assert!(d.validate_value(&mut v, &Dtd::default()));
        assert_eq!(v, "n1");

        let mut v = "1bad".to_string();
        assert!(!d.validate_value(&mut v, &Dtd::default()));
        let mut v = "two names".to_string();
        assert!(!d.validate_value(&mut v, &Dtd::default()));
    }

    #[test]
    fn test_idrefs_normalizes_whitespace() {
        let d = decl(AttributeType::IdRefs);
        let mut v = " a \t b\n  c ".to_string();
        assert!(d.validate_value(&mut v, &Dtd::default()));
        assert_eq!(v, "a b c");
    }

    #[test]
    fn test_nmtoken() {
        let d = decl(AttributeType::NmToken);
        let mut v = "1-2.3".to_string();
        assert!(d.validate_value(&mut v, &Dtd::default()));
        let mut v = "has space".to_string();
        assert!(!d.validate_value(&mut v, &Dtd::default()));
    }

    #[test]
    fn test_entity_requires_unparsed() {
        let mut dtd = Dtd::default();
        let mut parsed = EntityDecl::internal("chap", "chapter one");
        parsed.parsed = true;
        dtd.add_entity(parsed);

        let mut unparsed = EntityDecl::external("pic", Some("pic.gif".to_string()), None);
        unparsed.parsed = false;
        unparsed.ndata = Some("gif".to_string());
        dtd.add_entity(unparsed);

        let d = decl(AttributeType::Entity);
        let mut v = "pic".to_string();
        assert!(d.validate_value(&mut v, &dtd));
        let mut v = "chap".to_string();
        assert!(!d.validate_value(&mut v, &dtd));
        let mut v = "missing".to_string();
        assert!(!d.validate_value(&mut v, &dtd));
    }

    #[test]
    fn test_enumerated_membership() {
        let mut d = decl(AttributeType::Enumerated);
        d.enumeration = vec!["yes".to_string(), "no".to_string()];
        let mut v = " yes ".to_string();
        assert!(d.validate_value(&mut v, &Dtd::default()));
        assert_eq!(v, "yes");
        let mut v = "maybe".to_string();
        assert!(!d.validate_value(&mut v, &Dtd::default()));
    }

    #[test]
    fn test_fixed_mismatch() {
        let mut d = decl(AttributeType::CData);
        d.default = AttributeDefault::Fixed;
        d.default_value = Some("1.0".to_string());
        let mut v = "1.0".to_string();
        assert!(d.validate_value(&mut v, &Dtd::default()));
        let mut v = "2.0".to_string();
        assert!(!d.validate_value(&mut v, &Dtd::default()));
    }

    #[test]
    fn test_first_entity_declaration_wins() {
        let mut dtd = Dtd::default();
        dtd.add_entity(EntityDecl::internal("e", "first"));
        dtd.add_entity(EntityDecl::internal("e", "second"));
        assert_eq!(dtd.entity("e").map(|e| e.replacement.as_str()), Some("first"));
    }

    #[test]
    fn test_attlist_first_declaration_wins() {
        let mut dtd = Dtd::default();
        let elem = dtd.element_mut("r", false);
        elem.add_attribute(decl(AttributeType::CData));
        let mut second = decl(AttributeType::Id);
        second.name = "x".to_string();
        elem.add_attribute(second);
        assert_eq!(elem.attributes.len(), 1);
        assert_eq!(elem.attributes[0].attr_type, AttributeType::CData);
    }
}
