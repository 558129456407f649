//! DTD validation tests: content models, attribute declarations, entities.

#![allow(clippy::unwrap_used)]

use ferroxml::{Document, Error, ParseOptions};

fn validating() -> ParseOptions {
    ParseOptions::default().validating(true)
}

fn assert_invalid_mentioning(input: &str, needle: &str) {
    let err = Document::parse_str_with(input, &validating()).unwrap_err();
    match err {
        Error::Invalid { messages } => {
            assert!(
                messages.iter().any(|m| m.contains(needle)),
                "expected a message containing {needle:?}, got {messages:?}"
            );
        }
        other => panic!("expected Invalid, got {other}"),
    }
}

#[test]
fn sequence_content_model_accepts_declared_order() {
    let input = "<!DOCTYPE r [<!ELEMENT r (a,b)> <!ELEMENT a EMPTY> <!ELEMENT b EMPTY>]>\
                 <r><a/><b/></r>";
    assert!(Document::parse_str_with(input, &validating()).is_ok());
}

#[test]
fn sequence_content_model_rejects_swapped_order() {
    let input = "<!DOCTYPE r [<!ELEMENT r (a,b)> <!ELEMENT a EMPTY> <!ELEMENT b EMPTY>]>\
                 <r><b/><a/></r>";
    assert_invalid_mentioning(input, "element 'r'");
}

#[test]
fn choice_and_repetition() {
    let dtd = "<!DOCTYPE r [<!ELEMENT r (a|b)+> <!ELEMENT a EMPTY> <!ELEMENT b EMPTY>]>";
    for body in ["<r><a/></r>", "<r><a/><a/></r>", "<r><b/><b/><b/></r>"] {
        let input = format!("{dtd}{body}");
        assert!(
            Document::parse_str_with(&input, &validating()).is_ok(),
            "body: {body}"
        );
    }
    // (a|b)+ locks to the branch that accepted first.
    let input = format!("{dtd}<r></r>");
    assert!(Document::parse_str_with(&input, &validating()).is_err());
}

#[test]
fn optional_particles() {
    let dtd = "<!DOCTYPE r [<!ELEMENT r (a, b?, c*)> <!ELEMENT a EMPTY>\
               <!ELEMENT b EMPTY> <!ELEMENT c EMPTY>]>";
    for body in [
        "<r><a/></r>",
        "<r><a/><b/></r>",
        "<r><a/><c/><c/></r>",
        "<r><a/><b/><c/></r>",
    ] {
        let input = format!("{dtd}{body}");
        assert!(
            Document::parse_str_with(&input, &validating()).is_ok(),
            "body: {body}"
        );
    }
    let input = format!("{dtd}<r><b/></r>");
    assert!(Document::parse_str_with(&input, &validating()).is_err());
}

#[test]
fn empty_content_model() {
    let dtd = "<!DOCTYPE r [<!ELEMENT r EMPTY>]>";
    assert!(Document::parse_str_with(&format!("{dtd}<r/>"), &validating()).is_ok());
    assert_invalid_mentioning(&format!("{dtd}<r>text</r>"), "element 'r'");
    let input = format!("{dtd}<r><r/></r>");
    assert!(Document::parse_str_with(&input, &validating()).is_err());
}

#[test]
fn mixed_content_allows_interleaved_text() {
    let input = "<!DOCTYPE p [<!ELEMENT p (#PCDATA|em)*> <!ELEMENT em (#PCDATA)>]>\
                 <p>one <em>two</em> three</p>";
    assert!(Document::parse_str_with(input, &validating()).is_ok());
}

#[test]
fn element_content_rejects_text() {
    let input = "<!DOCTYPE r [<!ELEMENT r (a)> <!ELEMENT a EMPTY>]><r>oops<a/></r>";
    assert_invalid_mentioning(input, "character data");
}

#[test]
fn whitespace_is_ignorable_in_element_content() {
    let input = "<!DOCTYPE r [<!ELEMENT r (a,b)> <!ELEMENT a EMPTY> <!ELEMENT b EMPTY>]>\
                 <r>\n  <a/>\n  <b/>\n</r>";
    assert!(Document::parse_str_with(input, &validating()).is_ok());
}

#[test]
fn required_and_defaulted_attributes() {
    let dtd = "<!DOCTYPE r [<!ELEMENT r EMPTY>\
               <!ATTLIST r id CDATA #REQUIRED mode CDATA \"auto\">]>";

    assert_invalid_mentioning(&format!("{dtd}<r/>"), "required");

    let doc = Document::parse_str_with(&format!("{dtd}<r id=\"x\"/>"), &validating()).unwrap();
    let root = doc.root_element().unwrap();
    assert_eq!(doc.attribute(root, "id"), Some("x"));
    // The declared default materializes.
    assert_eq!(doc.attribute(root, "mode"), Some("auto"));
}

#[test]
fn fixed_attribute_value_checked() {
    let dtd = "<!DOCTYPE r [<!ELEMENT r EMPTY>\
               <!ATTLIST r version CDATA #FIXED \"1.0\">]>";
    assert!(Document::parse_str_with(&format!("{dtd}<r version=\"1.0\"/>"), &validating()).is_ok());
    assert_invalid_mentioning(&format!("{dtd}<r version=\"2.0\"/>"), "version");
}

#[test]
fn id_and_idref_types() {
    let dtd = "<!DOCTYPE r [<!ELEMENT r (n*)> <!ELEMENT n EMPTY>\
               <!ATTLIST n id ID #IMPLIED ref IDREF #IMPLIED>]>";

    let doc = Document::parse_str_with(
        &format!("{dtd}<r><n id=\"a\"/><n ref=\"a\"/></r>"),
        &validating(),
    )
    .unwrap();
    assert!(doc.element_by_id("a").is_some());

    // An ID must be a Name: digits cannot start one.
    assert_invalid_mentioning(&format!("{dtd}<r><n id=\"1x\"/></r>"), "invalid value");
    // Duplicate IDs are invalid.
    assert_invalid_mentioning(
        &format!("{dtd}<r><n id=\"a\"/><n id=\"a\"/></r>"),
        "duplicate ID",
    );
}

#[test]
fn idrefs_value_is_normalized() {
    let dtd = "<!DOCTYPE r [<!ELEMENT r EMPTY>\
               <!ATTLIST r refs IDREFS #IMPLIED>]>";
    let doc = Document::parse_str_with(
        &format!("{dtd}<r refs=\"  a   b  \"/>"),
        &validating(),
    )
    .unwrap();
    let root = doc.root_element().unwrap();
    assert_eq!(doc.attribute(root, "refs"), Some("a b"));
}

#[test]
fn nmtoken_and_enumerated_types() {
    let dtd = "<!DOCTYPE r [<!ELEMENT r EMPTY>\
               <!ATTLIST r tok NMTOKEN #IMPLIED dir (ltr|rtl) #IMPLIED>]>";
    assert!(
        Document::parse_str_with(&format!("{dtd}<r tok=\"1-2\" dir=\"rtl\"/>"), &validating())
            .is_ok()
    );
    assert_invalid_mentioning(&format!("{dtd}<r tok=\"a b\"/>"), "tok");
    assert_invalid_mentioning(&format!("{dtd}<r dir=\"sideways\"/>"), "dir");
}

#[test]
fn entity_attribute_requires_unparsed_entity() {
    let dtd = "<!DOCTYPE r [<!ELEMENT r EMPTY>\
               <!NOTATION gif SYSTEM \"image/gif\">\
               <!ENTITY pic SYSTEM \"pic.gif\" NDATA gif>\
               <!ENTITY txt \"plain text\">\
               <!ATTLIST r img ENTITY #IMPLIED>]>";
    assert!(Document::parse_str_with(&format!("{dtd}<r img=\"pic\"/>"), &validating()).is_ok());
    assert_invalid_mentioning(&format!("{dtd}<r img=\"txt\"/>"), "img");
}

#[test]
fn unparsed_entity_requires_declared_notation() {
    let input = "<!DOCTYPE r [<!ELEMENT r EMPTY>\
                 <!ENTITY pic SYSTEM \"pic.xyz\" NDATA mystery>]><r/>";
    assert_invalid_mentioning(input, "mystery");
}

#[test]
fn undeclared_element_reported() {
    let input = "<!DOCTYPE r [<!ELEMENT r ANY>]><r><ghost/></r>";
    assert_invalid_mentioning(input, "ghost");
}

#[test]
fn root_must_match_doctype() {
    let input = "<!DOCTYPE expected [<!ELEMENT expected EMPTY>]><actual/>";
    assert_invalid_mentioning(input, "DOCTYPE");
}

#[test]
fn multiple_invalidations_collected() {
    let input = "<!DOCTYPE r [<!ELEMENT r (a)> <!ELEMENT a EMPTY>\
                 <!ATTLIST a id CDATA #REQUIRED>]>\
                 <r>text<a/><a/></r>";
    let err = Document::parse_str_with(input, &validating()).unwrap_err();
    match err {
        Error::Invalid { messages } => {
            // text in element content, missing required attr (twice), and
            // a second <a/> the content model does not allow.
            assert!(messages.len() >= 3, "messages: {messages:?}");
        }
        other => panic!("expected Invalid, got {other}"),
    }
}

#[test]
fn well_formedness_errors_take_priority() {
    // The document is both invalid and, later, not well-formed; the WF
    // error wins and surfaces alone.
    let input = "<!DOCTYPE r [<!ELEMENT r (a)> <!ELEMENT a EMPTY>]><r>text</oops>";
    let err = Document::parse_str_with(input, &validating()).unwrap_err();
    assert!(matches!(err, Error::NotWellFormed { .. }));
}

#[test]
fn non_validating_mode_ignores_content_models() {
    let input = "<!DOCTYPE r [<!ELEMENT r (a,b)> <!ELEMENT a EMPTY> <!ELEMENT b EMPTY>]>\
                 <r><b/><a/></r>";
    assert!(Document::parse_str(input).is_ok());
}

#[test]
fn parameter_entities_carry_declarations() {
    let input = "<!DOCTYPE r [\
                 <!ENTITY % common \"<!ELEMENT r (item*)> <!ELEMENT item (#PCDATA)>\">\
                 %common;\
                 ]><r><item>x</item></r>";
    assert!(Document::parse_str_with(input, &validating()).is_ok());
}

#[test]
fn standalone_external_entity_reference_invalid() {
    let options = validating().entity_loader(|_base, _pubid, sysid| {
        if sysid == Some("ents.dtd") {
            Some(Box::new(std::io::Cursor::new(
                b"<!ELEMENT r (#PCDATA)> <!ENTITY ext \"x\">".to_vec(),
            )) as Box<dyn std::io::Read>)
        } else {
            None
        }
    });
    let input = "<?xml version=\"1.0\" standalone=\"yes\"?>\
                 <!DOCTYPE r SYSTEM \"ents.dtd\"><r>&ext;</r>";
    let err = Document::parse_str_with(input, &options).unwrap_err();
    match err {
        Error::Invalid { messages } => {
            assert!(messages.iter().any(|m| m.contains("standalone")));
        }
        other => panic!("expected Invalid, got {other}"),
    }
}
