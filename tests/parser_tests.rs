//! Parser conformance tests: well-formedness, structure, and encodings.

#![allow(clippy::unwrap_used)]

use ferroxml::{Document, Error, NodeKind, ParseOptions, XmlVersion};

#[test]
fn parses_minimal_document() {
    let doc = Document::parse_str("<r/>").unwrap();
    let root = doc.root_element().unwrap();
    assert_eq!(doc.node_name(root), Some("r"));
}

#[test]
fn document_without_element_is_not_well_formed() {
    for input in ["", "   ", "<!-- nothing here -->", "<?pi only?>"] {
        let err = Document::parse_str(input).unwrap_err();
        assert!(matches!(err, Error::NotWellFormed { .. }), "input: {input:?}");
    }
}

#[test]
fn error_carries_line_and_column() {
    let err = Document::parse_str("<a>\n  <b>\n</a>").unwrap_err();
    match err {
        Error::NotWellFormed { location, .. } => {
            assert!(location.line >= 3, "location: {location}");
        }
        other => panic!("expected NotWellFormed, got {other}"),
    }
}

#[test]
fn mismatched_tags_and_stray_content() {
    assert!(Document::parse_str("<a><b></a></b>").is_err());
    assert!(Document::parse_str("<a/>trailing").is_err());
    assert!(Document::parse_str("<a/><b/>").is_err());
}

#[test]
fn cdata_end_marker_must_be_split() {
    // "]]>" is forbidden in character data...
    assert!(Document::parse_str("<r>a]]>b</r>").is_err());
    // ...but fine inside a CDATA section terminated correctly.
    let doc = Document::parse_str("<r><![CDATA[a]] >b]]></r>").unwrap();
    let root = doc.root_element().unwrap();
    assert_eq!(doc.text_content(root), "a]] >b");
}

#[test]
fn unterminated_constructs_rejected() {
    assert!(Document::parse_str("<r><!-- unterminated").is_err());
    assert!(Document::parse_str("<r><![CDATA[unterminated").is_err());
    assert!(Document::parse_str("<r><?pi unterminated").is_err());
}

#[test]
fn attribute_values_have_entities_resolved() {
    let doc = Document::parse_str(r#"<r a="x &amp; y &#38; z"/>"#).unwrap();
    let root = doc.root_element().unwrap();
    assert_eq!(doc.attribute(root, "a"), Some("x & y & z"));
}

#[test]
fn ampersand_never_literal_in_output() {
    let doc = Document::parse_str(r#"<r a="x &amp; y">a &amp; b</r>"#).unwrap();
    let output = doc.to_xml().unwrap();
    // Every & in the output starts a reference.
    for (i, _) in output.match_indices('&') {
        assert!(
            output[i..].starts_with("&amp;"),
            "bare ampersand in output: {output}"
        );
    }
}

#[test]
fn utf16_inputs_decode() {
    let text = "<?xml version=\"1.0\"?><greeting>héllo</greeting>";

    let mut le = vec![0xFF, 0xFE];
    for unit in text.encode_utf16() {
        le.extend_from_slice(&unit.to_le_bytes());
    }
    let doc = Document::parse_bytes(&le, &ParseOptions::default()).unwrap();
    let root = doc.root_element().unwrap();
    assert_eq!(doc.text_content(root), "héllo");

    let mut be = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        be.extend_from_slice(&unit.to_be_bytes());
    }
    let doc = Document::parse_bytes(&be, &ParseOptions::default()).unwrap();
    let root = doc.root_element().unwrap();
    assert_eq!(doc.text_content(root), "héllo");
}

#[test]
fn latin1_input_decodes() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>");
    bytes.extend_from_slice(b"<r>caf\xE9</r>");
    let doc = Document::parse_bytes(&bytes, &ParseOptions::default()).unwrap();
    let root = doc.root_element().unwrap();
    assert_eq!(doc.text_content(root), "café");
}

#[test]
fn reader_errors_propagate_as_io() {
    struct FailingReader;
    impl std::io::Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"))
        }
    }
    let err =
        Document::parse_reader(&mut FailingReader, &ParseOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn parse_reader_builds_document() {
    let mut input = std::io::Cursor::new(b"<r><x>1</x></r>".to_vec());
    let doc = Document::parse_reader(&mut input, &ParseOptions::default()).unwrap();
    let root = doc.root_element().unwrap();
    assert_eq!(doc.text_content(root), "1");
}

#[test]
fn xml_1_1_control_chars_as_references_only() {
    // Literal C0 control: rejected in both versions.
    assert!(Document::parse_str("<?xml version=\"1.1\"?><r>\u{1}</r>").is_err());
    // As a reference: rejected in 1.0, accepted in 1.1.
    assert!(Document::parse_str("<r>&#1;</r>").is_err());
    let doc = Document::parse_str("<?xml version=\"1.1\"?><r>&#1;</r>").unwrap();
    assert_eq!(doc.version, XmlVersion::V1_1);
    let root = doc.root_element().unwrap();
    assert_eq!(doc.text_content(root), "\u{1}");
}

#[test]
fn doctype_parsed_and_recorded() {
    let doc = Document::parse_str("<!DOCTYPE r SYSTEM \"r.dtd\"><r/>").unwrap();
    let dt = doc.doctype.as_ref().unwrap();
    assert_eq!(dt.root, "r");
    assert_eq!(dt.system_id.as_deref(), Some("r.dtd"));
    assert_eq!(dt.public_id, None);
}

#[test]
fn comments_and_pis_in_prolog_and_epilog() {
    let doc = Document::parse_str("<!--a--><?b c?><r/><!--d-->").unwrap();
    let kinds: Vec<&NodeKind> = doc
        .children(doc.root())
        .map(|id| &doc.node(id).kind)
        .collect();
    assert_eq!(kinds.len(), 4);
    assert!(matches!(kinds[0], NodeKind::Comment { .. }));
    assert!(matches!(kinds[1], NodeKind::ProcessingInstruction { .. }));
    assert!(matches!(kinds[2], NodeKind::Element { .. }));
    assert!(matches!(kinds[3], NodeKind::Comment { .. }));
}

#[test]
fn deep_nesting_within_limit() {
    let depth = 200;
    let mut input = String::new();
    for _ in 0..depth {
        input.push_str("<d>");
    }
    for _ in 0..depth {
        input.push_str("</d>");
    }
    assert!(Document::parse_str(&input).is_ok());
}

#[test]
fn namespace_errors_are_classified() {
    let err = Document::parse_str("<p:r/>").unwrap_err();
    assert!(matches!(err, Error::Namespace { .. }));

    let err = Document::parse_str(r#"<r xmlns:xml="urn:wrong"/>"#).unwrap_err();
    assert!(matches!(err, Error::Namespace { .. }));
}

#[test]
fn dom_invariants_after_parse() {
    let doc = Document::parse_str(
        "<library><shelf n=\"1\"><book>A</book><book>B</book></shelf><shelf n=\"2\"/></library>",
    )
    .unwrap();

    // Every node reaches the document node through its ancestors, and the
    // sibling links are mutually consistent.
    let root = doc.root();
    for node in doc.descendants(root) {
        assert_eq!(doc.ancestors(node).last(), Some(root));
        if let Some(next) = doc.next_sibling(node) {
            assert_eq!(doc.prev_sibling(next), Some(node));
        }
        if let Some(prev) = doc.prev_sibling(node) {
            assert_eq!(doc.next_sibling(prev), Some(node));
        }
        let parent = doc.parent(node).unwrap();
        assert!(doc.children(parent).any(|c| c == node));
    }
}
