//! Parse → serialize → parse round trips and structural equality.

#![allow(clippy::unwrap_used)]

use ferroxml::{Document, FormatInfo, ParseOptions};

fn roundtrip(input: &str) -> (Document, Document) {
    let first = Document::parse_str(input).unwrap();
    let output = first.to_xml().unwrap();
    let second = Document::parse_str(&output)
        .unwrap_or_else(|e| panic!("reparse of {output:?} failed: {e}"));
    (first, second)
}

#[test]
fn roundtrip_preserves_structure() {
    let inputs = [
        "<r/>",
        "<r><a/><b/><c/></r>",
        "<r a=\"1\" b=\"two\"><nested deep=\"yes\">text</nested></r>",
        "<r>mixed <b>bold</b> tail</r>",
        "<r><!-- note --><?pi data?><x/></r>",
        "<r>&amp;&lt;&gt;</r>",
        r#"<z:r xmlns:z="urn:z"><z:c z:k="v"/></z:r>"#,
    ];
    for input in inputs {
        let (first, second) = roundtrip(input);
        assert!(
            first.equals(&second),
            "roundtrip changed structure for {input:?}"
        );
    }
}

#[test]
fn whitespace_collapses_by_default() {
    let doc = Document::parse_str("<t>  <x>1</x>  <x>2</x></t>").unwrap();
    assert_eq!(doc.to_xml().unwrap(), "<t><x>1</x><x>2</x></t>");
}

#[test]
fn whitespace_survives_when_preserved() {
    let doc = Document::parse_str_with(
        "<t>  <x>1</x>  <x>2</x></t>",
        &ParseOptions::default().preserve_whitespace(true),
    )
    .unwrap();
    assert_eq!(doc.to_xml().unwrap(), "<t>  <x>1</x>  <x>2</x></t>");
}

#[test]
fn equality_ignores_interelement_whitespace() {
    let pretty = Document::parse_str_with(
        "<r>\n  <a>1</a>\n  <b/>\n</r>",
        &ParseOptions::default().preserve_whitespace(true),
    )
    .unwrap();
    let compact = Document::parse_str("<r><a>1</a><b/></r>").unwrap();
    assert!(pretty.equals(&compact));
    assert!(compact.equals(&pretty));
}

#[test]
fn equality_sees_prefixes_through_uris() {
    // Documents differing only in prefix spelling (same URIs) are equal.
    let a = Document::parse_str(r#"<r xmlns:p="urn:n"><p:x p:a="1"/></r>"#).unwrap();
    let b = Document::parse_str(r#"<r xmlns:q="urn:n"><q:x q:a="1"/></r>"#).unwrap();
    assert!(a.equals(&b));

    // A different URI is a different document.
    let c = Document::parse_str(r#"<r xmlns:p="urn:other"><p:x p:a="1"/></r>"#).unwrap();
    assert!(!a.equals(&c));
}

#[test]
fn text_content_concatenates_in_document_order() {
    let doc = Document::parse_str("<p>one<b>two<i>three</i></b>four</p>").unwrap();
    let p = doc.root_element().unwrap();
    assert_eq!(doc.text_content(p), "onetwothreefour");
}

#[test]
fn cdata_text_equivalence_in_string_value() {
    let plain = Document::parse_str("<r>x &lt; 1</r>").unwrap();
    let cdata = Document::parse_str_with(
        "<r><![CDATA[x < 1]]></r>",
        &ParseOptions::default().preserve_cdata(true),
    )
    .unwrap();
    assert_eq!(
        plain.text_content(plain.root_element().unwrap()),
        cdata.text_content(cdata.root_element().unwrap()),
    );
}

#[test]
fn serialized_output_reparses_after_mutation() {
    let mut doc = Document::parse_str("<inventory><item>widget</item></inventory>").unwrap();
    let root = doc.root_element().unwrap();
    let item = doc.first_child(root).unwrap();
    doc.set_attribute(item, "count", "3");
    doc.add_text(item, "s");

    let output = doc.to_xml().unwrap();
    assert_eq!(
        output,
        "<inventory><item count=\"3\">widgets</item></inventory>"
    );
    let reparsed = Document::parse_str(&output).unwrap();
    assert!(doc.equals(&reparsed));
}

#[test]
fn indented_output_equals_original_modulo_whitespace() {
    let doc = Document::parse_str("<a><b><c>x</c></b><d/></a>").unwrap();
    let mut buf = Vec::new();
    doc.write(&mut buf, &FormatInfo::indented(4)).unwrap();
    let pretty = String::from_utf8(buf).unwrap();
    assert!(pretty.contains("\n    <b>"));

    let reparsed = Document::parse_str(&pretty).unwrap();
    assert!(doc.equals(&reparsed));
}

#[test]
fn prolog_roundtrip() {
    let input = "<?xml version=\"1.0\" standalone=\"yes\"?>\n<r/>";
    let doc = Document::parse_str(input).unwrap();
    assert_eq!(doc.to_xml().unwrap(), input);
}

#[test]
fn grafted_subtree_roundtrips_with_fixed_namespaces() {
    let source = Document::parse_str(
        r#"<lib xmlns:m="urn:meta"><m:entry m:id="7">body</m:entry></lib>"#,
    )
    .unwrap();
    let entry = source
        .first_child(source.root_element().unwrap())
        .unwrap();

    let mut dest = Document::parse_str("<doc/>").unwrap();
    let doc_root = dest.root_element().unwrap();
    dest.graft(doc_root, &source, entry).unwrap();

    let output = dest.to_xml().unwrap();
    let reparsed = Document::parse_str(&output)
        .unwrap_or_else(|e| panic!("grafted output {output:?} not parseable: {e}"));
    assert!(dest.equals(&reparsed));

    // The copied element still resolves its prefix.
    let copied = reparsed
        .first_child(reparsed.root_element().unwrap())
        .unwrap();
    assert_eq!(reparsed.node_namespace(copied), Some("urn:meta"));
}
