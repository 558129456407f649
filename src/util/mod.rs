//! Character classification and small text utilities.
//!
//! Implements the character classes from XML 1.0 (Fifth Edition) §2.2/§2.3
//! and XML 1.1 §2.2, plus the UTF-8 helpers used by the tokenizer and the
//! attribute-value normalizers.

/// Returns `true` if `c` is a valid `NameStartChar` per XML 1.0 §2.3 `[4]`.
pub fn is_name_start_char(c: char) -> bool {
    matches!(c,
        ':' | 'A'..='Z' | '_' | 'a'..='z' |
        '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{2FF}' |
        '\u{370}'..='\u{37D}' | '\u{37F}'..='\u{1FFF}' |
        '\u{200C}'..='\u{200D}' | '\u{2070}'..='\u{218F}' |
        '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}' |
        '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}' |
        '\u{10000}'..='\u{EFFFF}'
    )
}

/// Returns `true` if `c` is a valid `NameChar` per XML 1.0 §2.3 [4a].
pub fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}' |
            '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}'
        )
}

/// Returns `true` if `c` is a valid `Char` per XML 1.0 (Fifth Edition) §2.2 `[2]`.
///
/// `Char ::= #x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]`
pub fn is_valid_xml_1_0_char(c: char) -> bool {
    matches!(c as u32,
        0x09 | 0x0A | 0x0D | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x0001_0000..=0x0010_FFFF
    )
}

/// Returns `true` if `c` may appear *literally* in an XML 1.1 document.
///
/// XML 1.1 restricts the C0 and C1 control ranges to character references;
/// this is the set of characters allowed directly in content. See XML 1.1
/// §2.2 `[2]` together with the restricted-character rules.
pub fn is_valid_xml_1_1_char(c: char) -> bool {
    matches!(c as u32,
        0x09 | 0x0A | 0x0D | 0x20..=0x7E | 0x85 |
        0xA0..=0xD7FF | 0xE000..=0xFFFD | 0x0001_0000..=0x0010_FFFF
    )
}

/// Returns `true` if `c` may be produced by a character reference in an
/// XML 1.1 document. The restricted controls are legal here.
pub fn is_valid_xml_1_1_char_ref(c: char) -> bool {
    matches!(c as u32,
        0x01..=0xD7FF | 0xE000..=0xFFFD | 0x0001_0000..=0x0010_FFFF
    )
}

/// Returns `true` if `c` is a valid `PubidChar` per XML 1.0 §2.3 `[13]`.
pub fn is_valid_public_id_char(c: char) -> bool {
    matches!(c,
        ' ' | '\r' | '\n' |
        'a'..='z' | 'A'..='Z' | '0'..='9' |
        '-' | '\'' | '(' | ')' | '+' | ',' | '.' | '/' | ':' |
        '=' | '?' | ';' | '!' | '*' | '#' | '@' | '$' | '_' | '%'
    )
}

/// Returns `true` if `c` may appear in a `SystemLiteral`.
///
/// System identifiers are URI references; controls, whitespace, quotes,
/// angle brackets, and fragment markers are excluded.
pub fn is_valid_system_literal_char(c: char) -> bool {
    (c as u32) > 0x1F && !matches!(c, ' ' | '<' | '>' | '"' | '#')
}

/// Appends the Unicode scalar value `cp` to `s` as UTF-8.
///
/// Returns `false` (leaving `s` untouched) if `cp` is a surrogate or lies
/// outside the Unicode range.
pub fn append_utf8(s: &mut String, cp: u32) -> bool {
    match char::from_u32(cp) {
        Some(c) => {
            s.push(c);
            true
        }
        None => false,
    }
}

/// Decodes the UTF-8 sequence starting at `*pos` in `bytes`, advancing the
/// cursor past it.
///
/// Returns `None` (without advancing) when the cursor is at the end or the
/// byte sequence is not valid UTF-8.
pub fn pop_front_utf8(bytes: &[u8], pos: &mut usize) -> Option<char> {
    let rest = bytes.get(*pos..)?;
    if rest.is_empty() {
        return None;
    }
    let len = utf8_len(rest[0])?;
    let seq = rest.get(..len)?;
    let c = std::str::from_utf8(seq).ok()?.chars().next()?;
    *pos += len;
    Some(c)
}

/// Expected length of a UTF-8 sequence given its lead byte.
fn utf8_len(lead: u8) -> Option<usize> {
    match lead {
        0x00..=0x7F => Some(1),
        0xC2..=0xDF => Some(2),
        0xE0..=0xEF => Some(3),
        0xF0..=0xF4 => Some(4),
        _ => None,
    }
}

/// Trims ASCII whitespace from both ends of `s`, in place.
pub fn trim(s: &mut String) {
    let end = s.trim_end_matches([' ', '\t', '\r', '\n']).len();
    s.truncate(end);
    let start = s.len() - s.trim_start_matches([' ', '\t', '\r', '\n']).len();
    if start > 0 {
        s.drain(..start);
    }
}

/// Splits a qualified name into optional prefix and local part.
///
/// `"foo:bar"` → `(Some("foo"), "bar")`; `"bar"` → `(None, "bar")`
pub fn split_name(name: &str) -> (Option<&str>, &str) {
    match name.find(':') {
        Some(pos) => (Some(&name[..pos]), &name[pos + 1..]),
        None => (None, name),
    }
}

/// Validates that a name is a legal `QName` per Namespaces in XML 1.0 §4.
///
/// A `QName` has at most one colon, and neither prefix nor local part may be
/// empty. Returns an error message if invalid, or `None` if valid.
pub fn validate_qname(name: &str) -> Option<&'static str> {
    let colon_count = name.chars().filter(|&c| c == ':').count();
    if colon_count > 1 {
        return Some("QName contains multiple colons");
    }
    if colon_count == 1 && (name.starts_with(':') || name.ends_with(':')) {
        return Some("QName has empty prefix or local part");
    }
    None
}
