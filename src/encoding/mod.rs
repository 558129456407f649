//! Encoding detection and transcoding.
//!
//! Implements BOM sniffing and XML declaration encoding detection per
//! XML 1.0 §4.3.3 and Appendix F, bridging to `encoding_rs` for the
//! character encodings the parser accepts: UTF-8, UTF-16LE, UTF-16BE,
//! US-ASCII, and ISO-8859-1.
//!
//! # Detection strategy
//!
//! 1. Check for a Byte Order Mark at the start of the input.
//! 2. If a BOM is found, use the indicated encoding and skip the BOM bytes.
//! 3. If no BOM is found, default to UTF-8.
//! 4. After initial decoding, inspect the XML declaration's `encoding=`
//!    attribute to confirm or override the detected encoding.

use crate::error::{Error, Result, SourceLocation};

/// A character encoding the parser can decode.
///
/// Output is always UTF-8 regardless of the input encoding; the detected
/// encoding is recorded on the document for inspection only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// UTF-8 (the default when no BOM or declaration says otherwise).
    #[default]
    Utf8,
    /// UTF-16, little endian.
    Utf16Le,
    /// UTF-16, big endian.
    Utf16Be,
    /// US-ASCII (decoded as UTF-8; a superset check applies).
    Ascii,
    /// ISO-8859-1 (Latin-1).
    Iso8859_1,
}

impl Encoding {
    /// Returns the IANA charset name for this encoding.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Utf16Le => "UTF-16LE",
            Self::Utf16Be => "UTF-16BE",
            Self::Ascii => "US-ASCII",
            Self::Iso8859_1 => "ISO-8859-1",
        }
    }

    /// Looks up an encoding by its declared name (case-insensitive).
    ///
    /// Returns `None` for encodings outside the supported set.
    #[must_use]
    pub fn for_label(label: &str) -> Option<Self> {
        match label.to_ascii_uppercase().as_str() {
            "UTF-8" | "UTF8" => Some(Self::Utf8),
            "UTF-16LE" => Some(Self::Utf16Le),
            "UTF-16BE" => Some(Self::Utf16Be),
            "UTF-16" => Some(Self::Utf16Le),
            "US-ASCII" | "ASCII" => Some(Self::Ascii),
            "ISO-8859-1" | "LATIN1" | "LATIN-1" | "ISO8859-1" => Some(Self::Iso8859_1),
            _ => None,
        }
    }
}

/// Detects the encoding of an XML byte stream by inspecting the Byte Order
/// Mark.
///
/// Returns the detected encoding and the number of BOM bytes to skip.
/// Per XML 1.0 Appendix F:
/// - `EF BB BF` → UTF-8
/// - `FE FF`    → UTF-16 BE
/// - `FF FE`    → UTF-16 LE
/// - no BOM     → UTF-8
#[must_use]
pub fn detect_encoding(bytes: &[u8]) -> (Encoding, usize) {
    if bytes.len() >= 3 && bytes[0] == 0xEF && bytes[1] == 0xBB && bytes[2] == 0xBF {
        (Encoding::Utf8, 3)
    } else if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        (Encoding::Utf16Be, 2)
    } else if bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] == 0xFE {
        (Encoding::Utf16Le, 2)
    } else {
        (Encoding::Utf8, 0)
    }
}

/// Transcodes a byte slice from the given encoding into a UTF-8 `String`.
///
/// # Errors
///
/// Returns `NotWellFormed` if the input contains byte sequences that are
/// malformed for the encoding (including non-ASCII bytes under `Ascii`).
pub fn transcode(bytes: &[u8], encoding: Encoding) -> Result<String> {
    match encoding {
        Encoding::Utf8 => match std::str::from_utf8(bytes) {
            Ok(s) => Ok(s.to_string()),
            Err(_) => Err(malformed(encoding)),
        },
        Encoding::Ascii => {
            if bytes.is_ascii() {
                // ASCII is a UTF-8 subset; no conversion needed.
                Ok(String::from_utf8_lossy(bytes).into_owned())
            } else {
                Err(malformed(encoding))
            }
        }
        Encoding::Utf16Le | Encoding::Utf16Be | Encoding::Iso8859_1 => {
            let enc = encoding_rs::Encoding::for_label(encoding.name().as_bytes())
                .unwrap_or(encoding_rs::UTF_8);
            let (result, _, had_errors) = enc.decode(bytes);
            if had_errors {
                return Err(malformed(encoding));
            }
            Ok(result.into_owned())
        }
    }
}

fn malformed(encoding: Encoding) -> Error {
    Error::not_well_formed(
        format!("malformed byte sequence for encoding {}", encoding.name()),
        SourceLocation::default(),
    )
}

/// Decodes raw XML bytes into UTF-8, automatically detecting the encoding.
///
/// Returns the decoded text together with the encoding that was ultimately
/// used. The pipeline follows XML 1.0 §4.3.3: BOM first, then the XML
/// declaration's `encoding=` attribute.
///
/// # Errors
///
/// Returns `NotWellFormed` if the bytes are malformed for the detected
/// encoding or declare an unsupported one.
pub fn decode_to_utf8(bytes: &[u8]) -> Result<(String, Encoding)> {
    let (bom_encoding, bom_skip) = detect_encoding(bytes);
    let content = &bytes[bom_skip..];

    if bom_encoding == Encoding::Utf8 {
        // Fast path: validate in place, then honor a declared single-byte
        // encoding if one is present.
        if let Ok(s) = std::str::from_utf8(content) {
            if let Some(declared) = extract_xml_decl_encoding(s) {
                let Some(enc) = Encoding::for_label(&declared) else {
                    return Err(Error::not_well_formed(
                        format!("unsupported encoding '{declared}'"),
                        SourceLocation::default(),
                    ));
                };
                if !matches!(enc, Encoding::Utf8 | Encoding::Ascii) {
                    return Ok((transcode(content, enc)?, enc));
                }
                return Ok((s.to_string(), enc));
            }
            return Ok((s.to_string(), Encoding::Utf8));
        }
        // Not valid UTF-8. The XML declaration is ASCII-compatible, so scan
        // the raw bytes for a declared encoding before giving up.
        if let Some(declared) = extract_encoding_from_ascii_bytes(content) {
            if let Some(enc) = Encoding::for_label(&declared) {
                return Ok((transcode(content, enc)?, enc));
            }
        }
        return Err(Error::not_well_formed(
            "input is not valid UTF-8",
            SourceLocation::default(),
        ));
    }

    // UTF-16 BOM: transcode, then sanity-check any declaration.
    let text = transcode(content, bom_encoding)?;
    if let Some(declared) = extract_xml_decl_encoding(&text) {
        let upper = declared.to_ascii_uppercase();
        let compatible = upper == bom_encoding.name()
            || upper == "UTF-16"
            || upper == "UTF-8"; // tolerated; the BOM wins
        if !compatible {
            return Err(Error::not_well_formed(
                format!(
                    "encoding declaration '{declared}' contradicts the {} byte order mark",
                    bom_encoding.name()
                ),
                SourceLocation::default(),
            ));
        }
    }
    Ok((text, bom_encoding))
}

/// Extracts the `encoding` attribute value from an XML declaration.
///
/// A lightweight scan that avoids running the full parser. Returns `None`
/// if there is no declaration or no encoding attribute.
fn extract_xml_decl_encoding(text: &str) -> Option<String> {
    let decl_end = text.find("?>")?;
    let decl = &text[..decl_end];
    if !decl.starts_with("<?xml") {
        return None;
    }

    let enc_pos = decl.find("encoding")?;
    let after_enc = decl[enc_pos + "encoding".len()..].trim_start();
    let after_eq = after_enc.strip_prefix('=')?.trim_start();
    let quote = after_eq.as_bytes().first().copied()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let after_quote = &after_eq[1..];
    let end = after_quote.find(quote as char)?;
    Some(after_quote[..end].to_string())
}

/// Extracts the `encoding` attribute from raw bytes treated as ASCII.
///
/// Used as a fallback when the input is not valid UTF-8 and has no BOM —
/// the XML declaration itself is always ASCII-compatible.
fn extract_encoding_from_ascii_bytes(bytes: &[u8]) -> Option<String> {
    let limit = bytes.len().min(200);
    let scan = &bytes[..limit];
    if !scan.starts_with(b"<?xml") {
        return None;
    }
    let decl_end = scan.windows(2).position(|w| w == b"?>")?;
    let decl = &scan[..decl_end];

    let needle = b"encoding";
    let enc_pos = decl.windows(needle.len()).position(|w| w == needle)?;
    let mut rest = skip_ascii_whitespace(&decl[enc_pos + needle.len()..]);
    if rest.first() != Some(&b'=') {
        return None;
    }
    rest = skip_ascii_whitespace(&rest[1..]);
    let quote = *rest.first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let value = &rest[1..];
    let end = value.iter().position(|&b| b == quote)?;
    let name = &value[..end];
    if name.iter().all(u8::is_ascii) {
        Some(String::from_utf8_lossy(name).into_owned())
    } else {
        None
    }
}

fn skip_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let skip = bytes
        .iter()
        .take_while(|&&b| b == b' ' || b == b'\t' || b == b'\r' || b == b'\n')
        .count();
    &bytes[skip..]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_utf8_bom() {
        let (enc, skip) = detect_encoding(b"\xEF\xBB\xBF<root/>");
        assert_eq!(enc, Encoding::Utf8);
        assert_eq!(skip, 3);
    }

    #[test]
    fn test_detect_utf16le_bom() {
        let (enc, skip) = detect_encoding(b"\xFF\xFE<\x00r\x00");
        assert_eq!(enc, Encoding::Utf16Le);
        assert_eq!(skip, 2);
    }

    #[test]
    fn test_detect_utf16be_bom() {
        let (enc, skip) = detect_encoding(b"\xFE\xFF\x00<\x00r");
        assert_eq!(enc, Encoding::Utf16Be);
        assert_eq!(skip, 2);
    }

    #[test]
    fn test_detect_no_bom_defaults_utf8() {
        let (enc, skip) = detect_encoding(b"<root/>");
        assert_eq!(enc, Encoding::Utf8);
        assert_eq!(skip, 0);
    }

    #[test]
    fn test_decode_plain_utf8() {
        let (text, enc) = decode_to_utf8(b"<root>hello</root>").unwrap();
        assert_eq!(text, "<root>hello</root>");
        assert_eq!(enc, Encoding::Utf8);
    }

    #[test]
    fn test_decode_utf16le() {
        let mut bytes = vec![0xFF, 0xFE];
        for b in "<r/>".bytes() {
            bytes.push(b);
            bytes.push(0);
        }
        let (text, enc) = decode_to_utf8(&bytes).unwrap();
        assert_eq!(text, "<r/>");
        assert_eq!(enc, Encoding::Utf16Le);
    }

    #[test]
    fn test_decode_utf16be() {
        let mut bytes = vec![0xFE, 0xFF];
        for b in "<r/>".bytes() {
            bytes.push(0);
            bytes.push(b);
        }
        let (text, enc) = decode_to_utf8(&bytes).unwrap();
        assert_eq!(text, "<r/>");
        assert_eq!(enc, Encoding::Utf16Be);
    }

    #[test]
    fn test_decode_latin1_declared() {
        // 0xE9 is 'é' in ISO-8859-1, which is not valid UTF-8 on its own.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>");
        bytes.extend_from_slice(b"<root>caf\xE9</root>");
        let (text, enc) = decode_to_utf8(&bytes).unwrap();
        assert!(text.contains("caf\u{E9}"));
        assert_eq!(enc, Encoding::Iso8859_1);
    }

    #[test]
    fn test_decode_invalid_utf8_rejected() {
        let result = decode_to_utf8(&[0x80, 0x81, 0x82]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unsupported_declared_encoding() {
        let result = decode_to_utf8(b"<?xml version=\"1.0\" encoding=\"EBCDIC\"?><r/>");
        assert!(result.is_err());
    }

    #[test]
    fn test_transcode_ascii_rejects_high_bytes() {
        assert!(transcode(b"plain", Encoding::Ascii).is_ok());
        assert!(transcode(b"caf\xE9", Encoding::Ascii).is_err());
    }

    #[test]
    fn test_encoding_labels() {
        assert_eq!(Encoding::for_label("utf-8"), Some(Encoding::Utf8));
        assert_eq!(Encoding::for_label("ISO-8859-1"), Some(Encoding::Iso8859_1));
        assert_eq!(Encoding::for_label("US-ASCII"), Some(Encoding::Ascii));
        assert_eq!(Encoding::for_label("SHIFT_JIS"), None);
    }

    #[test]
    fn test_extract_xml_decl_encoding() {
        assert_eq!(
            extract_xml_decl_encoding("<?xml version='1.0' encoding='UTF-8'?><r/>"),
            Some("UTF-8".to_string())
        );
        assert_eq!(extract_xml_decl_encoding("<?xml version='1.0'?><r/>"), None);
        assert_eq!(extract_xml_decl_encoding("<root/>"), None);
    }
}
