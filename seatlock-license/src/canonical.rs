//! Canonical payload encoding.
//!
//! The signed bytes are a compact JSON object with the five token fields in
//! declaration order and `signature` forced to the empty string. Strings are
//! escaped HTML-safe: on top of the standard JSON escapes, `<`, `>`, `&`,
//! U+2028 and U+2029 are written as `\u` sequences. Issuers already in the
//! field emit exactly these bytes, so their tokens verify here and ours
//! verify there.

use std::io::{self, Write};

use serde::Serialize;
use serde_json::ser::Formatter;

use crate::error::LicenseResult;

/// The signed view of a token. Field order is the wire order.
#[derive(Serialize)]
struct CanonicalPayload<'a> {
    machine_id: &'a str,
    program_hash: &'a str,
    expiry: &'a str,
    extra: &'a str,
    signature: &'a str,
}

/// Compact formatter with HTML-safe string escaping.
struct CanonicalFormatter;

impl Formatter for CanonicalFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        let mut start = 0;
        for (idx, ch) in fragment.char_indices() {
            if needs_html_escape(ch) {
                writer.write_all(fragment[start..idx].as_bytes())?;
                write!(writer, "\\u{:04x}", ch as u32)?;
                start = idx + ch.len_utf8();
            }
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

fn needs_html_escape(ch: char) -> bool {
    matches!(ch, '<' | '>' | '&' | '\u{2028}' | '\u{2029}')
}

/// Serializes the four signed fields into the exact bytes that get signed.
///
/// The signature slot is always emitted empty; callers never pass it.
pub fn canonical_payload(
    machine_id: &str,
    program_hash: &str,
    expiry: &str,
    extra: &str,
) -> LicenseResult<Vec<u8>> {
    let payload = CanonicalPayload {
        machine_id,
        program_hash,
        expiry,
        extra,
        signature: "",
    };

    let mut out = Vec::with_capacity(
        96 + machine_id.len() + program_hash.len() + expiry.len() + extra.len(),
    );
    let mut ser = serde_json::Serializer::with_formatter(&mut out, CanonicalFormatter);
    payload.serialize(&mut ser).map_err(io::Error::from)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn escaped(ch: char) -> String {
        format!("\\u{:04x}", ch as u32)
    }

    #[test]
    fn field_order_and_empty_signature() {
        let bytes = canonical_payload("m", "h", "e", "x").unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"machine_id":"m","program_hash":"h","expiry":"e","extra":"x","signature":""}"#
        );
    }

    #[test]
    fn html_characters_are_escaped() {
        let bytes = canonical_payload("a<b>", "", "", "x & y").unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let expected_machine = format!("a{}b{}", escaped('<'), escaped('>'));
        let expected_extra = format!("x {} y", escaped('&'));
        assert!(text.contains(&expected_machine));
        assert!(text.contains(&expected_extra));
        assert!(!text.contains('<'));
        assert!(!text.contains('&'));
    }

    #[test]
    fn line_separators_are_escaped() {
        let bytes = canonical_payload("", "", "", "a\u{2028}b\u{2029}c").unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let expected = format!("a{}b{}c", escaped('\u{2028}'), escaped('\u{2029}'));
        assert!(text.contains(&expected));
    }

    #[test]
    fn standard_json_escapes_still_apply() {
        let bytes = canonical_payload("q\"b\\", "", "", "tab\tnl\n").unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains(r#""machine_id":"q\"b\\""#));
        assert!(text.contains(r#""extra":"tab\tnl\n""#));
    }

    #[test]
    fn non_ascii_passes_through_raw() {
        let bytes = canonical_payload("", "", "", "caf\u{e9} \u{4e2d}").unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("caf\u{e9} \u{4e2d}"));
    }
}
