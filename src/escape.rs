//! JSON string escaping.
//!
//! Produces the same bytes as a standard JSON encoder: short escapes for
//! `\\`, `"`, `\n`, `\r`, `\t`; `\u00XX` for the remaining control bytes;
//! the replacement-character escape for each invalid UTF-8 byte; and
//! escapes for the U+2028/U+2029 line and paragraph separators. Unescaped
//! runs are copied as one slice.

const HEX: &[u8; 16] = b"0123456789abcdef";

/// ASCII bytes that may appear verbatim inside a JSON string.
#[inline]
pub(crate) fn is_safe(b: u8) -> bool {
    b >= 0x20 && b < 0x80 && b != b'"' && b != b'\\'
}

/// Append the escaped form of `s` (without surrounding quotes) to `buf`.
pub fn append_escaped_json(buf: &mut Vec<u8>, s: &[u8]) {
    let mut start = 0;
    let mut i = 0;

    while i < s.len() {
        let b = s[i];
        if b < 0x80 {
            if is_safe(b) {
                i += 1;
                continue;
            }
            buf.extend_from_slice(&s[start..i]);
            buf.push(b'\\');
            match b {
                b'\\' | b'"' => buf.push(b),
                b'\n' => buf.push(b'n'),
                b'\r' => buf.push(b'r'),
                b'\t' => buf.push(b't'),
                _ => {
                    // Control bytes other than \t, \n and \r.
                    buf.extend_from_slice(b"u00");
                    buf.push(HEX[(b >> 4) as usize]);
                    buf.push(HEX[(b & 0xF) as usize]);
                }
            }
            i += 1;
            start = i;
            continue;
        }

        match decode_char(&s[i..]) {
            None => {
                buf.extend_from_slice(&s[start..i]);
                buf.extend_from_slice(b"\\ufffd");
                i += 1;
                start = i;
            }
            Some((c @ ('\u{2028}' | '\u{2029}'), size)) => {
                buf.extend_from_slice(&s[start..i]);
                buf.extend_from_slice(b"\\u202");
                buf.push(HEX[(c as u32 & 0xF) as usize]);
                i += size;
                start = i;
            }
            Some((_, size)) => i += size,
        }
    }

    buf.extend_from_slice(&s[start..]);
}

/// Append `s` escaped for use inside a JSON string.
#[inline]
pub fn append_escaped_str(buf: &mut Vec<u8>, s: &str) {
    append_escaped_json(buf, s.as_bytes());
}

/// Decode the first character of `s`, or `None` if it starts with an
/// invalid sequence (which consumes exactly one byte).
pub(crate) fn decode_char(s: &[u8]) -> Option<(char, usize)> {
    let window = &s[..s.len().min(4)];
    let valid = match std::str::from_utf8(window) {
        Ok(v) => v,
        Err(e) if e.valid_up_to() > 0 => {
            // The window may cut through a later character; the first one is whole.
            std::str::from_utf8(&window[..e.valid_up_to()]).ok()?
        }
        Err(_) => return None,
    };
    valid.chars().next().map(|c| (c, c.len_utf8()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn escape(s: &[u8]) -> String {
        let mut buf = Vec::new();
        append_escaped_json(&mut buf, s);
        String::from_utf8(buf).unwrap()
    }

    #[rstest]
    #[case(b"plain text", "plain text")]
    #[case(b"quote\"back\\slash", r#"quote\"back\\slash"#)]
    #[case(b"line\nfeed\rtab\t", r"line\nfeed\rtab\t")]
    #[case(b"\x00\x01\x1f", r"\u0000\u0001\u001f")]
    #[case(b"bad\xffbyte", r"bad\ufffdbyte")]
    #[case(b"\xe2\x80", r"\ufffd\ufffd")]
    #[case("sep\u{2028}par\u{2029}".as_bytes(), r"sep\u2028par\u2029")]
    #[case("h\u{e9}llo \u{1f600}".as_bytes(), "h\u{e9}llo \u{1f600}")]
    #[case(b"del\x7f", "del\x7f")]
    fn escapes_like_a_json_encoder(#[case] input: &[u8], #[case] expected: &str) {
        assert_eq!(escape(input), expected);
    }

    #[test]
    fn real_replacement_char_passes_through() {
        assert_eq!(escape("\u{fffd}".as_bytes()), "\u{fffd}");
    }

    #[test]
    fn matches_serde_json_for_valid_strings() {
        let input = "a\"b\\c\nd\u{1}e\u{7f}f\u{e9}";
        let expected = serde_json::to_string(input).unwrap();
        assert_eq!(format!("\"{}\"", escape(input.as_bytes())), expected);
    }

    proptest! {
        #[test]
        fn escaped_string_round_trips(s in any::<String>()) {
            let quoted = format!("\"{}\"", escape(s.as_bytes()));
            let decoded: String = serde_json::from_str(&quoted).unwrap();
            prop_assert_eq!(decoded, s);
        }

        #[test]
        fn invalid_bytes_still_produce_valid_json(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let quoted = format!("\"{}\"", escape(&bytes));
            let decoded: Result<String, _> = serde_json::from_str(&quoted);
            prop_assert!(decoded.is_ok());
        }
    }
}
