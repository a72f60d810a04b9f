// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Byte-level helpers shared by the passes.
//!
//! All helpers work on UTF-8 bytes but only ever stop on ASCII delimiters, so
//! every offset they return is a valid `str` boundary.

pub(crate) fn is_ident_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_' || byte == b'$'
}

pub(crate) fn is_ident_part(byte: u8) -> bool {
    is_ident_start(byte) || byte.is_ascii_digit()
}

/// Returns the end of the identifier starting at `pos`, if one starts there.
pub(crate) fn ident_end(bytes: &[u8], pos: usize) -> Option<usize> {
    if pos >= bytes.len() || !is_ident_start(bytes[pos]) || starts_interpolation(bytes, pos) {
        return None;
    }
    let mut end = pos + 1;
    while end < bytes.len() && is_ident_part(bytes[end]) && !starts_interpolation(bytes, end) {
        end += 1;
    }
    Some(end)
}

pub(crate) fn skip_ws(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

pub(crate) fn starts_interpolation(bytes: &[u8], pos: usize) -> bool {
    pos + 1 < bytes.len() && bytes[pos] == b'$' && bytes[pos + 1] == b'{'
}

pub(crate) fn starts_with_at(bytes: &[u8], pos: usize, needle: &[u8]) -> bool {
    bytes.len() >= pos + needle.len() && &bytes[pos..pos + needle.len()] == needle
}

pub(crate) fn find(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || from >= bytes.len() {
        return None;
    }
    bytes[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

/// Skips a string literal whose opening quote sits at `pos`. Returns the
/// offset just past the closing quote. Template literals (backticks) skip
/// their `${...}` segments as nested expressions.
pub(crate) fn skip_string(bytes: &[u8], pos: usize) -> Option<usize> {
    let quote = bytes[pos];
    let mut i = pos + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'$' if quote == b'`' && starts_interpolation(bytes, i) => {
                i = skip_interpolation(bytes, i)?;
            }
            b if b == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

/// Skips a `${...}` segment starting at `pos` (the `$`). Returns the offset
/// just past the matching `}`.
pub(crate) fn skip_interpolation(bytes: &[u8], pos: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = pos + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                depth -= 1;
                i += 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            b'"' | b'\'' | b'`' => i = skip_string(bytes, i)?,
            _ => i += 1,
        }
    }
    None
}

/// Offset of the first top-level occurrence of `target` in `bytes[from..to]`,
/// ignoring bytes inside string literals and nested brackets.
pub(crate) fn find_top_level(bytes: &[u8], from: usize, to: usize, target: u8) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = from;
    while i < to {
        let byte = bytes[i];
        if depth == 0 && byte == target {
            return Some(i);
        }
        match byte {
            b'"' | b'\'' | b'`' => {
                i = skip_string(bytes, i)?;
                continue;
            }
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
        i += 1;
    }
    None
}

/// Splits `bytes[from..to]` on top-level occurrences of `separator`.
pub(crate) fn split_top_level(
    bytes: &[u8],
    from: usize,
    to: usize,
    separator: u8,
) -> Vec<(usize, usize)> {
    let mut parts = Vec::new();
    let mut start = from;
    while let Some(at) = find_top_level(bytes, start, to, separator) {
        parts.push((start, at));
        start = at + 1;
    }
    parts.push((start, to));
    parts
}

/// Returns the unquoted body of a simple string literal (`"x"`, `'x'`, or a
/// backtick literal without interpolation).
pub(crate) fn string_literal_body(text: &str) -> Option<&str> {
    let text = text.trim();
    let bytes = text.as_bytes();
    if bytes.len() < 2 {
        return None;
    }
    let quote = bytes[0];
    if !matches!(quote, b'"' | b'\'' | b'`') || bytes[bytes.len() - 1] != quote {
        return None;
    }
    if skip_string(bytes, 0) != Some(bytes.len()) {
        return None;
    }
    let body = &text[1..text.len() - 1];
    if quote == b'`' && body.contains("${") {
        return None;
    }
    Some(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_nested_interpolations() {
        let src = b"${a ? `x${b}` : \"}\"} tail";
        let end = skip_interpolation(src, 0).expect("balanced");
        assert_eq!(&src[end..], b" tail");
    }

    #[test]
    fn unbalanced_interpolation_is_none() {
        assert_eq!(skip_interpolation(b"${a + {b}", 0), None);
        assert_eq!(skip_string(b"'abc", 0), None);
    }

    #[test]
    fn splits_on_top_level_commas_only() {
        let src = b"a: f(1, 2), 'b,c': d";
        let parts = split_top_level(src, 0, src.len(), b',');
        assert_eq!(parts.len(), 2);
        assert_eq!(&src[parts[1].0..parts[1].1], b" 'b,c': d");
    }

    #[test]
    fn extracts_literal_bodies() {
        assert_eq!(string_literal_body(" \"hidden\" "), Some("hidden"));
        assert_eq!(string_literal_body("'a'"), Some("a"));
        assert_eq!(string_literal_body("`a${b}`"), None);
        assert_eq!(string_literal_body("name"), None);
    }
}
