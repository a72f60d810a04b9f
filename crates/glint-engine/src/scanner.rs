// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Tag scanner: raw template text to an ordered stream of tag tokens.

use crate::ast::Span;
use crate::syntax::{find, skip_interpolation, skip_ws, starts_interpolation};

/// Elements that never have a closing tag.
pub const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagToken {
    pub kind: TagKind,
    pub name: String,
    /// Source text covered by `span`.
    pub raw: String,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Open,
    Close,
    /// Void element or an explicit `<tag />`.
    SelfClosing,
    /// Text run between tags. Only produced by the merger.
    Text,
}

impl TagToken {
    fn new(kind: TagKind, name: &str, source: &str, span: Span) -> Self {
        Self {
            kind,
            name: name.to_string(),
            raw: source[span.start..span.end].to_string(),
            span,
        }
    }

    /// Whether the tag name embeds an expression (`meta-${kind}`).
    pub fn has_dynamic_name(&self) -> bool {
        self.name.contains("${")
    }
}

pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS
        .iter()
        .any(|void| void.eq_ignore_ascii_case(name))
}

/// Scans `source` for tags.
///
/// Never fails: anything that does not look like a tag, comment, doctype or
/// processing instruction is left untokenized and later treated as text.
pub fn scan(source: &str) -> Vec<TagToken> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut cursor = 0usize;

    while let Some(offset) = bytes[cursor..].iter().position(|b| *b == b'<') {
        let open = cursor + offset;
        cursor = match scan_markup(source, open) {
            Markup::Token(token) => {
                let end = token.span.end;
                tokens.push(token);
                end
            }
            Markup::Skipped(end) => end,
            Markup::NotMarkup => open + 1,
        };
    }

    tokens
}

enum Markup {
    Token(TagToken),
    Skipped(usize),
    NotMarkup,
}

fn scan_markup(source: &str, open: usize) -> Markup {
    let bytes = source.as_bytes();
    let next = bytes.get(open + 1).copied();
    match next {
        Some(b'!') if bytes[open..].starts_with(b"<!--") => {
            let end = find(bytes, open + 4, b"-->").map_or(bytes.len(), |at| at + 3);
            Markup::Skipped(end)
        }
        Some(b'!') => Markup::Skipped(find(bytes, open + 2, b">").map_or(bytes.len(), |at| at + 1)),
        Some(b'?') => {
            let end = find(bytes, open + 2, b"?>")
                .map(|at| at + 2)
                .or_else(|| find(bytes, open + 2, b">").map(|at| at + 1))
                .unwrap_or(bytes.len());
            Markup::Skipped(end)
        }
        Some(b'/') => scan_close_tag(source, open),
        Some(_) => scan_open_tag(source, open),
        None => Markup::NotMarkup,
    }
}

fn scan_close_tag(source: &str, open: usize) -> Markup {
    let bytes = source.as_bytes();
    let name_start = open + 2;
    let Some(name_end) = tag_name_end(bytes, name_start) else {
        return Markup::NotMarkup;
    };
    let after = skip_ws(bytes, name_end);
    if bytes.get(after) != Some(&b'>') {
        return Markup::NotMarkup;
    }
    let span = Span::new(open, after + 1);
    Markup::Token(TagToken::new(
        TagKind::Close,
        &source[name_start..name_end],
        source,
        span,
    ))
}

fn scan_open_tag(source: &str, open: usize) -> Markup {
    let bytes = source.as_bytes();
    let name_start = open + 1;
    let Some(name_end) = tag_name_end(bytes, name_start) else {
        return Markup::NotMarkup;
    };
    let Some(end) = open_tag_end(bytes, name_end) else {
        return Markup::NotMarkup;
    };

    let name = &source[name_start..name_end];
    let explicit_self_close = source[name_end..end - 1].trim_end().ends_with('/');
    let kind = if explicit_self_close || is_void_element(name) {
        TagKind::SelfClosing
    } else {
        TagKind::Open
    };
    Markup::Token(TagToken::new(kind, name, source, Span::new(open, end)))
}

/// Finds the `>` that ends an open tag whose name ends at `from`. Quoted
/// values and `${...}` segments are skipped as opaque content.
fn open_tag_end(bytes: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'>' => return Some(i + 1),
            b'<' => return None,
            b'"' | b'\'' => i = skip_attribute_quote(bytes, i)?,
            b'$' if starts_interpolation(bytes, i) => i = skip_interpolation(bytes, i)?,
            _ => i += 1,
        }
    }
    None
}

pub(crate) fn skip_attribute_quote(bytes: &[u8], pos: usize) -> Option<usize> {
    let quote = bytes[pos];
    let mut i = pos + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'$' if starts_interpolation(bytes, i) => i = skip_interpolation(bytes, i)?,
            b if b == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

/// Returns the end of a tag name starting at `start`.
///
/// Grammar: an ASCII letter followed by letters, digits, `-` and `_`, with
/// further `:`/`.` separated segments, and at most one embedded `${...}`
/// segment (which may also form the whole name). The name must be followed by
/// whitespace, `/` or `>`.
pub(crate) fn tag_name_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut pos = start;
    let mut saw_expr = false;

    match bytes.get(pos) {
        Some(b) if b.is_ascii_alphabetic() => pos += 1,
        Some(b'$') if starts_interpolation(bytes, pos) => {
            pos = skip_interpolation(bytes, pos)?;
            saw_expr = true;
        }
        _ => return None,
    }

    while pos < bytes.len() {
        match bytes[pos] {
            b if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' => pos += 1,
            b':' | b'.' if bytes.get(pos + 1).is_some_and(u8::is_ascii_alphabetic) => pos += 1,
            b'$' if !saw_expr && starts_interpolation(bytes, pos) => {
                pos = skip_interpolation(bytes, pos)?;
                saw_expr = true;
            }
            _ => break,
        }
    }

    match bytes.get(pos) {
        Some(b) if b.is_ascii_whitespace() || *b == b'/' || *b == b'>' => Some(pos),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(tokens: &[TagToken]) -> Vec<(TagKind, &str)> {
        tokens
            .iter()
            .map(|token| (token.kind, token.name.as_str()))
            .collect()
    }

    #[test]
    fn scans_open_and_close_pairs() {
        let src = "<div><span>hi</span></div>";
        let tokens = scan(src);
        assert_eq!(
            summary(&tokens),
            vec![
                (TagKind::Open, "div"),
                (TagKind::Open, "span"),
                (TagKind::Close, "span"),
                (TagKind::Close, "div"),
            ]
        );
        assert_eq!(tokens[1].span, Span::new(5, 11));
        assert_eq!(&src[tokens[2].span.start..tokens[2].span.end], "</span>");
    }

    #[test]
    fn quoted_values_do_not_end_tags() {
        let src = r#"<div title="${flag ? "a > b" : "c < d"}" data-x='>'></div>"#;
        let tokens = scan(src);
        assert_eq!(
            summary(&tokens),
            vec![(TagKind::Open, "div"), (TagKind::Close, "div")]
        );
        assert!(tokens[0].raw.ends_with("data-x='>'>"));
    }

    #[test]
    fn unquoted_expressions_skip_by_brace_depth() {
        let src = "<button onclick=${() => { state.n > 1 }}>go</button>";
        let tokens = scan(src);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].raw, "<button onclick=${() => { state.n > 1 }}>");
    }

    #[test]
    fn void_and_self_closing_elements() {
        let tokens = scan("<p>a<br>b<img src=\"x\"><my-icon /></p>");
        assert_eq!(
            summary(&tokens),
            vec![
                (TagKind::Open, "p"),
                (TagKind::SelfClosing, "br"),
                (TagKind::SelfClosing, "img"),
                (TagKind::SelfClosing, "my-icon"),
                (TagKind::Close, "p"),
            ]
        );
    }

    #[test]
    fn discards_comments_doctype_and_processing_instructions() {
        let tokens = scan("<?xml version=\"1.0\"?><!DOCTYPE html><!-- <b> --><i></i>");
        assert_eq!(
            summary(&tokens),
            vec![(TagKind::Open, "i"), (TagKind::Close, "i")]
        );
    }

    #[test]
    fn special_tag_names() {
        let tokens = scan("<svg:use xlink:href=\"#a\"/><meta-${context.kind} a=\"1\"></meta-${context.kind}>");
        assert_eq!(tokens[0].name, "svg:use");
        assert_eq!(tokens[0].kind, TagKind::SelfClosing);
        assert_eq!(tokens[1].name, "meta-${context.kind}");
        assert!(tokens[1].has_dynamic_name());
        assert_eq!(tokens[1].kind, TagKind::Open);
        assert_eq!(tokens[2].kind, TagKind::Close);
    }

    #[test]
    fn invalid_names_fall_through_as_text() {
        let tokens = scan("a <1b> c < d <a-b!> <ok></ok>");
        assert_eq!(
            summary(&tokens),
            vec![(TagKind::Open, "ok"), (TagKind::Close, "ok")]
        );
    }

    #[test]
    fn tokens_are_ordered_and_disjoint() {
        let src = "<ul>${context.items.map(i => html`<li class=\"${i.kind}\">${i.name}</li>`)}</ul>";
        let tokens = scan(src);
        for pair in tokens.windows(2) {
            assert!(pair[0].span.end <= pair[1].span.start);
        }
        assert_eq!(tokens.len(), 4);
    }
}
