// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Resolved data-binding model and its canonical path rendering.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ast::Span;
use crate::error::{Error, UnresolvedReason};
use crate::syntax::{skip_interpolation, skip_string, starts_interpolation};

/// The three conventional bindings an expression may be rooted at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Root {
    Context,
    Core,
    State,
}

impl Root {
    pub const ALL: [Root; 3] = [Root::Context, Root::Core, Root::State];

    pub fn as_str(&self) -> &'static str {
        match self {
            Root::Context => "context",
            Root::Core => "core",
            Root::State => "state",
        }
    }
}

impl FromStr for Root {
    type Err = ();

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "context" => Ok(Root::Context),
            "core" => Ok(Root::Core),
            "state" => Ok(Root::State),
            _ => Err(()),
        }
    }
}

/// Canonical location of a referenced value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolvedPath {
    /// `/root/seg/seg`
    Absolute { root: Root, segments: Vec<String> },
    /// `[item]/seg`, prefixed by one `../` per skipped scope.
    ItemRelative { ups: usize, segments: Vec<String> },
    /// `[index]`, prefixed by one `../` per skipped scope.
    IndexRelative { ups: usize },
}

impl ResolvedPath {
    pub fn absolute(root: Root, segments: Vec<String>) -> Self {
        ResolvedPath::Absolute { root, segments }
    }

    /// Builds an item-relative path, checking that `depth` active scopes can
    /// satisfy `ups`.
    pub fn item_relative(
        ups: usize,
        segments: Vec<String>,
        depth: usize,
        span: Option<Span>,
    ) -> Result<Self, Error> {
        check_depth(ups, depth, span)?;
        Ok(ResolvedPath::ItemRelative { ups, segments })
    }

    /// Builds an index-relative path, checking that `depth` active scopes can
    /// satisfy `ups`.
    pub fn index_relative(ups: usize, depth: usize, span: Option<Span>) -> Result<Self, Error> {
        check_depth(ups, depth, span)?;
        Ok(ResolvedPath::IndexRelative { ups })
    }

    /// Number of enclosing scopes skipped; zero for absolute paths.
    pub fn ups(&self) -> usize {
        match self {
            ResolvedPath::Absolute { .. } => 0,
            ResolvedPath::ItemRelative { ups, .. } | ResolvedPath::IndexRelative { ups } => *ups,
        }
    }
}

fn check_depth(ups: usize, depth: usize, span: Option<Span>) -> Result<(), Error> {
    if depth < ups + 1 {
        return Err(Error::resolve(
            UnresolvedReason::ScopeDepth { ups, depth }.to_string(),
            span,
        ));
    }
    Ok(())
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedPath::Absolute { root, segments } => {
                write!(f, "/{}", root.as_str())?;
                for segment in segments {
                    write!(f, "/{segment}")?;
                }
                Ok(())
            }
            ResolvedPath::ItemRelative { ups, segments } => {
                for _ in 0..*ups {
                    f.write_str("../")?;
                }
                f.write_str("[item]")?;
                for segment in segments {
                    write!(f, "/{segment}")?;
                }
                Ok(())
            }
            ResolvedPath::IndexRelative { ups } => {
                for _ in 0..*ups {
                    f.write_str("../")?;
                }
                f.write_str("[index]")
            }
        }
    }
}

/// Expression template plus the paths its placeholders stand for.
///
/// `template` holds `[i]` placeholders inside `${...}` segments; `paths[i]`
/// is the resolved path of placeholder `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingExpression {
    pub template: String,
    pub paths: Vec<ResolvedPath>,
}

impl BindingExpression {
    pub fn new(template: impl Into<String>, paths: Vec<ResolvedPath>) -> Self {
        Self {
            template: template.into(),
            paths,
        }
    }

    /// Template of a binding that is exactly one placeholder.
    pub const BARE: &'static str = "${[0]}";

    /// True when the template is a lone placeholder with no literal text.
    pub fn is_bare(&self) -> bool {
        self.paths.len() == 1 && self.template == Self::BARE
    }

    /// Placeholder indices in order of appearance, repeats included.
    ///
    /// Only `[i]` tokens in code inside `${...}` segments count. Literal text
    /// around the segments and string literals inside them are skipped;
    /// template literals are searched through their own `${...}` segments.
    pub fn placeholders(&self) -> Vec<usize> {
        let bytes = self.template.as_bytes();
        let mut found = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            if !starts_interpolation(bytes, i) {
                i += 1;
                continue;
            }
            let (inner_end, next) = segment_bounds(bytes, i, bytes.len());
            placeholders_in_code(bytes, i + 2, inner_end, &mut found);
            i = next;
        }
        found
    }
}

/// End of the code inside the `${` at `start`, and the offset after its `}`.
/// An unterminated segment runs to `limit`.
fn segment_bounds(bytes: &[u8], start: usize, limit: usize) -> (usize, usize) {
    match skip_interpolation(bytes, start) {
        Some(end) if end <= limit => (end - 1, end),
        _ => (limit, limit),
    }
}

fn placeholders_in_code(bytes: &[u8], from: usize, to: usize, found: &mut Vec<usize>) {
    let mut i = from;
    while i < to {
        match bytes[i] {
            b'"' | b'\'' => i = skip_string(bytes, i).map_or(to, |end| end.min(to)),
            b'`' => {
                let end = skip_string(bytes, i).map_or(to, |end| end.min(to));
                let mut j = i + 1;
                while j < end {
                    if bytes[j] == b'\\' {
                        j += 2;
                    } else if starts_interpolation(bytes, j) {
                        let (inner_end, next) = segment_bounds(bytes, j, end);
                        placeholders_in_code(bytes, j + 2, inner_end, found);
                        j = next;
                    } else {
                        j += 1;
                    }
                }
                i = end;
            }
            b'[' => match placeholder_at(bytes, i) {
                Some((index, end)) => {
                    found.push(index);
                    i = end;
                }
                None => i += 1,
            },
            _ => i += 1,
        }
    }
}

/// A `[digits]` token at `pos`: its index and the offset after `]`.
pub(crate) fn placeholder_at(bytes: &[u8], pos: usize) -> Option<(usize, usize)> {
    if bytes.get(pos) != Some(&b'[') {
        return None;
    }
    let digits_start = pos + 1;
    let mut end = digits_start;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    if end == digits_start || bytes.get(end) != Some(&b']') {
        return None;
    }
    let index = std::str::from_utf8(&bytes[digits_start..end]).ok()?.parse().ok()?;
    Some((index, end + 1))
}

/// Resolution outcome of one expression field.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// Text without any embedded expression.
    Literal(String),
    Expr(BindingExpression),
    /// Kept as raw text because it could not be resolved.
    Unresolved {
        raw: String,
        reason: UnresolvedReason,
    },
}

impl Binding {
    pub fn as_expr(&self) -> Option<&BindingExpression> {
        match self {
            Binding::Expr(expr) => Some(expr),
            _ => None,
        }
    }

    pub fn paths(&self) -> &[ResolvedPath] {
        match self {
            Binding::Expr(expr) => &expr.paths,
            Binding::Literal(_) | Binding::Unresolved { .. } => &[],
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, Binding::Unresolved { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segs(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| (*part).to_string()).collect()
    }

    #[test]
    fn renders_absolute_paths() {
        let path = ResolvedPath::absolute(Root::Context, segs(&["user", "name"]));
        assert_eq!(path.to_string(), "/context/user/name");
        assert_eq!(ResolvedPath::absolute(Root::Core, Vec::new()).to_string(), "/core");
    }

    #[test]
    fn renders_relative_paths() {
        let item = ResolvedPath::item_relative(0, Vec::new(), 1, None).unwrap();
        assert_eq!(item.to_string(), "[item]");

        let outer = ResolvedPath::item_relative(2, segs(&["id"]), 3, None).unwrap();
        assert_eq!(outer.to_string(), "../../[item]/id");

        let index = ResolvedPath::index_relative(1, 2, None).unwrap();
        assert_eq!(index.to_string(), "../[index]");
    }

    #[test]
    fn rejects_paths_deeper_than_scope() {
        let err = ResolvedPath::item_relative(1, Vec::new(), 1, Some(Span::new(3, 7)))
            .expect_err("depth 1 cannot skip a scope");
        assert!(matches!(err, Error::Resolve { .. }));
        assert_eq!(err.span(), Some(Span::new(3, 7)));
        assert!(ResolvedPath::index_relative(0, 0, None).is_err());
    }

    #[test]
    fn lists_placeholders_in_order() {
        let expr = BindingExpression::new(
            "${[0]} and ${[1] + [0]} [x] [12",
            vec![
                ResolvedPath::absolute(Root::State, segs(&["a"])),
                ResolvedPath::absolute(Root::State, segs(&["b"])),
            ],
        );
        assert_eq!(expr.placeholders(), vec![0, 1, 0]);
        assert!(!expr.is_bare());
    }

    #[test]
    fn placeholders_ignore_literal_text_and_strings() {
        let expr = BindingExpression::new(
            "Item [3]: ${[0] + \"[1]\"} ${`a-${[1]}-[2]`}",
            vec![
                ResolvedPath::absolute(Root::State, segs(&["a"])),
                ResolvedPath::absolute(Root::State, segs(&["b"])),
            ],
        );
        assert_eq!(expr.placeholders(), vec![0, 1]);
    }

    #[test]
    fn wrapped_placeholders_inside_template_literals() {
        let expr = BindingExpression::new("${[0]} ? `x${[1]}` : \"\"", Vec::new());
        assert_eq!(expr.placeholders(), vec![0, 1]);
    }
}
