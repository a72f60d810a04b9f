// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Data path resolver: rewrites expression text into placeholder templates
//! plus the canonical paths the placeholders stand for.
//!
//! References are found by scanning for identifier dot-chains, never by
//! parsing the expression. Anything that is not a reference (literals,
//! operators, method calls, string contents) is copied through verbatim.

use crate::ast::{
    Attribute, AttributeValue, Attributes, BooleanValue, ConditionNode, ElementNode, LogicalNode,
    MapNode, Member, MetaNode, Node, TextNode,
};
use crate::binding::{placeholder_at, Binding, BindingExpression, ResolvedPath, Root};
use crate::error::UnresolvedReason;
use crate::options::CompileOptions;
use crate::syntax::{
    find, ident_end, is_ident_part, is_ident_start, skip_interpolation, skip_string, skip_ws,
    starts_interpolation, starts_with_at,
};
use crate::telemetry;

/// Identifiers that can never start a data reference.
const KEYWORDS: [&str; 16] = [
    "true",
    "false",
    "null",
    "undefined",
    "typeof",
    "instanceof",
    "new",
    "this",
    "in",
    "of",
    "void",
    "async",
    "await",
    "return",
    "NaN",
    "Infinity",
];

/// How an expression field embeds its expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprMode {
    /// Text with `${...}` segments (text nodes, attribute values, meta tag
    /// names). References become `[i]` inside each segment.
    Interpolated,
    /// One whole expression (map sources and guards). Each reference becomes
    /// `${[i]}`.
    Bare,
    /// Kept as a literal without scanning (event handlers).
    Verbatim,
}

/// Which loop alias a name matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeAlias {
    Item,
    Index,
}

/// One iteration frame, linked to its enclosing frame.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub item: &'a str,
    pub index: Option<&'a str>,
    pub parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    pub fn new(item: &'a str, index: Option<&'a str>) -> Self {
        Self {
            item,
            index,
            parent: None,
        }
    }

    /// A frame nested directly inside `self`.
    pub fn child(&'a self, item: &'a str, index: Option<&'a str>) -> Scope<'a> {
        Scope {
            item,
            index,
            parent: Some(self),
        }
    }

    /// Number of frames from here to the outermost one, inclusive.
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut frame = self.parent;
        while let Some(scope) = frame {
            depth += 1;
            frame = scope.parent;
        }
        depth
    }

    /// Finds `name` among the aliases, innermost frame first. Returns the
    /// number of frames skipped to reach it.
    pub fn lookup(&self, name: &str) -> Option<(usize, ScopeAlias)> {
        let mut frame = Some(self);
        let mut ups = 0;
        while let Some(scope) = frame {
            if scope.item == name {
                return Some((ups, ScopeAlias::Item));
            }
            if scope.index == Some(name) {
                return Some((ups, ScopeAlias::Index));
            }
            frame = scope.parent;
            ups += 1;
        }
        None
    }
}

/// An expression field the resolver can turn into a [`Binding`].
///
/// Raw text is scanned; an existing `Binding` is returned unchanged, which
/// makes resolving an already resolved tree a no-op.
pub trait Resolvable {
    fn resolve_in(self, mode: ExprMode, resolver: &Resolver<'_>, scope: Option<&Scope<'_>>)
        -> Binding;
}

impl Resolvable for String {
    fn resolve_in(
        self,
        mode: ExprMode,
        resolver: &Resolver<'_>,
        scope: Option<&Scope<'_>>,
    ) -> Binding {
        resolver.binding(self, mode, scope)
    }
}

impl Resolvable for Binding {
    fn resolve_in(self, _: ExprMode, _: &Resolver<'_>, _: Option<&Scope<'_>>) -> Binding {
        self
    }
}

/// Resolves every expression field of `nodes`.
pub fn resolve<E: Resolvable>(nodes: Vec<Node<E>>, options: &CompileOptions) -> Vec<Node<Binding>> {
    Resolver::new(options).resolve(nodes)
}

#[derive(Debug, Clone, Copy)]
pub struct Resolver<'o> {
    options: &'o CompileOptions,
}

impl<'o> Resolver<'o> {
    pub fn new(options: &'o CompileOptions) -> Self {
        Self { options }
    }

    pub fn resolve<E: Resolvable>(&self, nodes: Vec<Node<E>>) -> Vec<Node<Binding>> {
        self.nodes(nodes, None)
    }

    /// Resolves one expression field in the given scope.
    ///
    /// Unknown roots, scope-depth violations and unbalanced `${` degrade the
    /// whole field to [`Binding::Unresolved`].
    pub fn binding(&self, text: String, mode: ExprMode, scope: Option<&Scope<'_>>) -> Binding {
        let result = match mode {
            ExprMode::Verbatim => return Binding::Literal(text),
            ExprMode::Interpolated if !text.contains("${") => return Binding::Literal(text),
            ExprMode::Interpolated => self.interpolated(&text, scope),
            ExprMode::Bare => self.bare(&text, scope),
        };
        match result {
            Ok(expr) => Binding::Expr(expr),
            Err(reason) => {
                telemetry::record_unresolved(reason.kind());
                Binding::Unresolved { raw: text, reason }
            }
        }
    }

    fn nodes<E: Resolvable>(
        &self,
        nodes: Vec<Node<E>>,
        scope: Option<&Scope<'_>>,
    ) -> Vec<Node<Binding>> {
        nodes
            .into_iter()
            .map(|node| self.node(node, scope))
            .collect()
    }

    fn node<E: Resolvable>(&self, node: Node<E>, scope: Option<&Scope<'_>>) -> Node<Binding> {
        match node {
            Node::Element(element) => Node::Element(ElementNode {
                span: element.span,
                tag: element.tag,
                raw_attributes: element.raw_attributes,
                attributes: self.attributes(element.attributes, scope),
                children: self.nodes(element.children, scope),
            }),
            Node::Text(text) => Node::Text(TextNode::new(
                text.span,
                text.content.resolve_in(ExprMode::Interpolated, self, scope),
            )),
            Node::Map(map) => {
                let source = map.source.resolve_in(ExprMode::Bare, self, scope);
                let frame = Scope {
                    item: &map.item,
                    index: map.index.as_deref(),
                    parent: scope,
                };
                let children = self.nodes(map.children, Some(&frame));
                Node::Map(MapNode {
                    span: map.span,
                    source,
                    item: map.item,
                    index: map.index,
                    children,
                })
            }
            Node::Condition(condition) => Node::Condition(ConditionNode::new(
                condition.span,
                condition.guard.resolve_in(ExprMode::Bare, self, scope),
                self.node(*condition.true_branch, scope),
                self.node(*condition.false_branch, scope),
            )),
            Node::Logical(logical) => Node::Logical(LogicalNode::new(
                logical.span,
                logical.guard.resolve_in(ExprMode::Bare, self, scope),
                self.node(*logical.child, scope),
            )),
            Node::Meta(meta) => Node::Meta(MetaNode {
                span: meta.span,
                tag: meta.tag.resolve_in(ExprMode::Interpolated, self, scope),
                raw_attributes: meta.raw_attributes,
                attributes: self.attributes(meta.attributes, scope),
                children: self.nodes(meta.children, scope),
            }),
        }
    }

    fn attributes<E: Resolvable>(
        &self,
        attributes: Attributes<E>,
        scope: Option<&Scope<'_>>,
    ) -> Attributes<Binding> {
        attributes
            .into_iter()
            .map(|attr| Attribute {
                name: attr.name,
                value: self.attribute_value(attr.value, scope),
            })
            .collect()
    }

    fn attribute_value<E: Resolvable>(
        &self,
        value: AttributeValue<E>,
        scope: Option<&Scope<'_>>,
    ) -> AttributeValue<Binding> {
        let member = |member: Member<E>| match member {
            Member::Static(text) => Member::Static(text),
            Member::Dynamic(expr) => {
                Member::Dynamic(expr.resolve_in(ExprMode::Interpolated, self, scope))
            }
        };
        match value {
            AttributeValue::Static(text) => AttributeValue::Static(text),
            AttributeValue::Dynamic(expr) => {
                AttributeValue::Dynamic(expr.resolve_in(ExprMode::Interpolated, self, scope))
            }
            AttributeValue::Boolean(BooleanValue::Always) => {
                AttributeValue::Boolean(BooleanValue::Always)
            }
            AttributeValue::Boolean(BooleanValue::When { guard, negated }) => {
                AttributeValue::Boolean(BooleanValue::When {
                    guard: guard.resolve_in(ExprMode::Bare, self, scope),
                    negated,
                })
            }
            AttributeValue::Event {
                handler,
                update_keys,
            } => AttributeValue::Event {
                handler: handler.resolve_in(ExprMode::Verbatim, self, scope),
                update_keys,
            },
            AttributeValue::Object(members) => AttributeValue::Object(
                members
                    .into_iter()
                    .map(|(name, value)| (name, member(value)))
                    .collect(),
            ),
            AttributeValue::List(members) => {
                AttributeValue::List(members.into_iter().map(member).collect())
            }
        }
    }

    fn interpolated(
        &self,
        text: &str,
        scope: Option<&Scope<'_>>,
    ) -> Result<BindingExpression, UnresolvedReason> {
        let bytes = text.as_bytes();
        let mut slots = Vec::new();
        let mut template = String::with_capacity(text.len());
        let mut copied = 0usize;
        let mut i = 0usize;

        while i < bytes.len() {
            if !starts_interpolation(bytes, i) {
                i += 1;
                continue;
            }
            let end = skip_interpolation(bytes, i).ok_or(UnresolvedReason::Unbalanced)?;
            template.push_str(&text[copied..i]);
            template.push_str("${");
            self.rewrite(&text[i + 2..end - 1], scope, false, &[], &mut slots, &mut template)?;
            template.push('}');
            copied = end;
            i = end;
        }
        template.push_str(&text[copied..]);
        Ok(BindingExpression::new(template, slots))
    }

    fn bare(
        &self,
        expr: &str,
        scope: Option<&Scope<'_>>,
    ) -> Result<BindingExpression, UnresolvedReason> {
        let mut slots = Vec::new();
        let mut template = String::with_capacity(expr.len() + 8);
        self.rewrite(expr.trim(), scope, true, &[], &mut slots, &mut template)?;
        Ok(BindingExpression::new(template, slots))
    }

    /// Copies `expr` into `out`, replacing each reference by its placeholder.
    /// Repeated references share one slot. `${...}` segments of template
    /// literals are rewritten in place as `[i]`, with `inherited` arrow
    /// parameters still in effect.
    fn rewrite(
        &self,
        expr: &str,
        scope: Option<&Scope<'_>>,
        wrap: bool,
        inherited: &[&str],
        slots: &mut Vec<ResolvedPath>,
        out: &mut String,
    ) -> Result<(), UnresolvedReason> {
        let bytes = expr.as_bytes();
        let mut locals = arrow_params(expr);
        locals.extend_from_slice(inherited);
        let depth = scope.map_or(0, Scope::depth);
        let mut copied = 0usize;
        let mut i = 0usize;

        while i < bytes.len() {
            let byte = bytes[i];
            if byte == b'`' {
                let end = skip_string(bytes, i).ok_or(UnresolvedReason::Unbalanced)?;
                let mut j = i + 1;
                while j < end {
                    if bytes[j] == b'\\' {
                        j += 2;
                    } else if starts_interpolation(bytes, j) {
                        let close =
                            skip_interpolation(bytes, j).ok_or(UnresolvedReason::Unbalanced)?;
                        out.push_str(&expr[copied..j + 2]);
                        self.rewrite(&expr[j + 2..close - 1], scope, false, &locals, slots, out)?;
                        copied = close - 1;
                        j = close;
                    } else {
                        j += 1;
                    }
                }
                i = end;
                continue;
            }
            if matches!(byte, b'"' | b'\'') {
                let end = skip_string(bytes, i).ok_or(UnresolvedReason::Unbalanced)?;
                // Outside a `${...}` segment a quoted `${` would pose as one.
                if wrap && expr[i..end].contains("${") {
                    return Err(UnresolvedReason::LiteralPlaceholder);
                }
                i = end;
                continue;
            }
            if !wrap && placeholder_at(bytes, i).is_some() {
                return Err(UnresolvedReason::LiteralPlaceholder);
            }
            let member_access = i > 0 && (is_ident_part(bytes[i - 1]) || bytes[i - 1] == b'.');
            let name_end = match ident_end(bytes, i) {
                Some(end) if is_ident_start(byte) && !member_access => end,
                _ => {
                    i += 1;
                    continue;
                }
            };
            let name = &expr[i..name_end];
            let (chain_end, segments) = member_chain(expr, name_end);

            if KEYWORDS.contains(&name) || locals.contains(&name) || is_object_key(bytes, i, name_end)
            {
                i = name_end;
                continue;
            }

            let (path, consumed) = if let Some((ups, alias)) = scope.and_then(|s| s.lookup(name)) {
                let path = match alias {
                    ScopeAlias::Item => {
                        ResolvedPath::item_relative(ups, owned(&segments), depth, None)
                            .map(|path| (path, chain_end))
                    }
                    ScopeAlias::Index => {
                        ResolvedPath::index_relative(ups, depth, None).map(|path| (path, name_end))
                    }
                };
                path.map_err(|_| UnresolvedReason::ScopeDepth { ups, depth })?
            } else if let Ok(root) = name.parse::<Root>() {
                (ResolvedPath::absolute(root, owned(&segments)), chain_end)
            } else if let Some(root) = self.options.alias(name) {
                let mut path = vec![name.to_string()];
                path.extend(owned(&segments));
                (ResolvedPath::absolute(root, path), chain_end)
            } else if self.options.is_global(name) || bytes.get(skip_ws(bytes, name_end)) == Some(&b'(')
            {
                i = chain_end;
                continue;
            } else {
                return Err(UnresolvedReason::UnknownRoot(name.to_string()));
            };

            let slot = match slots.iter().position(|existing| *existing == path) {
                Some(slot) => slot,
                None => {
                    slots.push(path);
                    slots.len() - 1
                }
            };
            out.push_str(&expr[copied..i]);
            if wrap {
                out.push_str(&format!("${{[{slot}]}}"));
            } else {
                out.push_str(&format!("[{slot}]"));
            }
            copied = consumed;
            i = consumed;
        }

        out.push_str(&expr[copied..]);
        Ok(())
    }
}

fn owned(segments: &[&str]) -> Vec<String> {
    segments.iter().map(|segment| (*segment).to_string()).collect()
}

/// Follows `.seg`, `?.seg` and literal `[0]`/`["key"]` indexing after an
/// identifier. A segment followed by `(` is a method call and ends the chain
/// before its dot; any other index expression ends it before its bracket.
fn member_chain(expr: &str, name_end: usize) -> (usize, Vec<&str>) {
    let bytes = expr.as_bytes();
    let mut end = name_end;
    let mut segments = Vec::new();
    loop {
        let bracket = if bytes.get(end) == Some(&b'[') {
            Some(end)
        } else if starts_with_at(bytes, end, b"?.[") {
            Some(end + 2)
        } else {
            None
        };
        if let Some(open) = bracket {
            let Some((key, after)) = literal_index(expr, open) else {
                break;
            };
            segments.push(key);
            end = after;
            continue;
        }
        let dot = if bytes.get(end) == Some(&b'.') {
            end + 1
        } else if starts_with_at(bytes, end, b"?.") {
            end + 2
        } else {
            break;
        };
        let Some(next) = ident_end(bytes, dot) else {
            break;
        };
        if bytes.get(skip_ws(bytes, next)) == Some(&b'(') {
            break;
        }
        segments.push(&expr[dot..next]);
        end = next;
    }
    (end, segments)
}

/// `[3]`, `["key"]` or `['key']` at `open`: the key and the offset after `]`.
fn literal_index(expr: &str, open: usize) -> Option<(&str, usize)> {
    let bytes = expr.as_bytes();
    let start = skip_ws(bytes, open + 1);
    let (key, after) = match *bytes.get(start)? {
        b'"' | b'\'' => {
            let end = skip_string(bytes, start)?;
            let body = &expr[start + 1..end - 1];
            if body.is_empty() || body.contains(|c: char| matches!(c, '\\' | '/' | '$')) {
                return None;
            }
            (body, end)
        }
        byte if byte.is_ascii_digit() => {
            let mut end = start;
            while bytes.get(end).is_some_and(u8::is_ascii_digit) {
                end += 1;
            }
            (&expr[start..end], end)
        }
        _ => return None,
    };
    let close = skip_ws(bytes, after);
    (bytes.get(close) == Some(&b']')).then_some((key, close + 1))
}

/// `key` in `{ key: value }` or `{ a: 1, key: 2 }`.
fn is_object_key(bytes: &[u8], start: usize, end: usize) -> bool {
    let next = skip_ws(bytes, end);
    if bytes.get(next) != Some(&b':') {
        return false;
    }
    let before = bytes[..start]
        .iter()
        .rev()
        .find(|byte| !byte.is_ascii_whitespace());
    matches!(before, Some(b'{' | b','))
}

/// Names bound as arrow-function parameters anywhere in `expr`.
fn arrow_params(expr: &str) -> Vec<&str> {
    let bytes = expr.as_bytes();
    let mut params = Vec::new();
    let mut from = 0usize;

    while let Some(arrow) = find(bytes, from, b"=>") {
        from = arrow + 2;
        let mut end = arrow;
        while end > 0 && bytes[end - 1].is_ascii_whitespace() {
            end -= 1;
        }
        if end > 0 && bytes[end - 1] == b')' {
            let close = end - 1;
            let mut depth = 0usize;
            let mut k = close + 1;
            let mut open = None;
            while k > 0 {
                k -= 1;
                match bytes[k] {
                    b')' => depth += 1,
                    b'(' => {
                        depth -= 1;
                        if depth == 0 {
                            open = Some(k);
                            break;
                        }
                    }
                    _ => {}
                }
            }
            if let Some(open) = open {
                let mut p = open + 1;
                while p < close {
                    match ident_end(bytes, p) {
                        Some(next) if bytes[p - 1] != b'.' => {
                            params.push(&expr[p..next]);
                            p = next;
                        }
                        _ => p += 1,
                    }
                }
            }
        } else {
            let mut start = end;
            while start > 0 && is_ident_part(bytes[start - 1]) {
                start -= 1;
            }
            if start < end && is_ident_start(bytes[start]) {
                params.push(&expr[start..end]);
            }
        }
    }
    params
}
