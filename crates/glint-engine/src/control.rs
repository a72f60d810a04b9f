// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Control-flow extraction and the merged token stream.
//!
//! Control constructs live in the text between tags, as fragments of the
//! embedding expression syntax:
//!
//! ```text
//! ${context.items.map(item => html`   <li>..</li>   `)}
//! ${state.open ? html`                <b>..</b>      ` : html`  <i>..</i>  `}
//! ${a && b && html`                   <p>..</p>      `}
//! ```
//!
//! Each gap between two tags is matched against a handful of anchored shapes.
//! A frame stack that survives across gaps remembers which construct a closing
//! backtick belongs to, so a `)` after a conditional that forms a map callback
//! closes both, conditional first.

use smallvec::SmallVec;

use crate::ast::Span;
use crate::scanner::{TagKind, TagToken};
use crate::syntax::{
    ident_end, is_ident_part, skip_interpolation, skip_string, skip_ws, starts_interpolation,
    starts_with_at, string_literal_body,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamToken {
    pub kind: StreamKind,
    pub span: Span,
}

impl StreamToken {
    pub fn new(kind: StreamKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Merged stream entry: a tag/text token or a structural control marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamKind {
    Tag(TagToken),
    MapOpen {
        /// Matched source, e.g. `context.items.map((item, i) =>`.
        signature: String,
        /// Iterated expression, e.g. `context.items`.
        source: String,
        item: String,
        index: Option<String>,
    },
    MapClose,
    CondOpen {
        guard: String,
    },
    CondElseIf {
        guard: String,
    },
    CondElse,
    CondClose,
    LogicalOpen {
        guard: String,
    },
    LogicalClose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Map { interp: bool },
    Cond { interp: bool, has_else: bool },
    Logical { interp: bool },
}

impl Frame {
    fn interp(self) -> bool {
        match self {
            Frame::Map { interp } | Frame::Cond { interp, .. } | Frame::Logical { interp } => {
                interp
            }
        }
    }
}

/// Tentative match state; committed only when a whole shape matched.
#[derive(Debug, Clone, Default)]
struct Draft {
    frames: SmallVec<[Frame; 8]>,
    tokens: Vec<StreamToken>,
    /// Set once a branch opens an `html` template body.
    entered_template: bool,
}

impl Draft {
    fn emit(&mut self, kind: StreamKind, start: usize, end: usize) {
        self.tokens.push(StreamToken::new(kind, Span::new(start, end)));
    }

    /// Stretches the latest token over syntax that produces no token of its
    /// own (`html\``, a `null` branch).
    fn extend_last(&mut self, end: usize) {
        if let Some(token) = self.tokens.last_mut() {
            token.span.end = token.span.end.max(end);
        }
    }

    /// Closes implicit frames (opened without `${`) for which `stop` is false.
    fn close_implicit_until(&mut self, at: usize, stop: impl Fn(Frame) -> bool) -> Option<Frame> {
        loop {
            let top = *self.frames.last()?;
            if stop(top) {
                return Some(top);
            }
            match top {
                Frame::Cond { interp: false, .. } => self.emit(StreamKind::CondClose, at, at),
                Frame::Logical { interp: false } => self.emit(StreamKind::LogicalClose, at, at),
                _ => return None,
            }
            self.frames.pop();
        }
    }
}

/// Stateful extractor over consecutive gaps of one source.
#[derive(Debug)]
pub struct ControlExtractor<'a> {
    source: &'a str,
    bytes: &'a [u8],
    frames: SmallVec<[Frame; 8]>,
}

/// Interleaves tag tokens with the control and text tokens found between
/// them. The result is ordered by source offset.
pub fn merge(source: &str, tags: &[TagToken]) -> Vec<StreamToken> {
    let mut extractor = ControlExtractor::new(source);
    let mut stream = Vec::with_capacity(tags.len() * 2 + 1);
    let mut cursor = 0usize;
    for tag in tags {
        stream.extend(extractor.extract(cursor, tag.span.start));
        stream.push(StreamToken::new(StreamKind::Tag(tag.clone()), tag.span));
        cursor = tag.span.end;
    }
    stream.extend(extractor.extract(cursor, source.len()));
    stream
}

impl<'a> ControlExtractor<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            frames: SmallVec::new(),
        }
    }

    /// Number of control constructs still open after the last extracted gap.
    pub fn open_constructs(&self) -> usize {
        self.frames.len()
    }

    /// Extracts control and text tokens from `source[start..end]`.
    pub fn extract(&mut self, start: usize, end: usize) -> Vec<StreamToken> {
        let mut out = Vec::new();
        let mut pos = start;
        let mut text_start = start;

        while pos < end {
            let matched = if starts_interpolation(self.bytes, pos) {
                self.match_opener(pos, end)
            } else if self.bytes[pos] == b'`' && !self.frames.is_empty() {
                self.match_closer(pos, end)
            } else {
                None
            };

            if let Some((after, draft)) = matched {
                self.push_text(&mut out, text_start, pos);
                out.extend(draft.tokens);
                self.frames = draft.frames;
                pos = after;
                text_start = after;
                continue;
            }

            if starts_interpolation(self.bytes, pos) {
                pos = match skip_interpolation(self.bytes, pos) {
                    Some(after) if after <= end => after,
                    _ => pos + 2,
                };
            } else {
                pos += 1;
            }
        }

        self.push_text(&mut out, text_start, end);
        out
    }

    fn push_text(&self, out: &mut Vec<StreamToken>, start: usize, end: usize) {
        if start >= end {
            return;
        }
        let span = Span::new(start, end);
        let token = TagToken {
            kind: TagKind::Text,
            name: String::new(),
            raw: self.source[start..end].to_string(),
            span,
        };
        out.push(StreamToken::new(StreamKind::Tag(token), span));
    }

    fn draft(&self) -> Draft {
        Draft {
            frames: self.frames.clone(),
            tokens: Vec::new(),
            entered_template: false,
        }
    }

    /// `${` followed by a map, conditional or logical opener.
    fn match_opener(&self, pos: usize, limit: usize) -> Option<(usize, Draft)> {
        let mut draft = self.draft();
        let after = self.opener(&mut draft, pos, pos + 2, limit, true)?;
        // A ternary over plain strings is an ordinary expression, not markup.
        if !draft.entered_template {
            return None;
        }
        Some((after, draft))
    }

    /// A backtick ending a template body.
    fn match_closer(&self, pos: usize, limit: usize) -> Option<(usize, Draft)> {
        let mut draft = self.draft();
        let after = self.after_branch(&mut draft, pos + 1, limit)?;
        if let Some(first) = draft.tokens.first_mut() {
            first.span.start = pos;
        }
        Some((after, draft))
    }

    fn opener(
        &self,
        draft: &mut Draft,
        start: usize,
        p: usize,
        limit: usize,
        interp: bool,
    ) -> Option<usize> {
        let p = skip_ws(self.bytes, p);
        let mut trial = draft.clone();
        if let Some(after) = self.map_opener(&mut trial, start, p, limit, interp) {
            *draft = trial;
            return Some(after);
        }
        self.guarded_opener(draft, start, p, limit, interp)
    }

    /// `chain.map(item =>` or `chain.map((item, index) =>`, then a branch.
    fn map_opener(
        &self,
        draft: &mut Draft,
        start: usize,
        p: usize,
        limit: usize,
        interp: bool,
    ) -> Option<usize> {
        let bytes = self.bytes;
        let (chain_end, last_segment_start) = dot_chain(bytes, p, limit)?;
        if &self.source[last_segment_start..chain_end] != "map"
            || last_segment_start == p
            || bytes.get(chain_end) != Some(&b'(')
        {
            return None;
        }
        let source = self.source[p..last_segment_start - 1].to_string();

        let mut q = skip_ws(bytes, chain_end + 1);
        let parenthesized = bytes.get(q) == Some(&b'(');
        if parenthesized {
            q = skip_ws(bytes, q + 1);
        }
        let item_end = ident_end(bytes, q).filter(|end| *end <= limit)?;
        let item = self.source[q..item_end].to_string();
        q = skip_ws(bytes, item_end);

        let mut index = None;
        if parenthesized {
            if bytes.get(q) == Some(&b',') {
                let index_start = skip_ws(bytes, q + 1);
                let index_end = ident_end(bytes, index_start).filter(|end| *end <= limit)?;
                index = Some(self.source[index_start..index_end].to_string());
                q = skip_ws(bytes, index_end);
            }
            if bytes.get(q) != Some(&b')') {
                return None;
            }
            q = skip_ws(bytes, q + 1);
        }
        if !starts_with_at(bytes, q, b"=>") || q + 2 > limit {
            return None;
        }
        let arrow_end = q + 2;

        let signature = self.source[p..arrow_end].to_string();
        draft.emit(
            StreamKind::MapOpen {
                signature,
                source,
                item,
                index,
            },
            start,
            arrow_end,
        );
        draft.frames.push(Frame::Map { interp });
        self.branch(draft, arrow_end, limit)
    }

    /// `guard ? branch` or `guard && branch`.
    fn guarded_opener(
        &self,
        draft: &mut Draft,
        start: usize,
        p: usize,
        limit: usize,
        interp: bool,
    ) -> Option<usize> {
        let region = self.guard_region(p, limit)?;

        if let Some(question) = region.question {
            let guard = self.guard_text(p, question)?;
            draft.emit(StreamKind::CondOpen { guard }, start, question + 1);
            draft.frames.push(Frame::Cond {
                interp,
                has_else: false,
            });
            return self.branch(draft, question + 1, limit);
        }

        // The last `&&` that is followed by a branch splits guard from content,
        // so every earlier operand stays part of the guard. Operands that cannot
        // start a branch are never tried, which keeps long chains linear.
        for and in region.ands.iter().rev() {
            if !self.starts_branch(and + 2, limit) {
                continue;
            }
            let Some(guard) = self.guard_text(p, *and) else {
                continue;
            };
            let mut trial = draft.clone();
            trial.emit(StreamKind::LogicalOpen { guard }, start, and + 2);
            trial.frames.push(Frame::Logical { interp });
            if let Some(after) = self.branch(&mut trial, and + 2, limit) {
                *draft = trial;
                return Some(after);
            }
        }
        None
    }

    /// Whether a branch can start at `p`: a template, a string literal,
    /// `null`/`undefined` or a `chain.map(` call. Looks at a bounded prefix
    /// only.
    fn starts_branch(&self, p: usize, limit: usize) -> bool {
        let bytes = self.bytes;
        let p = skip_ws(bytes, p);
        if p >= limit {
            return false;
        }
        if template_start(bytes, p, limit).is_some()
            || matches!(bytes[p], b'"' | b'\'' | b'`')
            || starts_with_at(bytes, p, b"null")
            || starts_with_at(bytes, p, b"undefined")
        {
            return true;
        }
        dot_chain(bytes, p, limit).is_some_and(|(end, last)| {
            last > p && &self.source[last..end] == "map" && bytes.get(end) == Some(&b'(')
        })
    }

    /// What follows `=>`, `?`, `:` or `&&`.
    fn branch(&self, draft: &mut Draft, p: usize, limit: usize) -> Option<usize> {
        let p = skip_ws(self.bytes, p);
        if p >= limit {
            return None;
        }
        if let Some(body_start) = template_start(self.bytes, p, limit) {
            draft.entered_template = true;
            draft.extend_last(body_start);
            return Some(body_start);
        }
        if let Some((literal_end, body)) = self.literal_branch(p, limit) {
            if !body.is_empty() {
                let token = TagToken {
                    kind: TagKind::Text,
                    name: String::new(),
                    raw: body.to_string(),
                    span: Span::new(p, literal_end),
                };
                draft.emit(StreamKind::Tag(token), p, literal_end);
            } else {
                draft.extend_last(literal_end);
            }
            return self.after_branch(draft, literal_end, limit);
        }
        self.opener(draft, p, p, limit, false)
    }

    /// Continuation after a branch ended: `)`, `:` or `}`.
    fn after_branch(&self, draft: &mut Draft, p: usize, limit: usize) -> Option<usize> {
        let p = skip_ws(self.bytes, p);
        if p >= limit {
            return None;
        }
        match self.bytes[p] {
            b')' => {
                draft.close_implicit_until(p, |frame| matches!(frame, Frame::Map { .. }))?;
                let Some(Frame::Map { interp }) = draft.frames.pop() else {
                    return None;
                };
                let mut q = p + 1;
                if interp {
                    q = skip_join(self.bytes, q, limit);
                    let close = skip_ws(self.bytes, q);
                    if close < limit && self.bytes[close] == b'}' {
                        q = close + 1;
                    }
                    draft.emit(StreamKind::MapClose, p, q);
                    return Some(q);
                }
                draft.emit(StreamKind::MapClose, p, q);
                self.after_branch(draft, q, limit)
            }
            b':' => {
                draft.close_implicit_until(p, |frame| {
                    matches!(frame, Frame::Cond { has_else: false, .. })
                })?;
                let q = skip_ws(self.bytes, p + 1);

                if template_start(self.bytes, q, limit).is_none()
                    && self.literal_branch(q, limit).is_none()
                {
                    if let Some(region) = self.guard_region(q, limit) {
                        if let Some(question) = region.question {
                            let guard = self.guard_text(q, question)?;
                            draft.emit(StreamKind::CondElseIf { guard }, p, question + 1);
                            return self.branch(draft, question + 1, limit);
                        }
                    }
                }

                draft.emit(StreamKind::CondElse, p, p + 1);
                if let Some(Frame::Cond { has_else, .. }) = draft.frames.last_mut() {
                    *has_else = true;
                }
                self.branch(draft, q, limit)
            }
            b'}' => {
                let top = draft.close_implicit_until(p, Frame::interp)?;
                match top {
                    Frame::Cond { .. } => draft.emit(StreamKind::CondClose, p, p + 1),
                    Frame::Logical { .. } => draft.emit(StreamKind::LogicalClose, p, p + 1),
                    Frame::Map { .. } => return None,
                }
                draft.frames.pop();
                Some(p + 1)
            }
            _ => None,
        }
    }

    /// A string literal or `null`/`undefined` used as a branch value.
    fn literal_branch(&self, p: usize, limit: usize) -> Option<(usize, &'a str)> {
        let bytes = self.bytes;
        match bytes.get(p)? {
            b'"' | b'\'' | b'`' => {
                let end = skip_string(bytes, p).filter(|end| *end <= limit)?;
                let body = string_literal_body(&self.source[p..end])?;
                Some((end, body))
            }
            _ => {
                for keyword in ["null", "undefined"] {
                    let end = p + keyword.len();
                    if starts_with_at(bytes, p, keyword.as_bytes())
                        && end <= limit
                        && !bytes.get(end).copied().is_some_and(is_ident_part)
                    {
                        return Some((end, ""));
                    }
                }
                None
            }
        }
    }

    /// Scans an expression from `p` up to the first top-level backtick,
    /// recording where a ternary `?` and top-level `&&` operators sit.
    fn guard_region(&self, p: usize, limit: usize) -> Option<GuardRegion> {
        let bytes = self.bytes;
        let mut depth = 0usize;
        let mut i = p;
        let mut region = GuardRegion::default();

        while i < limit {
            match bytes[i] {
                b'"' | b'\'' => {
                    i = skip_string(bytes, i).filter(|end| *end <= limit)?;
                    continue;
                }
                b'(' | b'[' => depth += 1,
                b')' | b']' => {
                    if depth == 0 {
                        return finish(region);
                    }
                    depth -= 1;
                }
                b'`' if depth == 0 => return finish(region),
                b'{' | b'}' | b';' if depth == 0 => return finish(region),
                b':' if depth == 0 && region.question.is_none() => return finish(region),
                b'?' if depth == 0 && region.question.is_none() => {
                    let next = bytes.get(i + 1).copied();
                    if next == Some(b'?') || next == Some(b'.') {
                        i += 2;
                        continue;
                    }
                    region.question = Some(i);
                    // Everything after the `?` belongs to the branch.
                    return finish(region);
                }
                b'&' if depth == 0 && bytes.get(i + 1) == Some(&b'&') => {
                    region.ands.push(i);
                    i += 2;
                    continue;
                }
                _ => {}
            }
            i += 1;
        }
        finish(region)
    }

    fn guard_text(&self, start: usize, end: usize) -> Option<String> {
        let guard = self.source[start..end].trim();
        if guard.is_empty() || guard.contains("=>") {
            return None;
        }
        Some(guard.to_string())
    }
}

fn finish(region: GuardRegion) -> Option<GuardRegion> {
    if region.question.is_none() && region.ands.is_empty() {
        None
    } else {
        Some(region)
    }
}

#[derive(Debug, Default)]
struct GuardRegion {
    question: Option<usize>,
    ands: SmallVec<[usize; 4]>,
}

/// `html` or `svg` followed by a backtick; returns the offset after it.
fn template_start(bytes: &[u8], p: usize, limit: usize) -> Option<usize> {
    for tag in [&b"html"[..], &b"svg"[..]] {
        if starts_with_at(bytes, p, tag) {
            let q = skip_ws(bytes, p + tag.len());
            if q < limit && bytes[q] == b'`' {
                return Some(q + 1);
            }
        }
    }
    None
}

/// Parses `ident(.ident)*` and returns its end plus the start of the last
/// segment.
fn dot_chain(bytes: &[u8], p: usize, limit: usize) -> Option<(usize, usize)> {
    let mut end = ident_end(bytes, p).filter(|end| *end <= limit)?;
    let mut last = p;
    while end + 1 < limit && bytes[end] == b'.' {
        let Some(next) = ident_end(bytes, end + 1) else {
            break;
        };
        last = end + 1;
        end = next;
    }
    Some((end, last))
}

/// Skips an optional `.join(...)` after a map call.
fn skip_join(bytes: &[u8], p: usize, limit: usize) -> usize {
    let q = skip_ws(bytes, p);
    if !starts_with_at(bytes, q, b".join(") {
        return p;
    }
    let mut depth = 0usize;
    let mut i = q + 5;
    while i < limit {
        match bytes[i] {
            b'"' | b'\'' | b'`' => match skip_string(bytes, i) {
                Some(end) => {
                    i = end;
                    continue;
                }
                None => return p,
            },
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    p
}
