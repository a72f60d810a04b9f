// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Attribute classifier: raw open-tag text to typed attribute values.
//!
//! Classification is purely syntactic. Values that do not match any
//! recognised quoting or brace form are kept as static raw text and scanning
//! carries on, so a malformed attribute never fails the compile.

use crate::ast::{Attributes, AttributeValue, BooleanValue, Member, Node};
use crate::scanner::{skip_attribute_quote, tag_name_end};
use crate::syntax::{
    find_top_level, ident_end, is_ident_part, skip_interpolation, skip_ws, split_top_level,
    starts_interpolation, starts_with_at, string_literal_body,
};

/// Classifies every attribute of one open tag (`<name ...>` or `<name .../>`).
pub fn classify(raw_open_tag: &str) -> Attributes<String> {
    let bytes = raw_open_tag.as_bytes();
    let mut attributes = Attributes::default();

    let start = if bytes.first() == Some(&b'<') {
        tag_name_end(bytes, 1).unwrap_or(1)
    } else {
        0
    };
    let end = attribute_region_end(raw_open_tag);
    let mut pos = start;

    while pos < end {
        pos = skip_ws(bytes, pos);
        if pos >= end {
            break;
        }
        pos = if starts_interpolation(bytes, pos) {
            toggle(raw_open_tag, pos, end, &mut attributes)
        } else {
            named(raw_open_tag, pos, end, &mut attributes)
        };
    }

    attributes
}

/// Fills in the attributes of every element and meta node below `nodes`.
pub fn classify_tree(nodes: &mut [Node<String>]) {
    for node in nodes {
        match node {
            Node::Element(element) => {
                element.attributes = classify(&element.raw_attributes);
                classify_tree(&mut element.children);
            }
            Node::Meta(meta) => {
                meta.attributes = classify(&meta.raw_attributes);
                classify_tree(&mut meta.children);
            }
            Node::Map(map) => classify_tree(&mut map.children),
            Node::Condition(condition) => {
                classify_tree(std::slice::from_mut(&mut *condition.true_branch));
                classify_tree(std::slice::from_mut(&mut *condition.false_branch));
            }
            Node::Logical(logical) => classify_tree(std::slice::from_mut(&mut *logical.child)),
            Node::Text(_) => {}
        }
    }
}

/// Offset where attributes stop: before the closing `>` and any `/`.
fn attribute_region_end(raw: &str) -> usize {
    let body = raw.strip_suffix('>').unwrap_or(raw);
    let trimmed = body.trim_end();
    match trimmed.strip_suffix('/') {
        // `href=/a/>` keeps its slash; `<br/>`, `x="1"/>` and `a=${b} />` do not.
        Some(rest)
            if rest.ends_with(|c: char| c.is_ascii_whitespace() || matches!(c, '"' | '\'' | '}'))
                || !rest.contains('=') =>
        {
            rest.len()
        }
        _ => body.len(),
    }
}

/// `${g && "name"}` or `${g0 ? "a" : g1 ? "b" : "c"}` standing in for an
/// attribute.
fn toggle(raw: &str, pos: usize, end: usize, out: &mut Attributes<String>) -> usize {
    let bytes = raw.as_bytes();
    let Some(after) = skip_interpolation(bytes, pos).filter(|after| *after <= end) else {
        let text = raw[pos..end].trim_end();
        out.insert(text, AttributeValue::Static(text.to_string()));
        return end;
    };

    let inner = &raw[pos + 2..after - 1];
    match toggle_names(inner) {
        Some(entries) => {
            for (name, value) in entries {
                out.insert(name, AttributeValue::Boolean(value));
            }
        }
        None => {
            let text = &raw[pos..after];
            out.insert(text, AttributeValue::Static(text.to_string()));
        }
    }
    after
}

fn toggle_names(expr: &str) -> Option<Vec<(String, BooleanValue<String>)>> {
    let bytes = expr.as_bytes();

    if let Some((guards, names, fallback)) = ternary_chain(expr) {
        let mut entries = Vec::new();
        for (i, name) in names.iter().enumerate() {
            let guard = if i == 0 {
                guards[0].to_string()
            } else {
                let mut parts: Vec<String> =
                    guards[..i].iter().map(|guard| format!("!({guard})")).collect();
                parts.push(format!("({})", guards[i]));
                parts.join(" && ")
            };
            if !name.is_empty() {
                entries.push((
                    (*name).to_string(),
                    BooleanValue::When {
                        guard,
                        negated: false,
                    },
                ));
            }
        }
        if let Some(name) = fallback.filter(|name| !name.is_empty()) {
            entries.push((
                name.to_string(),
                BooleanValue::When {
                    guard: guards.join(" || "),
                    negated: true,
                },
            ));
        }
        return (!entries.is_empty()).then_some(entries);
    }

    let and = last_top_level_and(bytes)?;
    let name = string_literal_body(&expr[and + 2..])?;
    let guard = expr[..and].trim();
    if guard.is_empty() || name.is_empty() {
        return None;
    }
    Some(vec![(
        name.to_string(),
        BooleanValue::When {
            guard: guard.to_string(),
            negated: false,
        },
    )])
}

type Chain<'a> = (Vec<&'a str>, Vec<&'a str>, Option<&'a str>);

/// Splits `g0 ? "a" : g1 ? "b" : "c"` into guards, guarded names and the
/// final fallback name. `null` and `undefined` fallbacks yield no name.
fn ternary_chain(expr: &str) -> Option<Chain<'_>> {
    let bytes = expr.as_bytes();
    let mut guards = Vec::new();
    let mut names = Vec::new();
    let mut pos = 0usize;

    loop {
        let question = find_question(bytes, pos, bytes.len())?;
        let colon = find_top_level(bytes, question + 1, bytes.len(), b':')?;
        let guard = expr[pos..question].trim();
        if guard.is_empty() {
            return None;
        }
        guards.push(guard);
        names.push(string_literal_body(&expr[question + 1..colon])?);

        let rest = &expr[colon + 1..];
        let trimmed = rest.trim();
        if let Some(name) = string_literal_body(trimmed) {
            return Some((guards, names, Some(name)));
        }
        if trimmed == "null" || trimmed == "undefined" {
            return Some((guards, names, None));
        }
        pos = colon + 1;
    }
}

/// Top-level ternary `?`, skipping `?.` and `??`.
fn find_question(bytes: &[u8], from: usize, to: usize) -> Option<usize> {
    let mut pos = from;
    while let Some(at) = find_top_level(bytes, pos, to, b'?') {
        match bytes.get(at + 1) {
            Some(b'.' | b'?') => pos = at + 2,
            _ => return Some(at),
        }
    }
    None
}

fn last_top_level_and(bytes: &[u8]) -> Option<usize> {
    let mut pos = 0usize;
    let mut last = None;
    while let Some(at) = find_top_level(bytes, pos, bytes.len(), b'&') {
        if bytes.get(at + 1) == Some(&b'&') {
            last = Some(at);
            pos = at + 2;
        } else {
            pos = at + 1;
        }
    }
    last
}

/// `name`, `name=value`, `?name=${g}`, `onclick=${...}` and friends.
fn named(raw: &str, pos: usize, end: usize, out: &mut Attributes<String>) -> usize {
    let bytes = raw.as_bytes();
    let name_end = attribute_name_end(bytes, pos, end);
    if name_end == pos {
        // Stray byte such as a lone `=` or quote.
        let text = raw[pos..end].trim_end();
        out.insert(text, AttributeValue::Static(text.to_string()));
        return end;
    }
    let name = &raw[pos..name_end];

    let eq = skip_ws(bytes, name_end);
    if eq >= end || bytes[eq] != b'=' {
        let name = name.strip_prefix('?').unwrap_or(name);
        out.insert(name, AttributeValue::Boolean(BooleanValue::Always));
        return name_end;
    }

    let value_start = skip_ws(bytes, eq + 1);
    if value_start >= end {
        out.insert(name, AttributeValue::Static(raw[pos..end].to_string()));
        return end;
    }

    let (value, after) = match bytes[value_start] {
        b'"' | b'\'' => match skip_attribute_quote(bytes, value_start).filter(|after| *after <= end) {
            Some(after) => (&raw[value_start + 1..after - 1], after),
            None => {
                out.insert(name, AttributeValue::Static(raw[value_start..end].to_string()));
                return end;
            }
        },
        _ => match unquoted_value_end(bytes, value_start, end) {
            Some(after) => (&raw[value_start..after], after),
            None => {
                out.insert(name, AttributeValue::Static(raw[value_start..end].to_string()));
                return end;
            }
        },
    };

    let (name, value) = value_for(name, value);
    out.insert(name, value);
    after
}

fn attribute_name_end(bytes: &[u8], pos: usize, end: usize) -> usize {
    let mut i = pos;
    while i < end {
        match bytes[i] {
            b if b.is_ascii_whitespace() => break,
            b'=' | b'"' | b'\'' | b'>' | b'<' => break,
            b'/' if i + 1 >= end => break,
            b'$' if starts_interpolation(bytes, i) => break,
            _ => i += 1,
        }
    }
    i
}

fn unquoted_value_end(bytes: &[u8], pos: usize, end: usize) -> Option<usize> {
    let mut i = pos;
    while i < end {
        if bytes[i].is_ascii_whitespace() {
            break;
        }
        if starts_interpolation(bytes, i) {
            i = skip_interpolation(bytes, i).filter(|after| *after <= end)?;
        } else {
            i += 1;
        }
    }
    Some(i)
}

fn value_for<'a>(name: &'a str, value: &str) -> (&'a str, AttributeValue<String>) {
    if let Some(stripped) = name.strip_prefix('?') {
        return match whole_interpolation(value) {
            Some(guard) if !guard.trim().is_empty() => (
                stripped,
                AttributeValue::Boolean(BooleanValue::When {
                    guard: guard.trim().to_string(),
                    negated: false,
                }),
            ),
            _ => (stripped, AttributeValue::Static(value.to_string())),
        };
    }

    if is_event_name(name) {
        let handler = whole_interpolation(value).map_or(value, str::trim);
        return (
            name,
            AttributeValue::Event {
                handler: handler.to_string(),
                update_keys: update_keys(handler),
            },
        );
    }

    if let Some(members) = whole_interpolation(value).and_then(object_members) {
        return (name, AttributeValue::Object(members));
    }

    let segments = segments(value);
    let dynamic = |segment: &&str| segment.contains("${");
    if segments.len() >= 2 && segments.iter().any(dynamic) {
        let members = segments
            .into_iter()
            .map(|segment| {
                if segment.contains("${") {
                    Member::Dynamic(segment.to_string())
                } else {
                    Member::Static(segment.to_string())
                }
            })
            .collect();
        return (name, AttributeValue::List(members));
    }

    if value.contains("${") {
        (name, AttributeValue::Dynamic(value.to_string()))
    } else {
        (name, AttributeValue::Static(value.to_string()))
    }
}

fn is_event_name(name: &str) -> bool {
    name.starts_with('@') || (name.len() > 2 && name.starts_with("on"))
}

/// Inner text when `value` is exactly one `${...}` segment.
fn whole_interpolation(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    let bytes = trimmed.as_bytes();
    if !starts_interpolation(bytes, 0) || skip_interpolation(bytes, 0) != Some(bytes.len()) {
        return None;
    }
    Some(&trimmed[2..trimmed.len() - 1])
}

/// `{ color: state.c, "font-size": "12px" }` split into members.
fn object_members(expr: &str) -> Option<Vec<(String, Member<String>)>> {
    let body = expr.trim().strip_prefix('{')?.strip_suffix('}')?;
    let bytes = body.as_bytes();
    let mut members = Vec::new();

    for (start, end) in split_top_level(bytes, 0, bytes.len(), b',') {
        let member = body[start..end].trim();
        if member.is_empty() {
            continue;
        }
        let member_bytes = member.as_bytes();
        let Some(colon) = find_top_level(member_bytes, 0, member_bytes.len(), b':') else {
            // Shorthand `{ color }`.
            let key = ident_end(member_bytes, 0).filter(|end| *end == member.len())?;
            members.push((
                member[..key].to_string(),
                Member::Dynamic(format!("${{{member}}}")),
            ));
            continue;
        };
        let key = member[..colon].trim();
        let key = string_literal_body(key).unwrap_or(key);
        if key.is_empty() {
            return None;
        }
        let value = member[colon + 1..].trim();
        let value = match string_literal_body(value) {
            Some(text) => Member::Static(text.to_string()),
            None => Member::Dynamic(format!("${{{value}}}")),
        };
        members.push((key.to_string(), value));
    }
    Some(members)
}

/// Whitespace-separated segments; whitespace inside `${...}` does not split.
fn segments(value: &str) -> Vec<&str> {
    let bytes = value.as_bytes();
    let mut out = Vec::new();
    let mut i = 0usize;
    while i < bytes.len() {
        i = skip_ws(bytes, i);
        if i >= bytes.len() {
            break;
        }
        let start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
            if starts_interpolation(bytes, i) {
                i = skip_interpolation(bytes, i).unwrap_or(bytes.len());
            } else {
                i += 1;
            }
        }
        out.push(&value[start..i]);
    }
    out
}

/// `state.<key>` chains that are assigned or incremented inside `handler`.
pub fn update_keys(handler: &str) -> Vec<String> {
    let bytes = handler.as_bytes();
    let mut keys: Vec<String> = Vec::new();
    let mut i = 0usize;

    while let Some(offset) = handler[i..].find("state.") {
        let at = i + offset;
        i = at + "state.".len();
        if at > 0 && (is_ident_part(bytes[at - 1]) || bytes[at - 1] == b'.') {
            continue;
        }

        let mut end = match ident_end(bytes, i) {
            Some(end) => end,
            None => continue,
        };
        while bytes.get(end) == Some(&b'.') {
            match ident_end(bytes, end + 1) {
                Some(next) => end = next,
                None => break,
            }
        }
        let key = &handler[i..end];
        i = end;

        let prefix = handler[..at].trim_end();
        let incremented = prefix.ends_with("++") || prefix.ends_with("--");
        if (incremented || assigns(bytes, end)) && !keys.iter().any(|existing| existing == key) {
            keys.push(key.to_string());
        }
    }
    keys
}

fn assigns(bytes: &[u8], pos: usize) -> bool {
    let p = skip_ws(bytes, pos);
    for op in [&b"++"[..], b"--", b"+=", b"-=", b"*=", b"/="] {
        if starts_with_at(bytes, p, op) {
            return true;
        }
    }
    starts_with_at(bytes, p, b"=") && !matches!(bytes.get(p + 1), Some(b'=' | b'>'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn when(guard: &str, negated: bool) -> AttributeValue<String> {
        AttributeValue::Boolean(BooleanValue::When {
            guard: guard.to_string(),
            negated,
        })
    }

    #[test]
    fn static_dynamic_and_bare_boolean() {
        let attrs = classify("<input type=\"text\" value=${state.name} disabled>");
        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs.get("type"), Some(&AttributeValue::Static("text".into())));
        assert_eq!(
            attrs.get("value"),
            Some(&AttributeValue::Dynamic("${state.name}".into()))
        );
        assert_eq!(
            attrs.get("disabled"),
            Some(&AttributeValue::Boolean(BooleanValue::Always))
        );
    }

    #[test]
    fn quoted_angle_brackets_stay_in_value() {
        let attrs = classify(r#"<div title="${flag ? "a > b" : "c < d"}">"#);
        assert_eq!(
            attrs.get("title"),
            Some(&AttributeValue::Dynamic(r#"${flag ? "a > b" : "c < d"}"#.into()))
        );
    }

    #[test]
    fn question_prefix_is_guarded_boolean() {
        let attrs = classify("<button ?hidden=${state.busy}>");
        assert_eq!(attrs.get("hidden"), Some(&when("state.busy", false)));
    }

    #[test]
    fn logical_toggle_names_attribute() {
        let attrs = classify("<option ${context.sel === item.id && \"selected\"}>");
        assert_eq!(
            attrs.get("selected"),
            Some(&when("context.sel === item.id", false))
        );
    }

    #[test]
    fn ternary_toggle_names_both_attributes() {
        let attrs = classify("<div ${state.open ? \"expanded\" : \"collapsed\"}>");
        assert_eq!(attrs.get("expanded"), Some(&when("state.open", false)));
        assert_eq!(attrs.get("collapsed"), Some(&when("state.open", true)));
    }

    #[test]
    fn chained_toggle_is_mutually_exclusive() {
        let attrs = classify("<i ${state.a ? \"one\" : state.b ? \"two\" : \"three\"}>");
        assert_eq!(attrs.get("one"), Some(&when("state.a", false)));
        assert_eq!(
            attrs.get("two"),
            Some(&when("!(state.a) && (state.b)", false))
        );
        assert_eq!(
            attrs.get("three"),
            Some(&when("state.a || state.b", true))
        );
    }

    #[test]
    fn events_keep_handler_and_collect_updates() {
        let attrs = classify(
            "<button onclick=${() => { state.count++; state.form.name = e.value; state.x == 1 }} @focus=\"${() => ++state.focus}\">",
        );
        match attrs.get("onclick") {
            Some(AttributeValue::Event {
                handler,
                update_keys,
            }) => {
                assert!(handler.starts_with("() => {"));
                assert_eq!(update_keys, &vec!["count".to_string(), "form.name".to_string()]);
            }
            other => panic!("expected event, found {other:?}"),
        }
        match attrs.get("@focus") {
            Some(AttributeValue::Event { update_keys, .. }) => {
                assert_eq!(update_keys, &vec!["focus".to_string()]);
            }
            other => panic!("expected event, found {other:?}"),
        }
    }

    #[test]
    fn object_values_split_members() {
        let attrs = classify("<p style=${{ color: state.c, \"font-size\": \"12px\", gap }}>");
        assert_eq!(
            attrs.get("style"),
            Some(&AttributeValue::Object(vec![
                ("color".into(), Member::Dynamic("${state.c}".into())),
                ("font-size".into(), Member::Static("12px".into())),
                ("gap".into(), Member::Dynamic("${gap}".into())),
            ]))
        );
    }

    #[test]
    fn multi_segment_values_become_lists() {
        let attrs = classify("<a class=\"btn ${state.kind} ${state.on ? 'on' : 'off'}\" rel=\"a b\">");
        assert_eq!(
            attrs.get("class"),
            Some(&AttributeValue::List(vec![
                Member::Static("btn".into()),
                Member::Dynamic("${state.kind}".into()),
                Member::Dynamic("${state.on ? 'on' : 'off'}".into()),
            ]))
        );
        assert_eq!(attrs.get("rel"), Some(&AttributeValue::Static("a b".into())));
    }

    #[test]
    fn fused_segment_stays_scalar() {
        let attrs = classify("<div id=\"row-${item.id}\">");
        assert_eq!(
            attrs.get("id"),
            Some(&AttributeValue::Dynamic("row-${item.id}".into()))
        );
    }

    #[test]
    fn namespaced_names_are_verbatim() {
        let attrs = classify("<use xlink:href=\"#icon\"/>");
        assert_eq!(
            attrs.get("xlink:href"),
            Some(&AttributeValue::Static("#icon".into()))
        );
        assert_eq!(attrs.len(), 1);
    }

    #[test]
    fn ambiguous_values_degrade_to_static() {
        let attrs = classify("<div a=\"ok\" b=");
        assert_eq!(attrs.get("a"), Some(&AttributeValue::Static("ok".into())));
        assert_eq!(attrs.get("b"), Some(&AttributeValue::Static("b=".into())));

        let attrs = classify("<div c='open d=1>");
        assert_eq!(attrs.get("c"), Some(&AttributeValue::Static("'open d=1".into())));

        let attrs = classify("<div ${state.weird()} e>");
        assert_eq!(
            attrs.get("${state.weird()}"),
            Some(&AttributeValue::Static("${state.weird()}".into()))
        );
        assert_eq!(attrs.get("e"), Some(&AttributeValue::Boolean(BooleanValue::Always)));
    }

    #[test]
    fn classify_tree_reaches_branches() {
        use crate::builder::build;
        use crate::control::merge;
        use crate::scanner::scan;

        let src = "${state.on ? html`<b id=\"x\"></b>` : html`<i hidden></i>`}";
        let mut nodes = build(&merge(src, &scan(src))).unwrap();
        classify_tree(&mut nodes);
        let Node::Condition(cond) = &nodes[0] else {
            panic!("expected condition");
        };
        let Node::Element(b) = &*cond.true_branch else {
            panic!("expected element");
        };
        assert_eq!(b.attributes.get("id"), Some(&AttributeValue::Static("x".into())));
        let Node::Element(i) = &*cond.false_branch else {
            panic!("expected element");
        };
        assert_eq!(
            i.attributes.get("hidden"),
            Some(&AttributeValue::Boolean(BooleanValue::Always))
        );
    }
}
