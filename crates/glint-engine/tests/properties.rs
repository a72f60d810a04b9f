// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::collections::BTreeSet;

use glint_engine::{
    build, classify_tree, merge, resolve, scan, Binding, CompileOptions, Node, ResolvedPath,
    StreamKind, TagKind, Template,
};

const SAMPLES: &[&str] = &[
    "<div></div>",
    "<ul>${context.list.map(name => html`<li>${name}</li>`)}</ul>",
    r#"<div title="${context.flag ? "a > b" : "c < d"}"></div>"#,
    "<section>${context.companies.map(company => html`<div>${company.departments.map(dept => html`<p>${company.id}: ${dept.name}</p>`)}</div>`)}</section>",
    r#"${context.a && state.b && html`<div class="x">y</div>`}"#,
    r#"<nav>${state.open ? html`<ul>${context.links.map((link, i) => html`<li data-i="${i}"><a href="${link.url}">${link.label}</a></li>`)}</ul>` : state.loading ? html`<p>Loading</p>` : html`<p>Closed</p>`}</nav>"#,
    r#"<form><input type="text" value=${state.name} ?disabled=${state.busy}><button onclick=${() => state.count++} ${state.primary ? "primary" : "secondary"}>Go</button></form>"#,
    r#"<p style=${{ color: state.color, margin: "0" }}>Hi ${context.user.name.toUpperCase()}!</p>"#,
    r#"<x-${context.kind} data-id="${context.id}"><br><img src="${context.src}"/></x-${context.kind}>"#,
    r#"<p class=${`row-${state.items[1].kind}`}>Item [2]: ${state.items[1]} ${context.table["k"].name}</p>"#,
];

fn compiled(source: &str) -> Template {
    Template::compile("sample", source)
        .unwrap_or_else(|err| panic!("sample failed to compile: {err}\n{source}"))
}

#[test]
fn open_and_close_tags_balance() {
    for source in SAMPLES {
        let stream = merge(source, &scan(source));
        let mut open = Vec::new();
        for token in &stream {
            let StreamKind::Tag(tag) = &token.kind else {
                continue;
            };
            match tag.kind {
                TagKind::Open => open.push(tag.name.clone()),
                TagKind::Close => {
                    let top = open.pop();
                    assert_eq!(top.as_deref(), Some(tag.name.as_str()), "{source}");
                }
                TagKind::SelfClosing | TagKind::Text => {}
            }
        }
        assert!(open.is_empty(), "unclosed tags {open:?} in {source}");
    }
}

#[test]
fn stream_covers_every_significant_byte() {
    for source in SAMPLES {
        let stream = merge(source, &scan(source));
        let mut covered = vec![false; source.len()];
        let mut last_start = 0;
        for token in &stream {
            assert!(token.span.start >= last_start, "stream out of order in {source}");
            last_start = token.span.start;
            for flag in &mut covered[token.span.start..token.span.end] {
                *flag = true;
            }
        }
        for (offset, byte) in source.bytes().enumerate() {
            assert!(
                covered[offset] || byte.is_ascii_whitespace(),
                "byte {offset} ({:?}) not covered in {source}",
                byte as char
            );
        }
    }
}

#[test]
fn resolution_is_idempotent() {
    let options = CompileOptions::default();
    for source in SAMPLES {
        let mut nodes = build(&merge(source, &scan(source))).unwrap();
        classify_tree(&mut nodes);
        let once = resolve(nodes, &options);
        let twice = resolve(once.clone(), &options);
        assert_eq!(once, twice, "{source}");
    }
}

fn check_scope_depth(node: &Node<Binding>, depth: usize, source: &str) {
    for binding in node.expressions() {
        for path in binding.paths() {
            if !matches!(path, ResolvedPath::Absolute { .. }) {
                assert!(path.ups() < depth, "{path} escapes {depth} scopes in {source}");
            }
        }
    }
    let inner = if matches!(node, Node::Map(_)) { depth + 1 } else { depth };
    for child in node.children() {
        check_scope_depth(child, inner, source);
    }
}

#[test]
fn relative_paths_stay_within_scope() {
    for source in SAMPLES {
        for root in compiled(source).nodes() {
            check_scope_depth(root, 0, source);
        }
    }
}

#[test]
fn placeholders_match_paths() {
    for source in SAMPLES {
        let template = compiled(source);
        for root in template.nodes() {
            root.visit(&mut |node| {
                for binding in node.expressions() {
                    let Binding::Expr(expr) = binding else {
                        continue;
                    };
                    let used: BTreeSet<usize> = expr.placeholders().into_iter().collect();
                    assert_eq!(used.len(), expr.paths.len(), "{} in {source}", expr.template);
                    assert!(used.iter().all(|index| *index < expr.paths.len()));
                    let distinct: BTreeSet<String> =
                        expr.paths.iter().map(ToString::to_string).collect();
                    assert_eq!(distinct.len(), expr.paths.len(), "{} in {source}", expr.template);
                }
            });
        }
        assert!(template.unresolved().is_empty(), "{source}");
    }
}
