// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::fs;
use std::path::PathBuf;

use glint_engine::{Binding, CompileOptions, Template};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct EngineCase {
    name: String,
    template: String,
    #[serde(default)]
    options: CompileOptions,
    /// Every resolved path, in document order.
    #[serde(default)]
    paths: Vec<String>,
    #[serde(default)]
    unresolved: usize,
    #[serde(default)]
    error: Option<String>,
}

fn resolved_paths(template: &Template) -> Vec<String> {
    let mut paths = Vec::new();
    for root in template.nodes() {
        root.visit(&mut |node| {
            for binding in node.expressions() {
                paths.extend(binding.paths().iter().map(ToString::to_string));
            }
        });
    }
    paths
}

#[test]
fn engine_test_cases_resolve_expected_paths() {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let root = manifest_dir
        .parent()
        .expect("workspace root missing")
        .parent()
        .expect("workspace root missing");
    let path = root.join("test-cases/glint-engine.json");
    let bytes = fs::read(&path).expect("missing engine test cases");
    let cases: Vec<EngineCase> = serde_json::from_slice(&bytes).expect("invalid engine test cases");
    assert!(!cases.is_empty());

    for case in cases {
        let result = Template::compile_with_options(&case.name, &case.template, case.options);

        let template = match (result, case.error.as_ref()) {
            (Ok(template), None) => template,
            (Ok(_), Some(expected_err)) => {
                panic!("{} expected error '{}' but compiled", case.name, expected_err)
            }
            (Err(err), Some(expected_err)) => {
                let msg = err.to_string();
                assert!(
                    msg.contains(expected_err),
                    "{} expected error containing '{}', got '{}'",
                    case.name,
                    expected_err,
                    msg
                );
                assert!(err.span().is_some(), "{} error carries no span", case.name);
                continue;
            }
            (Err(err), None) => panic!("compile {} failed: {}", case.name, err),
        };

        assert_eq!(resolved_paths(&template), case.paths, "case {} paths", case.name);
        assert_eq!(
            template.unresolved().len(),
            case.unresolved,
            "case {} unresolved bindings",
            case.name
        );
    }
}

#[test]
fn unresolved_bindings_keep_raw_text() {
    let template = Template::compile("raw", "<p>${user.name}</p>").unwrap();
    let mut raw = Vec::new();
    for root in template.nodes() {
        root.visit(&mut |node| {
            for binding in node.expressions() {
                if let Binding::Unresolved { raw: text, .. } = binding {
                    raw.push(text.clone());
                }
            }
        });
    }
    assert_eq!(raw, vec!["${user.name}".to_string()]);
}
