// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::fs;
use std::path::PathBuf;

use glint_document::{compile_document, outline, CompileOptions, Template};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct Fixture {
    name: String,
    template: String,
    #[serde(default)]
    options: CompileOptions,
    outline: String,
    #[serde(default)]
    document: Option<Value>,
}

#[test]
fn test_cases_outline_and_document() {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let root = manifest_dir
        .parent()
        .expect("workspace root missing")
        .parent()
        .expect("workspace root missing again");
    let path = root.join("test-cases/glint-document.json");
    let bytes = fs::read(&path).expect("test cases file missing");
    let cases: Vec<Fixture> = serde_json::from_slice(&bytes).expect("invalid test cases json");

    for case in cases {
        let template =
            Template::compile_with_options(&case.name, &case.template, case.options.clone())
                .unwrap_or_else(|err| panic!("compile {} failed: {}", case.name, err));
        assert_eq!(
            outline(template.nodes()),
            case.outline,
            "outline mismatch for {}",
            case.name
        );

        if let Some(expected) = case.document {
            let document = compile_document(&case.name, &case.template, case.options)
                .unwrap_or_else(|err| panic!("document {} failed: {}", case.name, err));
            assert_eq!(document, expected, "document mismatch for {}", case.name);
        }
    }
}

#[test]
fn compile_document_reports_structural_errors() {
    let err = compile_document("broken", "<div>", CompileOptions::default()).unwrap_err();
    assert!(err.to_string().contains("unclosed element <div>"));
}
