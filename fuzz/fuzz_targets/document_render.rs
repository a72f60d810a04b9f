#![no_main]

use glint_document::{outline, to_document, CompileOptions, Root, Template};
use libfuzzer_sys::fuzz_target;
use once_cell::sync::Lazy;

static OPTIONS: Lazy<CompileOptions> = Lazy::new(|| {
    CompileOptions::new()
        .with_alias("items", Root::Context)
        .with_alias("user", Root::State)
});

fuzz_target!(|data: &[u8]| {
    let source = match std::str::from_utf8(data) {
        Ok(src) => src,
        Err(_) => return,
    };

    if let Ok(template) = Template::compile_with_options("fuzz-document", source, OPTIONS.clone()) {
        let _ = outline(template.nodes());
        let document = to_document(template.nodes());
        let _ = serde_json::to_string(&document);
    }
});
