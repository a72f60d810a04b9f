// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::binding::Root;

/// Identifiers that are never treated as data references by default.
pub const DEFAULT_GLOBALS: [&str; 8] = [
    "Math", "JSON", "Number", "String", "Boolean", "Date", "Object", "Array",
];

/// Knobs for the data path resolver.
///
/// `aliases` maps bare identifiers onto a root, so `list` with
/// `list -> context` resolves to `/context/list`. `globals` are opaque names
/// such as `Math` whose member chains stay in the expression text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    pub aliases: BTreeMap<String, Root>,
    pub globals: Vec<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            aliases: BTreeMap::new(),
            globals: DEFAULT_GLOBALS.iter().map(|name| (*name).to_string()).collect(),
        }
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_alias(mut self, name: impl Into<String>, root: Root) -> Self {
        self.aliases.insert(name.into(), root);
        self
    }

    #[must_use]
    pub fn with_global(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.is_global(&name) {
            self.globals.push(name);
        }
        self
    }

    pub fn alias(&self, name: &str) -> Option<Root> {
        self.aliases.get(name).copied()
    }

    pub fn is_global(&self, name: &str) -> bool {
        self.globals.iter().any(|global| global == name)
    }

    /// Reads options from JSON, e.g. `{"aliases": {"list": "context"}}`.
    /// Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_include_standard_globals() {
        let options = CompileOptions::default();
        assert!(options.is_global("Math"));
        assert!(options.aliases.is_empty());
    }

    #[test]
    fn builder_methods_extend_options() {
        let options = CompileOptions::new()
            .with_alias("list", Root::Context)
            .with_global("Intl")
            .with_global("Math");
        assert_eq!(options.alias("list"), Some(Root::Context));
        assert!(options.is_global("Intl"));
        assert_eq!(
            options.globals.iter().filter(|name| *name == "Math").count(),
            1
        );
    }

    #[test]
    fn parses_partial_json() {
        let options = CompileOptions::from_json(r#"{"aliases": {"user": "state"}}"#).unwrap();
        assert_eq!(options.alias("user"), Some(Root::State));
        assert!(options.is_global("JSON"));

        let err = CompileOptions::from_json(r#"{"aliases": {"x": "nowhere"}}"#);
        assert!(err.is_err());
    }
}
