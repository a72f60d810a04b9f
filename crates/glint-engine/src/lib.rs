#![forbid(unsafe_code)]
// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Compiles HTML-shaped tagged templates into scope-resolved binding trees.
//!
//! A compile runs five passes over one immutable source string:
//!
//! 1. [`scan`] finds open, close and self-closing tags by byte offset.
//! 2. [`merge`] extracts `.map(...)`, ternary and `&&` constructs from the
//!    text between tags and interleaves them with the tags.
//! 3. [`build`] turns the merged stream into a node tree.
//! 4. [`classify_tree`] types every attribute.
//! 5. [`resolve`] rewrites expressions into placeholder templates over
//!    canonical data paths such as `/context/user/name` or `../[item]/id`.
//!
//! Structural problems abort the compile with an [`Error`]. Expressions that
//! cannot be resolved are kept as raw text and listed by
//! [`Template::unresolved`].

pub mod ast;
pub mod attributes;
pub mod binding;
pub mod builder;
pub mod control;
mod error;
pub mod options;
pub mod resolve;
pub mod scanner;
mod syntax;
pub mod telemetry;

pub use ast::{
    Attribute, AttributeValue, Attributes, BooleanValue, ConditionNode, ElementNode, LogicalNode,
    MapNode, Member, MetaNode, Node, Span, TextNode,
};
pub use attributes::{classify, classify_tree};
pub use binding::{Binding, BindingExpression, ResolvedPath, Root};
pub use builder::build;
pub use control::{merge, ControlExtractor, StreamKind, StreamToken};
pub use error::{Error, UnresolvedReason};
pub use options::CompileOptions;
pub use resolve::{resolve, ExprMode, Resolvable, Resolver, Scope};
pub use scanner::{scan, TagKind, TagToken, VOID_ELEMENTS};

use std::time::Instant;

/// A compiled template: its name, source and resolved node tree.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    source: String,
    options: CompileOptions,
    nodes: Vec<Node<Binding>>,
}

impl Template {
    /// Compiles `source` with default options.
    pub fn compile(name: &str, source: &str) -> Result<Self, Error> {
        Self::compile_with_options(name, source, CompileOptions::default())
    }

    /// Compiles `source`, resolving bare identifiers through `options`.
    pub fn compile_with_options(
        name: &str,
        source: &str,
        options: CompileOptions,
    ) -> Result<Self, Error> {
        let started = Instant::now();
        let result = compile_nodes(source, &options);
        telemetry::record_compile(name, source.len(), started.elapsed(), result.is_ok());
        let nodes = result?;
        Ok(Self {
            name: name.to_string(),
            source: source.to_string(),
            options,
            nodes,
        })
    }

    /// Returns the template name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the original template source.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Root nodes of the resolved tree, in document order.
    pub fn nodes(&self) -> &[Node<Binding>] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<Node<Binding>> {
        self.nodes
    }

    /// Every binding that was kept as raw text, in document order.
    pub fn unresolved(&self) -> Vec<(&str, &UnresolvedReason)> {
        let mut found = Vec::new();
        for root in &self.nodes {
            root.visit(&mut |node| {
                for binding in node.expressions() {
                    if let Binding::Unresolved { raw, reason } = binding {
                        found.push((raw.as_str(), reason));
                    }
                }
            });
        }
        found
    }
}

fn compile_nodes(source: &str, options: &CompileOptions) -> Result<Vec<Node<Binding>>, Error> {
    let tags = telemetry::timed("scan", || scan(source));
    let stream = telemetry::timed("merge", || merge(source, &tags));
    let mut nodes = telemetry::timed("build", || build(&stream))?;
    telemetry::timed("classify", || classify_tree(&mut nodes));
    Ok(telemetry::timed("resolve", || resolve(nodes, options)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_empty_element() {
        let tmpl = Template::compile("empty", "<div></div>").unwrap();
        assert_eq!(tmpl.name(), "empty");
        assert_eq!(tmpl.source(), "<div></div>");
        assert_eq!(tmpl.nodes().len(), 1);
        match &tmpl.nodes()[0] {
            Node::Element(div) => {
                assert_eq!(div.tag, "div");
                assert!(div.children.is_empty());
                assert!(div.attributes.is_empty());
            }
            other => panic!("expected element, found {other}"),
        }
    }

    #[test]
    fn structural_errors_abort() {
        let err = Template::compile("bad", "<div><p></div>").unwrap_err();
        assert!(matches!(err, Error::Structural { .. }));
        assert_eq!(err.span(), Some(Span::new(8, 14)));
    }

    #[test]
    fn unknown_roots_are_listed() {
        let tmpl = Template::compile(
            "partial",
            "<p title=\"${who.name}\">${context.ok} ${nope}</p>",
        )
        .unwrap();
        let unresolved = tmpl.unresolved();
        assert_eq!(unresolved.len(), 2);
        assert_eq!(unresolved[0].0, "${who.name}");
        assert_eq!(
            unresolved[1].1,
            &UnresolvedReason::UnknownRoot("nope".to_string())
        );
    }

    #[test]
    fn long_guard_chains_compile() {
        let chain: Vec<String> = (0..40).map(|n| format!("state.a{n}")).collect();
        let source = format!("<p>${{{}}}</p>", chain.join(" && "));
        let tmpl = Template::compile("chain", &source).unwrap();
        let Node::Element(p) = &tmpl.nodes()[0] else {
            panic!("expected p");
        };
        let Node::Text(text) = &p.children[0] else {
            panic!("expected text");
        };
        assert_eq!(text.content.paths().len(), 40);
        assert!(tmpl.unresolved().is_empty());
    }

    #[test]
    fn options_alias_bare_names() {
        let options = CompileOptions::new().with_alias("list", Root::Context);
        let tmpl = Template::compile_with_options(
            "aliased",
            "<ul>${list.map(name => html`<li>${name}</li>`)}</ul>",
            options,
        )
        .unwrap();
        assert!(tmpl.unresolved().is_empty());
        assert_eq!(tmpl.options().alias("list"), Some(Root::Context));
    }
}
