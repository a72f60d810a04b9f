// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::fmt;

use crate::ast::Span;
use thiserror::Error;

/// Unified error type for the template compiler.
///
/// Only structural failures abort a compile. Expression-level problems never
/// surface through this type during a normal compile; they degrade the
/// affected binding instead (see [`UnresolvedReason`]). `Resolve` exists for
/// callers that build paths by hand through the checked constructors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("structural error: {message}")]
    Structural {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        span: Option<Span>,
    },
    #[error("resolve error: {message}")]
    Resolve {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        span: Option<Span>,
    },
}

impl Error {
    pub fn structural(message: impl Into<String>, span: Option<Span>) -> Self {
        Error::Structural {
            message: message.into(),
            source: None,
            span,
        }
    }

    pub fn structural_with_span(message: impl Into<String>, span: Span) -> Self {
        Self::structural(message, Some(span))
    }

    pub fn resolve(message: impl Into<String>, span: Option<Span>) -> Self {
        Error::Resolve {
            message: message.into(),
            source: None,
            span,
        }
    }

    /// Span of the offending token, when known.
    pub fn span(&self) -> Option<Span> {
        match self {
            Error::Structural { span, .. } | Error::Resolve { span, .. } => *span,
        }
    }
}

/// Why a binding was kept as raw text instead of being resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UnresolvedReason {
    /// A reference starts with a name that is neither a root, a scope alias
    /// nor a configured alias.
    UnknownRoot(String),
    /// A scope-relative path would skip more frames than are active.
    ScopeDepth { ups: usize, depth: usize },
    /// An embedded expression never closes (`${` without `}`) or a string
    /// literal inside it is unterminated.
    Unbalanced,
    /// Literal code that a consumer would read as a placeholder, such as a
    /// computed `[0]` index on an opaque name.
    LiteralPlaceholder,
}

impl UnresolvedReason {
    /// Short, stable label used by telemetry attributes.
    pub fn kind(&self) -> &'static str {
        match self {
            UnresolvedReason::UnknownRoot(_) => "unknown_root",
            UnresolvedReason::ScopeDepth { .. } => "scope_depth",
            UnresolvedReason::Unbalanced => "unbalanced",
            UnresolvedReason::LiteralPlaceholder => "literal_placeholder",
        }
    }
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnresolvedReason::UnknownRoot(name) => write!(f, "unknown root `{name}`"),
            UnresolvedReason::ScopeDepth { ups, depth } => {
                write!(f, "path skips {ups} scopes but only {depth} are active")
            }
            UnresolvedReason::Unbalanced => write!(f, "unbalanced embedded expression"),
            UnresolvedReason::LiteralPlaceholder => {
                write!(f, "literal text reads as a placeholder")
            }
        }
    }
}
