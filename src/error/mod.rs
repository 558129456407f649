//! Error types for parsing, validation, and XPath evaluation.
//!
//! All fallible operations in the crate surface one [`Error`]. Parse-time
//! errors carry a [`SourceLocation`] with 1-based line and column numbers
//! derived from the tokenizer.

use std::fmt;

use thiserror::Error;

/// Source location within an XML document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number (in characters, not bytes).
    pub column: u32,
}

impl SourceLocation {
    /// Creates a location from 1-based line and column numbers.
    #[must_use]
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The error type for every fallible operation in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The document violates an XML well-formedness constraint: syntax
    /// errors, duplicate attributes, mismatched end tags, illegal
    /// characters, malformed entities, unterminated constructs, or
    /// invalid UTF-8.
    #[error("not well-formed at {location}: {message}")]
    NotWellFormed {
        /// What went wrong, with a short excerpt where useful.
        message: String,
        /// Where in the input the error was detected.
        location: SourceLocation,
    },

    /// The document is well-formed but does not conform to its DTD.
    ///
    /// All invalidation messages collected during the parse are included;
    /// validation continues past the first failure.
    #[error("document is not valid: {}", messages.join("; "))]
    Invalid {
        /// Every invalidation reported before end of document.
        messages: Vec<String>,
    },

    /// A namespace constraint was violated: an unbound prefix, a
    /// redeclaration of a reserved prefix, or an `xmlns:xml` mismatch.
    #[error("namespace error at {location}: {message}")]
    Namespace {
        /// Description of the violated constraint.
        message: String,
        /// Where in the input the error was detected.
        location: SourceLocation,
    },

    /// An XPath expression failed to compile (syntax error or wrong
    /// argument count for a core function).
    #[error("invalid XPath expression at offset {position}: {message}")]
    XPathCompile {
        /// Description of the parse failure.
        message: String,
        /// 0-based byte offset into the expression source.
        position: usize,
    },

    /// An XPath expression failed at evaluation time: a type error,
    /// an undefined variable, or a union over non-node-sets.
    #[error("XPath evaluation error: {message}")]
    XPathEval {
        /// Description of the runtime failure.
        message: String,
    },

    /// An underlying reader or writer error, passed through.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// API misuse: inserting a node that already has a parent, adding a
    /// second element to a document, or similar structural violations.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl Error {
    /// Creates a well-formedness error at the given location.
    pub(crate) fn not_well_formed(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::NotWellFormed {
            message: message.into(),
            location,
        }
    }

    /// Creates a namespace error at the given location.
    pub(crate) fn namespace(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::Namespace {
            message: message.into(),
            location,
        }
    }

    /// Creates an XPath evaluation error.
    pub(crate) fn xpath_eval(message: impl Into<String>) -> Self {
        Self::XPathEval {
            message: message.into(),
        }
    }

    /// Creates an invariant-violation error.
    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
