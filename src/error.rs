//! Error types for the PDF engine.
//!
//! Resolution paths inside the engine report "absent or malformed" through the
//! [`Object::Undefined`](crate::object::Object::Undefined) sentinel. The variants
//! below surface only from top-level operations (open, save, page mutation,
//! rendering and explicit decode calls).

use crate::object::ObjectRef;

/// Result type alias for PDF engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while opening, navigating or saving a document.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// The lexer or parser could not produce a value at the cursor
    #[error("Malformed syntax at byte {offset}: {reason}")]
    MalformedSyntax {
        /// Byte offset where parsing failed
        offset: u64,
        /// Reason for the failure
        reason: String,
    },

    /// Object number has no entry, or the generation does not match
    #[error("Unresolved reference: {0}")]
    UnresolvedReference(ObjectRef),

    /// The supplied password does not match the stored hash
    #[error("Authentication failed: password does not match the document")]
    AuthenticationFailure,

    /// Corrupt or short filter input, or an unsupported parameter combination
    #[error("{filter} failed: {reason}")]
    FilterDecodeFailure {
        /// Filter name (e.g. "FlateDecode")
        filter: String,
        /// Reason for the failure
        reason: String,
    },

    /// A structural rule of the document does not hold
    #[error("Structural invariant violated: {0}")]
    StructuralInvariantViolation(String),

    /// Feature recognised but not implemented
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Missing or unreadable `%PDF-M.m` header
    #[error("Invalid PDF header: {0}")]
    InvalidHeader(String),

    /// Object has the wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// Nesting of references or forms went too deep
    #[error("Recursion depth limit exceeded (max: {0})")]
    RecursionLimitExceeded(u32),

    /// Byte source is larger than the configured limit
    #[error("File too large: {size} bytes (limit {limit})")]
    FileTooLarge {
        /// Actual size in bytes
        size: u64,
        /// Configured limit in bytes
        limit: u64,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a [`Error::MalformedSyntax`] value.
    pub fn malformed(offset: u64, reason: impl Into<String>) -> Self {
        Error::MalformedSyntax {
            offset,
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`Error::FilterDecodeFailure`] value.
    pub fn filter(filter: &str, reason: impl Into<String>) -> Self {
        Error::FilterDecodeFailure {
            filter: filter.to_string(),
            reason: reason.into(),
        }
    }
}
