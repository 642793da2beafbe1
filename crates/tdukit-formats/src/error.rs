//! Error types for structure parsing and writing

use tdukit_crypto::CryptoError;
use thiserror::Error;

/// Errors raised by the codec engine
///
/// Every variant is terminal for the parse or write that produced it.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Not enough bytes remaining in the input
    #[error("Truncated input at offset {offset}: needed {needed} bytes, {available} available")]
    TruncatedInput {
        /// Offset where the read started
        offset: usize,
        /// Number of bytes requested
        needed: usize,
        /// Number of bytes left
        available: usize,
    },

    /// Bytes left over after the last top-level field
    #[error("Trailing input: {remaining} bytes left after offset {offset}")]
    TrailingInput {
        /// Offset where parsing stopped
        offset: usize,
        /// Number of unread bytes
        remaining: usize,
    },

    /// Size is not usable for the requested conversion
    #[error("Invalid size {size}: {reason}")]
    InvalidSize {
        /// Offending size
        size: i64,
        /// What the size was needed for
        reason: &'static str,
    },

    /// Malformed textual input (hex strings, paths, literals)
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Formula placeholder could not be resolved against the store
    #[error("Unresolved reference '{reference}' in '{formula}'")]
    UnresolvedReference {
        /// Placeholder name
        reference: String,
        /// Formula being evaluated
        formula: String,
    },

    /// Formula or condition uses syntax outside the supported grammar
    #[error("Unsupported expression: {0}")]
    UnsupportedExpression(String),

    /// Constant field does not hold its declared bytes
    #[error("Constant mismatch at {path}: expected {expected}, found {actual}")]
    ConstantMismatch {
        /// Field path
        path: String,
        /// Declared bytes
        expected: String,
        /// Bytes found in the stream
        actual: String,
    },

    /// Pointer sources and targets disagree
    #[error("Link mismatch: {0}")]
    LinkMismatch(String),

    /// Address registered twice in the same role
    #[error("Duplicate {role} address 0x{address:08X} for {path} (already used by {existing})")]
    DuplicateAddress {
        /// "source" or "target"
        role: &'static str,
        /// Conflicting address
        address: u64,
        /// Path being registered
        path: String,
        /// Path already registered at that address
        existing: String,
    },

    /// Field present in the schema but absent from the store
    #[error("Missing field: {0}")]
    MissingField(String),

    /// Encoded value does not fit the resolved field size
    #[error("Size mismatch at {path}: resolved {expected} bytes, value needs {actual}")]
    SizeMismatch {
        /// Field path
        path: String,
        /// Resolved size
        expected: usize,
        /// Size required by the value
        actual: usize,
    },

    /// Writing a parsed buffer back did not reproduce it
    #[error("Round trip of '{schema}' differs at offset {offset}: read {expected} bytes, wrote {actual}")]
    RoundTripMismatch {
        /// Schema name
        schema: String,
        /// First differing offset, or the shorter length when only the lengths differ
        offset: usize,
        /// Length of the parsed buffer
        expected: usize,
        /// Length of the written buffer
        actual: usize,
    },

    /// Stored value has a different type than requested
    #[error("Type mismatch at {path}: expected {expected}, found {actual}")]
    TypeMismatch {
        /// Field path
        path: String,
        /// Requested value type
        expected: &'static str,
        /// Stored value type
        actual: &'static str,
    },

    /// Schema document is inconsistent
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// Stream cipher failure
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O failure while loading a schema
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, FormatError>;
