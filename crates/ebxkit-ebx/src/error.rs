//! Error types for EBX parsing and emission.

use thiserror::Error;

/// Errors that can occur when reading or writing EBX payloads.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] ebxkit_common::Error),

    /// Unsupported partition version.
    #[error("unsupported EBX version: {0} (expected 2 or 4)")]
    UnsupportedVersion(u32),

    /// A table reference does not resolve within its table.
    #[error("{what} index {index} out of range (table size: {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: i64,
        len: usize,
    },

    /// A field kind outside the known TypeEnum range.
    #[error("unknown type kind: {0:#04x}")]
    UnknownTypeKind(u8),

    /// A construct this codec does not handle.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    /// The schema has no entry for a type hash.
    #[error("schema has no type for hash {0:#010x}")]
    SchemaMismatch(u32),

    /// A string-pool offset without a terminator inside pool bounds.
    #[error("corrupt string at pool offset {0:#010x}")]
    CorruptString(u32),

    /// The writer could not extract a property value from the graph.
    #[error("cannot extract property '{property}': expected {expected}")]
    PropertyExtraction {
        property: String,
        expected: &'static str,
    },

    /// The asset violates an emission precondition.
    #[error("invalid asset: {0}")]
    InvalidAsset(&'static str),
}

/// Result type for EBX operations.
pub type Result<T> = std::result::Result<T, Error>;
