//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Unexpected end of input.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Invalid UTF-8 in a text or key field.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// Structurally invalid or non-canonical input.
    #[error("invalid record structure: {message}")]
    InvalidStructure {
        /// Description of the structural error.
        message: String,
    },

    /// A claimed length or element count exceeds the decoder limit.
    #[error("size limit exceeded: claimed {claimed}, max allowed {max_allowed}")]
    SizeLimitExceeded {
        /// The length claimed by the input.
        claimed: u64,
        /// The maximum the decoder allows.
        max_allowed: u64,
    },

    /// Integer field does not fit in an i64.
    #[error("integer overflow")]
    IntegerOverflow,

    /// Bytes remain after the top-level value.
    #[error("trailing bytes after value")]
    TrailingBytes,
}

impl CodecError {
    /// Create an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }
}
