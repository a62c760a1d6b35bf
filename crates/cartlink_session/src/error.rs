//! Error types for link sessions.

use cartlink_codec::CodecError;
use cartlink_store::StoreError;
use thiserror::Error;

/// Result type for link operations.
pub type LinkResult<T> = Result<T, LinkError>;

/// Errors that can occur during link operations.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The operation requires an established session.
    #[error("not connected to the link service")]
    NotConnected,

    /// The service refused the connection attempt.
    #[error("connection refused by the link service")]
    ConnectionRefused,

    /// A storage operation failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// A payload failed to encode or decode.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl LinkError {
    /// Returns true when the error is the quota being exhausted.
    #[must_use]
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::Store(StoreError::QuotaExceeded { .. }))
    }

    /// Returns true when the error is a missing path.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(StoreError::NotFound { .. }))
    }
}
