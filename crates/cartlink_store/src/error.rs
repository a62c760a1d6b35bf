//! Error types for storage tree operations.

use thiserror::Error;

/// Result type for storage tree operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during storage tree operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store would exceed its declared capacity.
    #[error("quota exceeded: store of {requested} bytes, {available} available")]
    QuotaExceeded {
        /// Bytes the rejected store would have added.
        requested: u64,
        /// Bytes still available under the quota.
        available: u64,
    },

    /// No leaf exists at the given path.
    #[error("path not found: {path}")]
    NotFound {
        /// The path that was requested.
        path: String,
    },

    /// The path is not addressable.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath {
        /// The offending path.
        path: String,
        /// Why the path was rejected.
        reason: String,
    },
}

impl StoreError {
    /// Creates a not-found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Creates an invalid-path error.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
