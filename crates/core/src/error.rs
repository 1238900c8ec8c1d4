//! Base error model.

use thiserror::Error;

/// Result type used by the foundation layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Foundation-level error.
///
/// Business failures of the ledger itself (insufficient stock, invalid
/// quantities, ...) live in `stockflow-inventory`; this enum only covers what
/// the shared primitives can fail with.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The caller-supplied deadline elapsed before the operation could complete.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl DomainError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
