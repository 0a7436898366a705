//! Error types for event store operations.

use calllog_core::EventId;
use thiserror::Error;

/// Errors raised by event store implementations and row materialization.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool failure.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// A mutation referenced an event that does not exist.
    #[error("event not found: {0}")]
    EventNotFound(EventId),

    /// A query descriptor failed validation.
    #[error("invalid query descriptor: {0}")]
    InvalidDescriptor(String),

    /// A raw row could not be turned into a typed record.
    #[error("malformed row: {0}")]
    MalformedRow(String),

    /// A transaction was used after it ended or failed to begin/commit.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Anything else (blocking task panicked, channel closed).
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking task failed: {err}"))
    }
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
