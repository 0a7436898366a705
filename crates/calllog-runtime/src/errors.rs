//! Controller error types.

use calllog_query::QueryError;
use calllog_settings::SettingsError;
use calllog_store::StoreError;
use calllog_tree::TreeError;
use thiserror::Error;

/// Errors surfaced by [`CallHistoryController`](crate::CallHistoryController).
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Store call outside a transaction failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The tree rejected the operation, e.g. an unsupported grouping mode.
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    /// A member lookup query failed.
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// Settings could not be loaded.
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    /// Row index past the end of the view.
    #[error("row {row} out of range (rows: {len})")]
    RowOutOfRange {
        /// Requested row.
        row: usize,
        /// Rows in the view.
        len: usize,
    },

    /// A mutation failed inside a transaction; the transaction was rolled back.
    #[error("{operation} rolled back: {source}")]
    Consistency {
        /// Which controller operation failed.
        operation: &'static str,
        /// The failing store call.
        #[source]
        source: StoreError,
    },

    /// The controller was dropped before answering a request.
    #[error("controller stopped")]
    Stopped,
}

/// Convenience type alias for controller results.
pub type Result<T> = std::result::Result<T, ControllerError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
