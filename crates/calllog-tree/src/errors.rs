//! Tree error types.

use calllog_core::GroupingMode;
use thiserror::Error;

/// Errors returned by tree mutations. A failed mutation leaves the tree
/// untouched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    /// The grouping mode has no incremental edit rules.
    #[error("grouping mode {0} does not support incremental edits")]
    UnsupportedMode(GroupingMode),

    /// A row index past the last top-level row.
    #[error("row {row} out of range ({len} rows)")]
    RowOutOfRange {
        /// Requested row.
        row: usize,
        /// Current top-level row count.
        len: usize,
    },
}

/// Convenience type alias for tree results.
pub type Result<T> = std::result::Result<T, TreeError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
