//! Query pipeline error types.

use calllog_store::StoreError;
use thiserror::Error;

/// Why a query task finished without success.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Opening or reading the cursor failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A row did not match the task's field projection.
    #[error("row {row} could not be materialized: {source}")]
    Materialize {
        /// Zero-based row position.
        row: usize,
        /// Underlying decode error.
        #[source]
        source: StoreError,
    },

    /// A newer task replaced this one before it finished.
    #[error("superseded by a newer query")]
    Superseded,

    /// The cursor sat at a chunk boundary past the idle limit and was released.
    #[error("cursor idle for {idle_ms} ms, released")]
    CursorExpired {
        /// How long the cursor had been stalled.
        idle_ms: u64,
    },

    /// The cursor ended before the row count it announced.
    #[error("cursor ended after {delivered} of {expected} rows")]
    Truncated {
        /// Rows delivered.
        delivered: usize,
        /// Rows the cursor announced.
        expected: usize,
    },
}

impl QueryError {
    /// Short label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Store(_) => "store",
            Self::Materialize { .. } => "materialize",
            Self::Superseded => "superseded",
            Self::CursorExpired { .. } => "expired",
            Self::Truncated { .. } => "truncated",
        }
    }
}

/// Convenience type alias for query results.
pub type Result<T> = std::result::Result<T, QueryError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn store_error_converts() {
        let err: QueryError = StoreError::Internal("gone".into()).into();
        assert_eq!(err.label(), "store");
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn materialize_keeps_source() {
        let err = QueryError::Materialize {
            row: 3,
            source: StoreError::MalformedRow("bad width".into()),
        };
        assert!(err.to_string().starts_with("row 3"));
        assert!(err.source().is_some());
    }

    #[test]
    fn labels() {
        assert_eq!(QueryError::Superseded.label(), "superseded");
        assert_eq!(QueryError::CursorExpired { idle_ms: 5 }.label(), "expired");
        assert_eq!(
            QueryError::Truncated { delivered: 1, expected: 2 }.to_string(),
            "cursor ended after 1 of 2 rows"
        );
    }
}
