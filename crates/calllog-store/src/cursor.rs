//! Cursor over rows already held in memory.

use std::collections::VecDeque;

use async_trait::async_trait;

use crate::errors::Result;
use crate::row::RawRow;
use crate::traits::RowCursor;

/// A [`RowCursor`] over a fully fetched result set.
#[derive(Debug, Default)]
pub struct VecCursor {
    rows: VecDeque<RawRow>,
    total: usize,
}

impl VecCursor {
    /// Cursor yielding `rows` in order.
    pub fn new(rows: Vec<RawRow>) -> Self {
        let total = rows.len();
        Self {
            rows: rows.into(),
            total,
        }
    }

    /// Rows not yet yielded.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

#[async_trait]
impl RowCursor for VecCursor {
    async fn next_row(&mut self) -> Option<Result<RawRow>> {
        self.rows.pop_front().map(Ok)
    }

    fn total_rows(&self) -> Option<usize> {
        Some(self.total)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
