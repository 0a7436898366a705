//! Notifications emitted by the pipeline.

use calllog_core::CallEvent;
use calllog_store::{ExtraColumn, FieldValue};

use crate::errors::Result;
use crate::queue::TaskId;

/// One pipeline notification. Every task produces zero or more batches and
/// exactly one [`PipelineEvent::Finished`].
#[derive(Debug)]
pub enum PipelineEvent {
    /// Records `start..=end` of the task's result set.
    Batch {
        /// Owning task.
        task: TaskId,
        /// Index of the first record.
        start: usize,
        /// Index of the last record.
        end: usize,
        /// Materialized records, in store order.
        records: Vec<CallEvent>,
    },
    /// Extra column values for the records of the preceding batch.
    Extras {
        /// Owning task.
        task: TaskId,
        /// Index of the first record.
        start: usize,
        /// Index of the last record.
        end: usize,
        /// Which columns `values` holds.
        columns: Vec<ExtraColumn>,
        /// One entry per record, aligned with `columns`.
        values: Vec<Vec<FieldValue>>,
    },
    /// The task stalled at a chunk boundary (`true`) or resumed (`false`).
    CanFetchMoreChanged {
        /// Owning task.
        task: TaskId,
        /// Whether [`fetch_more`](crate::QueryPipeline::fetch_more) would resume it.
        can_fetch_more: bool,
    },
    /// Terminal notification with the number of records delivered.
    Finished {
        /// Owning task.
        task: TaskId,
        /// Record count on success.
        outcome: Result<usize>,
    },
}

impl PipelineEvent {
    /// Task the notification belongs to.
    pub fn task(&self) -> TaskId {
        match self {
            Self::Batch { task, .. }
            | Self::Extras { task, .. }
            | Self::CanFetchMoreChanged { task, .. }
            | Self::Finished { task, .. } => *task,
        }
    }

    /// Whether this is the task's terminal notification.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished { .. })
    }
}
