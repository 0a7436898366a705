//! Scripted store doubles for pipeline tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use calllog_core::{CallEvent, Direction, EventId};
use calllog_store::{
    ChangeSet, EventField, EventStore, FieldValue, QueryDescriptor, RawRow, Result, RowCursor,
    StoreError, StoreTransaction, project_event,
};
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::broadcast;

/// Event `id`, one minute apart, newest id first in time.
pub fn event(id: EventId) -> CallEvent {
    CallEvent::new(
        id,
        "ring/tel/ring",
        format!("+1555000{id:04}"),
        Direction::Inbound,
        Utc.timestamp_opt(1_700_000_000 + id * 60, 0).unwrap(),
    )
}

/// Full-projection rows for ids `1..=n`.
pub fn rows(n: i64) -> Vec<RawRow> {
    (1..=n)
        .map(|id| project_event(&event(id), &EventField::ALL))
        .collect()
}

/// What one `execute_query` call does.
#[derive(Debug)]
pub enum Script {
    /// Opening the cursor fails.
    OpenFailure(String),
    /// Cursor over `rows`.
    Rows {
        rows: Vec<RawRow>,
        /// Reported total; defaults to `rows.len()`.
        total: Option<Option<usize>>,
        /// Yield an error instead of the row at this index.
        fail_at: Option<usize>,
        /// Sleep before each row.
        delay: Option<Duration>,
    },
}

impl Script {
    pub fn rows(rows: Vec<RawRow>) -> Self {
        Self::Rows {
            rows,
            total: None,
            fail_at: None,
            delay: None,
        }
    }

    pub fn with_total(mut self, reported: Option<usize>) -> Self {
        if let Self::Rows { total, .. } = &mut self {
            *total = Some(reported);
        }
        self
    }

    pub fn failing_at(mut self, index: usize) -> Self {
        if let Self::Rows { fail_at, .. } = &mut self {
            *fail_at = Some(index);
        }
        self
    }

    pub fn slow(mut self, per_row: Duration) -> Self {
        if let Self::Rows { delay, .. } = &mut self {
            *delay = Some(per_row);
        }
        self
    }
}

/// Store answering queries from a list of scripts, in order. Queries past
/// the end of the list get an empty cursor.
pub struct ScriptedStore {
    scripts: Mutex<VecDeque<Script>>,
    seen: Mutex<Vec<QueryDescriptor>>,
    changes: broadcast::Sender<ChangeSet>,
}

impl ScriptedStore {
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        let (changes, _) = broadcast::channel(8);
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            seen: Mutex::new(Vec::new()),
            changes,
        })
    }

    /// Descriptors passed to `execute_query`, in call order.
    pub fn queries(&self) -> Vec<QueryDescriptor> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl EventStore for ScriptedStore {
    async fn execute_query(&self, descriptor: &QueryDescriptor) -> Result<Box<dyn RowCursor>> {
        self.seen.lock().push(descriptor.clone());
        let script = self
            .scripts
            .lock()
            .pop_front()
            .unwrap_or_else(|| Script::rows(Vec::new()));
        match script {
            Script::OpenFailure(reason) => Err(StoreError::Internal(reason)),
            Script::Rows {
                rows,
                total,
                fail_at,
                delay,
            } => Ok(Box::new(ScriptedCursor {
                total: total.unwrap_or(Some(rows.len())),
                rows: rows.into(),
                position: 0,
                fail_at,
                delay,
            })),
        }
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        Err(StoreError::Transaction("scripted store is read-only".into()))
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeSet> {
        self.changes.subscribe()
    }
}

struct ScriptedCursor {
    rows: VecDeque<RawRow>,
    total: Option<usize>,
    position: usize,
    fail_at: Option<usize>,
    delay: Option<Duration>,
}

#[async_trait]
impl RowCursor for ScriptedCursor {
    async fn next_row(&mut self) -> Option<Result<RawRow>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_at == Some(self.position) {
            self.position += 1;
            return Some(Err(StoreError::Internal("connection reset".into())));
        }
        let row = self.rows.pop_front()?;
        self.position += 1;
        Some(Ok(row))
    }

    fn total_rows(&self) -> Option<usize> {
        self.total
    }
}

/// A row whose id column holds text.
pub fn malformed_row() -> RawRow {
    let mut row = project_event(&event(99), &EventField::ALL);
    row.values[0] = FieldValue::Text("not an id".into());
    row
}
