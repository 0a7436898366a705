//! Query task state machine.
//!
//! A task moves `Queued → Executing → (Streaming)* → Finished`. At most one
//! task holds a cursor. The pipeline is driven by a single owner through
//! [`QueryPipeline::poll`]; only the [`TaskQueue`] is shared.
//!
//! Streamed tasks deliver `first_chunk_size` rows, then stall until
//! [`QueryPipeline::fetch_more`] asks for the next `chunk_size`. Other
//! tasks drain their cursor into a single batch.

use std::sync::Arc;

use calllog_core::CallEvent;
use calllog_store::{EventStore, FieldValue, QueryDescriptor, RowCursor, materialize_event};
use metrics::counter;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::errors::{QueryError, Result};
use crate::event::PipelineEvent;
use crate::queue::{QueryTask, TaskId, TaskQueue};

struct ActiveCursor {
    task: QueryTask,
    cursor: Box<dyn RowCursor>,
    delivered: usize,
    budget: usize,
    stalled_since: Option<Instant>,
}

/// How a chunk read ended.
enum Step {
    Boundary,
    End,
    Superseded,
    Failed(QueryError),
}

/// Runs query tasks against an [`EventStore`].
pub struct QueryPipeline {
    store: Arc<dyn EventStore>,
    queue: TaskQueue,
    config: PipelineConfig,
    active: Option<ActiveCursor>,
}

impl QueryPipeline {
    /// Idle pipeline with its own queue.
    pub fn new(store: Arc<dyn EventStore>, config: PipelineConfig) -> Self {
        Self {
            store,
            queue: TaskQueue::new(),
            config,
            active: None,
        }
    }

    /// Delivery configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Replace the configuration. Applies from the next dispatched task.
    pub fn set_config(&mut self, config: PipelineConfig) {
        self.config = config;
    }

    /// Handle for enqueueing from other threads.
    pub fn queue(&self) -> TaskQueue {
        self.queue.clone()
    }

    /// Queue a task. It runs on the next [`poll`](Self::poll); with
    /// queueing disabled it replaces whatever is active or pending.
    pub fn enqueue(&self, descriptor: QueryDescriptor) -> TaskId {
        self.queue.push(descriptor)
    }

    /// Task currently holding the cursor.
    pub fn active_task(&self) -> Option<TaskId> {
        self.active.as_ref().map(|a| a.task.id)
    }

    /// No active task and nothing queued.
    pub fn is_idle(&self) -> bool {
        self.active.is_none() && self.queue.is_empty()
    }

    /// Whether the active task is stalled at a chunk boundary.
    pub fn can_fetch_more(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| a.stalled_since.is_some())
    }

    /// When the stalled cursor should be released.
    pub fn idle_deadline(&self) -> Option<Instant> {
        let since = self.active.as_ref()?.stalled_since?;
        Some(since + self.config.idle_cursor_timeout)
    }

    /// Dispatch queued work and deliver rows until the pipeline stalls at
    /// a chunk boundary or runs out of tasks.
    pub async fn poll(&mut self) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        self.advance(&mut events).await;
        events
    }

    /// Resume a stalled task for one more chunk. Returns nothing when no
    /// task is stalled.
    pub async fn fetch_more(&mut self) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        let chunk_size = self.config.chunk_size;
        let Some(active) = self.active.as_mut().filter(|a| a.stalled_since.is_some()) else {
            return events;
        };
        active.stalled_since = None;
        active.budget = chunk_size;
        events.push(PipelineEvent::CanFetchMoreChanged {
            task: active.task.id,
            can_fetch_more: false,
        });
        self.advance(&mut events).await;
        events
    }

    /// Release a cursor that has been stalled past the idle timeout.
    pub async fn expire_idle_cursor(&mut self) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        let Some(since) = self.active.as_ref().and_then(|a| a.stalled_since) else {
            return events;
        };
        let idle = since.elapsed();
        if idle < self.config.idle_cursor_timeout {
            return events;
        }
        if let Some(active) = self.active.take() {
            let idle_ms = u64::try_from(idle.as_millis()).unwrap_or(u64::MAX);
            warn!(task_id = active.task.id, idle_ms, "stalled cursor expired");
            finish(active.task.id, Err(QueryError::CursorExpired { idle_ms }), &mut events);
        }
        self.advance(&mut events).await;
        events
    }

    /// Run every queued task to its terminal notification, continuing
    /// through chunk boundaries.
    pub async fn drain(&mut self) -> Vec<PipelineEvent> {
        let mut events = self.poll().await;
        while self.can_fetch_more() {
            events.extend(self.fetch_more().await);
        }
        events
    }

    /// Drop the active task and everything queued, each with a
    /// [`QueryError::Superseded`] terminal.
    pub fn abandon(&mut self) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        if let Some(active) = self.active.take() {
            finish(active.task.id, Err(QueryError::Superseded), &mut events);
        }
        for task in self.queue.drain() {
            finish(task.id, Err(QueryError::Superseded), &mut events);
        }
        events
    }

    // ── internals ──

    async fn advance(&mut self, events: &mut Vec<PipelineEvent>) {
        loop {
            if self.should_dispatch() {
                self.dispatch(events).await;
                continue;
            }
            let reading = self
                .active
                .as_ref()
                .is_some_and(|a| a.stalled_since.is_none());
            if !reading {
                return;
            }
            self.read_chunk(events).await;
        }
    }

    fn should_dispatch(&self) -> bool {
        !self.queue.is_empty() && (self.active.is_none() || !self.config.queue_enabled)
    }

    async fn dispatch(&mut self, events: &mut Vec<PipelineEvent>) {
        if let Some(previous) = self.active.take() {
            info!(task_id = previous.task.id, delivered = previous.delivered, "query superseded");
            finish(previous.task.id, Err(QueryError::Superseded), events);
        }
        if !self.config.queue_enabled {
            for stale in self.queue.drain_stale() {
                debug!(task_id = stale.id, "queued query superseded");
                finish(stale.id, Err(QueryError::Superseded), events);
            }
        }
        let Some(task) = self.queue.pop() else {
            return;
        };
        self.open(task, events).await;
    }

    #[instrument(skip_all, fields(task_id = task.id, kind = ?task.descriptor.kind()))]
    async fn open(&mut self, task: QueryTask, events: &mut Vec<PipelineEvent>) {
        match self.store.execute_query(&task.descriptor).await {
            Ok(cursor) => {
                debug!(total = ?cursor.total_rows(), "cursor opened");
                let budget = if self.config.is_streamed() {
                    self.config.first_chunk_size
                } else {
                    usize::MAX
                };
                self.active = Some(ActiveCursor {
                    task,
                    cursor,
                    delivered: 0,
                    budget,
                    stalled_since: None,
                });
            }
            Err(e) => {
                error!(error = %e, "query failed to open");
                finish(task.id, Err(e.into()), events);
            }
        }
    }

    async fn read_chunk(&mut self, events: &mut Vec<PipelineEvent>) {
        let replace_on_enqueue = !self.config.queue_enabled;
        let Some(ActiveCursor {
            task,
            cursor,
            delivered,
            budget,
            stalled_since,
        }) = self.active.as_mut()
        else {
            return;
        };

        let start = *delivered;
        let fields = task.descriptor.fields();
        let columns = task.descriptor.extra_columns();
        let mut records: Vec<CallEvent> = Vec::new();
        let mut extras: Vec<Vec<FieldValue>> = Vec::new();

        let step = loop {
            if records.len() >= *budget {
                break Step::Boundary;
            }
            if replace_on_enqueue && !self.queue.is_empty() {
                break Step::Superseded;
            }
            match cursor.next_row().await {
                None => break Step::End,
                Some(Err(e)) => break Step::Failed(QueryError::Store(e)),
                Some(Ok(row)) => match materialize_event(&row, fields) {
                    Ok(record) => {
                        records.push(record);
                        if !columns.is_empty() {
                            extras.push(row.extras);
                        }
                    }
                    Err(source) => {
                        break Step::Failed(QueryError::Materialize {
                            row: start + records.len(),
                            source,
                        });
                    }
                },
            }
        };

        let id = task.id;
        match step {
            Step::Superseded => {
                debug!(task_id = id, discarded = records.len(), "read interrupted by newer query");
                return;
            }
            Step::Failed(e) => {
                error!(task_id = id, error = %e, delivered = start, "query failed");
                self.active = None;
                finish(id, Err(e), events);
                return;
            }
            Step::Boundary | Step::End => {}
        }

        if !records.is_empty() {
            let end = start + records.len() - 1;
            counter!("calllog_query_rows_total").increment(records.len() as u64);
            debug!(task_id = id, start, end, "batch ready");
            *delivered = end + 1;
            events.push(PipelineEvent::Batch {
                task: id,
                start,
                end,
                records,
            });
            if !extras.is_empty() {
                events.push(PipelineEvent::Extras {
                    task: id,
                    start,
                    end,
                    columns: columns.to_vec(),
                    values: extras,
                });
            }
        }

        let total = cursor.total_rows();
        let delivered = *delivered;
        match step {
            Step::Boundary if total != Some(delivered) => {
                *stalled_since = Some(Instant::now());
                debug!(task_id = id, delivered, "cursor stalled at chunk boundary");
                events.push(PipelineEvent::CanFetchMoreChanged {
                    task: id,
                    can_fetch_more: true,
                });
            }
            Step::End if total.is_some_and(|expected| expected != delivered) => {
                let expected = total.unwrap_or_default();
                warn!(task_id = id, delivered, expected, "cursor ended early");
                self.active = None;
                finish(id, Err(QueryError::Truncated { delivered, expected }), events);
            }
            _ => {
                self.active = None;
                finish(id, Ok(delivered), events);
            }
        }
    }
}

/// Log, count and emit a task's terminal notification.
fn finish(task: TaskId, outcome: Result<usize>, events: &mut Vec<PipelineEvent>) {
    let label = match &outcome {
        Ok(rows) => {
            info!(task_id = task, rows, "query finished");
            "success"
        }
        Err(e) => e.label(),
    };
    counter!("calllog_query_tasks_total", "outcome" => label).increment(1);
    events.push(PipelineEvent::Finished { task, outcome });
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
