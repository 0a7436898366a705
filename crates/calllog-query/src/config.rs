//! Pipeline configuration.

use std::time::Duration;

use calllog_settings::{QueryMode, QuerySettings};

/// How the pipeline delivers rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Delivery mode.
    pub mode: QueryMode,
    /// Rows in the first streamed chunk.
    pub first_chunk_size: usize,
    /// Rows in each later streamed chunk.
    pub chunk_size: usize,
    /// Queue tasks behind the active one instead of replacing it.
    pub queue_enabled: bool,
    /// How long a stalled cursor may be held.
    pub idle_cursor_timeout: Duration,
}

impl PipelineConfig {
    /// Whether rows arrive in chunks with explicit continuation.
    pub fn is_streamed(&self) -> bool {
        self.mode.is_streamed()
    }

    /// Whether callers drive tasks to completion synchronously.
    pub fn is_sync(&self) -> bool {
        self.mode == QueryMode::Sync
    }

    /// Same settings with queueing switched on.
    #[must_use]
    pub fn queued(mut self) -> Self {
        self.queue_enabled = true;
        self
    }

    /// Same settings without chunking.
    #[must_use]
    pub fn unstreamed(mut self) -> Self {
        if self.mode.is_streamed() {
            self.mode = QueryMode::Async;
        }
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&QuerySettings::default())
    }
}

impl From<&QuerySettings> for PipelineConfig {
    fn from(settings: &QuerySettings) -> Self {
        Self {
            mode: settings.mode,
            first_chunk_size: settings.first_chunk_size.max(1),
            chunk_size: settings.chunk_size.max(1),
            queue_enabled: settings.queue_enabled,
            idle_cursor_timeout: settings.idle_cursor_timeout(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
