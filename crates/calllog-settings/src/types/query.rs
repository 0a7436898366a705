//! Query pipeline settings.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::SettingsError;

/// How query results are delivered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryMode {
    /// Rows arrive asynchronously and are delivered in one batch.
    #[default]
    Async,
    /// Rows arrive asynchronously in bounded chunks; the pipeline stalls at
    /// each chunk boundary until the caller asks for more.
    StreamedAsync,
    /// Rows are pulled eagerly until the task finishes. Test use only.
    Sync,
}

impl QueryMode {
    /// Whether chunk boundaries apply.
    pub fn is_streamed(self) -> bool {
        self == Self::StreamedAsync
    }

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Async => "async",
            Self::StreamedAsync => "streamedAsync",
            Self::Sync => "sync",
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryMode {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "async" => Ok(Self::Async),
            "streamedAsync" => Ok(Self::StreamedAsync),
            "sync" => Ok(Self::Sync),
            other => Err(SettingsError::InvalidValue(format!(
                "unknown query mode: {other}"
            ))),
        }
    }
}

/// Query pipeline behavior.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuerySettings {
    /// Delivery mode.
    pub mode: QueryMode,
    /// Rows in the first streamed chunk.
    pub first_chunk_size: usize,
    /// Rows in every later streamed chunk.
    pub chunk_size: usize,
    /// Whether the pipeline keeps dispatching queued tasks on its own
    /// after each terminal notification.
    pub queue_enabled: bool,
    /// How long a cursor may sit at a chunk boundary before it is disposed.
    pub idle_cursor_timeout_ms: u64,
    /// Maximum rows a query may return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl QuerySettings {
    /// Idle cursor bound as a `Duration`.
    pub fn idle_cursor_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_cursor_timeout_ms)
    }
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            mode: QueryMode::Async,
            first_chunk_size: 25,
            chunk_size: 50,
            queue_enabled: false,
            idle_cursor_timeout_ms: 30_000,
            limit: None,
        }
    }
}
