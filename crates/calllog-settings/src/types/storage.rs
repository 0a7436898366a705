//! Store, contact and logging settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Event store location and pool sizing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// Database path. A leading `~/` expands to `$HOME`.
    pub path: String,
    /// Connections in the pool.
    pub pool_size: u32,
    /// `SQLite` busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
}

impl StoreSettings {
    /// `path` with a leading `~/` expanded.
    pub fn resolved_path(&self) -> PathBuf {
        match self.path.strip_prefix("~/") {
            Some(rest) => crate::loader::home_dir().join(rest),
            None => PathBuf::from(&self.path),
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: "~/.calllog/calls.db".to_string(),
            pool_size: 4,
            busy_timeout_ms: 30_000,
        }
    }
}

/// Contact resolution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactSettings {
    /// Entries kept in the (local, remote) contact cache.
    pub cache_capacity: usize,
    /// Resolve contacts for inserted events that arrive without any.
    pub resolve_on_insert: bool,
}

impl Default for ContactSettings {
    fn default() -> Self {
        Self {
            cache_capacity: 1024,
            resolve_on_insert: true,
        }
    }
}

/// Log output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Filter directive passed to the subscriber (`warn`, `calllog_query=debug`, ...).
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: calllog_core::logging::DEFAULT_LEVEL.to_string(),
        }
    }
}
