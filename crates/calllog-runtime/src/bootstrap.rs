//! Wiring the controller to the `SQLite` store.

use std::sync::Arc;

use calllog_settings::CallLogSettings;
use calllog_store::sqlite::{ConnectionConfig, SqliteContactResolver, SqliteEventStore, new_file};
use tracing::info;

use crate::controller::CallHistoryController;
use crate::errors::Result;

/// Open the `SQLite` call store and contact resolver `settings` point at.
pub fn open_sqlite(
    settings: &CallLogSettings,
) -> Result<(Arc<SqliteEventStore>, Arc<SqliteContactResolver>)> {
    let config = ConnectionConfig {
        pool_size: settings.store.pool_size,
        busy_timeout_ms: settings.store.busy_timeout_ms,
    };
    let path = settings.store.resolved_path();
    let pool = new_file(&path, &config)?;
    let digits = settings.grouping.phone_match_digits;
    let store = SqliteEventStore::new(pool.clone(), digits)?;
    let resolver = SqliteContactResolver::new(pool, digits);
    info!(path = %path.display(), "call store opened");
    Ok((Arc::new(store), Arc::new(resolver)))
}

impl CallHistoryController {
    /// Controller over the `SQLite` store configured in `settings`.
    pub fn open(settings: &CallLogSettings) -> Result<Self> {
        let (store, resolver) = open_sqlite(settings)?;
        Ok(Self::new(store, resolver, settings))
    }

    /// Load settings from disk and the environment, then [`open`](Self::open).
    pub fn open_default() -> Result<Self> {
        let settings = calllog_settings::load_settings()?;
        Self::open(&settings)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
