//! `SQLite` connection pool.
//!
//! Uses `r2d2` with the `r2d2_sqlite` backend. [`PragmaCustomizer`] runs on
//! every new connection.

use std::path::Path;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::errors::Result;

/// Pool of call store connections.
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// A connection checked out of the pool.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Pool sizing and pragmas.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Maximum pool size.
    pub pool_size: u32,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            pool_size: 4,
            busy_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug)]
struct PragmaCustomizer {
    busy_timeout_ms: u64,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;\
             PRAGMA busy_timeout = {};\
             PRAGMA synchronous = NORMAL;",
            self.busy_timeout_ms
        ))
    }
}

/// In-memory pool for tests.
///
/// Every in-memory connection is its own database, so the pool holds exactly
/// one connection regardless of `config.pool_size`.
pub fn new_in_memory(config: &ConnectionConfig) -> Result<ConnectionPool> {
    let pool = Pool::builder()
        .max_size(1)
        .connection_timeout(Duration::from_secs(5))
        .connection_customizer(Box::new(PragmaCustomizer {
            busy_timeout_ms: config.busy_timeout_ms,
        }))
        .build(SqliteConnectionManager::memory())?;
    Ok(pool)
}

/// File-backed pool. Creates parent directories as needed.
pub fn new_file(path: &Path, config: &ConnectionConfig) -> Result<ConnectionPool> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| crate::errors::StoreError::Internal(format!("create {parent:?}: {e}")))?;
    }
    let pool = Pool::builder()
        .max_size(config.pool_size.max(1))
        .connection_timeout(Duration::from_secs(5))
        .connection_customizer(Box::new(PragmaCustomizer {
            busy_timeout_ms: config.busy_timeout_ms,
        }))
        .build(SqliteConnectionManager::file(path))?;
    Ok(pool)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
