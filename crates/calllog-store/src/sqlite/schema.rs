//! Schema migrations for the call store.
//!
//! Each migration runs in its own transaction. `schema_version` records
//! what has been applied, so running the migrator twice is a no-op.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::errors::Result;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "calls and contacts tables",
        sql: "
            CREATE TABLE calls (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                start_time    INTEGER NOT NULL,
                end_time      INTEGER,
                direction     INTEGER NOT NULL,
                local_uid     TEXT    NOT NULL,
                remote_uid    TEXT    NOT NULL,
                remote_key    TEXT    NOT NULL,
                is_missed     INTEGER NOT NULL DEFAULT 0,
                is_video      INTEGER NOT NULL DEFAULT 0,
                is_read       INTEGER NOT NULL DEFAULT 0,
                last_modified INTEGER
            );
            CREATE INDEX idx_calls_start ON calls (start_time DESC, id DESC);
            CREATE INDEX idx_calls_channel ON calls (local_uid, remote_key, is_video);

            CREATE TABLE contacts (
                id         INTEGER NOT NULL,
                name       TEXT    NOT NULL,
                remote_uid TEXT    NOT NULL,
                remote_key TEXT    NOT NULL,
                PRIMARY KEY (id, remote_uid)
            );
            CREATE INDEX idx_contacts_key ON contacts (remote_key);
        ",
    },
];

/// Apply pending migrations; returns how many ran.
pub fn run_migrations(conn: &mut Connection) -> Result<u32> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
    )?;
    let current: u32 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| {
            row.get(0)
        })?;

    let mut applied = 0;
    for migration in MIGRATIONS {
        if migration.version <= current {
            debug!(version = migration.version, "migration already applied");
            continue;
        }
        info!(
            version = migration.version,
            description = migration.description,
            "applying migration"
        );
        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)?;
        let _ = tx.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?1, strftime('%s', 'now'))",
            [migration.version],
        )?;
        tx.commit()?;
        applied += 1;
    }
    Ok(applied)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(run_migrations(&mut conn).unwrap(), MIGRATIONS.len() as u32);
        assert_eq!(run_migrations(&mut conn).unwrap(), 0);

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('calls', 'contacts')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 2);
    }
}
