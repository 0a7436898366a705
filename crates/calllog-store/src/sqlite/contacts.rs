//! Contact table and the `SQLite`-backed [`ContactResolver`].

use async_trait::async_trait;
use rusqlite::{Connection, params};
use tokio::sync::broadcast;
use tracing::debug;

use calllog_core::ContactRef;
use calllog_core::address::minimize_remote;

use crate::change::ContactChange;
use crate::errors::Result;
use crate::sqlite::connection::ConnectionPool;
use crate::traits::ContactResolver;

/// Contact table operations.
pub struct ContactRepo;

impl ContactRepo {
    /// Contacts attached to a minimized remote address.
    pub fn for_remote_key(conn: &Connection, remote_key: &str) -> Result<Vec<ContactRef>> {
        let mut stmt = conn.prepare_cached(
            "SELECT DISTINCT id, name FROM contacts WHERE remote_key = ?1 ORDER BY id",
        )?;
        let contacts = stmt
            .query_map([remote_key], |row| {
                Ok(ContactRef {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(contacts)
    }

    /// Replace the addresses of contact `id`.
    pub fn upsert(
        conn: &Connection,
        id: i64,
        name: &str,
        remote_uids: &[String],
        digits: usize,
    ) -> Result<()> {
        let _ = conn.execute("DELETE FROM contacts WHERE id = ?1", [id])?;
        for remote in remote_uids {
            let _ = conn.execute(
                "INSERT INTO contacts (id, name, remote_uid, remote_key) VALUES (?1, ?2, ?3, ?4)",
                params![id, name, remote, minimize_remote(remote, digits)],
            )?;
        }
        Ok(())
    }

    /// Remove contact `id`; returns the addresses it had.
    pub fn remove(conn: &Connection, id: i64) -> Result<Vec<String>> {
        let mut stmt = conn.prepare("SELECT remote_uid FROM contacts WHERE id = ?1")?;
        let remotes = stmt
            .query_map([id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        let _ = conn.execute("DELETE FROM contacts WHERE id = ?1", [id])?;
        Ok(remotes)
    }
}

/// Resolves contacts from the call store's contact table.
pub struct SqliteContactResolver {
    pool: ConnectionPool,
    match_digits: usize,
    changes: broadcast::Sender<ContactChange>,
}

impl SqliteContactResolver {
    /// Resolver over `pool`, matching phone numbers by `match_digits` digits.
    ///
    /// The pool must already carry the call store schema.
    pub fn new(pool: ConnectionPool, match_digits: usize) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            pool,
            match_digits,
            changes,
        }
    }

    /// Add or replace a contact and notify subscribers.
    pub async fn upsert_contact(&self, id: i64, name: &str, remote_uids: Vec<String>) -> Result<()> {
        let pool = self.pool.clone();
        let digits = self.match_digits;
        let name = name.to_string();
        let before = tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
            let conn = pool.get()?;
            let before = ContactRepo::remove(&conn, id)?;
            ContactRepo::upsert(&conn, id, &name, &remote_uids, digits)?;
            Ok(before.into_iter().chain(remote_uids).collect())
        })
        .await??;
        self.notify(id, before);
        Ok(())
    }

    /// Remove a contact and notify subscribers.
    pub async fn remove_contact(&self, id: i64) -> Result<()> {
        let pool = self.pool.clone();
        let remotes = tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
            let conn = pool.get()?;
            ContactRepo::remove(&conn, id)
        })
        .await??;
        self.notify(id, remotes);
        Ok(())
    }

    fn notify(&self, contact_id: i64, mut remote_uids: Vec<String>) {
        remote_uids.sort();
        remote_uids.dedup();
        debug!(contact_id, addresses = remote_uids.len(), "contact changed");
        let _ = self.changes.send(ContactChange {
            contact_id,
            remote_uids,
        });
    }
}

#[async_trait]
impl ContactResolver for SqliteContactResolver {
    async fn resolve_contacts(&self, _local_uid: &str, remote_uid: &str) -> Result<Vec<ContactRef>> {
        let pool = self.pool.clone();
        let key = minimize_remote(remote_uid, self.match_digits);
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            ContactRepo::for_remote_key(&conn, &key)
        })
        .await?
    }

    fn subscribe(&self) -> broadcast::Receiver<ContactChange> {
        self.changes.subscribe()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::connection::{ConnectionConfig, new_in_memory};
    use crate::sqlite::schema::run_migrations;

    fn resolver() -> SqliteContactResolver {
        let pool = new_in_memory(&ConnectionConfig::default()).unwrap();
        let _ = run_migrations(&mut pool.get().unwrap()).unwrap();
        SqliteContactResolver::new(pool, 7)
    }

    #[tokio::test]
    async fn resolves_by_minimized_address() {
        let resolver = resolver();
        resolver
            .upsert_contact(1, "Alice", vec!["+1 555 123 4567".into()])
            .await
            .unwrap();

        let found = resolver.resolve_contacts("ring/tel/ring", "5551234567").await.unwrap();
        assert_eq!(
            found,
            vec![ContactRef {
                id: 1,
                name: "Alice".into()
            }]
        );
        assert!(resolver.resolve_contacts("x", "5559999999").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn changes_are_broadcast() {
        let resolver = resolver();
        let mut rx = resolver.subscribe();

        resolver
            .upsert_contact(2, "Bob", vec!["5550001111".into()])
            .await
            .unwrap();
        resolver
            .upsert_contact(2, "Bob", vec!["5550002222".into()])
            .await
            .unwrap();
        resolver.remove_contact(2).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().remote_uids, vec!["5550001111"]);
        assert_eq!(
            rx.recv().await.unwrap().remote_uids,
            vec!["5550001111", "5550002222"]
        );
        assert_eq!(rx.recv().await.unwrap().remote_uids, vec!["5550002222"]);
        assert!(resolver.resolve_contacts("x", "5550002222").await.unwrap().is_empty());
    }
}
