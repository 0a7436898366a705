//! `SQLite`-backed [`EventStore`].
//!
//! Queries run on the blocking pool and are fully fetched into a
//! [`VecCursor`]. A transaction holds one pooled connection between
//! `BEGIN IMMEDIATE` and `COMMIT`/`ROLLBACK`; each mutation runs on the
//! blocking pool with that connection moved in and back out.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::broadcast;
use tracing::{debug, instrument, warn};

use calllog_core::{CallEvent, EventId};

use crate::change::ChangeSet;
use crate::cursor::VecCursor;
use crate::descriptor::{EventField, QueryDescriptor};
use crate::errors::{Result, StoreError};
use crate::row::project_event;
use crate::sqlite::calls::CallRepo;
use crate::sqlite::connection::{ConnectionPool, PooledConnection};
use crate::sqlite::schema::run_migrations;
use crate::traits::{EventStore, RowCursor, StoreTransaction};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

struct Shared {
    pool: ConnectionPool,
    match_digits: usize,
    changes: broadcast::Sender<ChangeSet>,
    sequence: AtomicU64,
}

/// Call store over an `SQLite` pool.
#[derive(Clone)]
pub struct SqliteEventStore {
    shared: Arc<Shared>,
}

impl SqliteEventStore {
    /// Open a store over `pool`, running pending migrations.
    ///
    /// `match_digits` must equal the digit count used to build the group
    /// keys sent in descriptors.
    pub fn new(pool: ConnectionPool, match_digits: usize) -> Result<Self> {
        {
            let mut conn = pool.get()?;
            let _ = run_migrations(&mut conn)?;
        }
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            shared: Arc::new(Shared {
                pool,
                match_digits,
                changes,
                sequence: AtomicU64::new(0),
            }),
        })
    }

    /// The underlying pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.shared.pool
    }

    /// Insert `events` in one transaction.
    pub async fn insert_calls(&self, events: &[CallEvent]) -> Result<ChangeSet> {
        let mut tx = self.begin().await?;
        for event in events {
            if let Err(e) = tx.insert_event(event).await {
                tx.rollback().await?;
                return Err(e);
            }
        }
        tx.commit().await
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    #[instrument(skip_all, fields(kind = ?descriptor.kind(), mode = %descriptor.mode()))]
    async fn execute_query(&self, descriptor: &QueryDescriptor) -> Result<Box<dyn RowCursor>> {
        let pool = self.shared.pool.clone();
        let descriptor = descriptor.clone();
        let rows = tokio::task::spawn_blocking(move || -> Result<_> {
            let conn = pool.get()?;
            let with_contacts = descriptor.fields().contains(&EventField::Contacts);
            let rows = CallRepo::query(&conn, &descriptor, with_contacts)?;
            Ok(rows
                .iter()
                .map(|row| {
                    let mut raw = project_event(&row.event, descriptor.fields());
                    raw.extras = row.extras(descriptor.extra_columns());
                    raw
                })
                .collect::<Vec<_>>())
        })
        .await??;

        debug!(rows = rows.len(), "query executed");
        metrics::counter!("calllog_store_queries_total").increment(1);
        Ok(Box::new(VecCursor::new(rows)))
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let pool = self.shared.pool.clone();
        let conn = tokio::task::spawn_blocking(move || -> Result<PooledConnection> {
            let conn = pool.get()?;
            conn.execute_batch("BEGIN IMMEDIATE")?;
            Ok(conn)
        })
        .await??;
        Ok(Box::new(SqliteTransaction {
            shared: Arc::clone(&self.shared),
            conn: Some(conn),
            changes: ChangeSet::default(),
        }))
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeSet> {
        self.shared.changes.subscribe()
    }
}

/// An open `SQLite` transaction.
struct SqliteTransaction {
    shared: Arc<Shared>,
    conn: Option<PooledConnection>,
    changes: ChangeSet,
}

impl SqliteTransaction {
    async fn run<T, F>(&mut self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, usize) -> Result<T> + Send + 'static,
    {
        let conn = self
            .conn
            .take()
            .ok_or_else(|| StoreError::Transaction("transaction already finished".into()))?;
        let digits = self.shared.match_digits;
        let (conn, result) = tokio::task::spawn_blocking(move || {
            let result = op(&conn, digits);
            (conn, result)
        })
        .await?;
        self.conn = Some(conn);
        result
    }
}

#[async_trait]
impl StoreTransaction for SqliteTransaction {
    async fn insert_event(&mut self, event: &CallEvent) -> Result<EventId> {
        let event = event.clone();
        let stored = self
            .run(move |conn, digits| {
                let id = CallRepo::insert(conn, &event, digits)?;
                CallRepo::get(conn, id)?.ok_or(StoreError::EventNotFound(id))
            })
            .await?;
        let id = stored.id;
        self.changes.added.push(stored);
        Ok(id)
    }

    async fn modify_event(&mut self, event: &CallEvent) -> Result<()> {
        let event = event.clone();
        let stored = self
            .run(move |conn, digits| {
                CallRepo::update(conn, &event, digits)?;
                CallRepo::get(conn, event.id)?.ok_or(StoreError::EventNotFound(event.id))
            })
            .await?;
        self.changes.push_modified(stored);
        Ok(())
    }

    async fn delete_event(&mut self, id: EventId) -> Result<()> {
        self.run(move |conn, _| CallRepo::delete(conn, id)).await?;
        self.changes.push_deleted(id);
        Ok(())
    }

    async fn mark_all_read(&mut self) -> Result<()> {
        let stored = self
            .run(|conn, _| {
                let ids = CallRepo::mark_all_read(conn)?;
                let mut stored = Vec::with_capacity(ids.len());
                for id in ids {
                    if let Some(event) = CallRepo::get(conn, id)? {
                        stored.push(event);
                    }
                }
                Ok(stored)
            })
            .await?;
        for event in stored {
            self.changes.push_modified(event);
        }
        Ok(())
    }

    async fn delete_all(&mut self) -> Result<()> {
        let _ = self.run(|conn, _| CallRepo::delete_all(conn)).await?;
        self.changes = ChangeSet {
            all_deleted: true,
            ..ChangeSet::default()
        };
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<ChangeSet> {
        self.run(|conn, _| Ok(conn.execute_batch("COMMIT")?)).await?;
        drop(self.conn.take());

        let mut changes = std::mem::take(&mut self.changes);
        changes.sequence = self.shared.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::counter!("calllog_store_commits_total").increment(1);
        debug!(
            sequence = changes.sequence,
            added = changes.added.len(),
            modified = changes.modified.len(),
            deleted = changes.deleted.len(),
            all_deleted = changes.all_deleted,
            "transaction committed"
        );
        if !changes.is_empty() {
            let _ = self.shared.changes.send(changes.clone());
        }
        Ok(changes)
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        self.run(|conn, _| Ok(conn.execute_batch("ROLLBACK")?)).await?;
        drop(self.conn.take());
        metrics::counter!("calllog_store_rollbacks_total").increment(1);
        debug!("transaction rolled back");
        Ok(())
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            warn!("transaction dropped while open, rolling back");
            if let Err(e) = conn.execute_batch("ROLLBACK") {
                warn!(error = %e, "rollback on drop failed");
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
