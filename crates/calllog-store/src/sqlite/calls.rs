//! Call table repository. Stateless; every function takes a `&Connection`.

use std::collections::HashMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use calllog_core::address::minimize_remote;
use calllog_core::{CallEvent, CallType, ContactRef, Direction, EventId};

use crate::descriptor::{ExtraColumn, QueryDescriptor, QueryKind};
use crate::errors::{Result, StoreError};
use crate::row::FieldValue;
use crate::sqlite::contacts::ContactRepo;

/// A stored call with its channel aggregates.
#[derive(Clone, Debug)]
pub struct CallRow {
    /// The call.
    pub event: CallEvent,
    /// Calls sharing this call's channel.
    pub channel_total: i64,
    /// Unread calls sharing this call's channel.
    pub channel_unread: i64,
}

impl CallRow {
    /// Extra column values in descriptor order.
    pub fn extras(&self, columns: &[ExtraColumn]) -> Vec<FieldValue> {
        columns
            .iter()
            .map(|c| match c {
                ExtraColumn::ChannelTotal => FieldValue::Integer(self.channel_total),
                ExtraColumn::ChannelUnread => FieldValue::Integer(self.channel_unread),
            })
            .collect()
    }
}

const COLUMNS: &str = "c.id, c.start_time, c.end_time, c.direction, c.local_uid, c.remote_uid, \
                       c.is_missed, c.is_video, c.is_read, c.last_modified, c.remote_key";

const CHANNEL_MATCH: &str =
    "g.local_uid = c.local_uid AND g.remote_key = c.remote_key AND g.is_video = c.is_video";

/// Call table operations.
pub struct CallRepo;

impl CallRepo {
    /// Insert `event`. A positive `event.id` is kept; otherwise one is assigned.
    pub fn insert(conn: &Connection, event: &CallEvent, digits: usize) -> Result<EventId> {
        let id = (event.id > 0).then_some(event.id);
        let _ = conn.execute(
            "INSERT INTO calls (id, start_time, end_time, direction, local_uid, remote_uid,
                                remote_key, is_missed, is_video, is_read, last_modified)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                id,
                event.start_time.timestamp_millis(),
                event.end_time.map(|t| t.timestamp_millis()),
                event.direction.as_i64(),
                event.local_uid,
                event.remote_uid,
                minimize_remote(&event.remote_uid, digits),
                event.is_missed_call,
                event.is_video_call,
                event.is_read,
                Utc::now().timestamp_millis(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Overwrite the stored row of `event.id`.
    pub fn update(conn: &Connection, event: &CallEvent, digits: usize) -> Result<()> {
        let changed = conn.execute(
            "UPDATE calls SET start_time = ?2, end_time = ?3, direction = ?4, local_uid = ?5,
                              remote_uid = ?6, remote_key = ?7, is_missed = ?8, is_video = ?9,
                              is_read = ?10, last_modified = ?11
             WHERE id = ?1",
            params![
                event.id,
                event.start_time.timestamp_millis(),
                event.end_time.map(|t| t.timestamp_millis()),
                event.direction.as_i64(),
                event.local_uid,
                event.remote_uid,
                minimize_remote(&event.remote_uid, digits),
                event.is_missed_call,
                event.is_video_call,
                event.is_read,
                Utc::now().timestamp_millis(),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::EventNotFound(event.id));
        }
        Ok(())
    }

    /// Delete one call.
    pub fn delete(conn: &Connection, id: EventId) -> Result<()> {
        if conn.execute("DELETE FROM calls WHERE id = ?1", [id])? == 0 {
            return Err(StoreError::EventNotFound(id));
        }
        Ok(())
    }

    /// Delete every call; returns how many were removed.
    pub fn delete_all(conn: &Connection) -> Result<usize> {
        Ok(conn.execute("DELETE FROM calls", [])?)
    }

    /// Mark every unread call read; returns the ids that changed.
    pub fn mark_all_read(conn: &Connection) -> Result<Vec<EventId>> {
        let mut stmt = conn.prepare("SELECT id FROM calls WHERE is_read = 0 ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<EventId>, _>>()?;
        let _ = conn.execute(
            "UPDATE calls SET is_read = 1, last_modified = ?1 WHERE is_read = 0",
            [Utc::now().timestamp_millis()],
        )?;
        Ok(ids)
    }

    /// One call with its contacts, if it exists.
    pub fn get(conn: &Connection, id: EventId) -> Result<Option<CallEvent>> {
        let row = conn
            .query_row(
                &format!("SELECT {COLUMNS}, 0, 0 FROM calls c WHERE c.id = ?1"),
                [id],
                map_row,
            )
            .optional()?;
        let Some((mut row, remote_key)) = row else {
            return Ok(None);
        };
        row.event.contacts = ContactRepo::for_remote_key(conn, &remote_key)?;
        Ok(Some(row.event))
    }

    /// Every call `descriptor` selects, newest first.
    pub fn query(
        conn: &Connection,
        descriptor: &QueryDescriptor,
        with_contacts: bool,
    ) -> Result<Vec<CallRow>> {
        let (sql, values) = build_select(descriptor);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut contacts: HashMap<String, Vec<ContactRef>> = HashMap::new();
        let mut out = Vec::with_capacity(rows.len());
        for (mut row, remote_key) in rows {
            if with_contacts {
                if !contacts.contains_key(&remote_key) {
                    let found = ContactRepo::for_remote_key(conn, &remote_key)?;
                    let _ = contacts.insert(remote_key.clone(), found);
                }
                row.event.contacts = contacts.get(&remote_key).cloned().unwrap_or_default();
            }
            out.push(row);
        }
        Ok(out)
    }
}

fn build_select(descriptor: &QueryDescriptor) -> (String, Vec<Value>) {
    let mut sql = format!("SELECT {COLUMNS}, ");
    if descriptor.extra_columns().is_empty() {
        sql.push_str("0, 0");
    } else {
        let _ = write!(
            sql,
            "(SELECT COUNT(*) FROM calls g WHERE {CHANNEL_MATCH}), \
             (SELECT COUNT(*) FROM calls g WHERE {CHANNEL_MATCH} AND g.is_read = 0)"
        );
    }
    sql.push_str(" FROM calls c WHERE 1 = 1");

    let mut values = Vec::new();
    if descriptor.kind() == QueryKind::Events {
        if let Some(reference) = descriptor.reference_time() {
            sql.push_str(" AND c.start_time >= ?");
            values.push(Value::Integer(reference.timestamp_millis()));
        }
        if descriptor.filters_call_type() {
            sql.push_str(match descriptor.call_type() {
                CallType::Missed => " AND c.direction = 0 AND c.is_missed = 1",
                CallType::Dialed => " AND c.direction = 1",
                CallType::Received => " AND c.direction = 0 AND c.is_missed = 0",
                CallType::All => "",
            });
        }
    }

    if !descriptor.group_keys().is_empty() {
        let clauses: Vec<String> = descriptor
            .group_keys()
            .iter()
            .map(|key| {
                values.push(Value::Text(key.channel.local_uid.clone()));
                values.push(Value::Text(key.channel.remote.clone()));
                values.push(Value::Integer(i64::from(key.channel.is_video)));
                match key.kind {
                    Some(kind) => {
                        values.push(Value::Integer(kind.direction.as_i64()));
                        values.push(Value::Integer(i64::from(kind.missed)));
                        "(c.local_uid = ? AND c.remote_key = ? AND c.is_video = ? \
                         AND c.direction = ? AND c.is_missed = ?)"
                            .to_string()
                    }
                    None => "(c.local_uid = ? AND c.remote_key = ? AND c.is_video = ?)".to_string(),
                }
            })
            .collect();
        let _ = write!(sql, " AND ({})", clauses.join(" OR "));
    }

    sql.push_str(" ORDER BY c.start_time DESC, c.id DESC");
    if let Some(limit) = descriptor.limit() {
        let _ = write!(sql, " LIMIT {limit}");
    }
    (sql, values)
}

fn millis(ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(1, ms))
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<(CallRow, String)> {
    let direction: i64 = row.get(3)?;
    let direction = Direction::from_i64(direction)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Integer, Box::new(e)))?;
    let end_time: Option<i64> = row.get(2)?;
    let last_modified: Option<i64> = row.get(9)?;

    let mut event = CallEvent::new(
        row.get(0)?,
        row.get::<_, String>(4)?,
        row.get::<_, String>(5)?,
        direction,
        millis(row.get(1)?)?,
    )
    .missed(row.get(6)?)
    .video(row.get(7)?)
    .read(row.get(8)?);
    event.end_time = end_time.map(millis).transpose()?;
    event.last_modified = last_modified.map(millis).transpose()?;

    Ok((
        CallRow {
            event,
            channel_total: row.get(11)?,
            channel_unread: row.get(12)?,
        },
        row.get(10)?,
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
