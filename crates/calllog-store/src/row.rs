//! Raw result rows and their materialization into typed events.
//!
//! A store yields [`RawRow`]s whose `values` line up with the descriptor's
//! [`EventField`] projection and whose `extras` line up with its
//! [`ExtraColumn`](crate::ExtraColumn)s. [`materialize_event`] turns one back
//! into a [`CallEvent`]; fields that were not projected keep their defaults.

use chrono::{DateTime, Utc};

use calllog_core::{CallEvent, ContactRef, Direction};

use crate::descriptor::EventField;
use crate::errors::{Result, StoreError};

/// One column value.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// SQL `NULL` or absent.
    Null,
    /// Integer column.
    Integer(i64),
    /// Text column.
    Text(String),
    /// Boolean column.
    Bool(bool),
    /// Timestamp column.
    Time(DateTime<Utc>),
    /// Resolved contacts.
    Contacts(Vec<ContactRef>),
}

/// One result row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawRow {
    /// Values aligned with the descriptor's fields.
    pub values: Vec<FieldValue>,
    /// Values aligned with the descriptor's extra columns.
    pub extras: Vec<FieldValue>,
}

/// Project `event` onto `fields`.
pub fn project_event(event: &CallEvent, fields: &[EventField]) -> RawRow {
    let values = fields
        .iter()
        .map(|field| match field {
            EventField::Id => FieldValue::Integer(event.id),
            EventField::StartTime => FieldValue::Time(event.start_time),
            EventField::EndTime => event.end_time.map_or(FieldValue::Null, FieldValue::Time),
            EventField::Direction => FieldValue::Integer(event.direction.as_i64()),
            EventField::LocalUid => FieldValue::Text(event.local_uid.clone()),
            EventField::RemoteUid => FieldValue::Text(event.remote_uid.clone()),
            EventField::IsMissedCall => FieldValue::Bool(event.is_missed_call),
            EventField::IsVideoCall => FieldValue::Bool(event.is_video_call),
            EventField::IsRead => FieldValue::Bool(event.is_read),
            EventField::Contacts => FieldValue::Contacts(event.contacts.clone()),
            EventField::LastModified => {
                event.last_modified.map_or(FieldValue::Null, FieldValue::Time)
            }
        })
        .collect();
    RawRow {
        values,
        extras: Vec::new(),
    }
}

/// Build a typed event from `row` projected as `fields`.
pub fn materialize_event(row: &RawRow, fields: &[EventField]) -> Result<CallEvent> {
    if row.values.len() != fields.len() {
        return Err(StoreError::MalformedRow(format!(
            "expected {} values, got {}",
            fields.len(),
            row.values.len()
        )));
    }

    let mut event = CallEvent::new(0, "", "", Direction::Inbound, DateTime::<Utc>::UNIX_EPOCH);
    let mut has_id = false;

    for (field, value) in fields.iter().zip(&row.values) {
        match field {
            EventField::Id => {
                event.id = integer(*field, value)?;
                has_id = true;
            }
            EventField::StartTime => event.start_time = time(*field, value)?,
            EventField::EndTime => event.end_time = optional_time(*field, value)?,
            EventField::Direction => {
                event.direction = Direction::from_i64(integer(*field, value)?)
                    .map_err(|e| StoreError::MalformedRow(e.to_string()))?;
            }
            EventField::LocalUid => event.local_uid = text(*field, value)?,
            EventField::RemoteUid => event.remote_uid = text(*field, value)?,
            EventField::IsMissedCall => event.is_missed_call = boolean(*field, value)?,
            EventField::IsVideoCall => event.is_video_call = boolean(*field, value)?,
            EventField::IsRead => event.is_read = boolean(*field, value)?,
            EventField::Contacts => {
                event.contacts = match value {
                    FieldValue::Contacts(c) => c.clone(),
                    FieldValue::Null => Vec::new(),
                    other => return Err(mismatch(*field, other)),
                };
            }
            EventField::LastModified => event.last_modified = optional_time(*field, value)?,
        }
    }

    if !has_id {
        return Err(StoreError::MalformedRow("row has no id".into()));
    }
    Ok(event)
}

fn mismatch(field: EventField, value: &FieldValue) -> StoreError {
    StoreError::MalformedRow(format!("{field:?} cannot hold {value:?}"))
}

fn integer(field: EventField, value: &FieldValue) -> Result<i64> {
    match value {
        FieldValue::Integer(v) => Ok(*v),
        other => Err(mismatch(field, other)),
    }
}

fn text(field: EventField, value: &FieldValue) -> Result<String> {
    match value {
        FieldValue::Text(v) => Ok(v.clone()),
        other => Err(mismatch(field, other)),
    }
}

fn boolean(field: EventField, value: &FieldValue) -> Result<bool> {
    match value {
        FieldValue::Bool(v) => Ok(*v),
        FieldValue::Integer(v) => Ok(*v != 0),
        other => Err(mismatch(field, other)),
    }
}

fn time(field: EventField, value: &FieldValue) -> Result<DateTime<Utc>> {
    match value {
        FieldValue::Time(t) => Ok(*t),
        FieldValue::Integer(ms) => {
            DateTime::from_timestamp_millis(*ms).ok_or_else(|| mismatch(field, value))
        }
        other => Err(mismatch(field, other)),
    }
}

fn optional_time(field: EventField, value: &FieldValue) -> Result<Option<DateTime<Utc>>> {
    match value {
        FieldValue::Null => Ok(None),
        other => time(field, other).map(Some),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
