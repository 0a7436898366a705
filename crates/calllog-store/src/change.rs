//! Committed change notifications.

use serde::{Deserialize, Serialize};

use calllog_core::{CallEvent, EventId};

/// Everything one committed transaction changed.
///
/// Stores broadcast a `ChangeSet` after a successful commit and never on
/// rollback. `sequence` increases by one per commit.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    /// Commit sequence number.
    pub sequence: u64,
    /// Newly stored calls, with their assigned ids.
    pub added: Vec<CallEvent>,
    /// Calls whose stored data changed.
    pub modified: Vec<CallEvent>,
    /// Ids of deleted calls.
    pub deleted: Vec<EventId>,
    /// Every call was deleted.
    pub all_deleted: bool,
}

impl ChangeSet {
    /// Whether the commit changed nothing.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.modified.is_empty()
            && self.deleted.is_empty()
            && !self.all_deleted
    }

    /// Record a modification, replacing an earlier one for the same id.
    pub fn push_modified(&mut self, event: CallEvent) {
        if let Some(added) = self.added.iter_mut().find(|e| e.id == event.id) {
            *added = event;
        } else if let Some(existing) = self.modified.iter_mut().find(|e| e.id == event.id) {
            *existing = event;
        } else {
            self.modified.push(event);
        }
    }

    /// Record a deletion, dropping earlier adds or modifications of the id.
    pub fn push_deleted(&mut self, id: EventId) {
        let before = self.added.len();
        self.added.retain(|e| e.id != id);
        self.modified.retain(|e| e.id != id);
        if self.added.len() == before && !self.deleted.contains(&id) {
            self.deleted.push(id);
        }
    }
}

/// A contact was added, edited or removed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactChange {
    /// Contact identifier.
    pub contact_id: i64,
    /// Remote addresses whose resolution may have changed.
    pub remote_uids: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
