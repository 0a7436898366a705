//! Structural change notifications emitted by tree mutations.
//!
//! Every mutation returns the changes it made, in order, with row indices
//! valid at the moment each change is applied. Contiguous inserts and
//! removes under the same parent are coalesced into one range.

use serde::{Deserialize, Serialize};

use crate::arena::NodeHandle;

/// Parent whose child list changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Parent {
    /// Top-level rows.
    Root,
    /// Occurrence rows of a group.
    Group(NodeHandle),
}

/// One structural change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum TreeChange {
    /// Rows `start..=end` were inserted.
    Insert {
        /// Parent.
        parent: Parent,
        /// First new row.
        start: usize,
        /// Last new row.
        end: usize,
    },
    /// Rows `start..=end` were removed.
    Remove {
        /// Parent.
        parent: Parent,
        /// First removed row.
        start: usize,
        /// Last removed row.
        end: usize,
    },
    /// Row `from` moved so that it now sits at index `to`.
    Move {
        /// Parent.
        parent: Parent,
        /// Index before the move.
        from: usize,
        /// Index after the move.
        to: usize,
    },
    /// Row data changed in place.
    Update {
        /// Parent.
        parent: Parent,
        /// Changed row.
        row: usize,
    },
    /// Everything was discarded.
    Reset,
}

/// Ordered, coalescing collector of [`TreeChange`]s.
#[derive(Debug, Default)]
pub(crate) struct ChangeLog {
    changes: Vec<TreeChange>,
}

impl ChangeLog {
    pub(crate) fn insert(&mut self, parent: Parent, start: usize, end: usize) {
        if let Some(TreeChange::Insert {
            parent: p,
            start: s,
            end: e,
        }) = self.changes.last_mut()
        {
            if *p == parent && (start == *e + 1 || start == *s) {
                *e += end - start + 1;
                return;
            }
        }
        self.changes.push(TreeChange::Insert { parent, start, end });
    }

    pub(crate) fn remove(&mut self, parent: Parent, start: usize, end: usize) {
        if let Some(TreeChange::Remove {
            parent: p,
            start: s,
            end: e,
        }) = self.changes.last_mut()
        {
            if *p == parent && start == *s {
                *e += end - start + 1;
                return;
            }
            if *p == parent && end + 1 == *s {
                *s = start;
                return;
            }
        }
        self.changes.push(TreeChange::Remove { parent, start, end });
    }

    pub(crate) fn moved(&mut self, parent: Parent, from: usize, to: usize) {
        if from != to {
            self.changes.push(TreeChange::Move { parent, from, to });
        }
    }

    pub(crate) fn update(&mut self, parent: Parent, row: usize) {
        match self.changes.last() {
            Some(TreeChange::Update { parent: p, row: r }) if *p == parent && *r == row => {}
            Some(TreeChange::Insert {
                parent: p,
                start,
                end,
            }) if *p == parent && (*start..=*end).contains(&row) => {}
            _ => self.changes.push(TreeChange::Update { parent, row }),
        }
    }

    pub(crate) fn reset(&mut self) {
        self.changes.clear();
        self.changes.push(TreeChange::Reset);
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub(crate) fn finish(self) -> Vec<TreeChange> {
        self.changes
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
