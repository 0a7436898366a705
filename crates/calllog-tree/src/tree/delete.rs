//! Row and occurrence removal.

use calllog_core::EventId;
use tracing::trace;

use super::GroupedEventTree;
use crate::change::{ChangeLog, Parent, TreeChange};
use crate::errors::{Result, TreeError};

impl GroupedEventTree {
    /// Remove event `id` from the view.
    ///
    /// A representative takes its whole row with it; any other occurrence
    /// is removed on its own. Unknown ids are a no-op.
    pub fn delete(&mut self, id: EventId) -> Result<Vec<TreeChange>> {
        self.ensure_supported()?;
        match self.find(id) {
            Some(location) if location.is_representative() => self.delete_row(location.row),
            Some(_) => self.delete_occurrence(id),
            None => {
                trace!(id, "delete of unknown event");
                Ok(Vec::new())
            }
        }
    }

    /// Remove the whole group at `row`.
    ///
    /// Under time grouping, when the rows on either side now share a key
    /// they are merged into the upper one: one removal covering both rows,
    /// then one update of the survivor.
    pub fn delete_row(&mut self, row: usize) -> Result<Vec<TreeChange>> {
        self.ensure_supported()?;
        let len = self.roots.len();
        if row >= len {
            return Err(TreeError::RowOutOfRange { row, len });
        }
        let mut log = ChangeLog::default();
        self.remove_row(row, &mut log);
        Ok(log.finish())
    }

    /// Remove one occurrence. The next occurrence is promoted when the
    /// representative goes; a group losing its last occurrence goes too.
    pub fn delete_occurrence(&mut self, id: EventId) -> Result<Vec<TreeChange>> {
        self.ensure_supported()?;
        let Some(location) = self.find(id) else {
            return Ok(Vec::new());
        };
        let mut log = ChangeLog::default();
        let group = self.roots[location.row];

        if self.child_count(group) == 1 {
            self.remove_row(location.row, &mut log);
            return Ok(log.finish());
        }

        let _ = self.detach_child(group, location.child);
        log.remove(Parent::Group(group), location.child, location.child);

        let current = self.rep(group).event_count;
        let outside_streak = !self.is_time_mode()
            && !location.is_representative()
            && location.child > current as usize;
        let count = outside_streak.then_some(current);
        if self.refresh_representative(group, count) {
            log.update(Parent::Root, location.row);
        }
        if location.is_representative() && !self.is_time_mode() {
            let _ = self.reposition(location.row, &mut log);
        }
        Ok(log.finish())
    }

    fn remove_row(&mut self, row: usize, log: &mut ChangeLog) {
        let handle = self.roots.remove(row);
        self.release_group(handle);

        if self.is_time_mode() && row > 0 && row < self.roots.len() {
            let upper = self.roots[row - 1];
            let lower = self.roots[row];
            if self.policy.same_group(self.rep(upper), self.rep(lower)) {
                let _ = self.roots.remove(row);
                if let Some(node) = self.nodes.release(lower) {
                    for child in node.children {
                        self.nodes[child].parent = Some(upper);
                        self.nodes[upper].children.push(child);
                    }
                }
                let _ = self.refresh_representative(upper, None);
                log.remove(Parent::Root, row, row + 1);
                log.update(Parent::Root, row - 1);
                return;
            }
        }
        log.remove(Parent::Root, row, row);
    }
}
