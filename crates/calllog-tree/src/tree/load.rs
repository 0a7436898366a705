//! Bulk construction from query batches.

use std::collections::{BTreeMap, HashMap};

use calllog_core::{CallEvent, GroupKey};
use tracing::debug;

use super::GroupedEventTree;
use crate::change::{ChangeLog, Parent, TreeChange};
use crate::errors::Result;

impl GroupedEventTree {
    /// Append one batch of query results, ordered newest first.
    ///
    /// Batches continue one another: under time grouping the last row of
    /// the previous batch keeps absorbing matching events, and under the
    /// contact modes an event whose group already exists becomes an older
    /// occurrence of it. Events already present are skipped, as are events
    /// the view filter rejects.
    pub fn load_batch(&mut self, events: Vec<CallEvent>) -> Result<Vec<TreeChange>> {
        self.ensure_supported()?;

        let existing_rows = self.roots.len();
        // Row -> occurrence count before this batch.
        let mut touched: BTreeMap<usize, usize> = BTreeMap::new();
        let mut by_key: HashMap<GroupKey, usize> = if self.is_time_mode() {
            HashMap::new()
        } else {
            self.roots
                .iter()
                .enumerate()
                .map(|(row, &h)| (self.policy.key(self.rep(h)), row))
                .collect()
        };

        let mut skipped = 0usize;
        for event in events {
            if self.occurrences.contains_key(&event.id) || !self.filter.passes(&event) {
                skipped += 1;
                continue;
            }
            let target = if self.is_time_mode() {
                self.roots
                    .last()
                    .filter(|&&h| self.policy.same_group(self.rep(h), &event))
                    .map(|_| self.roots.len() - 1)
            } else {
                by_key.get(&self.policy.key(&event)).copied()
            };

            match target {
                Some(row) => {
                    let group = self.roots[row];
                    let index = self.child_count(group);
                    let _ = touched.entry(row).or_insert(index);
                    let _ = self.attach_child(group, index, event);
                }
                None => {
                    if !self.is_time_mode() {
                        let _ = by_key.insert(self.policy.key(&event), self.roots.len());
                    }
                    let group = self.make_group(vec![event]);
                    self.roots.push(group);
                }
            }
        }

        let mut log = ChangeLog::default();
        for (row, before) in touched {
            let group = self.roots[row];
            let changed = self.refresh_representative(group, None);
            if row < existing_rows {
                log.insert(Parent::Group(group), before, self.child_count(group) - 1);
                if changed {
                    log.update(Parent::Root, row);
                }
            }
        }
        if self.roots.len() > existing_rows {
            log.insert(Parent::Root, existing_rows, self.roots.len() - 1);
        }

        debug!(
            rows = self.roots.len(),
            added_rows = self.roots.len() - existing_rows,
            skipped,
            "batch loaded"
        );
        Ok(log.finish())
    }
}
