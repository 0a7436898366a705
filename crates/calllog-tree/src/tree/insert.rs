//! Single-event insertion.

use calllog_core::CallEvent;
use tracing::trace;

use super::GroupedEventTree;
use crate::arena::NodeHandle;
use crate::change::{ChangeLog, Parent, TreeChange};
use crate::errors::Result;
use crate::policy::{GroupingPolicy, is_newer};

impl GroupedEventTree {
    /// Add one new event.
    ///
    /// An event already in the tree is treated as an update. Events the
    /// view rejects leave the tree untouched, except that under time
    /// grouping a rejected call with the same party as the top row resets
    /// that row's count to 1.
    pub fn insert(&mut self, event: CallEvent) -> Result<Vec<TreeChange>> {
        self.ensure_supported()?;
        if self.occurrences.contains_key(&event.id) {
            let (_, changes) = self.update(event)?;
            return Ok(changes);
        }
        let mut log = ChangeLog::default();
        self.insert_new(event, &mut log);
        Ok(log.finish())
    }

    pub(super) fn insert_new(&mut self, event: CallEvent, log: &mut ChangeLog) {
        if self.is_time_mode() {
            self.insert_timed(event, log);
        } else {
            self.insert_by_contact(event, log);
        }
    }

    fn insert_by_contact(&mut self, event: CallEvent, log: &mut ChangeLog) {
        if !self.accepts(&event) {
            trace!(id = event.id, "insert ignored by filter");
            return;
        }
        let key = self.policy.key(&event);
        let found = self
            .roots
            .iter()
            .position(|&h| self.policy.key(self.rep(h)) == key);

        let Some(row) = found else {
            let row = self.time_position(&event, None);
            let group = self.make_group(vec![event]);
            self.roots.insert(row, group);
            log.insert(Parent::Root, row, row);
            return;
        };

        let group = self.roots[row];
        if is_newer(&event, self.rep(group)) {
            let count = GroupingPolicy::chained_count(self.rep(group), &event);
            let _ = self.attach_child(group, 0, event);
            log.insert(Parent::Group(group), 0, 0);
            let _ = self.refresh_representative(group, Some(count));
            let row = self.reposition(row, log);
            log.update(Parent::Root, row);
        } else {
            let index = self.child_slot(group, &event);
            let _ = self.attach_child(group, index, event);
            log.insert(Parent::Group(group), index, index);
            if self.refresh_representative(group, None) {
                log.update(Parent::Root, row);
            }
        }
    }

    fn insert_timed(&mut self, event: CallEvent, log: &mut ChangeLog) {
        if !self.filter.within_reference(&event) {
            trace!(id = event.id, "insert older than reference time");
            return;
        }
        let top = self.roots.first().copied();
        let newest = top.is_none_or(|h| is_newer(&event, self.rep(h)));

        if !self.filter.call_type.matches(&event) {
            if newest
                && let Some(h) = top
                && self.policy.same_channel(self.rep(h), &event)
                && self.rep(h).event_count != 1
            {
                self.nodes[h].event.event_count = 1;
                log.update(Parent::Root, 0);
            }
            trace!(id = event.id, "insert ignored by call type");
            return;
        }

        if newest {
            match top {
                Some(h) if self.policy.same_group(self.rep(h), &event) => {
                    let _ = self.attach_child(h, 0, event);
                    log.insert(Parent::Group(h), 0, 0);
                    let _ = self.refresh_representative(h, None);
                    log.update(Parent::Root, 0);
                }
                _ => {
                    let group = self.make_group(vec![event]);
                    self.roots.insert(0, group);
                    log.insert(Parent::Root, 0, 0);
                }
            }
            return;
        }

        // Older than the top row: place by time among all occurrences.
        match self.first_older_occurrence(&event) {
            Some((row, index)) if index > 0 => self.insert_inside(row, index, event, log),
            Some((row, _)) => self.insert_between(row.checked_sub(1), Some(row), event, log),
            None => {
                let last = self.roots.len().checked_sub(1);
                self.insert_between(last, None, event, log);
            }
        }
    }

    /// First occurrence, in row then child order, that is older than `event`.
    fn first_older_occurrence(&self, event: &CallEvent) -> Option<(usize, usize)> {
        self.roots.iter().enumerate().find_map(|(row, &g)| {
            self.nodes[g]
                .children
                .iter()
                .position(|&c| is_newer(event, &self.nodes[c].event))
                .map(|index| (row, index))
        })
    }

    /// Index at which `event` sorts among the occurrences of `group`.
    fn child_slot(&self, group: NodeHandle, event: &CallEvent) -> usize {
        let children = &self.nodes[group].children;
        children
            .iter()
            .position(|&c| is_newer(event, &self.nodes[c].event))
            .unwrap_or(children.len())
    }

    /// `event` falls between occurrences `index - 1` and `index` of the
    /// group at `row`.
    fn insert_inside(&mut self, row: usize, index: usize, event: CallEvent, log: &mut ChangeLog) {
        let group = self.roots[row];
        if self.policy.same_group(self.rep(group), &event) {
            let _ = self.attach_child(group, index, event);
            log.insert(Parent::Group(group), index, index);
            if self.refresh_representative(group, None) {
                log.update(Parent::Root, row);
            }
            return;
        }

        // A different call interrupts the run: split the group around it.
        let len = self.child_count(group);
        let mut older = Vec::with_capacity(len - index);
        while let Some(e) = self.detach_child(group, index) {
            older.push(e);
        }
        log.remove(Parent::Group(group), index, len - 1);
        if self.refresh_representative(group, None) {
            log.update(Parent::Root, row);
        }

        let middle = self.make_group(vec![event]);
        let tail = self.make_group(older);
        self.roots.insert(row + 1, middle);
        self.roots.insert(row + 2, tail);
        log.insert(Parent::Root, row + 1, row + 2);
    }

    /// `event` falls after the last occurrence of row `prev` and before the
    /// first occurrence of row `next`.
    fn insert_between(
        &mut self,
        prev: Option<usize>,
        next: Option<usize>,
        event: CallEvent,
        log: &mut ChangeLog,
    ) {
        if let Some(row) = prev {
            let group = self.roots[row];
            if self.policy.same_group(self.rep(group), &event) {
                let index = self.child_count(group);
                let _ = self.attach_child(group, index, event);
                log.insert(Parent::Group(group), index, index);
                if self.refresh_representative(group, None) {
                    log.update(Parent::Root, row);
                }
                return;
            }
        }
        if let Some(row) = next {
            let group = self.roots[row];
            if self.policy.same_group(self.rep(group), &event) {
                let _ = self.attach_child(group, 0, event);
                log.insert(Parent::Group(group), 0, 0);
                let _ = self.refresh_representative(group, None);
                log.update(Parent::Root, row);
                return;
            }
        }
        let row = prev.map_or(0, |p| p + 1);
        let group = self.make_group(vec![event]);
        self.roots.insert(row, group);
        log.insert(Parent::Root, row, row);
    }
}
