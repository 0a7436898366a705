//! In-place updates, keyed reconciliation, and contact application.

use std::collections::{HashMap, HashSet};

use calllog_core::address::remote_address_match;
use calllog_core::{CallEvent, ContactRef, GroupKey};
use tracing::debug;

use super::GroupedEventTree;
use crate::arena::NodeHandle;
use crate::change::{ChangeLog, Parent, TreeChange};
use crate::errors::{Result, TreeError};
use crate::policy::newest_first;

/// What [`GroupedEventTree::update`] did with an event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The event was in the tree and changed in place.
    Applied,
    /// The event was unknown and has been inserted.
    Inserted,
    /// The event was unknown and the view does not display it.
    Ignored,
    /// A grouping-relevant attribute changed. Nothing was modified; the
    /// listed groups must be fetched again and reconciled.
    NeedsRefetch(Vec<GroupKey>),
}

impl GroupedEventTree {
    /// Apply a modified event.
    pub fn update(&mut self, event: CallEvent) -> Result<(UpdateOutcome, Vec<TreeChange>)> {
        self.ensure_supported()?;
        let mut log = ChangeLog::default();

        let Some(location) = self.find(event.id) else {
            if !self.filter.within_reference(&event) {
                return Ok((UpdateOutcome::Ignored, Vec::new()));
            }
            let id = event.id;
            self.insert_new(event, &mut log);
            let outcome = if self.occurrences.contains_key(&id) {
                UpdateOutcome::Inserted
            } else {
                UpdateOutcome::Ignored
            };
            return Ok((outcome, log.finish()));
        };

        let group = self.roots[location.row];
        let child = self.nodes[group].children[location.child];
        let old = &self.nodes[child].event;

        let old_key = self.policy.key(old);
        let new_key = self.policy.key(&event);
        if old_key != new_key || old.start_time != event.start_time || !self.accepts(&event) {
            debug!(id = event.id, %old_key, %new_key, "grouping attributes changed");
            let mut keys = vec![old_key];
            if new_key != keys[0] {
                keys.push(new_key);
            }
            return Ok((UpdateOutcome::NeedsRefetch(keys), Vec::new()));
        }
        if same_event(old, &event) {
            return Ok((UpdateOutcome::Applied, Vec::new()));
        }

        let recount =
            old.is_missed_call != event.is_missed_call || old.direction != event.direction;
        self.nodes[child].event = event;
        log.update(Parent::Group(group), location.child);

        let count = (!recount).then_some(self.rep(group).event_count);
        if self.refresh_representative(group, count) {
            log.update(Parent::Root, location.row);
        }
        Ok((UpdateOutcome::Applied, log.finish()))
    }

    /// Replace the groups named by `dirty` with authoritative rows.
    ///
    /// `fresh` holds every event of those groups as the store now sees it.
    /// Rows are folded into groups first; each group then replaces the row
    /// with the same key (or whose representative is the same event), other
    /// rows with that key are dropped, and dirty keys that received no rows
    /// are removed from the view. Groups whose content did not change emit
    /// nothing. Only the contact modes reconcile; time grouping reloads.
    pub fn reconcile<I>(&mut self, dirty: I, fresh: Vec<CallEvent>) -> Result<Vec<TreeChange>>
    where
        I: IntoIterator<Item = GroupKey>,
    {
        self.ensure_supported()?;
        if self.is_time_mode() {
            return Err(TreeError::UnsupportedMode(self.policy.mode()));
        }
        let mut dirty: HashSet<GroupKey> = dirty.into_iter().collect();

        let mut folded: Vec<(GroupKey, Vec<CallEvent>)> = Vec::new();
        let mut slots: HashMap<GroupKey, usize> = HashMap::new();
        for event in fresh {
            if !self.accepts(&event) {
                continue;
            }
            let key = self.policy.key(&event);
            match slots.get(&key) {
                Some(&slot) => folded[slot].1.push(event),
                None => {
                    let _ = slots.insert(key.clone(), folded.len());
                    folded.push((key, vec![event]));
                }
            }
        }

        let mut log = ChangeLog::default();
        for (key, mut events) in folded {
            events.sort_by(newest_first);
            let rep_id = events[0].id;
            let found = self.roots.iter().position(|&h| {
                let rep = self.rep(h);
                rep.id == rep_id || self.policy.key(rep) == key
            });

            let group = match found {
                Some(row) => {
                    let group = self.roots[row];
                    if !self.same_content(group, &events) {
                        self.replace_children(group, events, &mut log);
                        let _ = self.refresh_representative(group, None);
                        log.update(Parent::Root, row);
                        let _ = self.reposition(row, &mut log);
                    }
                    group
                }
                None => {
                    let row = self.time_position(&events[0], None);
                    let group = self.make_group(events);
                    self.roots.insert(row, group);
                    log.insert(Parent::Root, row, row);
                    group
                }
            };

            self.remove_rows_where(&mut log, |tree, h| {
                h != group && tree.policy.key(tree.rep(h)) == key
            });
            let _ = dirty.remove(&key);
        }

        if !dirty.is_empty() {
            self.remove_rows_where(&mut log, |tree, h| {
                dirty.contains(&tree.policy.key(tree.rep(h)))
            });
        }

        debug!(rows = self.roots.len(), "groups reconciled");
        Ok(log.finish())
    }

    /// Attach `contacts` to every event with the given local account and
    /// remote party.
    pub fn apply_contacts(
        &mut self,
        local_uid: &str,
        remote_uid: &str,
        contacts: &[ContactRef],
    ) -> Vec<TreeChange> {
        let digits = self.policy.match_digits();
        let mut log = ChangeLog::default();
        for row in 0..self.roots.len() {
            let group = self.roots[row];
            let mut touched = false;
            for index in 0..self.child_count(group) {
                let child = self.nodes[group].children[index];
                let event = &mut self.nodes[child].event;
                if event.local_uid == local_uid
                    && event.contacts != contacts
                    && remote_address_match(&event.remote_uid, remote_uid, digits)
                {
                    event.contacts = contacts.to_vec();
                    log.update(Parent::Group(group), index);
                    touched = true;
                }
            }
            if touched {
                let count = self.rep(group).event_count;
                if self.refresh_representative(group, Some(count)) {
                    log.update(Parent::Root, row);
                }
            }
        }
        log.finish()
    }

    fn same_content(&self, group: NodeHandle, events: &[CallEvent]) -> bool {
        self.child_count(group) == events.len()
            && self
                .child_events(group)
                .zip(events)
                .all(|(a, b)| same_event(a, b))
    }

    fn replace_children(&mut self, group: NodeHandle, events: Vec<CallEvent>, log: &mut ChangeLog) {
        let old_len = self.child_count(group);
        while self.detach_child(group, 0).is_some() {}
        if old_len > 0 {
            log.remove(Parent::Group(group), 0, old_len - 1);
        }
        let new_len = events.len();
        for (index, event) in events.into_iter().enumerate() {
            let _ = self.attach_child(group, index, event);
        }
        if new_len > 0 {
            log.insert(Parent::Group(group), 0, new_len - 1);
        }
    }

    fn remove_rows_where<F>(&mut self, log: &mut ChangeLog, predicate: F)
    where
        F: Fn(&Self, NodeHandle) -> bool,
    {
        let mut row = 0;
        while row < self.roots.len() {
            let handle = self.roots[row];
            if predicate(self, handle) {
                let _ = self.roots.remove(row);
                self.release_group(handle);
                log.remove(Parent::Root, row, row);
            } else {
                row += 1;
            }
        }
    }
}

/// Equal apart from the display count.
fn same_event(a: &CallEvent, b: &CallEvent) -> bool {
    a.id == b.id
        && a.start_time == b.start_time
        && a.end_time == b.end_time
        && a.direction == b.direction
        && a.local_uid == b.local_uid
        && a.remote_uid == b.remote_uid
        && a.is_missed_call == b.is_missed_call
        && a.is_video_call == b.is_video_call
        && a.is_read == b.is_read
        && a.contacts == b.contacts
        && a.last_modified == b.last_modified
}
