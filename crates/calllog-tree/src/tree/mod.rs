//! Two-level grouped view of call events.
//!
//! Top-level rows are groups. Each group owns its occurrences (the concrete
//! calls) newest first; occurrence 0 is the one the group row displays, and
//! the group row carries a copy of it with the policy's count applied.
//!
//! Rows are kept newest first by representative start time. Under time
//! grouping no two adjacent rows share a group key; under the contact modes
//! no two rows share one at all.

mod delete;
mod insert;
mod load;
mod update;


use std::collections::HashMap;

use calllog_core::{CallEvent, EventId, GroupKey, GroupingMode};

use crate::arena::{Arena, NodeHandle};
use crate::change::{ChangeLog, TreeChange};
use crate::errors::{Result, TreeError};
use crate::policy::{GroupingPolicy, ViewFilter, is_newer};

pub use update::UpdateOutcome;

#[derive(Debug)]
struct Node {
    event: CallEvent,
    parent: Option<NodeHandle>,
    children: Vec<NodeHandle>,
}

/// Position of an event in the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Location {
    /// Top-level row of the group.
    pub row: usize,
    /// Occurrence index within the group; 0 is the representative.
    pub child: usize,
}

impl Location {
    /// Whether the event is its group's representative.
    pub fn is_representative(self) -> bool {
        self.child == 0
    }
}

/// Grouped call event tree.
#[derive(Debug)]
pub struct GroupedEventTree {
    policy: GroupingPolicy,
    filter: ViewFilter,
    nodes: Arena<Node>,
    roots: Vec<NodeHandle>,
    occurrences: HashMap<EventId, NodeHandle>,
}

impl GroupedEventTree {
    /// Empty tree.
    pub fn new(policy: GroupingPolicy, filter: ViewFilter) -> Self {
        Self {
            policy,
            filter,
            nodes: Arena::default(),
            roots: Vec::new(),
            occurrences: HashMap::new(),
        }
    }

    /// Grouping policy.
    pub fn policy(&self) -> &GroupingPolicy {
        &self.policy
    }

    /// View filter.
    pub fn filter(&self) -> &ViewFilter {
        &self.filter
    }

    /// Replace policy and filter, discarding all rows.
    pub fn reconfigure(&mut self, policy: GroupingPolicy, filter: ViewFilter) -> Vec<TreeChange> {
        self.policy = policy;
        self.filter = filter;
        self.clear()
    }

    /// Discard all rows.
    pub fn clear(&mut self) -> Vec<TreeChange> {
        self.nodes.clear();
        self.roots.clear();
        self.occurrences.clear();
        let mut log = ChangeLog::default();
        log.reset();
        log.finish()
    }

    /// Whether `event` is admissible to the view.
    ///
    /// Time grouping checks only the reference time here; its call-type
    /// filter is part of the grouping itself.
    pub fn accepts(&self, event: &CallEvent) -> bool {
        if self.is_time_mode() {
            self.filter.within_reference(event)
        } else {
            self.filter.passes(event)
        }
    }

    /// Number of top-level rows.
    pub fn row_count(&self) -> usize {
        self.roots.len()
    }

    /// Whether the tree has no rows.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Number of events held, across all groups.
    pub fn event_count(&self) -> usize {
        self.occurrences.len()
    }

    /// Group at `row`.
    pub fn group(&self, row: usize) -> Option<GroupView<'_>> {
        self.roots.get(row).map(|&handle| GroupView { tree: self, handle })
    }

    /// Groups in row order.
    pub fn groups(&self) -> impl Iterator<Item = GroupView<'_>> {
        self.roots.iter().map(|&handle| GroupView { tree: self, handle })
    }

    /// Representative shown at `row`.
    pub fn representative(&self, row: usize) -> Option<&CallEvent> {
        self.roots.get(row).map(|&h| &self.nodes[h].event)
    }

    /// Group key of the row at `row`.
    pub fn group_key(&self, row: usize) -> Option<GroupKey> {
        self.representative(row).map(|e| self.policy.key(e))
    }

    /// Handle of the group at `row`.
    pub fn handle_at(&self, row: usize) -> Option<NodeHandle> {
        self.roots.get(row).copied()
    }

    /// Current row of a group handle.
    pub fn row_of(&self, handle: NodeHandle) -> Option<usize> {
        self.roots.iter().position(|&h| h == handle)
    }

    /// Where event `id` sits.
    pub fn find(&self, id: EventId) -> Option<Location> {
        let &child = self.occurrences.get(&id)?;
        let group = self.nodes.get(child)?.parent?;
        Some(Location {
            row: self.row_of(group)?,
            child: self.nodes[group].children.iter().position(|&c| c == child)?,
        })
    }

    /// Event `id` as stored in its occurrence row.
    pub fn event(&self, id: EventId) -> Option<&CallEvent> {
        self.occurrences
            .get(&id)
            .and_then(|&h| self.nodes.get(h))
            .map(|n| &n.event)
    }

    /// Ids of every occurrence of the group at `row`, newest first.
    pub fn occurrence_ids(&self, row: usize) -> Option<Vec<EventId>> {
        self.group(row).map(|g| g.occurrences().map(|e| e.id).collect())
    }

    // ── internals ──

    fn ensure_supported(&self) -> Result<()> {
        let mode = self.policy.mode();
        if mode.is_supported() {
            Ok(())
        } else {
            Err(TreeError::UnsupportedMode(mode))
        }
    }

    fn is_time_mode(&self) -> bool {
        self.policy.mode() == GroupingMode::ByTime
    }

    fn rep(&self, group: NodeHandle) -> &CallEvent {
        &self.nodes[group].event
    }

    fn child_events(&self, group: NodeHandle) -> impl Iterator<Item = &CallEvent> {
        self.nodes[group]
            .children
            .iter()
            .map(|&c| &self.nodes[c].event)
    }

    fn child_count(&self, group: NodeHandle) -> usize {
        self.nodes[group].children.len()
    }

    /// New group from occurrences ordered newest first. Not yet placed in
    /// the row list.
    fn make_group(&mut self, events: Vec<CallEvent>) -> NodeHandle {
        let representative = events[0].clone();
        let group = self.nodes.alloc(Node {
            event: representative,
            parent: None,
            children: Vec::with_capacity(events.len()),
        });
        for event in events {
            let index = self.child_count(group);
            let _ = self.attach_child(group, index, event);
        }
        let _ = self.refresh_representative(group, None);
        group
    }

    fn attach_child(&mut self, group: NodeHandle, index: usize, event: CallEvent) -> NodeHandle {
        let id = event.id;
        let child = self.nodes.alloc(Node {
            event,
            parent: Some(group),
            children: Vec::new(),
        });
        self.nodes[group].children.insert(index, child);
        let _ = self.occurrences.insert(id, child);
        child
    }

    fn detach_child(&mut self, group: NodeHandle, index: usize) -> Option<CallEvent> {
        let children = &mut self.nodes[group].children;
        if index >= children.len() {
            return None;
        }
        let child = children.remove(index);
        let node = self.nodes.release(child)?;
        self.forget(node.event.id, child);
        Some(node.event)
    }

    fn forget(&mut self, id: EventId, handle: NodeHandle) {
        if self.occurrences.get(&id) == Some(&handle) {
            let _ = self.occurrences.remove(&id);
        }
    }

    /// Free a group and its occurrences. The caller removes it from `roots`.
    fn release_group(&mut self, group: NodeHandle) {
        let Some(node) = self.nodes.release(group) else {
            return;
        };
        for child in node.children {
            if let Some(c) = self.nodes.release(child) {
                self.forget(c.event.id, child);
            }
        }
    }

    /// Copy occurrence 0 into the group row and set its count, either the
    /// given one or the policy's. Returns whether the row changed.
    fn refresh_representative(&mut self, group: NodeHandle, count: Option<u32>) -> bool {
        let Some(&first) = self.nodes[group].children.first() else {
            return false;
        };
        let count = count.unwrap_or_else(|| self.policy.event_count(self.child_events(group)));
        let mut event = self.nodes[first].event.clone();
        event.event_count = count;
        let node = &mut self.nodes[group];
        if node.event == event {
            false
        } else {
            node.event = event;
            true
        }
    }

    /// Row at which a group represented by `event` belongs, ignoring the
    /// row at `skip`. Indices are into the row list without `skip`.
    fn time_position(&self, event: &CallEvent, skip: Option<usize>) -> usize {
        self.roots
            .iter()
            .enumerate()
            .filter(|&(row, _)| Some(row) != skip)
            .take_while(|&(_, &h)| is_newer(self.rep(h), event))
            .count()
    }

    /// Move the row at `row` to its time-ordered position. Returns the new row.
    fn reposition(&mut self, row: usize, log: &mut ChangeLog) -> usize {
        let handle = self.roots[row];
        let target = self.time_position(self.rep(handle), Some(row));
        if target != row {
            let _ = self.roots.remove(row);
            self.roots.insert(target, handle);
            log.moved(crate::change::Parent::Root, row, target);
        }
        target
    }
}

/// Borrowed view of one group.
#[derive(Clone, Copy)]
pub struct GroupView<'a> {
    tree: &'a GroupedEventTree,
    handle: NodeHandle,
}

impl<'a> GroupView<'a> {
    /// Stable handle, used as the parent of occurrence notifications.
    pub fn handle(&self) -> NodeHandle {
        self.handle
    }

    /// The row's display event, with the group count.
    pub fn representative(&self) -> &'a CallEvent {
        self.tree.rep(self.handle)
    }

    /// Number of occurrences.
    pub fn len(&self) -> usize {
        self.tree.child_count(self.handle)
    }

    /// Always false for a live group.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Occurrence at `index`, newest first.
    pub fn occurrence(&self, index: usize) -> Option<&'a CallEvent> {
        let tree = self.tree;
        tree.nodes[self.handle]
            .children
            .get(index)
            .map(|&c| &tree.nodes[c].event)
    }

    /// Occurrences, newest first.
    pub fn occurrences(&self) -> impl Iterator<Item = &'a CallEvent> + 'a {
        let tree = self.tree;
        tree.nodes[self.handle]
            .children
            .iter()
            .map(move |&c| &tree.nodes[c].event)
    }

    /// Group key.
    pub fn key(&self) -> GroupKey {
        self.tree.policy.key(self.representative())
    }
}

impl std::fmt::Debug for GroupView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupView")
            .field("handle", &self.handle)
            .field("representative", &self.representative().id)
            .field("count", &self.representative().event_count)
            .field("len", &self.len())
            .finish()
    }
}
