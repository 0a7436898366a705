//! Grouping policy and view filter.
//!
//! [`GroupingPolicy`] decides which events share a group and what count a
//! group representative shows. [`ViewFilter`] decides which events a view
//! displays at all.

use std::cmp::Ordering;

use calllog_core::{CallEvent, CallType, ChannelKey, GroupKey, GroupingMode};
use chrono::{DateTime, Utc};

/// Group membership and count rules for one grouping mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupingPolicy {
    mode: GroupingMode,
    match_digits: usize,
}

impl GroupingPolicy {
    /// Policy for `mode`, comparing phone numbers by `match_digits` trailing digits.
    pub fn new(mode: GroupingMode, match_digits: usize) -> Self {
        Self { mode, match_digits }
    }

    /// Grouping mode.
    pub fn mode(&self) -> GroupingMode {
        self.mode
    }

    /// Trailing digits compared for phone numbers.
    pub fn match_digits(&self) -> usize {
        self.match_digits
    }

    /// Group key of `event`.
    pub fn key(&self, event: &CallEvent) -> GroupKey {
        GroupKey::new(event, self.mode, self.match_digits)
    }

    /// Whether `a` and `b` belong to the same group.
    pub fn same_group(&self, a: &CallEvent, b: &CallEvent) -> bool {
        if self.mode.is_typed()
            && (a.direction != b.direction || a.is_missed_call != b.is_missed_call)
        {
            return false;
        }
        self.same_channel(a, b)
    }

    /// Same local account, remote party and media type, ignoring call kind.
    pub fn same_channel(&self, a: &CallEvent, b: &CallEvent) -> bool {
        a.local_uid == b.local_uid
            && a.is_video_call == b.is_video_call
            && ChannelKey::of(a, self.match_digits).remote
                == ChannelKey::of(b, self.match_digits).remote
    }

    /// Count shown on a representative whose occurrences are `children`,
    /// newest first.
    ///
    /// Contact modes count the run of missed calls starting at the
    /// representative; any other representative shows 1. Time grouping
    /// counts every occurrence.
    pub fn event_count<'a, I>(&self, children: I) -> u32
    where
        I: IntoIterator<Item = &'a CallEvent>,
    {
        let mut iter = children.into_iter();
        match self.mode {
            GroupingMode::ByTime => iter.count() as u32,
            GroupingMode::ByContact | GroupingMode::ByContactAndType => {
                match iter.next() {
                    Some(first) if first.is_missed_call => {
                        1 + iter.take_while(|e| e.is_missed_call).count() as u32
                    }
                    _ => 1,
                }
            }
            GroupingMode::ByType | GroupingMode::ByService => 1,
        }
    }

    /// Count after `incoming` replaces `current` as representative.
    ///
    /// The streak continues when both calls have the same direction and
    /// missed flag, and restarts at 1 otherwise.
    pub fn chained_count(current: &CallEvent, incoming: &CallEvent) -> u32 {
        if current.direction == incoming.direction
            && current.is_missed_call == incoming.is_missed_call
        {
            current.event_count.saturating_add(1)
        } else {
            1
        }
    }
}

/// Newest-first ordering of events: later start first, then higher id.
pub fn newest_first(a: &CallEvent, b: &CallEvent) -> Ordering {
    b.start_time.cmp(&a.start_time).then(b.id.cmp(&a.id))
}

/// Whether `a` sorts strictly before `b` in newest-first order.
pub fn is_newer(a: &CallEvent, b: &CallEvent) -> bool {
    newest_first(a, b) == Ordering::Less
}

/// Which events a view displays.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewFilter {
    /// Call-type filter.
    pub call_type: CallType,
    /// Hide calls that started before this instant.
    pub reference_time: Option<DateTime<Utc>>,
}

impl ViewFilter {
    /// Filter with only a call type.
    pub fn call_type(call_type: CallType) -> Self {
        Self {
            call_type,
            reference_time: None,
        }
    }

    /// Whether `event` is recent enough.
    pub fn within_reference(&self, event: &CallEvent) -> bool {
        self.reference_time.is_none_or(|t| event.start_time >= t)
    }

    /// Whether `event` passes both the time bound and the call-type filter.
    pub fn passes(&self, event: &CallEvent) -> bool {
        self.within_reference(event) && self.call_type.matches(event)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
