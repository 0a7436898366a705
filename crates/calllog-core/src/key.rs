//! Group identity derived from an event and a grouping mode.
//!
//! Two events belong to the same group exactly when their [`GroupKey`]s are
//! equal. The [`ChannelKey`] part (local account, remote party, media type)
//! is what a store can filter on; the optional [`CallKind`] part adds the
//! direction and missed flag for typed modes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::minimize_remote;
use crate::event::{CallEvent, Direction, GroupingMode};

/// Local account, remote party and media type of a call.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelKey {
    /// Local account uid.
    pub local_uid: String,
    /// Minimized remote address.
    pub remote: String,
    /// Video rather than audio.
    pub is_video: bool,
}

impl ChannelKey {
    /// Channel of `event`, comparing phone numbers by `digits` trailing digits.
    pub fn of(event: &CallEvent, digits: usize) -> Self {
        Self {
            local_uid: event.local_uid.clone(),
            remote: minimize_remote(&event.remote_uid, digits),
            is_video: event.is_video_call,
        }
    }
}

/// Direction and missed flag, compared under typed grouping modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallKind {
    /// Inbound or outbound.
    pub direction: Direction,
    /// Missed flag.
    pub missed: bool,
}

impl CallKind {
    /// Kind of `event`.
    pub fn of(event: &CallEvent) -> Self {
        Self {
            direction: event.direction,
            missed: event.is_missed_call,
        }
    }
}

/// Equivalence class of events under a grouping mode.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupKey {
    /// Channel part.
    pub channel: ChannelKey,
    /// Kind part, present for typed modes only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<CallKind>,
}

impl GroupKey {
    /// Key of `event` under `mode`.
    pub fn new(event: &CallEvent, mode: GroupingMode, digits: usize) -> Self {
        Self {
            channel: ChannelKey::of(event, digits),
            kind: mode.is_typed().then(|| CallKind::of(event)),
        }
    }

    /// The store-filterable channel part.
    pub fn channel(&self) -> &ChannelKey {
        &self.channel
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let media = if self.channel.is_video { "video" } else { "audio" };
        write!(f, "{}!{}!{media}", self.channel.local_uid, self.channel.remote)?;
        if let Some(kind) = self.kind {
            let dir = match kind.direction {
                Direction::Inbound => "in",
                Direction::Outbound => "out",
            };
            write!(f, "!{dir}")?;
            if kind.missed {
                f.write_str("!missed")?;
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
