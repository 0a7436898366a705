//! Call event records and the enums that classify them.
//!
//! A [`CallEvent`] is one concrete call occurrence as stored by the event
//! store. Identity is the store-assigned [`EventId`]; everything else may be
//! modified in place by later store updates.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Store-assigned event identifier.
pub type EventId = i64;

/// Whether the call was received or placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    /// Incoming call (answered or missed).
    Inbound,
    /// Outgoing (dialed) call.
    Outbound,
}

impl Direction {
    /// Stable integer encoding used by the store.
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Inbound => 0,
            Self::Outbound => 1,
        }
    }

    /// Decode the store's integer encoding.
    pub fn from_i64(value: i64) -> crate::Result<Self> {
        match value {
            0 => Ok(Self::Inbound),
            1 => Ok(Self::Outbound),
            other => Err(CoreError::InvalidValue {
                field: "direction",
                reason: format!("expected 0 or 1, got {other}"),
            }),
        }
    }
}

/// A contact resolved for an event's remote party.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRef {
    /// Contact identifier in the address book.
    pub id: i64,
    /// Display name.
    pub name: String,
}

/// One call occurrence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEvent {
    /// Store-assigned identifier.
    pub id: EventId,
    /// When the call started.
    pub start_time: DateTime<Utc>,
    /// When the call ended, if it connected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Inbound or outbound.
    pub direction: Direction,
    /// Local account the call went through.
    pub local_uid: String,
    /// Remote party address (phone number or SIP/IM address).
    pub remote_uid: String,
    /// Inbound call that was never answered.
    pub is_missed_call: bool,
    /// Video rather than audio call.
    pub is_video_call: bool,
    /// Whether the user has seen the call.
    pub is_read: bool,
    /// Aggregate occurrence count shown on a group representative.
    pub event_count: u32,
    /// Contacts attached to the remote party.
    #[serde(default)]
    pub contacts: Vec<ContactRef>,
    /// Last store modification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl CallEvent {
    /// Create an answered audio call with defaults for the remaining fields.
    pub fn new(
        id: EventId,
        local_uid: impl Into<String>,
        remote_uid: impl Into<String>,
        direction: Direction,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            start_time,
            end_time: None,
            direction,
            local_uid: local_uid.into(),
            remote_uid: remote_uid.into(),
            is_missed_call: false,
            is_video_call: false,
            is_read: false,
            event_count: 1,
            contacts: Vec::new(),
            last_modified: None,
        }
    }

    /// Builder: set the missed-call flag.
    #[must_use]
    pub fn missed(mut self, missed: bool) -> Self {
        self.is_missed_call = missed;
        self
    }

    /// Builder: set the video flag.
    #[must_use]
    pub fn video(mut self, video: bool) -> Self {
        self.is_video_call = video;
        self
    }

    /// Builder: set the read flag.
    #[must_use]
    pub fn read(mut self, read: bool) -> Self {
        self.is_read = read;
        self
    }

    /// Builder: attach contacts.
    #[must_use]
    pub fn with_contacts(mut self, contacts: Vec<ContactRef>) -> Self {
        self.contacts = contacts;
        self
    }

    /// The call-type class this event falls into.
    pub fn call_type(&self) -> CallType {
        match (self.direction, self.is_missed_call) {
            (Direction::Outbound, _) => CallType::Dialed,
            (Direction::Inbound, true) => CallType::Missed,
            (Direction::Inbound, false) => CallType::Received,
        }
    }
}

/// Call-type filter applied to views.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CallType {
    /// No filtering.
    #[default]
    All,
    /// Inbound calls that were not answered.
    Missed,
    /// Outbound calls.
    Dialed,
    /// Inbound calls that were answered.
    Received,
}

impl CallType {
    /// Whether `event` passes this filter.
    pub fn matches(self, event: &CallEvent) -> bool {
        match self {
            Self::All => true,
            Self::Missed => event.direction == Direction::Inbound && event.is_missed_call,
            Self::Dialed => event.direction == Direction::Outbound,
            Self::Received => event.direction == Direction::Inbound && !event.is_missed_call,
        }
    }

    /// Wire name (matches the serde encoding).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Missed => "missed",
            Self::Dialed => "dialed",
            Self::Received => "received",
        }
    }
}

impl FromStr for CallType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "missed" => Ok(Self::Missed),
            "dialed" => Ok(Self::Dialed),
            "received" => Ok(Self::Received),
            other => Err(CoreError::UnknownVariant {
                kind: "call type",
                value: other.to_string(),
            }),
        }
    }
}

/// How call events are clustered into groups.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupingMode {
    /// One group per remote party and media type; most recent first.
    #[default]
    ByContact,
    /// Consecutive calls of the same kind with the same party, in time order.
    ByTime,
    /// One group per remote party, media type and call kind.
    ByContactAndType,
    /// Grouping by call type only. Not supported for incremental edits.
    ByType,
    /// Grouping by account/service. Not supported for incremental edits.
    ByService,
}

impl GroupingMode {
    /// Whether grouped edits (insert/update/delete) are implemented for this mode.
    pub fn is_supported(self) -> bool {
        matches!(self, Self::ByContact | Self::ByTime | Self::ByContactAndType)
    }

    /// Whether group membership also requires equal direction and missed flag.
    pub fn is_typed(self) -> bool {
        matches!(self, Self::ByTime | Self::ByContactAndType)
    }

    /// Contact-centric modes (ByContact, ByContactAndType).
    pub fn is_contact_mode(self) -> bool {
        matches!(self, Self::ByContact | Self::ByContactAndType)
    }

    /// Wire name (matches the serde encoding).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ByContact => "byContact",
            Self::ByTime => "byTime",
            Self::ByContactAndType => "byContactAndType",
            Self::ByType => "byType",
            Self::ByService => "byService",
        }
    }
}

impl fmt::Display for GroupingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupingMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "byContact" => Ok(Self::ByContact),
            "byTime" => Ok(Self::ByTime),
            "byContactAndType" => Ok(Self::ByContactAndType),
            "byType" => Ok(Self::ByType),
            "byService" => Ok(Self::ByService),
            other => Err(CoreError::UnknownVariant {
                kind: "grouping mode",
                value: other.to_string(),
            }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn call(direction: Direction, missed: bool) -> CallEvent {
        CallEvent::new(1, "ring/tel/ring", "+15551234567", direction, at(100)).missed(missed)
    }

    #[test]
    fn new_event_defaults() {
        let event = call(Direction::Inbound, false);
        assert_eq!(event.event_count, 1);
        assert!(!event.is_video_call);
        assert!(event.contacts.is_empty());
    }

    #[test]
    fn call_type_classification() {
        assert_eq!(call(Direction::Inbound, true).call_type(), CallType::Missed);
        assert_eq!(call(Direction::Inbound, false).call_type(), CallType::Received);
        assert_eq!(call(Direction::Outbound, false).call_type(), CallType::Dialed);
    }

    #[test]
    fn call_type_filter_matches() {
        let missed = call(Direction::Inbound, true);
        let received = call(Direction::Inbound, false);
        let dialed = call(Direction::Outbound, false);

        assert!(CallType::All.matches(&missed));
        assert!(CallType::Missed.matches(&missed));
        assert!(!CallType::Missed.matches(&received));
        assert!(CallType::Received.matches(&received));
        assert!(!CallType::Received.matches(&dialed));
        assert!(CallType::Dialed.matches(&dialed));
        assert!(!CallType::Dialed.matches(&missed));
    }

    #[test]
    fn grouping_mode_support() {
        assert!(GroupingMode::ByContact.is_supported());
        assert!(GroupingMode::ByTime.is_supported());
        assert!(GroupingMode::ByContactAndType.is_supported());
        assert!(!GroupingMode::ByType.is_supported());
        assert!(!GroupingMode::ByService.is_supported());
        assert!(!GroupingMode::ByContact.is_typed());
        assert!(GroupingMode::ByTime.is_typed());
    }

    #[test]
    fn grouping_mode_parse_roundtrip() {
        for mode in [
            GroupingMode::ByContact,
            GroupingMode::ByTime,
            GroupingMode::ByContactAndType,
            GroupingMode::ByType,
            GroupingMode::ByService,
        ] {
            assert_eq!(mode.as_str().parse::<GroupingMode>().unwrap(), mode);
            let json = serde_json::to_value(mode).unwrap();
            assert_eq!(json, mode.as_str());
        }
    }

    #[test]
    fn grouping_mode_parse_rejects_unknown() {
        assert_matches!(
            "byColor".parse::<GroupingMode>(),
            Err(CoreError::UnknownVariant { kind: "grouping mode", .. })
        );
    }

    #[test]
    fn call_type_parse() {
        assert_eq!("missed".parse::<CallType>().unwrap(), CallType::Missed);
        assert!("busy".parse::<CallType>().is_err());
    }

    #[test]
    fn direction_integer_encoding() {
        assert_eq!(Direction::from_i64(Direction::Outbound.as_i64()).unwrap(), Direction::Outbound);
        assert_matches!(Direction::from_i64(9), Err(CoreError::InvalidValue { .. }));
    }

    #[test]
    fn event_serializes_camel_case() {
        let event = call(Direction::Inbound, true).video(true);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["isMissedCall"], true);
        assert_eq!(json["isVideoCall"], true);
        assert_eq!(json["direction"], "inbound");
        assert!(json.get("endTime").is_none());
    }
}
