//! Settings type definitions.
//!
//! All types serialize as camelCase JSON. Every section is `#[serde(default)]`
//! so a partial file only overrides the keys it names.

mod grouping;
mod query;
mod storage;

pub use grouping::*;
pub use query::*;
pub use storage::*;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Root settings for the call log engine.
///
/// ```json
/// {
///   "grouping": { "mode": "byTime", "callType": "missed" },
///   "query": { "mode": "streamedAsync", "chunkSize": 20 }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallLogSettings {
    /// Grouping mode, filter and phone matching.
    pub grouping: GroupingSettings,
    /// Query pipeline behavior.
    pub query: QuerySettings,
    /// Event store location.
    pub store: StoreSettings,
    /// Contact cache and resolution.
    pub contacts: ContactSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl CallLogSettings {
    /// Clamp values into their working ranges.
    pub fn validate(&mut self) {
        if self.query.first_chunk_size == 0 {
            warn!("query.firstChunkSize must be at least 1, clamping");
            self.query.first_chunk_size = 1;
        }
        if self.query.chunk_size == 0 {
            warn!("query.chunkSize must be at least 1, clamping");
            self.query.chunk_size = 1;
        }
        let digits = self.grouping.phone_match_digits;
        let clamped = digits.clamp(MIN_MATCH_DIGITS, MAX_MATCH_DIGITS);
        if clamped != digits {
            warn!(digits, clamped, "grouping.phoneMatchDigits out of range, clamping");
            self.grouping.phone_match_digits = clamped;
        }
        if self.store.pool_size == 0 {
            self.store.pool_size = 1;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use calllog_core::{CallType, GroupingMode};

    #[test]
    fn defaults() {
        let s = CallLogSettings::default();
        assert_eq!(s.grouping.mode, GroupingMode::ByContact);
        assert_eq!(s.grouping.call_type, CallType::All);
        assert_eq!(s.grouping.phone_match_digits, 7);
        assert_eq!(s.query.mode, QueryMode::Async);
        assert_eq!(s.query.first_chunk_size, 25);
        assert_eq!(s.query.chunk_size, 50);
        assert!(!s.query.queue_enabled);
        assert_eq!(s.query.idle_cursor_timeout_ms, 30_000);
        assert!(s.query.limit.is_none());
        assert_eq!(s.store.pool_size, 4);
        assert_eq!(s.contacts.cache_capacity, 1024);
        assert_eq!(s.logging.level, "warn");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: CallLogSettings =
            serde_json::from_str(r#"{"query": {"mode": "streamedAsync", "chunkSize": 5}}"#).unwrap();
        assert_eq!(s.query.mode, QueryMode::StreamedAsync);
        assert_eq!(s.query.chunk_size, 5);
        assert_eq!(s.query.first_chunk_size, 25);
        assert_eq!(s.grouping, GroupingSettings::default());
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(CallLogSettings::default()).unwrap();
        assert_eq!(json["grouping"]["phoneMatchDigits"], 7);
        assert_eq!(json["query"]["firstChunkSize"], 25);
        assert_eq!(json["query"]["idleCursorTimeoutMs"], 30_000);
        assert!(json["query"].get("limit").is_none());
    }

    #[test]
    fn validate_clamps() {
        let mut s = CallLogSettings::default();
        s.query.first_chunk_size = 0;
        s.query.chunk_size = 0;
        s.grouping.phone_match_digits = 40;
        s.validate();
        assert_eq!(s.query.first_chunk_size, 1);
        assert_eq!(s.query.chunk_size, 1);
        assert_eq!(s.grouping.phone_match_digits, MAX_MATCH_DIGITS);

        s.grouping.phone_match_digits = 1;
        s.validate();
        assert_eq!(s.grouping.phone_match_digits, MIN_MATCH_DIGITS);
    }

    #[test]
    fn query_mode_parse() {
        assert_eq!("sync".parse::<QueryMode>().unwrap(), QueryMode::Sync);
        assert!("eager".parse::<QueryMode>().is_err());
        assert!(QueryMode::StreamedAsync.is_streamed());
        assert!(!QueryMode::Async.is_streamed());
    }

    #[test]
    fn store_path_expands_home() {
        let s = StoreSettings {
            path: "/var/lib/calls.db".into(),
            ..StoreSettings::default()
        };
        assert_eq!(s.resolved_path(), std::path::PathBuf::from("/var/lib/calls.db"));
        assert!(StoreSettings::default().resolved_path().ends_with(".calllog/calls.db"));
    }
}
