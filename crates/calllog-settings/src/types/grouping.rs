//! Grouping settings.

use calllog_core::address::DEFAULT_MATCH_DIGITS;
use calllog_core::{CallType, GroupingMode};
use serde::{Deserialize, Serialize};

/// Smallest accepted `phoneMatchDigits`.
pub const MIN_MATCH_DIGITS: usize = 4;
/// Largest accepted `phoneMatchDigits`.
pub const MAX_MATCH_DIGITS: usize = 15;

/// How the call log view clusters events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupingSettings {
    /// Initial grouping mode.
    pub mode: GroupingMode,
    /// Initial call-type filter.
    pub call_type: CallType,
    /// Trailing digits compared when matching phone numbers.
    pub phone_match_digits: usize,
}

impl Default for GroupingSettings {
    fn default() -> Self {
        Self {
            mode: GroupingMode::ByContact,
            call_type: CallType::All,
            phone_match_digits: DEFAULT_MATCH_DIGITS,
        }
    }
}
