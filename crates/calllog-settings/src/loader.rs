//! Settings loading with deep merge and environment overrides.
//!
//! 1. Start from [`CallLogSettings::default()`]
//! 2. Deep-merge `~/.calllog/settings.json` when it exists
//! 3. Apply `CALLLOG_*` environment overrides
//! 4. Clamp with [`CallLogSettings::validate`]
//!
//! Merge rules: objects merge per key, arrays and scalars are replaced,
//! `null` in the file keeps the default.

use std::path::{Path, PathBuf};

use calllog_core::GroupingMode;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{CallLogSettings, QueryMode};

/// `$HOME`, or `/tmp` when unset.
pub fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string()))
}

/// `~/.calllog/settings.json`.
pub fn settings_path() -> PathBuf {
    home_dir().join(".calllog").join("settings.json")
}

/// Load from the default path with environment overrides.
pub fn load_settings() -> Result<CallLogSettings> {
    load_settings_from_path(&settings_path())
}

/// Load from `path` with environment overrides.
///
/// A missing file yields defaults; unreadable or malformed JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<CallLogSettings> {
    let defaults = serde_json::to_value(CallLogSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: CallLogSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate();
    Ok(settings)
}

/// Recursive merge of `source` over `target`.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `CALLLOG_*` overrides from the process environment.
pub fn apply_env_overrides(settings: &mut CallLogSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides using `lookup` as the variable source.
///
/// Invalid values are logged and ignored.
pub fn apply_overrides_from<F>(settings: &mut CallLogSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── grouping ──
    if let Some(v) = env.parsed::<GroupingMode>("CALLLOG_GROUPING_MODE") {
        settings.grouping.mode = v;
    }

    // ── query ──
    if let Some(v) = env.parsed::<QueryMode>("CALLLOG_QUERY_MODE") {
        settings.query.mode = v;
    }
    if let Some(v) = env.usize_in("CALLLOG_FIRST_CHUNK_SIZE", 1, 100_000) {
        settings.query.first_chunk_size = v;
    }
    if let Some(v) = env.usize_in("CALLLOG_CHUNK_SIZE", 1, 100_000) {
        settings.query.chunk_size = v;
    }
    if let Some(v) = env.bool("CALLLOG_QUEUE_ENABLED") {
        settings.query.queue_enabled = v;
    }
    if let Some(v) = env.u64_in("CALLLOG_IDLE_CURSOR_TIMEOUT_MS", 100, 3_600_000) {
        settings.query.idle_cursor_timeout_ms = v;
    }

    // ── store / logging ──
    if let Some(v) = env.string("CALLLOG_DB_PATH") {
        settings.store.path = v;
    }
    if let Some(v) = env.string("CALLLOG_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`, case-insensitively.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a `u64` within `min..=max`.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a `usize` within `min..=max`.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

// ── Variable readers ────────────────────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn checked<T>(&self, name: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
        let val = self.string(name)?;
        let result = parse(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid env override, ignoring");
        }
        result
    }

    fn bool(&self, name: &str) -> Option<bool> {
        self.checked(name, parse_bool)
    }

    fn u64_in(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        self.checked(name, |v| parse_u64_range(v, min, max))
    }

    fn usize_in(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        self.checked(name, |v| parse_usize_range(v, min, max))
    }

    fn parsed<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        self.checked(name, |v| v.parse().ok())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
