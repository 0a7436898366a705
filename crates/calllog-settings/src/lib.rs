//! # calllog-settings
//!
//! Layered configuration for the call log engine.
//!
//! Settings come from three layers, later ones winning:
//! 1. **Compiled defaults** ([`CallLogSettings::default()`])
//! 2. **User file** `~/.calllog/settings.json`, deep-merged over defaults
//! 3. **Environment** `CALLLOG_*` overrides
//!
//! The global snapshot is reloadable: [`reload_settings_from_path`] swaps
//! the cached value and later [`get_settings`] calls see the new one.
//!
//! ## Crate Position
//!
//! Depends on calllog-core. Depended on by calllog-query and calllog-runtime.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

static SETTINGS: RwLock<Option<Arc<CallLogSettings>>> = RwLock::new(None);

/// The global settings snapshot.
///
/// Loaded from disk on first access; falls back to defaults when loading
/// fails.
pub fn get_settings() -> Arc<CallLogSettings> {
    if let Some(s) = SETTINGS.read().as_ref() {
        return Arc::clone(s);
    }

    let mut guard = SETTINGS.write();
    if let Some(s) = guard.as_ref() {
        return Arc::clone(s);
    }

    let settings = Arc::new(match load_settings() {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            CallLogSettings::default()
        }
    });
    *guard = Some(Arc::clone(&settings));
    settings
}

/// Replace the global snapshot.
pub fn init_settings(settings: CallLogSettings) {
    *SETTINGS.write() = Some(Arc::new(settings));
}

/// Reload the global snapshot from `path`.
pub fn reload_settings_from_path(path: &Path) {
    let new = Arc::new(match load_settings_from_path(path) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, ?path, "failed to reload settings, falling back to defaults");
            CallLogSettings::default()
        }
    });
    *SETTINGS.write() = Some(new);
    tracing::info!(?path, "settings reloaded");
}

#[cfg(test)]
fn reset_settings() {
    *SETTINGS.write() = None;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
