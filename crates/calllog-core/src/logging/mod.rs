//! Tracing subscriber setup.
//!
//! Every calllog crate logs through `tracing` macros with structured fields.
//! The binary or embedding application installs a subscriber once with
//! [`init_subscriber`]; tests install a scoped in-memory one with
//! [`capture_logs`].

pub mod test_utils;

pub use test_utils::{CapturedLogs, CapturedRecord, capture_logs};

/// Default level when neither settings nor `RUST_LOG` specify one.
pub const DEFAULT_LEVEL: &str = "warn";

/// Install the global stderr subscriber.
///
/// `RUST_LOG` takes precedence over `level`. Calls after the first are no-ops.
pub fn init_subscriber(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    let _ = subscriber.try_init();
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
