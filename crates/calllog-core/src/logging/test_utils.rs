//! In-memory capture of tracing events.
//!
//! Used by tests across the workspace to assert that failures are logged
//! at the right level with the right fields.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::level_filters::LevelFilter;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

/// One captured tracing event.
#[derive(Clone, Debug)]
pub struct CapturedRecord {
    /// Event level.
    pub level: Level,
    /// Emitting module path.
    pub target: String,
    /// Formatted message.
    pub message: String,
    /// Structured fields in emission order.
    pub fields: Vec<(String, String)>,
}

impl CapturedRecord {
    /// Value of the named field, if recorded.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Shared handle to captured records.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    records: Arc<Mutex<Vec<CapturedRecord>>>,
}

impl CapturedLogs {
    /// Snapshot of all records.
    pub fn records(&self) -> Vec<CapturedRecord> {
        self.records.lock().clone()
    }

    /// Whether any record at `level` contains `needle` in its message.
    pub fn has_event(&self, level: Level, needle: &str) -> bool {
        self.records
            .lock()
            .iter()
            .any(|r| r.level == level && r.message.contains(needle))
    }

    /// Number of records at `level`.
    pub fn count_at_level(&self, level: Level) -> usize {
        self.records.lock().iter().filter(|r| r.level == level).count()
    }

    /// Records whose target starts with `prefix`.
    pub fn for_target(&self, prefix: &str) -> Vec<CapturedRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.target.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Drop everything captured so far.
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

struct CaptureLayer {
    logs: CapturedLogs,
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl FieldVisitor {
    fn push(&mut self, field: &tracing::field::Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.push((field.name().to_owned(), value));
        }
    }
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.push(field, format!("{value:?}"));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.push(field, value.to_owned());
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.push(field, value.to_string());
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.push(field, value.to_string());
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.push(field, value.to_string());
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        self.logs.records.lock().push(CapturedRecord {
            level: *metadata.level(),
            target: metadata.target().to_owned(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

/// Install a thread-local capturing subscriber.
///
/// Keep the returned guard alive for as long as events should be captured.
/// Async tests must use the current-thread runtime (the `#[tokio::test]`
/// default) so spawned work logs on the capturing thread.
pub fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let layer = CaptureLayer { logs: logs.clone() };

    let subscriber = tracing_subscriber::registry()
        .with(layer)
        .with(LevelFilter::TRACE);

    let guard = subscriber.set_default();
    (logs, guard)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
