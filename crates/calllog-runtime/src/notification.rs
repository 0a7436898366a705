//! Notifications to the presentation layer.

use std::sync::atomic::{AtomicU64, Ordering};

use calllog_store::{ExtraColumn, FieldValue};
use calllog_tree::TreeChange;
use tokio::sync::broadcast;

/// Default broadcast channel capacity.
const DEFAULT_CAPACITY: usize = 1024;

/// One view notification.
#[derive(Clone, Debug, PartialEq)]
pub enum ViewNotification {
    /// Structural or data change of the row tree.
    Tree(TreeChange),
    /// Extra column values for view records `start..=end`, in load order.
    Extras {
        /// Index of the first record.
        start: usize,
        /// Index of the last record.
        end: usize,
        /// Which columns `values` holds.
        columns: Vec<ExtraColumn>,
        /// One entry per record.
        values: Vec<Vec<FieldValue>>,
    },
    /// The view fetch stalled at a chunk boundary (`true`) or resumed.
    CanFetchMore(bool),
    /// The view fetch delivered every row.
    FetchFinished {
        /// Records received from the store.
        rows: usize,
    },
    /// The view fetch failed. Rows already shown stay.
    FetchFailed {
        /// Diagnostic detail.
        reason: String,
    },
}

/// Broadcast fan-out of [`ViewNotification`]s.
///
/// Non-blocking: `emit` never awaits and lagging receivers lose the oldest
/// notifications.
pub struct NotificationEmitter {
    tx: broadcast::Sender<ViewNotification>,
    emit_count: AtomicU64,
}

impl NotificationEmitter {
    /// Emitter with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Emitter with a custom capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            emit_count: AtomicU64::new(0),
        }
    }

    /// Send to every subscriber. Returns how many received it.
    pub fn emit(&self, notification: ViewNotification) -> usize {
        let _ = self.emit_count.fetch_add(1, Ordering::Relaxed);
        self.tx.send(notification).unwrap_or(0)
    }

    /// Emit each tree change in order.
    pub fn emit_tree(&self, changes: Vec<TreeChange>) {
        for change in changes {
            let _ = self.emit(ViewNotification::Tree(change));
        }
    }

    /// Receive everything emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ViewNotification> {
        self.tx.subscribe()
    }

    /// Total notifications emitted.
    pub fn emit_count(&self) -> u64 {
        self.emit_count.load(Ordering::Relaxed)
    }
}

impl Default for NotificationEmitter {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
