//! Shared task queue.
//!
//! The queue is the pipeline's only cross-thread entry point: any thread
//! may enqueue while the loop that owns the pipeline pops. Enqueueing wakes
//! that loop through [`TaskQueue::notified`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use calllog_store::QueryDescriptor;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

/// Task identifier, unique per queue.
pub type TaskId = u64;

/// One query waiting for or holding the cursor.
#[derive(Clone, Debug)]
pub struct QueryTask {
    /// Identifier reported in every pipeline event of the task.
    pub id: TaskId,
    /// What to fetch; its field list also drives materialization.
    pub descriptor: QueryDescriptor,
}

#[derive(Debug, Default)]
struct Inner {
    tasks: Mutex<VecDeque<QueryTask>>,
    next_id: AtomicU64,
    notify: Notify,
}

/// Cloneable handle to a FIFO of [`QueryTask`]s.
#[derive(Clone, Debug, Default)]
pub struct TaskQueue {
    inner: Arc<Inner>,
}

impl TaskQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task for `descriptor` and wake the owning loop.
    pub fn push(&self, descriptor: QueryDescriptor) -> TaskId {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let pending = {
            let mut tasks = self.inner.tasks.lock();
            tasks.push_back(QueryTask { id, descriptor });
            tasks.len()
        };
        debug!(task_id = id, pending, "query task enqueued");
        self.inner.notify.notify_one();
        id
    }

    /// Take the oldest task.
    pub fn pop(&self) -> Option<QueryTask> {
        self.inner.tasks.lock().pop_front()
    }

    /// Take every task except the newest, oldest first.
    pub fn drain_stale(&self) -> Vec<QueryTask> {
        let mut tasks = self.inner.tasks.lock();
        let keep = tasks.len().saturating_sub(1);
        tasks.drain(..keep).collect()
    }

    /// Take every task.
    pub fn drain(&self) -> Vec<QueryTask> {
        self.inner.tasks.lock().drain(..).collect()
    }

    /// Pending tasks.
    pub fn len(&self) -> usize {
        self.inner.tasks.lock().len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.inner.tasks.lock().is_empty()
    }

    /// Resolves after the next [`push`](Self::push), or immediately when a
    /// push happened since the last wake-up.
    pub async fn notified(&self) {
        self.inner.notify.notified().await;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use calllog_core::GroupingMode;
    use std::time::Duration;

    fn descriptor() -> QueryDescriptor {
        QueryDescriptor::events(GroupingMode::ByContact).build().unwrap()
    }

    #[test]
    fn fifo_with_increasing_ids() {
        let queue = TaskQueue::new();
        let a = queue.push(descriptor());
        let b = queue.push(descriptor());
        assert!(b > a);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().unwrap().id, a);
        assert_eq!(queue.pop().unwrap().id, b);
        assert!(queue.pop().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn drain_stale_keeps_newest() {
        let queue = TaskQueue::new();
        let ids: Vec<_> = (0..3).map(|_| queue.push(descriptor())).collect();
        let stale: Vec<_> = queue.drain_stale().into_iter().map(|t| t.id).collect();
        assert_eq!(stale, ids[..2]);
        assert_eq!(queue.pop().unwrap().id, ids[2]);
        assert!(queue.drain_stale().is_empty());
    }

    #[test]
    fn clones_share_state() {
        let queue = TaskQueue::new();
        let other = queue.clone();
        let _ = other.push(descriptor());
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain().len(), 1);
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn push_from_another_thread_wakes_waiter() {
        let queue = TaskQueue::new();
        let producer = queue.clone();
        let handle = std::thread::spawn(move || producer.push(descriptor()));

        tokio::time::timeout(Duration::from_secs(5), queue.notified())
            .await
            .unwrap();
        let id = handle.join().unwrap();
        assert_eq!(queue.pop().unwrap().id, id);
    }
}
