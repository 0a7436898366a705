//! Collaborator contracts consumed by the query pipeline and controller.

use async_trait::async_trait;
use tokio::sync::broadcast;

use calllog_core::{CallEvent, ContactRef, EventId};

use crate::change::{ChangeSet, ContactChange};
use crate::descriptor::QueryDescriptor;
use crate::errors::Result;
use crate::row::RawRow;

/// Source of call rows and target of call mutations.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Open a cursor over the rows `descriptor` selects, in store order
    /// (newest first).
    async fn execute_query(&self, descriptor: &QueryDescriptor) -> Result<Box<dyn RowCursor>>;

    /// Start a transaction. Its mutations become visible, and are broadcast
    /// as one [`ChangeSet`], only when it commits.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;

    /// Receive every committed [`ChangeSet`].
    fn subscribe(&self) -> broadcast::Receiver<ChangeSet>;
}

/// Row stream of one executing query.
///
/// Dropping the cursor releases whatever the store holds for it.
#[async_trait]
pub trait RowCursor: Send {
    /// Next row; `None` once the result set is exhausted.
    async fn next_row(&mut self) -> Option<Result<RawRow>>;

    /// Total rows in the result set, when the store knows it.
    fn total_rows(&self) -> Option<usize>;
}

/// An open store transaction.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Store a new call; returns its assigned id.
    async fn insert_event(&mut self, event: &CallEvent) -> Result<EventId>;

    /// Overwrite the stored data of `event.id`.
    async fn modify_event(&mut self, event: &CallEvent) -> Result<()>;

    /// Delete one call.
    async fn delete_event(&mut self, id: EventId) -> Result<()>;

    /// Mark every stored call read.
    async fn mark_all_read(&mut self) -> Result<()>;

    /// Delete every stored call.
    async fn delete_all(&mut self) -> Result<()>;

    /// Make the mutations durable and return what changed.
    async fn commit(self: Box<Self>) -> Result<ChangeSet>;

    /// Discard the mutations.
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Resolves remote addresses to address-book contacts.
#[async_trait]
pub trait ContactResolver: Send + Sync {
    /// Contacts attached to `remote_uid` as seen from `local_uid`.
    async fn resolve_contacts(&self, local_uid: &str, remote_uid: &str) -> Result<Vec<ContactRef>>;

    /// Receive contact change notifications.
    fn subscribe(&self) -> broadcast::Receiver<ContactChange>;
}
