//! User-triggered mutations, each committed as one store transaction.
//!
//! A failing mutation rolls the whole transaction back and nothing reaches
//! the tree. After a commit the controller applies the returned change set
//! itself and skips the broadcast copy of it.

use calllog_core::{CallEvent, EventId};
use calllog_store::ChangeSet;
use calllog_tree::TreeError;
use metrics::counter;
use tracing::{error, info, instrument, warn};

use super::CallHistoryController;
use crate::errors::{ControllerError, Result};

/// One store mutation inside a controller transaction.
#[derive(Debug)]
enum Mutation {
    Delete(EventId),
    Modify(CallEvent),
    MarkAllRead,
    DeleteAll,
}

impl CallHistoryController {
    /// Delete every call of the group at `row`.
    ///
    /// Under time grouping that is the row's occurrences. Under the contact
    /// modes it is every stored call of the group's channel, including calls
    /// the current filters hide. Returns how many calls were deleted.
    #[instrument(skip(self), fields(mode = %self.options.mode))]
    pub async fn delete_at(&mut self, row: usize) -> Result<usize> {
        let mode = self.options.mode;
        if !mode.is_supported() {
            warn!("delete rejected for unsupported grouping mode");
            return Err(TreeError::UnsupportedMode(mode).into());
        }
        let len = self.tree.row_count();
        let (Some(handle), Some(key), Some(mut ids)) = (
            self.tree.handle_at(row),
            self.tree.group_key(row),
            self.tree.occurrence_ids(row),
        ) else {
            return Err(ControllerError::RowOutOfRange { row, len });
        };

        if mode.is_contact_mode() {
            for member in self.fetch_members(vec![key]).await? {
                if !ids.contains(&member.id) {
                    ids.push(member.id);
                }
            }
        }

        let changes = self
            .commit("delete_at", ids.iter().copied().map(Mutation::Delete).collect())
            .await?;
        if let Some(row) = self.tree.row_of(handle) {
            let tree_changes = self.tree.delete_row(row)?;
            self.emitter.emit_tree(tree_changes);
        }
        self.apply_change_set(changes).await?;
        info!(deleted = ids.len(), "group deleted");
        Ok(ids.len())
    }

    /// Delete one call.
    #[instrument(skip(self))]
    pub async fn delete_event(&mut self, id: EventId) -> Result<()> {
        let changes = self.commit("delete_event", vec![Mutation::Delete(id)]).await?;
        self.apply_change_set(changes).await
    }

    /// Mark the representative and every occurrence of the group at `row`
    /// read or unread. Returns how many calls changed.
    #[instrument(skip(self))]
    pub async fn set_group_read(&mut self, row: usize, read: bool) -> Result<usize> {
        let len = self.tree.row_count();
        let Some(group) = self.tree.group(row) else {
            return Err(ControllerError::RowOutOfRange { row, len });
        };
        let mutations: Vec<Mutation> = group
            .occurrences()
            .filter(|event| event.is_read != read)
            .map(|event| Mutation::Modify(event.clone().read(read)))
            .collect();
        let count = mutations.len();
        if count == 0 {
            return Ok(0);
        }
        let changes = self.commit("set_group_read", mutations).await?;
        self.apply_change_set(changes).await?;
        Ok(count)
    }

    /// Mark every stored call read.
    #[instrument(skip(self))]
    pub async fn mark_all_read(&mut self) -> Result<()> {
        let changes = self.commit("mark_all_read", vec![Mutation::MarkAllRead]).await?;
        self.apply_change_set(changes).await
    }

    /// Delete every stored call.
    #[instrument(skip(self))]
    pub async fn delete_all(&mut self) -> Result<()> {
        let changes = self.commit("delete_all", vec![Mutation::DeleteAll]).await?;
        self.apply_change_set(changes).await
    }

    /// Run `mutations` in one transaction.
    async fn commit(&mut self, operation: &'static str, mutations: Vec<Mutation>) -> Result<ChangeSet> {
        let mut tx = self.store.begin().await?;
        for mutation in &mutations {
            let result = match mutation {
                Mutation::Delete(id) => tx.delete_event(*id).await,
                Mutation::Modify(event) => tx.modify_event(event).await,
                Mutation::MarkAllRead => tx.mark_all_read().await,
                Mutation::DeleteAll => tx.delete_all().await,
            };
            if let Err(source) = result {
                error!(operation, ?mutation, error = %source, "mutation failed, rolling back");
                if let Err(e) = tx.rollback().await {
                    warn!(operation, error = %e, "rollback failed");
                }
                counter!("calllog_transactions_total", "outcome" => "rolled_back").increment(1);
                return Err(ControllerError::Consistency { operation, source });
            }
        }
        let changes = tx
            .commit()
            .await
            .map_err(|source| ControllerError::Consistency { operation, source })?;
        counter!("calllog_transactions_total", "outcome" => "committed").increment(1);
        if !changes.is_empty() {
            let _ = self.own_commits.insert(changes.sequence);
        }
        Ok(changes)
    }
}
