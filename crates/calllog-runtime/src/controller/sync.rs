//! Keeping the view in step with store and contact changes.

use calllog_core::address::remote_address_match;
use calllog_core::{GroupKey, GroupingMode};
use calllog_store::{ChangeSet, ContactChange};
use calllog_tree::UpdateOutcome;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, instrument, warn};

use super::CallHistoryController;
use crate::errors::Result;

impl CallHistoryController {
    /// Apply a committed change set to the view.
    ///
    /// Order: full reset, deletions, modifications, additions. Deletions
    /// remove single occurrences. Modifications that move an event to
    /// another group re-fetch the affected groups.
    #[instrument(skip_all, fields(sequence = changes.sequence))]
    pub async fn apply_change_set(&mut self, changes: ChangeSet) -> Result<()> {
        if !self.fetched {
            return Ok(());
        }
        let ChangeSet {
            added,
            modified,
            deleted,
            all_deleted,
            ..
        } = changes;

        if all_deleted {
            let reset = self.tree.clear();
            self.emitter.emit_tree(reset);
        }
        for id in deleted {
            let tree_changes = self.tree.delete_occurrence(id)?;
            self.emitter.emit_tree(tree_changes);
        }

        let mut dirty: Vec<GroupKey> = Vec::new();
        for event in modified {
            let (outcome, tree_changes) = self.tree.update(event)?;
            self.emitter.emit_tree(tree_changes);
            if let UpdateOutcome::NeedsRefetch(keys) = outcome {
                for key in keys {
                    if !dirty.contains(&key) {
                        dirty.push(key);
                    }
                }
            }
        }

        for event in added {
            let unresolved = event.contacts.is_empty();
            let local_uid = event.local_uid.clone();
            let remote_uid = event.remote_uid.clone();
            let tree_changes = self.tree.insert(event)?;
            self.emitter.emit_tree(tree_changes);
            if unresolved && self.options.resolve_on_insert {
                self.fill_contacts(&local_uid, &remote_uid).await;
            }
        }

        if !dirty.is_empty() {
            self.refetch_groups(dirty).await?;
        }
        Ok(())
    }

    /// React to a contact change: forget cached lookups for its addresses
    /// and re-fetch what shows them.
    #[instrument(skip_all, fields(contact_id = change.contact_id))]
    pub async fn apply_contact_change(&mut self, change: ContactChange) -> Result<()> {
        let _ = self.contacts.invalidate(&change.remote_uids);
        if !self.fetched {
            return Ok(());
        }
        if self.options.mode == GroupingMode::ByTime {
            return self.refetch_view().await;
        }

        let digits = self.options.match_digits;
        let mut keys: Vec<GroupKey> = Vec::new();
        for group in self.tree.groups() {
            let remote = &group.representative().remote_uid;
            if change
                .remote_uids
                .iter()
                .any(|uid| remote_address_match(remote, uid, digits))
            {
                let key = group.key();
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        if keys.is_empty() {
            debug!("contact change does not touch the view");
            return Ok(());
        }
        self.refetch_groups(keys).await
    }

    /// Apply every store and contact notification received so far.
    /// Returns how many were handled.
    pub async fn sync_pending(&mut self) -> Result<usize> {
        let mut handled = 0;
        loop {
            match self.store_changes.try_recv() {
                Ok(changes) => self.on_store_change(changes).await?,
                Err(TryRecvError::Lagged(missed)) => self.on_lag("store", missed).await?,
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
            handled += 1;
        }
        loop {
            match self.contact_changes.try_recv() {
                Ok(change) => self.apply_contact_change(change).await?,
                Err(TryRecvError::Lagged(missed)) => self.on_lag("contact", missed).await?,
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
            handled += 1;
        }
        Ok(handled)
    }

    /// Apply a broadcast change set unless this controller committed it.
    pub(super) async fn on_store_change(&mut self, changes: ChangeSet) -> Result<()> {
        if self.own_commits.remove(&changes.sequence) {
            debug!(sequence = changes.sequence, "skipping own commit");
            return Ok(());
        }
        self.apply_change_set(changes).await
    }

    /// Notifications were dropped; the view can no longer be patched.
    pub(super) async fn on_lag(&mut self, source: &'static str, missed: u64) -> Result<()> {
        warn!(source, missed, "notifications lagged");
        self.own_commits.clear();
        if source == "contact" {
            self.contacts.clear();
        }
        self.refetch_view().await
    }

    async fn refetch_groups(&mut self, keys: Vec<GroupKey>) -> Result<()> {
        if self.options.mode == GroupingMode::ByTime {
            return self.refetch_view().await;
        }
        let fresh = self.fetch_members(keys.clone()).await?;
        let tree_changes = self.tree.reconcile(keys, fresh)?;
        self.emitter.emit_tree(tree_changes);
        Ok(())
    }

    async fn fill_contacts(&mut self, local_uid: &str, remote_uid: &str) {
        match self
            .contacts
            .resolve(self.resolver.as_ref(), local_uid, remote_uid)
            .await
        {
            Ok(contacts) if !contacts.is_empty() => {
                let tree_changes = self.tree.apply_contacts(local_uid, remote_uid, &contacts);
                self.emitter.emit_tree(tree_changes);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "contact resolution failed"),
        }
    }
}
