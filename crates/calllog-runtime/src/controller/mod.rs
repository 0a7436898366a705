//! Call history controller.
//!
//! Owns the grouped tree and both query pipelines, turns store and contact
//! notifications into tree mutations, and routes user mutations through
//! store transactions. While the run loop owns it, a [`ControllerHandle`]
//! carries requests in. Mutating methods take `&mut self`: all tree mutation
//! happens on the one task that owns the controller.

mod fetch;
mod handle;
mod mutate;
mod run;
mod sync;

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::sync::Arc;

use calllog_core::{CallType, GroupingMode};
use calllog_query::{PipelineConfig, QueryPipeline, TaskId};
use calllog_settings::CallLogSettings;
use calllog_store::{ChangeSet, ContactChange, ContactResolver, EventStore, ExtraColumn};
use calllog_tree::{GroupedEventTree, GroupingPolicy, ViewFilter};
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};

use crate::contacts::ContactCache;
use crate::notification::{NotificationEmitter, ViewNotification};

pub use handle::ControllerHandle;
use handle::{REQUEST_CHANNEL_CAPACITY, Request};

/// What the view shows and how it is fetched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewOptions {
    /// Grouping mode.
    pub mode: GroupingMode,
    /// Call type filter.
    pub call_type: CallType,
    /// Oldest start time shown.
    pub reference_time: Option<DateTime<Utc>>,
    /// Trailing digits compared when matching phone numbers.
    pub match_digits: usize,
    /// Row limit passed to the store.
    pub limit: Option<usize>,
    /// Extra columns requested with the view rows.
    pub extra_columns: Vec<ExtraColumn>,
    /// Fill in contacts of newly added calls.
    pub resolve_on_insert: bool,
}

impl ViewOptions {
    /// Options from loaded settings.
    pub fn from_settings(settings: &CallLogSettings) -> Self {
        Self {
            mode: settings.grouping.mode,
            call_type: settings.grouping.call_type,
            reference_time: None,
            match_digits: settings.grouping.phone_match_digits,
            limit: settings.query.limit,
            extra_columns: Vec::new(),
            resolve_on_insert: settings.contacts.resolve_on_insert,
        }
    }

    fn policy(&self) -> GroupingPolicy {
        GroupingPolicy::new(self.mode, self.match_digits)
    }

    fn filter(&self) -> ViewFilter {
        ViewFilter {
            call_type: self.call_type,
            reference_time: self.reference_time,
        }
    }
}

/// Drives one grouped call history view.
pub struct CallHistoryController {
    store: Arc<dyn EventStore>,
    resolver: Arc<dyn ContactResolver>,
    tree: GroupedEventTree,
    view: QueryPipeline,
    members: QueryPipeline,
    contacts: ContactCache,
    emitter: NotificationEmitter,
    options: ViewOptions,
    view_task: Option<TaskId>,
    view_rows: usize,
    fetched: bool,
    own_commits: HashSet<u64>,
    store_changes: broadcast::Receiver<ChangeSet>,
    contact_changes: broadcast::Receiver<ContactChange>,
    request_tx: mpsc::Sender<Request>,
    requests: mpsc::Receiver<Request>,
}

impl CallHistoryController {
    /// Controller over `store` and `resolver`, configured from `settings`.
    pub fn new(
        store: Arc<dyn EventStore>,
        resolver: Arc<dyn ContactResolver>,
        settings: &CallLogSettings,
    ) -> Self {
        let options = ViewOptions::from_settings(settings);
        let config = PipelineConfig::from(&settings.query);
        Self::with_options(store, resolver, options, config, settings.contacts.cache_capacity)
    }

    /// Controller with explicit view options and pipeline configuration.
    ///
    /// Group member lookups run on a second pipeline with the same settings,
    /// queued and unstreamed.
    pub fn with_options(
        store: Arc<dyn EventStore>,
        resolver: Arc<dyn ContactResolver>,
        options: ViewOptions,
        config: PipelineConfig,
        cache_capacity: usize,
    ) -> Self {
        let members = QueryPipeline::new(Arc::clone(&store), config.clone().queued().unstreamed());
        let (request_tx, requests) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);
        Self {
            tree: GroupedEventTree::new(options.policy(), options.filter()),
            view: QueryPipeline::new(Arc::clone(&store), config),
            members,
            contacts: ContactCache::new(cache_capacity, options.match_digits),
            emitter: NotificationEmitter::new(),
            view_task: None,
            view_rows: 0,
            fetched: false,
            own_commits: HashSet::new(),
            store_changes: store.subscribe(),
            contact_changes: resolver.subscribe(),
            request_tx,
            requests,
            store,
            resolver,
            options,
        }
    }

    /// The grouped view.
    pub fn tree(&self) -> &GroupedEventTree {
        &self.tree
    }

    /// Current view options.
    pub fn options(&self) -> &ViewOptions {
        &self.options
    }

    /// Receive view notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ViewNotification> {
        self.emitter.subscribe()
    }

    /// Whether the view fetch is stalled at a chunk boundary.
    pub fn can_fetch_more(&self) -> bool {
        self.view_task.is_some() && self.view.can_fetch_more()
    }

    /// Whether a view fetch is in progress.
    pub fn is_loading(&self) -> bool {
        self.view_task.is_some()
    }

    /// The contact cache.
    pub fn contact_cache(&self) -> &ContactCache {
        &self.contacts
    }
}
