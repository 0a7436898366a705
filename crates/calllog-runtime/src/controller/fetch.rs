//! View fetching and group member lookups.

use calllog_core::{CallEvent, CallType, GroupKey, GroupingMode};
use calllog_query::PipelineEvent;
use calllog_store::{ExtraColumn, QueryDescriptor};
use calllog_tree::TreeError;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use super::CallHistoryController;
use crate::errors::Result;
use crate::notification::ViewNotification;

impl CallHistoryController {
    /// Change grouping and filters.
    ///
    /// The view is cleared; it is fetched again when it had been fetched
    /// before. Unsupported modes are rejected without touching anything.
    #[instrument(skip(self), fields(%mode, call_type = call_type.as_str()))]
    pub async fn set_filter(
        &mut self,
        mode: GroupingMode,
        call_type: CallType,
        reference_time: Option<DateTime<Utc>>,
    ) -> Result<()> {
        if !mode.is_supported() {
            warn!("grouping mode not supported");
            return Err(TreeError::UnsupportedMode(mode).into());
        }
        self.options.mode = mode;
        self.options.call_type = call_type;
        self.options.reference_time = reference_time;
        let changes = self
            .tree
            .reconfigure(self.options.policy(), self.options.filter());
        self.emitter.emit_tree(changes);
        if self.fetched {
            self.get_events().await?;
        }
        Ok(())
    }

    /// Extra columns requested from the next fetch on.
    pub fn set_extra_columns(&mut self, columns: Vec<ExtraColumn>) {
        self.options.extra_columns = columns;
    }

    /// Fetch the view from scratch.
    ///
    /// Clears the tree, supersedes any fetch in progress and drops store
    /// notifications received so far. Returns once
    /// the first chunk is in (streamed modes) or the fetch has finished.
    #[instrument(skip(self), fields(mode = %self.options.mode))]
    pub async fn get_events(&mut self) -> Result<()> {
        let descriptor = self.view_descriptor()?;
        let changes = self.tree.clear();
        self.emitter.emit_tree(changes);
        // The fetch reads current state: change sets already queued are in it.
        self.store_changes = self.store.subscribe();
        self.own_commits.clear();
        self.fetched = true;
        self.view_rows = 0;
        let task = self.view.enqueue(descriptor);
        debug!(task_id = task, "view fetch queued");
        self.view_task = Some(task);
        self.pump_view().await
    }

    /// Continue a fetch stalled at a chunk boundary. Returns whether there
    /// was one.
    pub async fn fetch_more(&mut self) -> Result<bool> {
        if !self.can_fetch_more() {
            return Ok(false);
        }
        let events = self.view.fetch_more().await;
        self.handle_view_events(events)?;
        Ok(true)
    }

    /// Fetch the view again with the current options, if it was fetched
    /// before.
    pub(super) async fn refetch_view(&mut self) -> Result<()> {
        if self.fetched {
            info!("refetching view");
            self.get_events().await
        } else {
            Ok(())
        }
    }

    pub(super) async fn pump_view(&mut self) -> Result<()> {
        let events = if self.view.config().is_sync() {
            self.view.drain().await
        } else {
            self.view.poll().await
        };
        self.handle_view_events(events)
    }

    pub(super) async fn expire_view_cursor(&mut self) -> Result<()> {
        let events = self.view.expire_idle_cursor().await;
        self.handle_view_events(events)
    }

    fn view_descriptor(&self) -> Result<QueryDescriptor> {
        let options = &self.options;
        let builder = options.extra_columns.iter().fold(
            QueryDescriptor::events(options.mode)
                .call_type(options.call_type)
                .reference_time(options.reference_time)
                .limit(options.limit),
            |builder, &column| builder.extra_column(column),
        );
        Ok(builder.build()?)
    }

    fn handle_view_events(&mut self, events: Vec<PipelineEvent>) -> Result<()> {
        for event in events {
            if Some(event.task()) != self.view_task {
                debug!(task_id = event.task(), "dropping notification of replaced fetch");
                continue;
            }
            match event {
                PipelineEvent::Batch { records, .. } => {
                    self.view_rows += records.len();
                    let changes = self.tree.load_batch(records)?;
                    self.emitter.emit_tree(changes);
                }
                PipelineEvent::Extras {
                    start,
                    end,
                    columns,
                    values,
                    ..
                } => {
                    let _ = self.emitter.emit(ViewNotification::Extras {
                        start,
                        end,
                        columns,
                        values,
                    });
                }
                PipelineEvent::CanFetchMoreChanged { can_fetch_more, .. } => {
                    let _ = self.emitter.emit(ViewNotification::CanFetchMore(can_fetch_more));
                }
                PipelineEvent::Finished { outcome, .. } => {
                    self.view_task = None;
                    match outcome {
                        Ok(rows) => {
                            info!(rows, groups = self.tree.row_count(), "view fetched");
                            let _ = self.emitter.emit(ViewNotification::FetchFinished { rows });
                        }
                        Err(e) => {
                            warn!(error = %e, received = self.view_rows, "view fetch failed");
                            let _ = self.emitter.emit(ViewNotification::FetchFailed {
                                reason: e.to_string(),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Every stored event of the groups `keys` name, newest first.
    pub(super) async fn fetch_members(&mut self, keys: Vec<GroupKey>) -> Result<Vec<CallEvent>> {
        let descriptor = QueryDescriptor::group_members(self.options.mode, keys).build()?;
        let task = self.members.enqueue(descriptor);
        let mut members = Vec::new();
        for event in self.members.drain().await {
            if event.task() != task {
                continue;
            }
            match event {
                PipelineEvent::Batch { records, .. } => members.extend(records),
                PipelineEvent::Finished { outcome: Err(e), .. } => return Err(e.into()),
                _ => {}
            }
        }
        debug!(task_id = task, members = members.len(), "group members fetched");
        Ok(members)
    }
}
