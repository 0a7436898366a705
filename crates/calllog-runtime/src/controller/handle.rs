//! Requests into a running controller.
//!
//! [`CallHistoryController::run`] owns the controller for as long as it
//! runs. UI code drives it through a cloneable [`ControllerHandle`]: each
//! call sends one request over an mpsc channel and waits for the loop's
//! answer on a oneshot. Requests sent while no loop runs wait in the
//! channel until one does.

use calllog_core::{CallType, EventId, GroupingMode};
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::CallHistoryController;
use crate::errors::{ControllerError, Result};

/// Pending requests buffered per controller.
pub(super) const REQUEST_CHANNEL_CAPACITY: usize = 32;

type Reply<T> = oneshot::Sender<Result<T>>;

/// One request with the channel its answer goes back on.
pub(super) enum Request {
    GetEvents(Reply<()>),
    FetchMore(Reply<bool>),
    SetFilter {
        mode: GroupingMode,
        call_type: CallType,
        reference_time: Option<DateTime<Utc>>,
        reply: Reply<()>,
    },
    DeleteAt {
        row: usize,
        reply: Reply<usize>,
    },
    DeleteEvent {
        id: EventId,
        reply: Reply<()>,
    },
    SetGroupRead {
        row: usize,
        read: bool,
        reply: Reply<usize>,
    },
    MarkAllRead(Reply<()>),
    DeleteAll(Reply<()>),
}

impl Request {
    fn name(&self) -> &'static str {
        match self {
            Self::GetEvents(_) => "get_events",
            Self::FetchMore(_) => "fetch_more",
            Self::SetFilter { .. } => "set_filter",
            Self::DeleteAt { .. } => "delete_at",
            Self::DeleteEvent { .. } => "delete_event",
            Self::SetGroupRead { .. } => "set_group_read",
            Self::MarkAllRead(_) => "mark_all_read",
            Self::DeleteAll(_) => "delete_all",
        }
    }
}

/// Cloneable handle to a controller, usable while its loop runs.
#[derive(Clone, Debug)]
pub struct ControllerHandle {
    tx: mpsc::Sender<Request>,
}

impl ControllerHandle {
    pub(super) fn new(tx: mpsc::Sender<Request>) -> Self {
        Self { tx }
    }

    /// See [`CallHistoryController::get_events`].
    pub async fn get_events(&self) -> Result<()> {
        self.call(Request::GetEvents).await
    }

    /// See [`CallHistoryController::fetch_more`].
    pub async fn fetch_more(&self) -> Result<bool> {
        self.call(Request::FetchMore).await
    }

    /// See [`CallHistoryController::set_filter`].
    pub async fn set_filter(
        &self,
        mode: GroupingMode,
        call_type: CallType,
        reference_time: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.call(|reply| Request::SetFilter {
            mode,
            call_type,
            reference_time,
            reply,
        })
        .await
    }

    /// See [`CallHistoryController::delete_at`].
    pub async fn delete_at(&self, row: usize) -> Result<usize> {
        self.call(|reply| Request::DeleteAt { row, reply }).await
    }

    /// See [`CallHistoryController::delete_event`].
    pub async fn delete_event(&self, id: EventId) -> Result<()> {
        self.call(|reply| Request::DeleteEvent { id, reply }).await
    }

    /// See [`CallHistoryController::set_group_read`].
    pub async fn set_group_read(&self, row: usize, read: bool) -> Result<usize> {
        self.call(|reply| Request::SetGroupRead { row, read, reply })
            .await
    }

    /// See [`CallHistoryController::mark_all_read`].
    pub async fn mark_all_read(&self) -> Result<()> {
        self.call(Request::MarkAllRead).await
    }

    /// See [`CallHistoryController::delete_all`].
    pub async fn delete_all(&self) -> Result<()> {
        self.call(Request::DeleteAll).await
    }

    async fn call<T>(&self, request: impl FnOnce(Reply<T>) -> Request) -> Result<T> {
        let (reply, answer) = oneshot::channel();
        self.tx
            .send(request(reply))
            .await
            .map_err(|_| ControllerError::Stopped)?;
        answer.await.map_err(|_| ControllerError::Stopped)?
    }
}

impl CallHistoryController {
    /// A handle for driving this controller while [`run`](Self::run) owns it.
    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle::new(self.request_tx.clone())
    }

    /// Execute one request and send back its outcome. A caller that gave up
    /// waiting does not undo the operation.
    pub(super) async fn serve(&mut self, request: Request) {
        debug!(request = request.name(), "serving request");
        let delivered = match request {
            Request::GetEvents(reply) => reply.send(self.get_events().await).is_ok(),
            Request::FetchMore(reply) => reply.send(self.fetch_more().await).is_ok(),
            Request::SetFilter {
                mode,
                call_type,
                reference_time,
                reply,
            } => reply
                .send(self.set_filter(mode, call_type, reference_time).await)
                .is_ok(),
            Request::DeleteAt { row, reply } => reply.send(self.delete_at(row).await).is_ok(),
            Request::DeleteEvent { id, reply } => reply.send(self.delete_event(id).await).is_ok(),
            Request::SetGroupRead { row, read, reply } => {
                reply.send(self.set_group_read(row, read).await).is_ok()
            }
            Request::MarkAllRead(reply) => reply.send(self.mark_all_read().await).is_ok(),
            Request::DeleteAll(reply) => reply.send(self.delete_all().await).is_ok(),
        };
        if !delivered {
            debug!("requester went away before the reply");
        }
    }
}
