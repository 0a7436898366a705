//! Cooperative run loop.

use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use calllog_store::{ChangeSet, ContactChange};

use super::CallHistoryController;
use super::handle::Request;

/// What woke the loop.
enum Wake {
    Stop,
    Store(Result<ChangeSet, RecvError>),
    Contact(Result<ContactChange, RecvError>),
    IdleCursor,
    Request(Request),
}

impl CallHistoryController {
    /// Serve store notifications, contact notifications, handle requests
    /// and idle cursor expiry until `cancel` fires.
    ///
    /// Request outcomes go back to the requester. Other failures are logged
    /// and the loop keeps going.
    pub async fn run(&mut self, cancel: CancellationToken) {
        let mut store_open = true;
        let mut contacts_open = true;
        info!("controller loop started");

        loop {
            let deadline = self.view.idle_deadline();
            let wake = tokio::select! {
                () = cancel.cancelled() => Wake::Stop,
                changes = self.store_changes.recv(), if store_open => Wake::Store(changes),
                change = self.contact_changes.recv(), if contacts_open => Wake::Contact(change),
                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    Wake::IdleCursor
                }
                Some(request) = self.requests.recv() => Wake::Request(request),
            };

            let result = match wake {
                Wake::Stop => break,
                Wake::Store(Ok(changes)) => self.on_store_change(changes).await,
                Wake::Store(Err(RecvError::Lagged(missed))) => self.on_lag("store", missed).await,
                Wake::Store(Err(RecvError::Closed)) => {
                    info!("store notifications closed");
                    store_open = false;
                    Ok(())
                }
                Wake::Contact(Ok(change)) => self.apply_contact_change(change).await,
                Wake::Contact(Err(RecvError::Lagged(missed))) => {
                    self.on_lag("contact", missed).await
                }
                Wake::Contact(Err(RecvError::Closed)) => {
                    info!("contact notifications closed");
                    contacts_open = false;
                    Ok(())
                }
                Wake::IdleCursor => self.expire_view_cursor().await,
                Wake::Request(request) => {
                    self.serve(request).await;
                    Ok(())
                }
            };
            if let Err(e) = result {
                error!(error = %e, "controller operation failed");
            }
        }
        info!("controller loop stopped");
    }
}
