//! # calllog-runtime
//!
//! The call history controller and its run loop.
//!
//! - **Controller**: [`CallHistoryController`] owns the grouped tree, the view
//!   and member query pipelines, and the contact cache
//! - **Fetching**: [`CallHistoryController::get_events`],
//!   [`CallHistoryController::fetch_more`], [`CallHistoryController::set_filter`]
//! - **Mutations**: `delete_at`, `delete_event`, `set_group_read`,
//!   `mark_all_read`, `delete_all`, each one store transaction
//! - **Sync**: committed change sets and contact changes patch the view
//! - **Loop**: [`CallHistoryController::run`] until cancelled, serving
//!   requests sent through a [`ControllerHandle`]
//! - **Notifications**: [`ViewNotification`] through [`NotificationEmitter`]
//! - **Errors**: [`ControllerError`] via `thiserror`
//!
//! ## Crate Position
//!
//! Top of the stack. Depends on every other calllog crate.

#![deny(unsafe_code)]

pub mod bootstrap;
pub mod contacts;
pub mod controller;
pub mod errors;
pub mod notification;

pub use bootstrap::open_sqlite;
pub use contacts::ContactCache;
pub use controller::{CallHistoryController, ControllerHandle, ViewOptions};
pub use errors::{ControllerError, Result};
pub use notification::{NotificationEmitter, ViewNotification};
