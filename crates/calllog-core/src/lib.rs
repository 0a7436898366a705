//! # calllog-core
//!
//! Foundation types, address matching, and logging for the call log engine.
//!
//! This crate provides the shared vocabulary that all other calllog crates depend on:
//!
//! - **Events**: [`event::CallEvent`] with [`event::Direction`], [`event::ContactRef`]
//! - **Classification**: [`event::CallType`] filters and [`event::GroupingMode`] sort modes
//! - **Addresses**: [`address::remote_address_match`] and phone number minimization
//! - **Keys**: [`key::GroupKey`] and its store-side [`key::ChannelKey`] part
//! - **Errors**: [`errors::CoreError`] via `thiserror`
//! - **Logging**: [`logging::init_subscriber`] and in-memory log capture for tests
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other calllog crates.

#![deny(unsafe_code)]

pub mod address;
pub mod errors;
pub mod event;
pub mod key;
pub mod logging;

pub use errors::{CoreError, Result};
pub use event::{CallEvent, CallType, ContactRef, Direction, EventId, GroupingMode};
pub use key::{CallKind, ChannelKey, GroupKey};
