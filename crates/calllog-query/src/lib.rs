//! # calllog-query
//!
//! Asynchronous query execution for the call log engine.
//!
//! - **Tasks**: [`TaskQueue`] of [`QueryTask`]s, shareable across threads
//! - **Pipeline**: [`QueryPipeline`] runs one task at a time against an
//!   [`EventStore`](calllog_store::EventStore), materializing rows into
//!   [`CallEvent`](calllog_core::CallEvent) batches
//! - **Streaming**: first chunk, explicit continuation, idle cursor expiry
//! - **Notifications**: [`PipelineEvent`], one terminal per task
//! - **Errors**: [`QueryError`] via `thiserror`
//!
//! ## Crate Position
//!
//! Depends on calllog-core, calllog-settings, calllog-store. Depended on by
//! calllog-runtime.

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod event;
pub mod pipeline;
pub mod queue;

#[cfg(test)]
mod testing;

pub use config::PipelineConfig;
pub use errors::{QueryError, Result};
pub use event::PipelineEvent;
pub use pipeline::QueryPipeline;
pub use queue::{QueryTask, TaskId, TaskQueue};
