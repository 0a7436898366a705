//! # calllog-store
//!
//! Contracts between the call log engine and its event store, plus a
//! `SQLite` implementation.
//!
//! - **Contracts**: [`EventStore`], [`RowCursor`], [`StoreTransaction`],
//!   [`ContactResolver`]
//! - **Queries**: validated [`QueryDescriptor`]s built with
//!   [`QueryDescriptor::events`] / [`QueryDescriptor::group_members`]
//! - **Rows**: [`RawRow`] results and [`materialize_event`]
//! - **Changes**: [`ChangeSet`] broadcast after each commit, [`ContactChange`]
//! - **`SQLite`**: [`sqlite::SqliteEventStore`], [`sqlite::SqliteContactResolver`]
//!
//! ## Crate Position
//!
//! Depends on calllog-core. Depended on by calllog-query and calllog-runtime.

#![deny(unsafe_code)]

pub mod change;
pub mod cursor;
pub mod descriptor;
pub mod errors;
pub mod row;
pub mod sqlite;
pub mod traits;

pub use change::{ChangeSet, ContactChange};
pub use cursor::VecCursor;
pub use descriptor::{EventField, ExtraColumn, QueryDescriptor, QueryDescriptorBuilder, QueryKind};
pub use errors::{Result, StoreError};
pub use row::{FieldValue, RawRow, materialize_event, project_event};
pub use traits::{ContactResolver, EventStore, RowCursor, StoreTransaction};
