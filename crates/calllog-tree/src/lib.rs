//! # calllog-tree
//!
//! Grouping rules and the grouped call event tree.
//!
//! - **Policy**: [`policy::GroupingPolicy`] decides group membership and
//!   representative counts; [`policy::ViewFilter`] decides visibility
//! - **Tree**: [`tree::GroupedEventTree`] holds groups and their occurrences
//!   and applies batch loads, inserts, updates, reconciliation and deletes
//! - **Changes**: every mutation returns the [`change::TreeChange`]s it made,
//!   ready to forward to a presentation layer
//!
//! ## Crate Position
//!
//! Depends on calllog-core. Used by calllog-runtime.

#![deny(unsafe_code)]

pub mod arena;
pub mod change;
pub mod errors;
pub mod policy;
pub mod tree;

pub use arena::NodeHandle;
pub use change::{Parent, TreeChange};
pub use errors::{Result, TreeError};
pub use policy::{GroupingPolicy, ViewFilter};
pub use tree::{GroupView, GroupedEventTree, Location, UpdateOutcome};
