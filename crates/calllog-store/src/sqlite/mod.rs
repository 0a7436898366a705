//! `SQLite` reference implementation of the store contracts.

pub mod calls;
pub mod connection;
pub mod contacts;
pub mod schema;
pub mod store;

pub use connection::{ConnectionConfig, ConnectionPool, new_file, new_in_memory};
pub use contacts::SqliteContactResolver;
pub use store::SqliteEventStore;
