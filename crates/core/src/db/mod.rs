//! SQLite persistence shared by the cache store and the event queue.
//!
//! Async access goes through tokio-rusqlite; schema changes are tracked by a
//! version table and applied on open.

pub mod connection;
pub mod migrations;

pub use connection::Db;
