//! Core types and storage for the harbor agent.
//!
//! This crate provides:
//! - Versioned cache containers with SQLite backend
//! - The durable telemetry event queue
//! - Request/response types shared with the router
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod queue;

pub use cache::{CacheStore, CachedEntry, RequestIdentity};
pub use config::AppConfig;
pub use db::Db;
pub use error::Error;
pub use http::{Destination, Request, RequestMode, Response};
pub use queue::{EventKey, EventQueue, QueuedEvent};
