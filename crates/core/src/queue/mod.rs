//! Durable, at-least-once telemetry event queue.
//!
//! An event exists in the store from the moment it is accepted until the
//! ingestion endpoint acknowledges it; delivery sweeps only remove events
//! after a successful round trip.

pub mod event;
pub mod store;

pub use event::{EventKey, QueuedEvent, validate_channel};
pub use store::EventQueue;
