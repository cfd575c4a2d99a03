//! Queued telemetry events.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Error;

/// Where a queued event lives until it is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "store", content = "id", rename_all = "lowercase")]
pub enum EventKey {
    /// Row id in the durable store.
    Durable(i64),
    /// Sequence number in the in-process fallback list; lost on termination.
    Volatile(u64),
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKey::Durable(id) => write!(f, "durable:{id}"),
            EventKey::Volatile(seq) => write!(f, "volatile:{seq}"),
        }
    }
}

/// A telemetry submission awaiting delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedEvent {
    pub key: EventKey,
    /// Path segment of the ingestion endpoint (`/api/analytics/<channel>`).
    pub channel: String,
    pub payload: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

/// Reject channel names that would not form a single path segment.
pub fn validate_channel(channel: &str) -> Result<(), Error> {
    if channel.is_empty() {
        return Err(Error::InvalidInput("channel cannot be empty".into()));
    }
    if !channel.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(Error::InvalidInput(format!(
            "channel must contain only ASCII letters, digits, '-' or '_': {channel}"
        )));
    }
    Ok(())
}
