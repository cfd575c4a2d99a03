//! Durable event queue operations.
//!
//! Every mutation runs in its own write transaction. When the durable store
//! cannot be opened or a commit fails, events are held in an in-process list
//! instead: best effort, lost if the process terminates before a sweep.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio_rusqlite::params;

use super::event::{EventKey, QueuedEvent, validate_channel};
use crate::Error;
use crate::db::Db;

#[derive(Debug, Default)]
struct VolatileQueue {
    next_seq: u64,
    events: Vec<QueuedEvent>,
}

/// At-least-once telemetry queue.
#[derive(Clone, Debug)]
pub struct EventQueue {
    db: Option<Db>,
    volatile: Arc<Mutex<VolatileQueue>>,
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Corrupt(format!("timestamp {raw}: {e}")))
}

impl EventQueue {
    pub fn new(db: Db) -> Self {
        Self { db: Some(db), volatile: Arc::default() }
    }

    /// A queue with no durable store; every event is volatile.
    pub fn volatile() -> Self {
        Self { db: None, volatile: Arc::default() }
    }

    pub fn is_durable(&self) -> bool {
        self.db.is_some()
    }

    /// Accept an event for delivery.
    ///
    /// Only an invalid channel is an error. Store failures divert the event
    /// to the volatile list and are logged.
    pub async fn enqueue(&self, channel: &str, payload: Map<String, Value>) -> Result<EventKey, Error> {
        validate_channel(channel)?;
        let timestamp = Utc::now();

        if let Some(db) = &self.db {
            match Self::insert(db, channel, &payload, timestamp).await {
                Ok(id) => {
                    tracing::debug!(id, channel, "queued event");
                    return Ok(EventKey::Durable(id));
                }
                Err(e) => {
                    tracing::warn!(channel, error = %e, "event store unavailable; holding event in memory");
                }
            }
        }

        let mut volatile = self.volatile.lock().await;
        volatile.next_seq += 1;
        let key = EventKey::Volatile(volatile.next_seq);
        volatile.events.push(QueuedEvent { key, channel: channel.to_string(), payload, timestamp });
        Ok(key)
    }

    async fn insert(db: &Db, channel: &str, payload: &Map<String, Value>, timestamp: DateTime<Utc>) -> Result<i64, Error> {
        let channel = channel.to_string();
        let payload_json = serde_json::to_string(payload)?;
        let timestamp = timestamp.to_rfc3339();
        db.conn
            .call(move |conn| -> Result<i64, Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO queued_events (channel, payload_json, timestamp) VALUES (?1, ?2, ?3)",
                    params![channel, payload_json, timestamp],
                )?;
                let id = tx.last_insert_rowid();
                tx.commit()?;
                Ok(id)
            })
            .await
            .map_err(Error::from)
    }

    /// Every pending event: durable ones ordered by id, then volatile ones in
    /// acceptance order. A failing store reads as empty.
    pub async fn drain_all(&self) -> Vec<QueuedEvent> {
        let mut events = match &self.db {
            Some(db) => Self::read_durable(db).await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "event store unreadable; treating as empty");
                Vec::new()
            }),
            None => Vec::new(),
        };
        events.extend(self.volatile.lock().await.events.iter().cloned());
        events
    }

    async fn read_durable(db: &Db) -> Result<Vec<QueuedEvent>, Error> {
        let rows = db
            .conn
            .call(|conn| -> Result<Vec<(i64, String, String, String)>, Error> {
                let tx = conn.transaction()?;
                let rows = {
                    let mut stmt = tx.prepare(
                        "SELECT id, channel, payload_json, timestamp FROM queued_events ORDER BY id ASC",
                    )?;
                    stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
                        .collect::<Result<Vec<_>, _>>()?
                };
                tx.commit()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        rows.into_iter()
            .map(|(id, channel, payload_json, timestamp)| {
                Ok(QueuedEvent {
                    key: EventKey::Durable(id),
                    channel,
                    payload: serde_json::from_str(&payload_json)?,
                    timestamp: parse_timestamp(&timestamp)?,
                })
            })
            .collect()
    }

    /// Forget a delivered event. Returns whether it was still pending.
    pub async fn remove(&self, key: EventKey) -> Result<bool, Error> {
        match key {
            EventKey::Durable(id) => {
                let Some(db) = &self.db else {
                    return Ok(false);
                };
                db.conn
                    .call(move |conn| -> Result<bool, Error> {
                        let tx = conn.transaction()?;
                        let count = tx.execute("DELETE FROM queued_events WHERE id = ?1", params![id])?;
                        tx.commit()?;
                        Ok(count > 0)
                    })
                    .await
                    .map_err(Error::from)
            }
            EventKey::Volatile(_) => {
                let mut volatile = self.volatile.lock().await;
                let before = volatile.events.len();
                volatile.events.retain(|e| e.key != key);
                Ok(volatile.events.len() < before)
            }
        }
    }

    /// Number of pending events, durable and volatile.
    pub async fn pending_count(&self) -> Result<u64, Error> {
        let durable = match &self.db {
            Some(db) => db
                .conn
                .call(|conn| -> Result<i64, Error> {
                    Ok(conn.query_row("SELECT COUNT(*) FROM queued_events", [], |row| row.get(0))?)
                })
                .await
                .map_err(Error::from)? as u64,
            None => 0,
        };
        let volatile = self.volatile.lock().await.events.len() as u64;
        Ok(durable + volatile)
    }
}
