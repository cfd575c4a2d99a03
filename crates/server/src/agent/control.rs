//! Control channel between pages and the agent.
//!
//! Messages are JSON objects tagged by `type`. Every message gets exactly one
//! reply over a oneshot channel, including when handling fails or the agent
//! has gone away; failures reply `{ "error": true, "message": ... }`.

use std::collections::BTreeMap;
use std::sync::Arc;

use harbor_client::fetch::resolve;
use harbor_core::cache::CachePurpose;
use harbor_core::{Error, Request};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::Agent;

const CHANNEL_CAPACITY: usize = 64;

/// A message from a page to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Activate a waiting agent now.
    SkipWaiting,
    /// Fetch and store these URLs in the static container.
    CacheUrls { payload: CacheUrlsPayload },
    /// Delete every current container.
    ClearCache,
    GetVersion,
    /// Entry count per container.
    GetCacheStatus,
    /// Queue a telemetry event for delivery.
    TrackEvent { payload: TrackEventPayload },
    /// Run a delivery sweep now.
    FlushEvents,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CacheUrlsPayload {
    /// Absolute URLs or paths relative to the site origin.
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrackEventPayload {
    /// Ingestion channel, e.g. `booking` or `page_view`.
    pub channel: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// The agent's answer to a [`ControlMessage`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ControlReply {
    Flushed { success: bool, delivered: usize, failed: usize },
    Success { success: bool },
    Version { version: String },
    Status { status: BTreeMap<String, u64> },
    Error { error: bool, message: String },
}

impl ControlReply {
    fn ok() -> Self {
        Self::Success { success: true }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self::Error { error: true, message: message.into() }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

impl Agent {
    async fn handle_message(&self, message: ControlMessage) -> Result<ControlReply, Error> {
        match message {
            ControlMessage::SkipWaiting => {
                self.skip_waiting().await?;
                Ok(ControlReply::ok())
            }
            ControlMessage::CacheUrls { payload } => {
                self.cache_urls(&payload.urls).await;
                Ok(ControlReply::ok())
            }
            ControlMessage::ClearCache => {
                for name in self.settings.containers.names() {
                    self.cache.delete_container(&name).await?;
                }
                tracing::info!(version = %self.version(), "cleared current containers");
                Ok(ControlReply::ok())
            }
            ControlMessage::GetVersion => Ok(ControlReply::Version { version: self.version().to_string() }),
            ControlMessage::GetCacheStatus => {
                let mut status = BTreeMap::new();
                for name in self.cache.list_containers().await? {
                    let count = self.cache.count_entries(&name).await?;
                    status.insert(name, count);
                }
                Ok(ControlReply::Status { status })
            }
            ControlMessage::TrackEvent { payload } => {
                self.queue().enqueue(&payload.channel, payload.data).await?;
                Ok(ControlReply::ok())
            }
            ControlMessage::FlushEvents => {
                let report = self.flush().await;
                Ok(ControlReply::Flushed { success: true, delivered: report.delivered, failed: report.failed })
            }
        }
    }

    /// Handle `message` and always produce a reply.
    pub async fn reply(&self, message: ControlMessage) -> ControlReply {
        match self.handle_message(message).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "control message failed");
                ControlReply::failure(e.to_string())
            }
        }
    }

    /// Best-effort pre-warm; failures are logged and skipped.
    async fn cache_urls(&self, urls: &[String]) {
        for raw in urls {
            let url = match resolve(raw, &self.settings.origin) {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!(url = %raw, error = %e, "skipping invalid url");
                    continue;
                }
            };
            if let Err(e) = self.router.fetch_and_store(&Request::get(url), CachePurpose::Static).await {
                tracing::warn!(url = %raw, error = %e, "failed to cache url");
            }
        }
    }
}

struct Envelope {
    message: ControlMessage,
    reply: oneshot::Sender<ControlReply>,
}

/// Sending half of the control channel.
#[derive(Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<Envelope>,
}

impl ControlHandle {
    /// Send a message and wait for the reply.
    pub async fn send(&self, message: ControlMessage) -> ControlReply {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Envelope { message, reply }).await.is_err() {
            return ControlReply::failure(Error::AgentUnavailable.to_string());
        }
        rx.await
            .unwrap_or_else(|_| ControlReply::failure(Error::AgentUnavailable.to_string()))
    }
}

/// Serve control messages until the agent is terminated.
///
/// Each message is handled on its own task so a slow `CACHE_URLS` does not
/// hold up status queries.
pub fn spawn(agent: Arc<Agent>) -> (ControlHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<Envelope>(CHANNEL_CAPACITY);
    let cancel = agent.cancel_token();

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                envelope = rx.recv() => {
                    let Some(Envelope { message, reply }) = envelope else {
                        return;
                    };
                    let agent = Arc::clone(&agent);
                    tokio::spawn(async move {
                        let _ = reply.send(agent.reply(message).await);
                    });
                }
                () = cancel.cancelled() => {
                    tracing::debug!("control channel closed");
                    return;
                }
            }
        }
    });

    (ControlHandle { tx }, task)
}
