//! Telemetry delivery sweeps.
//!
//! A sweep drains the queue and posts every event **sequentially**, in queue
//! order, to `POST /api/analytics/<channel>`. A 2xx removes the event; any
//! other outcome leaves it for the next sweep and moves on. There is no retry
//! cap and no backoff: the next sweep is the retry.
//!
//! Overlapping sweeps run one after another; a sweep that had to wait drains
//! the queue only once the previous one has finished removing what it sent.

use std::collections::HashSet;
use std::sync::Arc;

use harbor_core::{Error, EventKey, EventQueue, QueuedEvent};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use url::Url;

use crate::network::Network;

/// Outcome counts of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Events already being attempted by an overlapping sweep.
    pub skipped: usize,
}

/// Drains the event queue to the ingestion endpoint.
#[derive(Clone)]
pub struct Deliverer {
    queue: EventQueue,
    network: Arc<dyn Network>,
    base: Url,
    in_flight: Arc<Mutex<HashSet<EventKey>>>,
    sweeping: Arc<Mutex<()>>,
}

impl Deliverer {
    pub fn new(queue: EventQueue, network: Arc<dyn Network>, base: Url) -> Self {
        Self { queue, network, base, in_flight: Arc::default(), sweeping: Arc::default() }
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    /// Ingestion URL for a channel.
    pub fn endpoint(&self, channel: &str) -> Result<Url, Error> {
        self.base
            .join(&format!("/api/analytics/{channel}"))
            .map_err(|e| Error::InvalidUrl(e.to_string()))
    }

    /// Attempt delivery of every pending event once.
    pub async fn sweep(&self) -> SweepReport {
        let _sweeping = self.sweeping.lock().await;
        let events = self.queue.drain_all().await;
        let mut report = SweepReport::default();

        for event in events {
            if !self.in_flight.lock().await.insert(event.key) {
                report.skipped += 1;
                continue;
            }

            report.attempted += 1;
            match self.deliver(&event).await {
                Ok(()) => {
                    report.delivered += 1;
                    if let Err(e) = self.queue.remove(event.key).await {
                        // Left in the store: redelivered next sweep.
                        tracing::warn!(key = %event.key, error = %e, "delivered event could not be removed");
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::debug!(key = %event.key, channel = %event.channel, error = %e, "delivery failed; will retry");
                }
            }

            self.in_flight.lock().await.remove(&event.key);
        }

        if report.attempted > 0 {
            tracing::info!(
                attempted = report.attempted,
                delivered = report.delivered,
                failed = report.failed,
                skipped = report.skipped,
                "delivery sweep finished"
            );
        }

        report
    }

    async fn deliver(&self, event: &QueuedEvent) -> Result<(), Error> {
        let url = self.endpoint(&event.channel)?;
        let body = Value::Object(event.payload.clone());
        let status = self
            .network
            .post_json(&url, &body)
            .await
            .map_err(|e| Error::DeliveryFailed(e.to_string()))?;

        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(Error::DeliveryFailed(format!("status {status}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchClient, FetchConfig};
    use crate::testing::StubNetwork;
    use harbor_core::Db;
    use serde_json::{Map, json};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BASE: &str = "https://clinic.example";

    fn payload(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("payload must be an object"),
        }
    }

    async fn queue() -> EventQueue {
        EventQueue::new(Db::open_in_memory().await.unwrap())
    }

    fn deliverer(queue: &EventQueue, network: Arc<StubNetwork>) -> Deliverer {
        Deliverer::new(queue.clone(), network, Url::parse(BASE).unwrap())
    }

    #[tokio::test]
    async fn test_endpoint() {
        let d = deliverer(&queue().await, Arc::new(StubNetwork::new()));
        assert_eq!(d.endpoint("booking").unwrap().as_str(), "https://clinic.example/api/analytics/booking");
    }

    #[tokio::test]
    async fn test_sweep_removes_delivered_events() {
        let queue = queue().await;
        let network = Arc::new(StubNetwork::new());
        queue.enqueue("booking", payload(json!({"step": "start"}))).await.unwrap();

        let report = deliverer(&queue, network.clone()).sweep().await;

        assert_eq!(report, SweepReport { attempted: 1, delivered: 1, failed: 0, skipped: 0 });
        assert_eq!(queue.pending_count().await.unwrap(), 0);
        let posted = network.posted();
        assert_eq!(posted[0].0, "https://clinic.example/api/analytics/booking");
        assert_eq!(posted[0].1, json!({"step": "start"}));
    }

    #[tokio::test]
    async fn test_partial_failure_then_retry() {
        let queue = queue().await;
        let network = Arc::new(StubNetwork::new());
        let a = queue.enqueue("a", payload(json!({"event": "A"}))).await.unwrap();
        queue.enqueue("b", payload(json!({"event": "B"}))).await.unwrap();
        queue.enqueue("c", payload(json!({"event": "C"}))).await.unwrap();
        network.fail_post("https://clinic.example/api/analytics/a");

        let d = deliverer(&queue, network.clone());
        let first = d.sweep().await;
        assert_eq!(first, SweepReport { attempted: 3, delivered: 2, failed: 1, skipped: 0 });

        let remaining = queue.drain_all().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].key, a);

        network.post_status("https://clinic.example/api/analytics/a", 201);
        let second = d.sweep().await;
        assert_eq!(second.delivered, 1);
        assert!(queue.drain_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_is_sequential_in_queue_order() {
        let queue = queue().await;
        let network = Arc::new(StubNetwork::new());
        for n in 0..5 {
            queue.enqueue("page_view", payload(json!({"n": n}))).await.unwrap();
        }

        deliverer(&queue, network.clone()).sweep().await;

        let order: Vec<Value> = network.posted().into_iter().map(|(_, body)| body["n"].clone()).collect();
        assert_eq!(order, vec![json!(0), json!(1), json!(2), json!(3), json!(4)]);
    }

    #[tokio::test]
    async fn test_non_2xx_is_failure() {
        let queue = queue().await;
        let network = Arc::new(StubNetwork::new());
        queue.enqueue("contact", Map::new()).await.unwrap();
        network.post_status("https://clinic.example/api/analytics/contact", 500);

        let d = deliverer(&queue, network);
        for _ in 0..3 {
            let report = d.sweep().await;
            assert_eq!(report.failed, 1);
        }
        assert_eq!(queue.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_volatile_events_are_swept() {
        let queue = EventQueue::volatile();
        let network = Arc::new(StubNetwork::new());
        queue.enqueue("booking", Map::new()).await.unwrap();

        let report = deliverer(&queue, network).sweep().await;
        assert_eq!(report.delivered, 1);
        assert_eq!(queue.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_in_flight_events_are_skipped() {
        let queue = queue().await;
        let network = Arc::new(StubNetwork::new());
        let key = queue.enqueue("booking", Map::new()).await.unwrap();

        let d = deliverer(&queue, network.clone());
        d.in_flight.lock().await.insert(key);

        let report = d.sweep().await;
        assert_eq!(report, SweepReport { attempted: 0, delivered: 0, failed: 0, skipped: 1 });
        assert!(network.posted().is_empty());
        assert_eq!(queue.pending_count().await.unwrap(), 1);
    }

    /// Delays posts to one channel so two sweeps overlap.
    struct SlowChannel {
        inner: Arc<StubNetwork>,
        slow: &'static str,
        delay: std::time::Duration,
    }

    #[async_trait::async_trait]
    impl Network for SlowChannel {
        async fn fetch(&self, request: &harbor_core::Request) -> Result<harbor_core::Response, Error> {
            self.inner.fetch(request).await
        }

        async fn post_json(&self, url: &Url, body: &Value) -> Result<u16, Error> {
            if url.path().ends_with(self.slow) {
                tokio::time::sleep(self.delay).await;
            }
            self.inner.post_json(url, body).await
        }
    }

    #[tokio::test]
    async fn test_overlapping_sweeps_deliver_each_event_once() {
        let queue = queue().await;
        let stub = Arc::new(StubNetwork::new());
        queue.enqueue("a", payload(json!({"event": "A"}))).await.unwrap();
        queue.enqueue("b", payload(json!({"event": "B"}))).await.unwrap();

        let network = Arc::new(SlowChannel {
            inner: stub.clone(),
            slow: "/a",
            delay: std::time::Duration::from_millis(200),
        });
        let d = Deliverer::new(queue.clone(), network, Url::parse(BASE).unwrap());

        let first = tokio::spawn({
            let d = d.clone();
            async move { d.sweep().await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let second = d.sweep().await;
        let first = first.await.unwrap();

        assert_eq!(first.delivered, 2);
        assert_eq!(second.attempted, 0);
        let posted: Vec<Value> = stub.posted().into_iter().map(|(_, body)| body["event"].clone()).collect();
        assert_eq!(posted, vec![json!("A"), json!("B")]);
        assert_eq!(queue.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_against_http_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/analytics/booking"))
            .and(body_partial_json(json!({"event": "A"})))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/analytics/booking"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let queue = queue().await;
        queue.enqueue("booking", payload(json!({"event": "A"}))).await.unwrap();
        queue.enqueue("booking", payload(json!({"event": "B"}))).await.unwrap();

        let client = Arc::new(FetchClient::new(FetchConfig::default()).unwrap());
        let d = Deliverer::new(queue.clone(), client, Url::parse(&server.uri()).unwrap());
        let report = d.sweep().await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
        let remaining = queue.drain_all().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].payload.get("event"), Some(&json!("A")));
    }
}
