//! Strategy router for intercepted requests.
//!
//! Each GET from a governed page is classified and served by one of three
//! caching strategies (see [`classify`]). Network failures never escape:
//! documents degrade to a cached copy or the offline document, other assets
//! to a bare error response.
//!
//! Background refreshes are spawned on a `TaskTracker` so the lifecycle can
//! wait for them before shutting down.

pub mod classify;
mod strategies;

use std::sync::Arc;

use chrono::Utc;
use harbor_core::cache::{CachePurpose, ContainerSet};
use harbor_core::{CacheStore, CachedEntry, Error, Request, RequestIdentity, Response};
use serde::Serialize;
use tokio_util::task::TaskTracker;
use url::Url;

pub use classify::{Classifier, Strategy};

use crate::network::Network;

/// Header marking responses synthesized by the agent.
pub const AGENT_ERROR_HEADER: &str = "x-harbor-error";

const OFFLINE_HTML: &str = "<!doctype html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>Offline</title></head>\n\
<body><h1>You are offline</h1><p>Check your connection and try again.</p></body>\n</html>\n";

/// Where a routed response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Network,
    Cache,
    /// The pre-cached offline document, or its synthesized stand-in.
    Offline,
    /// Synthesized error for a failed non-document request.
    Error,
}

/// A response chosen by the router.
#[derive(Debug, Clone)]
pub struct Routed {
    pub response: Response,
    pub source: ResponseSource,
    pub strategy: Strategy,
}

/// Router settings derived from the app configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub containers: ContainerSet,
    pub offline_url: Url,
    pub api_patterns: Vec<String>,
}

#[derive(Clone)]
pub struct Router {
    cache: CacheStore,
    network: Arc<dyn Network>,
    containers: ContainerSet,
    offline: RequestIdentity,
    classifier: Arc<Classifier>,
    background: TaskTracker,
}

impl Router {
    pub fn new(cache: CacheStore, network: Arc<dyn Network>, config: RouterConfig) -> Result<Self, Error> {
        let classifier = Classifier::new(&config.api_patterns)?;
        Ok(Self {
            cache,
            network,
            containers: config.containers,
            offline: RequestIdentity::get(&config.offline_url),
            classifier: Arc::new(classifier),
            background: TaskTracker::new(),
        })
    }

    pub fn classify(&self, request: &Request) -> Strategy {
        self.classifier.classify(request)
    }

    pub fn containers(&self) -> &ContainerSet {
        &self.containers
    }

    /// Serve an intercepted request.
    ///
    /// Returns `None` when the request is not intercepted and must go to the
    /// network untouched.
    pub async fn handle(&self, request: &Request) -> Option<Routed> {
        let strategy = self.classify(request);
        let (response, source) = match strategy {
            Strategy::NetworkFirst => self.network_first(request).await,
            Strategy::CacheFirst => self.cache_first(request).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request).await,
            Strategy::Passthrough => return None,
        };
        Some(Routed { response, source, strategy })
    }

    /// Fetch `request` and store the response in the container for `purpose`.
    ///
    /// Used for pre-warming: a non-2xx answer is an error and nothing is stored.
    pub async fn fetch_and_store(&self, request: &Request, purpose: CachePurpose) -> Result<Response, Error> {
        let response = self.network.fetch(request).await?;
        if !response.is_success() {
            return Err(Error::HttpStatus(response.status));
        }
        self.store(purpose, request, &response).await?;
        Ok(response)
    }

    /// Wait for in-flight background refreshes.
    #[cfg(any(test, feature = "testing"))]
    pub async fn settle(&self) {
        self.background.close();
        self.background.wait().await;
        self.background.reopen();
    }

    /// Wait for in-flight background refreshes and refuse to track new ones.
    pub async fn shutdown(&self) {
        self.background.close();
        self.background.wait().await;
    }

    async fn store(&self, purpose: CachePurpose, request: &Request, response: &Response) -> Result<(), Error> {
        let entry = CachedEntry::stamp(RequestIdentity::from(request), response, Utc::now());
        self.cache.put(&self.containers.name(purpose), &entry).await
    }

    /// Store a 2xx response, logging (not propagating) store failures.
    async fn store_if_ok(&self, purpose: CachePurpose, request: &Request, response: &Response) {
        if !response.is_success() {
            return;
        }
        if let Err(e) = self.store(purpose, request, response).await {
            tracing::warn!(url = %request.url, error = %e, "failed to store response");
        }
    }

    async fn lookup(&self, purpose: CachePurpose, request: &Request) -> Option<CachedEntry> {
        let identity = RequestIdentity::from(request);
        match self.cache.get(&self.containers.name(purpose), &identity).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "cache read failed; treating as miss");
                None
            }
        }
    }

    /// Re-fetch in the background and overwrite the cached copy; failures are discarded.
    fn refresh_in_background(&self, purpose: CachePurpose, request: &Request) {
        let router = self.clone();
        let request = request.clone();
        self.background.spawn(async move {
            match router.network.fetch(&request).await {
                Ok(response) => router.store_if_ok(purpose, &request, &response).await,
                Err(e) => tracing::debug!(url = %request.url, error = %e, "background refresh failed"),
            }
        });
    }

    async fn offline_fallback(&self) -> (Response, ResponseSource) {
        match self.cache.match_any(&self.containers.names(), &self.offline).await {
            Ok(Some(entry)) => return (entry.to_response(), ResponseSource::Offline),
            Ok(None) => tracing::warn!(url = %self.offline.url, "offline document is not cached"),
            Err(e) => tracing::warn!(error = %e, "offline document lookup failed"),
        }
        let response = Response::new(503, OFFLINE_HTML)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_header(AGENT_ERROR_HEADER, "offline");
        (response, ResponseSource::Offline)
    }

    fn error_response(error: &Error) -> (Response, ResponseSource) {
        let response = Response::new(504, "").with_header(AGENT_ERROR_HEADER, error.to_string());
        (response, ResponseSource::Error)
    }
}
