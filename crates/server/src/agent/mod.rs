//! The caching and durable-delivery agent.
//!
//! One `Agent` per cache version. It owns the cache store, the event queue,
//! the router and the deliverer, and moves through the lifecycle states in
//! [`lifecycle`]. All handles are passed in explicitly; nothing is global.

pub mod control;
pub mod lifecycle;
pub mod maintenance;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use harbor_client::{Deliverer, FetchClient, FetchConfig, Network, Routed, Router, RouterConfig};
use harbor_core::cache::{ContainerSet, MaxAge};
use harbor_core::{AppConfig, CacheStore, Db, Error, EventQueue, Request, Response};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use url::Url;

pub use control::{ControlHandle, ControlMessage};
pub use lifecycle::LifecycleState;

/// Everything the agent needs from the app configuration.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub origin: Url,
    pub containers: ContainerSet,
    pub manifest: Vec<Url>,
    pub offline_url: Url,
    pub api_patterns: Vec<String>,
    pub telemetry_base: Url,
    pub max_age: MaxAge,
    pub maintenance_interval: Duration,
}

impl AgentSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let invalid = |e: harbor_core::config::ConfigError| Error::InvalidInput(e.to_string());
        Ok(Self {
            origin: config.origin_url().map_err(invalid)?,
            containers: config.containers(),
            manifest: config.manifest_urls().map_err(invalid)?,
            offline_url: config.offline_url().map_err(invalid)?,
            api_patterns: config.api_patterns.clone(),
            telemetry_base: config.telemetry_base().map_err(invalid)?,
            max_age: config.max_age(),
            maintenance_interval: config.maintenance_interval(),
        })
    }
}

pub struct Agent {
    settings: AgentSettings,
    cache: CacheStore,
    network: Arc<dyn Network>,
    router: Router,
    deliverer: Deliverer,
    state: RwLock<LifecycleState>,
    skip_waiting: AtomicBool,
    cancel: CancellationToken,
}

impl Agent {
    pub fn new(
        settings: AgentSettings, cache: CacheStore, queue: EventQueue, network: Arc<dyn Network>,
    ) -> Result<Self, Error> {
        let router = Router::new(
            cache.clone(),
            network.clone(),
            RouterConfig {
                containers: settings.containers.clone(),
                offline_url: settings.offline_url.clone(),
                api_patterns: settings.api_patterns.clone(),
            },
        )?;
        let deliverer = Deliverer::new(queue, network.clone(), settings.telemetry_base.clone());

        Ok(Self {
            settings,
            cache,
            network,
            router,
            deliverer,
            state: RwLock::new(LifecycleState::Installing),
            skip_waiting: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        })
    }

    /// Open both stores and the HTTP client described by `config`.
    ///
    /// The cache store is required. If the event store cannot be opened the
    /// queue runs in volatile mode.
    pub async fn open(config: &AppConfig) -> Result<Self, Error> {
        let settings = AgentSettings::from_config(config)?;
        let cache = CacheStore::new(Db::open(&config.cache_db_path).await?);

        let queue = match Db::open(&config.queue_db_path).await {
            Ok(db) => EventQueue::new(db),
            Err(e) => {
                tracing::warn!(
                    path = %config.queue_db_path.display(),
                    error = %e,
                    "event store unavailable; telemetry will be held in memory"
                );
                EventQueue::volatile()
            }
        };

        let network = FetchClient::new(FetchConfig {
            user_agent: config.user_agent.clone(),
            timeout: config.timeout(),
            ..Default::default()
        })?;

        Self::new(settings, cache, queue, Arc::new(network))
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn version(&self) -> &str {
        self.settings.containers.version()
    }

    pub fn queue(&self) -> &EventQueue {
        self.deliverer.queue()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Serve a request from a governed page.
    ///
    /// Returns `None` when the agent does not intercept it: the request is
    /// unclassified, or the agent is not active yet.
    pub async fn handle_fetch(&self, request: &Request) -> Option<Routed> {
        if self.state().await != LifecycleState::Active {
            tracing::debug!(url = %request.url, "agent not active; passing request through");
            return None;
        }
        self.router.handle(request).await
    }

    /// Send a request the agent does not intercept straight to the network.
    pub async fn passthrough(&self, request: &Request) -> Result<Response, Error> {
        self.network.fetch(request).await
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use harbor_client::testing::StubNetwork;

    pub const ORIGIN: &str = "https://clinic.example";

    pub fn settings(version: &str) -> AgentSettings {
        let config = AppConfig {
            origin: ORIGIN.into(),
            cache_version: version.into(),
            precache_manifest: vec!["/".into(), "/offline.html".into(), "/site.css".into()],
            ..Default::default()
        };
        AgentSettings::from_config(&config).unwrap()
    }

    pub fn url(path: &str) -> String {
        format!("{ORIGIN}{path}")
    }

    /// A stub network that serves the default manifest.
    pub fn network() -> Arc<StubNetwork> {
        let network = Arc::new(StubNetwork::new());
        network.respond_ok(&url("/"), "<h1>Home</h1>");
        network.respond_ok(&url("/offline.html"), "<h1>Offline</h1>");
        network.respond_ok(&url("/site.css"), "body{}");
        network
    }

    pub struct Harness {
        pub agent: Arc<Agent>,
        pub cache: CacheStore,
        pub network: Arc<StubNetwork>,
    }

    pub async fn harness_with(version: &str, cache: CacheStore, network: Arc<StubNetwork>) -> Harness {
        let queue = EventQueue::new(Db::open_in_memory().await.unwrap());
        let agent = Agent::new(settings(version), cache.clone(), queue, network.clone()).unwrap();
        Harness { agent: Arc::new(agent), cache, network }
    }

    pub async fn harness() -> Harness {
        let cache = CacheStore::new(Db::open_in_memory().await.unwrap());
        harness_with("v1", cache, network()).await
    }

    /// An installed and activated agent.
    pub async fn active() -> Harness {
        let h = harness().await;
        h.agent.start().await.unwrap();
        h
    }
}
