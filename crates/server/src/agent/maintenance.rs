//! Periodic maintenance: age-based eviction plus a delivery retry sweep.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use harbor_client::SweepReport;
use harbor_core::cache::CachePurpose;
use harbor_core::{Request, RequestIdentity};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use url::Url;

use super::{Agent, LifecycleState};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub evicted: usize,
    pub sweep: SweepReport,
}

impl Agent {
    /// Delete entries older than their container's max age.
    ///
    /// Entries without a readable `cached-at` are kept. Stale manifest
    /// entries in the static container are re-fetched instead of deleted,
    /// and kept as they are if the fetch fails, so the offline document
    /// survives. Store failures are logged and skip the affected container.
    pub async fn evict_stale(&self, now: DateTime<Utc>) -> usize {
        let mut evicted = 0;
        let manifest: HashMap<RequestIdentity, &Url> =
            self.settings.manifest.iter().map(|url| (RequestIdentity::get(url), url)).collect();

        for purpose in CachePurpose::ALL {
            let name = self.settings.containers.name(purpose);
            let Ok(max_age) = chrono::Duration::from_std(self.settings.max_age.for_purpose(purpose)) else {
                continue;
            };

            let entries = match self.cache.entries(&name).await {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(container = %name, error = %e, "could not read container for eviction");
                    continue;
                }
            };

            for entry in entries {
                let Some(cached_at) = entry.cached_at() else {
                    continue;
                };
                if now - cached_at <= max_age {
                    continue;
                }
                if purpose == CachePurpose::Static
                    && let Some(url) = manifest.get(&entry.identity)
                {
                    self.rewarm(url).await;
                    continue;
                }
                match self.cache.delete_entry(&name, &entry.identity).await {
                    Ok(true) => evicted += 1,
                    Ok(false) => {}
                    Err(e) => tracing::warn!(container = %name, url = %entry.identity.url, error = %e, "eviction failed"),
                }
            }
        }

        if evicted > 0 {
            tracing::info!(evicted, "evicted stale cache entries");
        }
        evicted
    }

    async fn rewarm(&self, url: &Url) {
        match self.router.fetch_and_store(&Request::get(url.clone()), CachePurpose::Static).await {
            Ok(_) => tracing::debug!(%url, "refreshed manifest entry"),
            Err(e) => tracing::warn!(%url, error = %e, "manifest refresh failed; keeping stale copy"),
        }
    }

    /// One maintenance pass. Also the host periodic-sync hook.
    ///
    /// An agent still stuck in `installing` retries its install first.
    pub async fn run_maintenance(&self) -> MaintenanceReport {
        match self.state().await {
            LifecycleState::Installing => {
                if let Err(e) = self.start().await {
                    tracing::warn!(error = %e, "install retry failed");
                }
            }
            LifecycleState::Terminated => return MaintenanceReport::default(),
            _ => {}
        }

        let evicted = self.evict_stale(Utc::now()).await;
        let sweep = self.flush().await;
        MaintenanceReport { evicted, sweep }
    }

    /// Run maintenance every `maintenance_interval` until the agent is terminated.
    ///
    /// The first pass happens one interval after spawning.
    pub fn spawn_maintenance(self: &Arc<Self>) -> JoinHandle<()> {
        let agent = Arc::clone(self);
        let period = agent.settings.maintenance_interval;
        let cancel = agent.cancel_token();

        tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = agent.run_maintenance().await;
                        tracing::debug!(evicted = report.evicted, delivered = report.sweep.delivered, "maintenance pass");
                    }
                    () = cancel.cancelled() => {
                        tracing::debug!("maintenance stopped");
                        return;
                    }
                }
            }
        })
    }
}
