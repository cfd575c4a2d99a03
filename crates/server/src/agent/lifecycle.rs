//! Lifecycle state machine: install, activate, terminate.

use std::sync::atomic::Ordering;

use harbor_client::SweepReport;
use harbor_core::cache::CachePurpose;
use harbor_core::{Error, Request};
use serde::Serialize;

use super::Agent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Installing,
    Installed,
    Activating,
    Active,
    Terminated,
}

impl Agent {
    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    async fn set_state(&self, next: LifecycleState) {
        let mut state = self.state.write().await;
        tracing::info!(from = ?*state, to = ?next, version = %self.version(), "lifecycle transition");
        *state = next;
    }

    /// Open the current containers and pre-warm the static container.
    ///
    /// Any manifest fetch failure fails the install and leaves the agent in
    /// `installing`, so the host may call this again.
    pub async fn install(&self) -> Result<(), Error> {
        match self.state().await {
            LifecycleState::Installing => {}
            LifecycleState::Terminated => return Err(Error::InvalidState("agent is terminated".into())),
            _ => return Ok(()),
        }

        for name in self.settings.containers.names() {
            self.cache.open_container(&name).await?;
        }

        for url in &self.settings.manifest {
            let request = Request::get(url.clone());
            self.router
                .fetch_and_store(&request, CachePurpose::Static)
                .await
                .map_err(|e| Error::InstallFailed(format!("{url}: {e}")))?;
        }

        tracing::info!(entries = self.settings.manifest.len(), "manifest pre-cached");
        self.set_state(LifecycleState::Installed).await;
        self.skip_waiting.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Remove containers from other versions and start intercepting.
    ///
    /// Per-container deletion failures are logged and do not block activation.
    pub async fn activate(&self) -> Result<(), Error> {
        match self.state().await {
            LifecycleState::Installed => {}
            LifecycleState::Active => return Ok(()),
            other => return Err(Error::InvalidState(format!("cannot activate while {other:?}"))),
        }
        self.set_state(LifecycleState::Activating).await;

        match self.cache.list_containers().await {
            Ok(names) => {
                for name in names.iter().filter(|n| !self.settings.containers.is_current(n)) {
                    match self.cache.delete_container(name).await {
                        Ok(_) => tracing::info!(container = %name, "deleted superseded container"),
                        Err(e) => tracing::warn!(container = %name, error = %e, "failed to delete superseded container"),
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "could not list containers; skipping cleanup"),
        }

        self.set_state(LifecycleState::Active).await;
        Ok(())
    }

    /// Install, then activate if nothing holds the agent in waiting.
    pub async fn start(&self) -> Result<(), Error> {
        self.install().await?;
        if self.skip_waiting.load(Ordering::SeqCst) {
            self.activate().await?;
        }
        Ok(())
    }

    /// Activate an installed agent without waiting.
    ///
    /// Before install completes this only sets the flag; activation follows
    /// the install.
    pub async fn skip_waiting(&self) -> Result<(), Error> {
        self.skip_waiting.store(true, Ordering::SeqCst);
        match self.state().await {
            LifecycleState::Installed => self.activate().await,
            LifecycleState::Terminated => Err(Error::InvalidState("agent is terminated".into())),
            _ => Ok(()),
        }
    }

    /// Stop maintenance, wait for background refreshes, and go quiet.
    pub async fn terminate(&self) {
        self.cancel.cancel();
        self.router.shutdown().await;
        self.set_state(LifecycleState::Terminated).await;
    }

    /// Host connectivity-restored signal: run a delivery sweep.
    pub async fn on_sync(&self) -> SweepReport {
        self.flush().await
    }

    pub async fn flush(&self) -> SweepReport {
        self.deliverer.sweep().await
    }
}
