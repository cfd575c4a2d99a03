//! harbor server entry point.
//!
//! Boots the agent (install, then activate), starts periodic maintenance and
//! the control channel, and serves the MCP host surface on stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use harbor_core::AppConfig;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod agent;
mod error;
mod handler;
mod tools;

use agent::{Agent, control};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        origin = %config.origin,
        version = %config.cache_version,
        "Starting harbor agent on stdio transport"
    );

    let agent = Arc::new(Agent::open(&config).await?);
    if let Err(e) = agent.start().await {
        // Maintenance retries the install; until then requests pass through.
        tracing::error!(error = %e, "install failed");
    }

    let maintenance = agent.spawn_maintenance();
    let (control, control_task) = control::spawn(Arc::clone(&agent));

    let handler = handler::HarborServer::new(Arc::clone(&agent), control);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    agent.terminate().await;
    let _ = tokio::join!(maintenance, control_task);
    tracing::info!("harbor agent stopped");

    Ok(())
}
