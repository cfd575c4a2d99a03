//! agent_sync and agent_periodic_sync tool implementations.

use rmcp::{ErrorData as McpError, model::*};

use crate::agent::Agent;

/// Connectivity restored: sweep the event queue.
pub async fn sync_impl(agent: &Agent) -> Result<CallToolResult, McpError> {
    let report = agent.on_sync().await;
    Ok(super::json_result(&report))
}

/// Periodic sync: eviction plus a sweep.
pub async fn periodic_sync_impl(agent: &Agent) -> Result<CallToolResult, McpError> {
    let report = agent.run_maintenance().await;
    Ok(super::json_result(&report))
}
