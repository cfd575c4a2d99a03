//! agent_message tool implementation.

use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::agent::{ControlHandle, ControlMessage};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentMessageParams {
    /// Control message, e.g. `{"type": "GET_VERSION"}`.
    pub message: ControlMessage,
}

/// Deliver a page message over the control channel and return the agent's reply.
///
/// Failures come back as an `{ "error": true }` reply rather than a tool error.
pub async fn message_impl(control: &ControlHandle, params: AgentMessageParams) -> Result<CallToolResult, McpError> {
    let reply = control.send(params.message).await;
    if reply.is_error() {
        tracing::debug!(?reply, "control message answered with an error");
    }
    Ok(super::json_result(&reply))
}
