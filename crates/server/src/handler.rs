//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the agent.
use std::sync::Arc;

use crate::agent::{Agent, ControlHandle};
use crate::tools::fetch::fetch_impl;
use crate::tools::message::message_impl;
use crate::tools::sync::{periodic_sync_impl, sync_impl};
use crate::tools::{AgentFetchParams, AgentMessageParams};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The MCP server handler for harbor.
#[derive(Clone)]
pub struct HarborServer {
    agent: Arc<Agent>,
    control: ControlHandle,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl HarborServer {
    pub fn new(agent: Arc<Agent>, control: ControlHandle) -> Self {
        Self { agent, control, tool_router: Self::tool_router() }
    }

    /// Hand a page request to the agent.
    #[tool(
        description = "Issue a request from a governed page. The agent serves it from cache or network by strategy; unintercepted requests go straight to the network."
    )]
    async fn agent_fetch(&self, params: Parameters<AgentFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.agent, params.0).await
    }

    #[tool(
        description = "Send a control message (SKIP_WAITING, CACHE_URLS, CLEAR_CACHE, GET_VERSION, GET_CACHE_STATUS, TRACK_EVENT, FLUSH_EVENTS) and return the agent's reply."
    )]
    async fn agent_message(&self, params: Parameters<AgentMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.control, params.0).await
    }

    #[tool(description = "Signal that connectivity is restored. Runs a telemetry delivery sweep and returns its report.")]
    async fn agent_sync(&self) -> Result<CallToolResult, McpError> {
        sync_impl(&self.agent).await
    }

    #[tool(description = "Run periodic maintenance now: evict stale cache entries and retry queued telemetry.")]
    async fn agent_periodic_sync(&self) -> Result<CallToolResult, McpError> {
        periodic_sync_impl(&self.agent).await
    }
}

impl ServerHandler for HarborServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "harbor".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
