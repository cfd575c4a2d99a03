//! agent_fetch tool implementation.
//!
//! Hands a page request to the agent. Requests the agent does not intercept
//! go to the network untouched, as they would without an agent installed.

use std::collections::BTreeMap;

use harbor_client::fetch::resolve;
use harbor_client::{ResponseSource, Strategy};
use harbor_core::{Destination, Request, RequestMode};
use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::error::ToolError;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentFetchParams {
    /// Absolute URL, or a path relative to the site origin.
    pub url: String,

    #[serde(default = "default_method")]
    pub method: String,

    /// Resource kind: document, script, style, image, font or empty.
    #[serde(default)]
    pub destination: Destination,

    /// Request mode: navigate, same-origin, no-cors or cors.
    #[serde(default)]
    pub mode: RequestMode,
}

fn default_method() -> String {
    "GET".into()
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentFetchOutput {
    pub url: String,
    /// Whether the agent served the request.
    pub intercepted: bool,
    pub strategy: Option<Strategy>,
    pub source: Option<ResponseSource>,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    /// Body decoded as UTF-8, lossily.
    pub body: String,
}

pub async fn fetch_impl(agent: &Agent, params: AgentFetchParams) -> Result<CallToolResult, McpError> {
    if params.method.trim().is_empty() {
        return Err(ToolError::InvalidInput("method cannot be empty".into()).into());
    }
    let url = resolve(&params.url, &agent.settings().origin).map_err(|e| ToolError::InvalidInput(e.to_string()))?;

    let request = Request {
        method: params.method.trim().to_ascii_uppercase(),
        url,
        destination: params.destination,
        mode: params.mode,
    };

    let output = match agent.handle_fetch(&request).await {
        Some(routed) => AgentFetchOutput {
            url: request.url.to_string(),
            intercepted: true,
            strategy: Some(routed.strategy),
            source: Some(routed.source),
            status: routed.response.status,
            body: String::from_utf8_lossy(&routed.response.body).into_owned(),
            headers: routed.response.headers,
        },
        None => {
            let response = agent.passthrough(&request).await.map_err(ToolError::from)?;
            AgentFetchOutput {
                url: request.url.to_string(),
                intercepted: false,
                strategy: None,
                source: None,
                status: response.status,
                body: String::from_utf8_lossy(&response.body).into_owned(),
                headers: response.headers,
            }
        }
    };

    Ok(super::json_result(&output))
}
