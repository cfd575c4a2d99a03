//! Tool-level errors for the harbor MCP server.
//!
//! Agent failures keep their own codes; `ToolError` adds the ones that only
//! make sense at the tool boundary.

use rmcp::model::{ErrorCode, ErrorData as McpError};

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Invalid tool arguments (e.g., a relative URL that cannot be resolved).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Agent(#[from] harbor_core::Error),
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::InvalidInput(msg) => McpError { code: ErrorCode(-32602), message: msg.into(), data: None },
            ToolError::Agent(e) => e.into(),
        }
    }
}
