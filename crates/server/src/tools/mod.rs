//! MCP tool implementations.
//!
//! Each tool stands in for one browser hook the host would otherwise call:
//! request interception, page messages, and the two sync signals.

pub mod fetch;
pub mod message;
pub mod sync;

pub use fetch::AgentFetchParams;
pub use message::AgentMessageParams;

use rmcp::model::{CallToolResult, Content};
use serde::Serialize;

fn json_result<T: Serialize>(output: &T) -> CallToolResult {
    CallToolResult::success(vec![Content::text(serde_json::to_string_pretty(output).unwrap_or_default())])
}

#[cfg(test)]
pub(crate) fn result_json(result: &CallToolResult) -> serde_json::Value {
    let content = serde_json::to_value(&result.content[0]).unwrap();
    let text = content.get("text").and_then(|v| v.as_str()).expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}
