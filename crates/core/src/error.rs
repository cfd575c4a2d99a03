//! Unified error types for harbor.
//!
//! Each variant carries a stable code prefix so hosts can classify failures
//! without parsing free-form messages.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the harbor agent.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty channel name).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid or unsupported URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Pre-warm of the install manifest failed; the new version cannot activate.
    #[error("INSTALL_FAILED: {0}")]
    InstallFailed(String),

    /// Request-time network failure (connect, timeout, body read).
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// The origin answered, but not with a success status.
    #[error("HTTP_ERROR: status {0}")]
    HttpStatus(u16),

    /// The ingestion endpoint rejected or could not receive an event.
    #[error("DELIVERY_FAILED: {0}")]
    DeliveryFailed(String),

    /// Operation not allowed in the current lifecycle state.
    #[error("AGENT_STATE: {0}")]
    InvalidState(String),

    /// The agent has shut down and can no longer answer.
    #[error("AGENT_STATE: agent unavailable")]
    AgentUnavailable,

    /// Database operation failed.
    #[error("STORE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A stored row could not be decoded.
    #[error("STORE_ERROR: corrupt record: {0}")]
    Corrupt(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Corrupt(err.to_string())
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::InvalidUrl(msg) => (-32602, msg.clone()),
            Error::InstallFailed(msg) => (-32000, msg.clone()),
            Error::Network(msg) => (-32001, msg.clone()),
            Error::HttpStatus(status) => (-32001, format!("status {status}")),
            Error::DeliveryFailed(msg) => (-32003, msg.clone()),
            Error::InvalidState(msg) => (-32004, msg.clone()),
            Error::AgentUnavailable => (-32004, "agent unavailable".to_string()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
            Error::Corrupt(msg) => (-32002, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
