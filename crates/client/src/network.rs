//! The network seam.
//!
//! Strategies and delivery sweeps talk to origins only through [`Network`],
//! so the reqwest client can be swapped for an in-process stub in tests.

use async_trait::async_trait;
use harbor_core::{Error, Request, Response};
use serde_json::Value;
use url::Url;

#[async_trait]
pub trait Network: Send + Sync {
    /// Perform a request.
    ///
    /// Any HTTP status is `Ok`; `Err` means no response was received.
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;

    /// POST a JSON body and return the response status.
    async fn post_json(&self, url: &Url, body: &Value) -> Result<u16, Error>;
}
