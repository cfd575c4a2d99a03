//! HTTP fetch client backed by reqwest.
//!
//! ### Behavior
//! - Replays the page's method against the request URL
//! - Returns every HTTP status as a response; only transport failures are errors
//! - Enforces a maximum body size and the configured timeout
//! - Header names are lowercased; multi-valued headers are joined with `, `

pub mod url;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use harbor_core::{Error, Request, Response};
use reqwest::{Client, Method, header};
use serde_json::Value;

pub use self::url::{UrlError, resolve};
use crate::network::Network;

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "harbor/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 10MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "harbor/0.1".to_string(),
            max_bytes: 10 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

/// HTTP client used for intercepted requests and telemetry delivery.
#[derive(Debug, Clone)]
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

fn network_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Network(format!("timeout: {err}"))
    } else {
        Error::Network(err.to_string())
    }
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {}: {e}", request.method)))?;

        let response = self
            .http
            .request(method, request.url.as_str())
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::Network(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let mut headers = std::collections::BTreeMap::new();
        for (name, value) in response.headers() {
            let Ok(value) = value.to_str() else {
                continue;
            };
            headers
                .entry(name.as_str().to_string())
                .and_modify(|v: &mut String| {
                    v.push_str(", ");
                    v.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }
        headers.remove(header::CONTENT_LENGTH.as_str());

        let bytes: Bytes = response.bytes().await.map_err(network_error)?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::Network(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            "fetched {} {} -> {} in {}ms ({} bytes)",
            request.method,
            request.url,
            status.as_u16(),
            start.elapsed().as_millis(),
            bytes.len()
        );

        Ok(Response { status: status.as_u16(), headers, body: bytes })
    }

    async fn post_json(&self, url: &::url::Url, body: &Value) -> Result<u16, Error> {
        let response = self
            .http
            .post(url.as_str())
            .header(header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status().as_u16();
        tracing::debug!("posted to {} -> {}", url, status);
        Ok(status)
    }
}
