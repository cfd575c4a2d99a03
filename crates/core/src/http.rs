//! Request and response types shared by the stores, router and host surface.
//!
//! These carry exactly what the agent needs to classify a request and to
//! replay a response later; bodies are opaque bytes.

use std::collections::BTreeMap;

use bytes::Bytes;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// What kind of resource the page is requesting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Document,
    Script,
    Style,
    Image,
    Font,
    #[default]
    Empty,
}

/// How the page issued the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    Navigate,
    SameOrigin,
    NoCors,
    #[default]
    Cors,
}

/// An outgoing request handed to the agent by a governed page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: Url,
    pub destination: Destination,
    pub mode: RequestMode,
}

impl Request {
    /// A plain GET with no destination hint.
    pub fn get(url: Url) -> Self {
        Self { method: "GET".to_string(), url, destination: Destination::Empty, mode: RequestMode::Cors }
    }

    /// A top-level page navigation.
    pub fn navigate(url: Url) -> Self {
        Self { method: "GET".to_string(), url, destination: Destination::Document, mode: RequestMode::Navigate }
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate || self.destination == Destination::Document
    }
}

/// A response as returned to the page or stored in a cache container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    /// Header names are lowercased on insert.
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, headers: BTreeMap::new(), body: body.into() }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// 2xx, the only responses worth caching.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
