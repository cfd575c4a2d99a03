//! Request classification.
//!
//! Classification looks only at the request (method, mode, destination and
//! URL), never at response content. Rules are evaluated in a fixed order and
//! the first match wins.

use harbor_core::{Destination, Error, Request};
use regex::RegexSet;
use serde::Serialize;

/// How an intercepted request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    NetworkFirst,
    CacheFirst,
    StaleWhileRevalidate,
    /// Not intercepted; the page talks to the network directly.
    Passthrough,
}

#[derive(Debug, Clone)]
pub struct Classifier {
    api: RegexSet,
}

impl Classifier {
    pub fn new<I, S>(api_patterns: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let api = RegexSet::new(api_patterns).map_err(|e| Error::InvalidInput(format!("api pattern: {e}")))?;
        Ok(Self { api })
    }

    pub fn is_api(&self, url: &str) -> bool {
        self.api.is_match(url)
    }

    pub fn classify(&self, request: &Request) -> Strategy {
        if !request.is_get() {
            return Strategy::Passthrough;
        }
        if request.is_navigation() {
            return Strategy::NetworkFirst;
        }
        if matches!(
            request.destination,
            Destination::Script | Destination::Style | Destination::Image | Destination::Font
        ) {
            return Strategy::CacheFirst;
        }
        if self.is_api(request.url.as_str()) {
            return Strategy::StaleWhileRevalidate;
        }
        Strategy::Passthrough
    }
}
