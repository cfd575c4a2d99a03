//! Cached entries and request identities.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use url::Url;

use super::hash::compute_cache_key;
use crate::http::{Request, Response};

/// Header injected into every stored response.
pub const CACHED_AT_HEADER: &str = "cached-at";

/// Method + canonical URL. The fragment never reaches the network, so it is
/// not part of the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestIdentity {
    pub method: String,
    pub url: String,
}

impl RequestIdentity {
    pub fn new(method: &str, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self { method: method.to_ascii_uppercase(), url: url.to_string() }
    }

    pub fn get(url: &Url) -> Self {
        Self::new("GET", url)
    }

    pub fn key(&self) -> String {
        compute_cache_key(&self.method, &self.url)
    }
}

impl From<&Request> for RequestIdentity {
    fn from(request: &Request) -> Self {
        Self::new(&request.method, &request.url)
    }
}

/// A response stored in a cache container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    pub identity: RequestIdentity,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl CachedEntry {
    /// Copy a response for storage, stamping it with `cached_at`.
    pub fn stamp(identity: RequestIdentity, response: &Response, cached_at: DateTime<Utc>) -> Self {
        let mut headers = response.headers.clone();
        headers.insert(CACHED_AT_HEADER.to_string(), cached_at.to_rfc3339());
        Self { identity, status: response.status, headers, body: response.body.clone() }
    }

    /// The injected timestamp; `None` if missing or unparseable.
    pub fn cached_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.headers.get(CACHED_AT_HEADER)?;
        DateTime::parse_from_rfc3339(raw).ok().map(|t| t.with_timezone(&Utc))
    }

    pub fn to_response(&self) -> Response {
        Response { status: self.status, headers: self.headers.clone(), body: self.body.clone() }
    }
}
