//! The three caching strategies.

use harbor_core::cache::CachePurpose;
use harbor_core::{Request, RequestIdentity, Response};

use super::{ResponseSource, Router};

impl Router {
    /// Network, then any cached copy, then the offline document.
    pub(super) async fn network_first(&self, request: &Request) -> (Response, ResponseSource) {
        match self.network.fetch(request).await {
            Ok(response) => {
                self.store_if_ok(CachePurpose::Pages, request, &response).await;
                (response, ResponseSource::Network)
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "navigation failed; falling back to cache");
                let identity = RequestIdentity::from(request);
                match self.cache.match_any(&self.containers.names(), &identity).await {
                    Ok(Some(entry)) => (entry.to_response(), ResponseSource::Cache),
                    Ok(None) => self.offline_fallback().await,
                    Err(e) => {
                        tracing::warn!(url = %request.url, error = %e, "cache read failed");
                        self.offline_fallback().await
                    }
                }
            }
        }
    }

    /// Cached copy immediately (refreshed in the background), else network.
    pub(super) async fn cache_first(&self, request: &Request) -> (Response, ResponseSource) {
        if let Some(entry) = self.lookup(CachePurpose::Static, request).await {
            tracing::debug!(url = %request.url, "cache hit");
            self.refresh_in_background(CachePurpose::Static, request);
            return (entry.to_response(), ResponseSource::Cache);
        }

        tracing::debug!(url = %request.url, "cache miss");
        self.from_network(CachePurpose::Static, request).await
    }

    /// Cached copy immediately while revalidating, else network.
    pub(super) async fn stale_while_revalidate(&self, request: &Request) -> (Response, ResponseSource) {
        if let Some(entry) = self.lookup(CachePurpose::Api, request).await {
            tracing::debug!(url = %request.url, "serving cached API response while revalidating");
            self.refresh_in_background(CachePurpose::Api, request);
            return (entry.to_response(), ResponseSource::Cache);
        }

        self.from_network(CachePurpose::Api, request).await
    }

    async fn from_network(&self, purpose: CachePurpose, request: &Request) -> (Response, ResponseSource) {
        match self.network.fetch(request).await {
            Ok(response) => {
                self.store_if_ok(purpose, request, &response).await;
                (response, ResponseSource::Network)
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "network failed with nothing cached");
                Self::error_response(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use chrono::Utc;
    use harbor_core::cache::{CACHED_AT_HEADER, ContainerSet};
    use harbor_core::{CacheStore, CachedEntry, Db, Destination};
    use url::Url;

    use super::*;
    use crate::router::{AGENT_ERROR_HEADER, RouterConfig, Strategy};
    use crate::testing::StubNetwork;

    const ORIGIN: &str = "https://clinic.example";

    struct Fixture {
        router: Router,
        cache: CacheStore,
        network: Arc<StubNetwork>,
        containers: ContainerSet,
    }

    async fn fixture() -> Fixture {
        let cache = CacheStore::new(Db::open_in_memory().await.unwrap());
        let network = Arc::new(StubNetwork::new());
        let containers = ContainerSet::new("clinic", "v1");
        let config = RouterConfig {
            containers: containers.clone(),
            offline_url: Url::parse(&format!("{ORIGIN}/offline.html")).unwrap(),
            api_patterns: vec!["/api/".into()],
        };
        let router = Router::new(cache.clone(), network.clone(), config).unwrap();
        Fixture { router, cache, network, containers }
    }

    fn url(path: &str) -> Url {
        Url::parse(&format!("{ORIGIN}{path}")).unwrap()
    }

    async fn seed(f: &Fixture, purpose: CachePurpose, path: &str, body: &'static str) {
        let entry = CachedEntry::stamp(RequestIdentity::get(&url(path)), &Response::new(200, body), Utc::now());
        f.cache.put(&f.containers.name(purpose), &entry).await.unwrap();
    }

    async fn cached_body(f: &Fixture, purpose: CachePurpose, path: &str) -> Option<Bytes> {
        f.cache
            .get(&f.containers.name(purpose), &RequestIdentity::get(&url(path)))
            .await
            .unwrap()
            .map(|e| e.body)
    }

    #[tokio::test]
    async fn test_cache_first_hit_ignores_network() {
        let f = fixture().await;
        seed(&f, CachePurpose::Static, "/app.js", "cached").await;
        f.network.set_offline(true);

        let request = Request::get(url("/app.js")).with_destination(Destination::Script);
        let routed = f.router.handle(&request).await.unwrap();

        assert_eq!(routed.strategy, Strategy::CacheFirst);
        assert_eq!(routed.source, ResponseSource::Cache);
        assert_eq!(routed.response.body, Bytes::from_static(b"cached"));
        assert!(routed.response.header(CACHED_AT_HEADER).is_some());
    }

    #[tokio::test]
    async fn test_cache_first_hit_refreshes_in_background() {
        let f = fixture().await;
        seed(&f, CachePurpose::Static, "/app.js", "old").await;
        f.network.respond_ok(&url("/app.js").to_string(), "new");

        let request = Request::get(url("/app.js")).with_destination(Destination::Script);
        let routed = f.router.handle(&request).await.unwrap();
        assert_eq!(routed.response.body, Bytes::from_static(b"old"));

        f.router.settle().await;
        assert_eq!(cached_body(&f, CachePurpose::Static, "/app.js").await, Some(Bytes::from_static(b"new")));
    }

    #[tokio::test]
    async fn test_cache_first_failed_refresh_keeps_entry() {
        let f = fixture().await;
        seed(&f, CachePurpose::Static, "/logo.png", "png").await;
        f.network.fail(&url("/logo.png").to_string());

        let request = Request::get(url("/logo.png")).with_destination(Destination::Image);
        f.router.handle(&request).await.unwrap();
        f.router.settle().await;

        assert_eq!(cached_body(&f, CachePurpose::Static, "/logo.png").await, Some(Bytes::from_static(b"png")));
    }

    #[tokio::test]
    async fn test_cache_first_miss_fetches_and_stores() {
        let f = fixture().await;
        f.network.respond_ok(&url("/site.css").to_string(), "body{}");

        let request = Request::get(url("/site.css")).with_destination(Destination::Style);
        let routed = f.router.handle(&request).await.unwrap();

        assert_eq!(routed.source, ResponseSource::Network);
        assert_eq!(cached_body(&f, CachePurpose::Static, "/site.css").await, Some(Bytes::from_static(b"body{}")));
    }

    #[tokio::test]
    async fn test_cache_first_miss_does_not_store_errors() {
        let f = fixture().await;

        let request = Request::get(url("/missing.js")).with_destination(Destination::Script);
        let routed = f.router.handle(&request).await.unwrap();

        assert_eq!(routed.response.status, 404);
        assert!(cached_body(&f, CachePurpose::Static, "/missing.js").await.is_none());
    }

    #[tokio::test]
    async fn test_cache_first_offline_miss_is_bare_error() {
        let f = fixture().await;
        f.network.set_offline(true);

        let request = Request::get(url("/app.js")).with_destination(Destination::Script);
        let routed = f.router.handle(&request).await.unwrap();

        assert_eq!(routed.source, ResponseSource::Error);
        assert_eq!(routed.response.status, 504);
        assert!(routed.response.header(AGENT_ERROR_HEADER).is_some());
    }

    #[tokio::test]
    async fn test_network_first_stores_copy() {
        let f = fixture().await;
        f.network.respond_ok(&url("/services").to_string(), "<h1>Services</h1>");

        let routed = f.router.handle(&Request::navigate(url("/services"))).await.unwrap();

        assert_eq!(routed.strategy, Strategy::NetworkFirst);
        assert_eq!(routed.source, ResponseSource::Network);
        assert_eq!(
            cached_body(&f, CachePurpose::Pages, "/services").await,
            Some(Bytes::from_static(b"<h1>Services</h1>"))
        );
    }

    #[tokio::test]
    async fn test_network_first_prefers_network_over_cache() {
        let f = fixture().await;
        seed(&f, CachePurpose::Pages, "/", "stale home").await;
        f.network.respond_ok(&url("/").to_string(), "fresh home");

        let routed = f.router.handle(&Request::navigate(url("/"))).await.unwrap();
        assert_eq!(routed.response.body, Bytes::from_static(b"fresh home"));
    }

    #[tokio::test]
    async fn test_network_first_offline_returns_cached_copy() {
        let f = fixture().await;
        seed(&f, CachePurpose::Pages, "/about", "about copy").await;
        f.network.set_offline(true);

        let routed = f.router.handle(&Request::navigate(url("/about"))).await.unwrap();
        assert_eq!(routed.source, ResponseSource::Cache);
        assert_eq!(routed.response.body, Bytes::from_static(b"about copy"));
    }

    #[tokio::test]
    async fn test_network_first_offline_matches_any_container() {
        let f = fixture().await;
        seed(&f, CachePurpose::Static, "/", "precached home").await;
        f.network.set_offline(true);

        let routed = f.router.handle(&Request::navigate(url("/"))).await.unwrap();
        assert_eq!(routed.response.body, Bytes::from_static(b"precached home"));
    }

    #[tokio::test]
    async fn test_network_first_offline_document() {
        let f = fixture().await;
        seed(&f, CachePurpose::Static, "/offline.html", "offline page").await;
        f.network.set_offline(true);

        let routed = f.router.handle(&Request::navigate(url("/never-visited"))).await.unwrap();
        assert_eq!(routed.source, ResponseSource::Offline);
        assert_eq!(routed.response.body, Bytes::from_static(b"offline page"));
    }

    #[tokio::test]
    async fn test_network_first_synthesized_offline_document() {
        let f = fixture().await;
        f.network.set_offline(true);

        let routed = f.router.handle(&Request::navigate(url("/never-visited"))).await.unwrap();
        assert_eq!(routed.source, ResponseSource::Offline);
        assert_eq!(routed.response.status, 503);
        assert_eq!(routed.response.header("content-type"), Some("text/html; charset=utf-8"));
    }

    #[tokio::test]
    async fn test_stale_while_revalidate_hit() {
        let f = fixture().await;
        seed(&f, CachePurpose::Api, "/api/doctors", "[\"old\"]").await;
        f.network.respond_ok(&url("/api/doctors").to_string(), "[\"new\"]");

        let routed = f.router.handle(&Request::get(url("/api/doctors"))).await.unwrap();
        assert_eq!(routed.strategy, Strategy::StaleWhileRevalidate);
        assert_eq!(routed.response.body, Bytes::from_static(b"[\"old\"]"));

        f.router.settle().await;
        assert_eq!(f.network.fetch_count(&url("/api/doctors").to_string()), 1);
        assert_eq!(
            cached_body(&f, CachePurpose::Api, "/api/doctors").await,
            Some(Bytes::from_static(b"[\"new\"]"))
        );
    }

    #[tokio::test]
    async fn test_stale_while_revalidate_miss() {
        let f = fixture().await;
        f.network.respond_ok(&url("/api/slots").to_string(), "[]");

        let routed = f.router.handle(&Request::get(url("/api/slots"))).await.unwrap();
        assert_eq!(routed.source, ResponseSource::Network);
        assert_eq!(cached_body(&f, CachePurpose::Api, "/api/slots").await, Some(Bytes::from_static(b"[]")));
    }

    #[tokio::test]
    async fn test_passthrough_not_intercepted() {
        let f = fixture().await;
        let mut post = Request::get(url("/api/analytics/booking"));
        post.method = "POST".into();

        assert!(f.router.handle(&post).await.is_none());
        assert!(f.router.handle(&Request::get(url("/robots.txt"))).await.is_none());
        assert!(f.network.fetched().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_and_store_rejects_errors() {
        let f = fixture().await;
        let result = f.router.fetch_and_store(&Request::get(url("/missing")), CachePurpose::Static).await;
        assert!(matches!(result, Err(harbor_core::Error::HttpStatus(404))));
        assert!(cached_body(&f, CachePurpose::Static, "/missing").await.is_none());
    }
}
