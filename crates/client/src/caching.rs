//! Cache-aware fetching for a crawl.
//!
//! [`CachingFetcher`] sits between the crawl loop and [`FetchClient`]:
//! - attaches provenance to each request before it goes out
//! - serves responses from the cache when a usable entry exists
//! - stores every fetched response, error statuses included
//! - purges a response and its parents when the item built from it is dropped
//!
//! The cache is local filesystem I/O, so every cache call runs on the
//! blocking pool. A failing cache never fails the fetch: the error is logged
//! and the request goes to the network uncached.

use std::sync::Arc;

use feeds_core::{Cache, CachedResponse, CrawlRequest, Error, Provenance};

use crate::fetch::{FetchClient, join};

/// Result of [`CachingFetcher::fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub response: CachedResponse,
    /// Whether the response came from the cache rather than the network.
    pub from_cache: bool,
}

/// Fetches on behalf of one spider, caching under its namespace.
#[derive(Debug, Clone)]
pub struct CachingFetcher {
    client: FetchClient,
    cache: Arc<Cache>,
    provenance: Provenance,
    namespace: String,
}

impl CachingFetcher {
    pub fn new(client: FetchClient, cache: Arc<Cache>, namespace: impl Into<String>) -> Self {
        let provenance = cache.provenance();
        Self { client, cache, provenance, namespace: namespace.into() }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    /// Dispatch `request`, attaching its provenance first.
    ///
    /// # Errors
    ///
    /// Only network-level failures are errors; HTTP error statuses are
    /// returned in [`Fetched::response`] and logged.
    pub async fn fetch(&self, request: &mut CrawlRequest) -> Result<Fetched, Error> {
        self.provenance.on_dispatch(request);
        let cacheable = !request.meta.dont_cache;

        if cacheable {
            let lookup = request.clone();
            match self.with_cache(move |cache, ns| cache.retrieve_response(ns, &lookup)).await? {
                Ok(Some(response)) => {
                    tracing::debug!(namespace = %self.namespace, url = %request.url, status = response.status, "cache hit");
                    log_http_error(&request.url, response.status);
                    return Ok(Fetched { response, from_cache: true });
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(namespace = %self.namespace, url = %request.url, error = %e, "cache lookup failed");
                }
            }
        }

        let response = self.client.fetch(request).await?;
        log_http_error(&request.url, response.status);

        if !cacheable {
            return Ok(Fetched { response, from_cache: false });
        }

        let stored = request.clone();
        let (response, result) = self
            .with_cache(move |cache, ns| {
                let result = cache.store_response(ns, &stored, &response);
                (response, result)
            })
            .await?;
        if let Err(e) = result {
            tracing::warn!(namespace = %self.namespace, url = %request.url, error = %e, "failed to cache response");
        }

        Ok(Fetched { response, from_cache: false })
    }

    /// Build the request for a link found in `parent`'s response, inheriting
    /// its provenance chain.
    pub fn follow(&self, parent: &CrawlRequest, href: &str) -> Result<CrawlRequest, Error> {
        let url = join(&parent.url, href).map_err(|e| Error::InvalidUrl(format!("{href}: {e}")))?;
        Ok(self.provenance.follow(parent, CrawlRequest::get(url)))
    }

    /// The item scraped from `request`'s response was rejected: drop the
    /// cached response and the responses that led to it, so the next run
    /// fetches them again.
    pub async fn item_dropped(&self, request: &CrawlRequest) -> Result<usize, Error> {
        let target = request.clone();
        let removed = self.with_cache(move |cache, ns| cache.purge_response(ns, &target)).await??;
        tracing::info!(namespace = %self.namespace, url = %request.url, removed, "dropped item, purged cached responses");
        Ok(removed)
    }

    async fn with_cache<T, F>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce(&Cache, &str) -> T + Send + 'static,
        T: Send + 'static,
    {
        let cache = Arc::clone(&self.cache);
        let namespace = self.namespace.clone();
        tokio::task::spawn_blocking(move || f(&cache, &namespace))
            .await
            .map_err(|e| Error::BlockingTask(e.to_string()))
    }
}

/// Server-side failures are usually transient and only noted; anything else
/// non-2xx is worth a warning.
fn log_http_error(url: &url::Url, status: u16) {
    match status {
        200..=299 => {}
        500 | 502 | 503 | 504 => tracing::info!(%url, status, "server error response"),
        _ => tracing::warn!(%url, status, "HTTP error response"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchConfig;
    use crate::testutil::Origin;
    use feeds_core::CacheConfig;
    use feeds_core::cache::meta::read_meta;
    use feeds_core::cache::{CacheBackend, FilesystemStorage};
    use std::path::Path;

    fn persistent_cache(dir: &Path) -> Arc<Cache> {
        let config = CacheConfig { dir: dir.to_path_buf(), ..Default::default() };
        Arc::new(Cache::from_config(&config).unwrap())
    }

    fn fetcher(cache: Arc<Cache>) -> CachingFetcher {
        CachingFetcher::new(FetchClient::new(FetchConfig::default()).unwrap(), cache, "spider")
    }

    fn storage(fetcher: &CachingFetcher) -> &FilesystemStorage {
        match fetcher.cache().backend() {
            CacheBackend::Persistent(storage) => storage,
            CacheBackend::InMemory(_) => panic!("expected persistent backend"),
        }
    }

    #[tokio::test]
    async fn test_second_fetch_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let origin = Origin::start(&[("/feed", 200, "<feed/>")]).await;
        let fetcher = fetcher(persistent_cache(dir.path()));

        let first = fetcher.fetch(&mut CrawlRequest::get(origin.url("/feed"))).await.unwrap();
        let second = fetcher.fetch(&mut CrawlRequest::get(origin.url("/feed"))).await.unwrap();

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(second.response, first.response);
        assert_eq!(origin.hits(), 1);
    }

    #[tokio::test]
    async fn test_dont_cache_bypasses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let origin = Origin::start(&[("/live", 200, "now")]).await;
        let fetcher = fetcher(persistent_cache(dir.path()));

        for _ in 0..2 {
            let mut request = CrawlRequest::get(origin.url("/live")).dont_cache();
            let fetched = fetcher.fetch(&mut request).await.unwrap();
            assert!(!fetched.from_cache);
            assert!(request.meta.fingerprints.is_empty());
        }

        assert_eq!(origin.hits(), 2);
        assert!(!dir.path().join("spider").exists());
    }

    #[tokio::test]
    async fn test_error_status_stored_but_not_served() {
        let dir = tempfile::tempdir().unwrap();
        let origin = Origin::start(&[]).await;
        let fetcher = fetcher(persistent_cache(dir.path()));

        for _ in 0..2 {
            let fetched = fetcher.fetch(&mut CrawlRequest::get(origin.url("/gone"))).await.unwrap();
            assert_eq!(fetched.response.status, 404);
            assert!(!fetched.from_cache);
        }
        assert_eq!(origin.hits(), 2);

        let report = fetcher.cache().cleanup().unwrap();
        assert_eq!(report.disallowed, 1);
    }

    #[tokio::test]
    async fn test_provenance_recorded_and_item_dropped_cascades() {
        let dir = tempfile::tempdir().unwrap();
        let routes = [("/", 200, "index"), ("/list", 200, "list"), ("/item", 200, "item"), ("/about", 200, "about")];
        let origin = Origin::start(&routes).await;
        let fetcher = fetcher(persistent_cache(dir.path()));
        fetcher.fetch(&mut CrawlRequest::get(origin.url("/about"))).await.unwrap();

        let mut index = CrawlRequest::get(origin.url("/"));
        fetcher.fetch(&mut index).await.unwrap();
        let mut list = fetcher.follow(&index, "list").unwrap();
        fetcher.fetch(&mut list).await.unwrap();
        let mut item = fetcher.follow(&list, "item#comments").unwrap();
        fetcher.fetch(&mut item).await.unwrap();
        assert_eq!(item.meta.fingerprints.len(), 3);
        assert_eq!(origin.hits(), 4);

        let fp = |r: &CrawlRequest| storage(&fetcher).fingerprinter().fingerprint(r);
        let meta = read_meta(&storage(&fetcher).request_path("spider", &item).unwrap()).unwrap().unwrap();
        let mut expected = vec![fp(&index), fp(&list)];
        expected.sort();
        assert_eq!(meta.parents().map(str::to_owned).collect::<Vec<_>>(), expected);

        assert_eq!(fetcher.item_dropped(&item).await.unwrap(), 3);

        for path in ["/", "/list", "/item"] {
            assert!(!fetcher.fetch(&mut CrawlRequest::get(origin.url(path))).await.unwrap().from_cache, "{path}");
        }
        assert!(fetcher.fetch(&mut CrawlRequest::get(origin.url("/about"))).await.unwrap().from_cache);
    }

    #[tokio::test]
    async fn test_in_memory_cache_never_serves_responses() {
        let origin = Origin::start(&[("/feed", 200, "<feed/>")]).await;
        let fetcher = fetcher(Arc::new(Cache::in_memory()));

        fetcher.fetch(&mut CrawlRequest::get(origin.url("/feed"))).await.unwrap();
        let second = fetcher.fetch(&mut CrawlRequest::get(origin.url("/feed"))).await.unwrap();

        assert!(!second.from_cache);
        assert_eq!(origin.hits(), 2);
    }

    #[tokio::test]
    async fn test_broken_cache_does_not_fail_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("not-a-directory");
        std::fs::write(&root, b"").unwrap();
        let origin = Origin::start(&[("/feed", 200, "<feed/>")]).await;
        let fetcher = fetcher(persistent_cache(&root));

        let fetched = fetcher.fetch(&mut CrawlRequest::get(origin.url("/feed"))).await.unwrap();

        assert_eq!(fetched.response.body, b"<feed/>");
        assert!(!fetched.from_cache);
    }

    #[test]
    fn test_follow_rejects_unsupported_links() {
        let fetcher = fetcher(Arc::new(Cache::in_memory()));
        let parent = CrawlRequest::get(url::Url::parse("https://example.com/").unwrap());
        assert!(matches!(fetcher.follow(&parent, "javascript:void(0)"), Err(Error::InvalidUrl(_))));
    }
}
