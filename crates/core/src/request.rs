//! Crawl requests and the responses stored for them.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// A request the crawl engine is about to dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlRequest {
    /// HTTP method, e.g. `GET`.
    pub method: String,
    pub url: Url,
    /// Header name/value pairs in the order they were added.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub meta: RequestMeta,
}

/// Per-request cache bookkeeping carried alongside a [`CrawlRequest`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    /// Fingerprints of the cached requests that led here, oldest first.
    pub fingerprints: Vec<String>,

    /// Never read from or write to the cache for this request.
    pub dont_cache: bool,

    /// Lifetime override for the stored response.
    pub cache_expires: Option<Duration>,
}

impl CrawlRequest {
    pub fn new(method: impl Into<String>, url: Url) -> Self {
        Self { method: method.into(), url, headers: Vec::new(), body: Vec::new(), meta: RequestMeta::default() }
    }

    /// A `GET` request for `url`.
    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Store the response with a lifetime other than the global default.
    pub fn with_cache_expires(mut self, expires: Duration) -> Self {
        self.meta.cache_expires = Some(expires);
        self
    }

    /// Bypass the cache for this request.
    pub fn dont_cache(mut self) -> Self {
        self.meta.dont_cache = true;
        self
    }

    /// Values of header `name`, matched case-insensitively, in request order.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A response as stored in and restored from the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    /// URL the response was served from (after redirects).
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    #[serde(skip)]
    pub body: Vec<u8>,
}

impl CachedResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First value of header `name`, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
