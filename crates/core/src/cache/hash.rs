//! Content-addressed cache key generation.
//!
//! Responses are keyed by a request fingerprint, generic objects by a hash of
//! the caller's key. Both are lowercase hex SHA-256 digests.

use sha2::{Digest, Sha256};
use url::Url;

use crate::config::CacheConfig;
use crate::request::CrawlRequest;

/// Headers that distinguish otherwise identical requests by default.
pub const DEFAULT_FINGERPRINT_HEADERS: &[&str] = &["Cookie"];

/// Computes request fingerprints over method, canonical URL, body and an
/// allow-list of headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprinter {
    /// Lowercased, sorted, deduplicated header names.
    include_headers: Vec<String>,
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new(DEFAULT_FINGERPRINT_HEADERS)
    }
}

impl Fingerprinter {
    pub fn new<I, S>(include_headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut include_headers: Vec<String> = include_headers
            .into_iter()
            .map(|h| h.as_ref().trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        include_headers.sort();
        include_headers.dedup();
        Self { include_headers }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(&config.fingerprint_headers)
    }

    pub fn include_headers(&self) -> &[String] {
        &self.include_headers
    }

    /// Fingerprint of `request`.
    ///
    /// Header names are compared case-insensitively and only allow-listed
    /// headers contribute, so incidental header order or casing does not
    /// change the result.
    pub fn fingerprint(&self, request: &CrawlRequest) -> String {
        let mut hasher = Sha256::new();
        hasher.update(request.method.to_ascii_uppercase().as_bytes());
        hasher.update(b"\n");
        hasher.update(canonical_url(&request.url).as_bytes());
        hasher.update(b"\n");
        hasher.update(Sha256::digest(&request.body));
        for name in &self.include_headers {
            hasher.update(b"\n");
            hasher.update(name.as_bytes());
            hasher.update(b":");
            for value in request.header_values(name) {
                hasher.update(value.as_bytes());
                hasher.update(b"\0");
            }
        }
        hex::encode(hasher.finalize())
    }
}

/// On-disk key for a generic object stored under `key`.
pub fn object_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// URL form used for fingerprinting: fragment dropped, query pairs sorted.
///
/// The `url` crate already lowercases scheme and host for http(s).
pub fn canonical_url(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);

    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        pairs.sort();
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }

    url.into()
}

/// Whether `s` looks like a key produced by this module.
pub fn is_cache_key(s: &str) -> bool {
    s.len() >= 2 && s.bytes().all(|b| b.is_ascii_hexdigit())
}
