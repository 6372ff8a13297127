//! `feeds purge`: drop the cached response for a URL and its parents.

use anyhow::{Context, Result};
use feeds_client::canonicalize;
use feeds_core::{AppConfig, CrawlRequest};
use serde_json::{Value, json};

pub fn run(config: &AppConfig, namespace: &str, url: &str) -> Result<Value> {
    let url = canonicalize(url).with_context(|| format!("invalid URL: {url}"))?;
    let cache = super::open_cache(config)?;
    let removed = cache.purge_response(namespace, &CrawlRequest::get(url.clone()))?;
    tracing::info!(namespace, %url, removed, "purged cached response");
    Ok(json!({ "url": url.as_str(), "removed": removed }))
}
