//! `feeds fetch`: fetch URLs through the cache.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use feeds_client::{CachingFetcher, FetchClient, FetchConfig, canonicalize};
use feeds_core::{AppConfig, CrawlRequest};
use serde_json::{Value, json};

/// Per-invocation cache options.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    pub dont_cache: bool,
    pub expires_secs: Option<u64>,
}

/// Fetch every URL in order. A failing URL is reported in the output and
/// does not stop the others.
pub async fn run(config: &AppConfig, namespace: &str, urls: &[String], options: FetchOptions) -> Result<Value> {
    let cache = Arc::new(super::open_cache(config)?);
    let client = FetchClient::new(FetchConfig::from_app_config(config))?;
    let fetcher = CachingFetcher::new(client, cache, namespace);

    let mut results = Vec::with_capacity(urls.len());
    for raw in urls {
        let url = match canonicalize(raw) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(url = %raw, error = %e, "invalid URL");
                results.push(json!({ "url": raw, "error": e.to_string() }));
                continue;
            }
        };

        let mut request = CrawlRequest::get(url);
        if options.dont_cache {
            request = request.dont_cache();
        }
        if let Some(secs) = options.expires_secs {
            request = request.with_cache_expires(Duration::from_secs(secs));
        }

        match fetcher.fetch(&mut request).await {
            Ok(fetched) => results.push(json!({
                "url": request.url.as_str(),
                "status": fetched.response.status,
                "from_cache": fetched.from_cache,
                "bytes": fetched.response.body.len(),
            })),
            Err(e) => {
                tracing::error!(url = %request.url, error = %e, "fetch failed");
                results.push(json!({ "url": request.url.as_str(), "error": e.to_string() }));
            }
        }
    }

    Ok(Value::Array(results))
}
