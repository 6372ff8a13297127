//! `feeds cleanup`: one batch expiry pass over the cache.

use anyhow::Result;
use feeds_core::AppConfig;
use serde_json::Value;

pub fn run(config: &AppConfig) -> Result<Value> {
    let cache = super::open_cache(config)?;
    let report = cache.cleanup()?;
    Ok(serde_json::to_value(report)?)
}
