//! `feeds get`: print a cached object.

use anyhow::{Result, bail};
use feeds_core::AppConfig;
use serde_json::Value;

pub fn run(config: &AppConfig, namespace: &str, key: &str) -> Result<Value> {
    let cache = super::open_cache(config)?;
    match cache.get::<Value>(namespace, key)? {
        Some(value) => Ok(value),
        None => bail!("no object stored under {key:?} in namespace {namespace:?}"),
    }
}
