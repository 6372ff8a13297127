//! Subcommand implementations. Each returns the JSON printed on stdout.

pub mod cleanup;
pub mod fetch;
pub mod get;
pub mod purge;

use anyhow::{Context, Result};
use feeds_core::{AppConfig, Cache};

fn open_cache(config: &AppConfig) -> Result<Cache> {
    Cache::from_config(&config.cache).context("failed to open cache")
}

#[cfg(test)]
pub(crate) fn test_config(dir: &std::path::Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.cache.dir = dir.to_path_buf();
    config
}
