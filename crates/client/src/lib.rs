//! Client code for feeds.
//!
//! This crate provides the HTTP fetch pipeline and the cache-aware fetcher
//! used by spiders and the CLI.

pub mod caching;
pub mod fetch;

#[cfg(any(test, feature = "test-util"))]
pub mod testutil;

pub use caching::{CachingFetcher, Fetched};
pub use fetch::{FetchClient, FetchConfig, UrlError, canonicalize, join};
