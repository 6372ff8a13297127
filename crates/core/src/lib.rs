//! Core types and shared functionality for feeds.
//!
//! This crate provides:
//! - Response and object cache with persistent and in-memory backends
//! - Request provenance tracking for cascading cleanup
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod request;

pub use cache::{Cache, CacheStorage, CleanupReport, Provenance};
pub use config::{AppConfig, CacheConfig, ConfigError};
pub use error::Error;
pub use request::{CachedResponse, CrawlRequest, RequestMeta};
