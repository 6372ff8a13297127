//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::{AppConfig, CacheConfig};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - the cache section is invalid (see [`CacheConfig::validate`])
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        self.cache.validate()
    }
}

impl CacheConfig {
    /// Validate the cache section.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `expires_days` is negative
    /// - an ignored status code lies outside 100..=599
    /// - a fingerprint header name is blank
    /// - `dir` is empty while caching is enabled
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.expires_days < 0 {
            return Err(ConfigError::Invalid {
                field: "cache.expires_days".into(),
                reason: "must not be negative".into(),
            });
        }

        if let Some(code) = self.ignore_http_codes.iter().find(|c| !(100..=599).contains(*c)) {
            return Err(ConfigError::Invalid {
                field: "cache.ignore_http_codes".into(),
                reason: format!("{code} is not an HTTP status code"),
            });
        }

        if self.fingerprint_headers.iter().any(|h| h.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "cache.fingerprint_headers".into(),
                reason: "header names must not be blank".into(),
            });
        }

        if self.enabled && self.dir.as_os_str().is_empty() {
            return Err(ConfigError::Missing {
                field: "cache.dir".into(),
                hint: "Set FEEDS_CACHE__DIR or disable caching with FEEDS_CACHE__ENABLED=false".into(),
            });
        }

        if self.enabled && self.expires_days == 0 {
            tracing::warn!("cache.expires_days is 0; every cache entry expires on the next cleanup");
        }

        Ok(())
    }
}
