//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (FEEDS_*)
//! 2. TOML config file (`--config` or FEEDS_CONFIG_FILE)
//! 3. Built-in defaults
//!
//! Nested keys use a double underscore, e.g. `FEEDS_CACHE__ENABLED=false`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// User-Agent string for HTTP requests.
    ///
    /// Set via FEEDS_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via FEEDS_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via FEEDS_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Response and object cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Settings consumed by the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether responses and objects persist on disk between runs.
    ///
    /// When false, objects live in memory for the current process only and
    /// HTTP responses are not cached at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cache root directory.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    /// Global default lifetime of an entry, in days.
    #[serde(default = "default_expires_days")]
    pub expires_days: i64,

    /// Responses with these status codes are hidden from reads and removed,
    /// together with their recorded parents, on cleanup.
    #[serde(default = "default_ignore_http_codes")]
    pub ignore_http_codes: Vec<u16>,

    /// Request headers that take part in the fingerprint.
    #[serde(default = "default_fingerprint_headers")]
    pub fingerprint_headers: Vec<String>,
}

fn default_user_agent() -> String {
    "feeds (+https://github.com/pyfeeds/pyfeeds)".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_true() -> bool {
    true
}

fn default_expires_days() -> i64 {
    90
}

fn default_ignore_http_codes() -> Vec<u16> {
    (400..600).collect()
}

fn default_fingerprint_headers() -> Vec<String> {
    vec!["Cookie".into()]
}

/// `$XDG_CACHE_HOME/feeds`, falling back to `~/.cache/feeds`.
fn default_cache_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CACHE_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(xdg).join("feeds");
    }
    match std::env::var_os("HOME").filter(|v| !v.is_empty()) {
        Some(home) => PathBuf::from(home).join(".cache").join("feeds"),
        None => PathBuf::from(".feeds-cache"),
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            cache: CacheConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_cache_dir(),
            expires_days: default_expires_days(),
            ignore_http_codes: default_ignore_http_codes(),
            fingerprint_headers: default_fingerprint_headers(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration, reading the TOML file named by `FEEDS_CONFIG_FILE` if set.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::load_from`].
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var_os("FEEDS_CONFIG_FILE").map(PathBuf::from);
        Self::load_from(file.as_deref())
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `FEEDS_`
    /// 2. TOML file at `config_file` (if given)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read or parsed
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load_from(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = config_file {
            if !path.is_file() {
                return Err(ConfigError::LoadFailed(format!("config file not found: {}", path.display())));
            }
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(
            Env::prefixed("FEEDS_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
