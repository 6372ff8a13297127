//! Command-line interface definitions for feeds.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Fetch feeds through the response cache and maintain it.
///
/// # Examples
///
/// ```sh
/// # Fetch two pages for the "blog" spider, caching the responses for an hour
/// feeds fetch blog https://example.com/ https://example.com/archive --expires-secs 3600
///
/// # Expire old entries once the crawl is done
/// feeds --loglevel debug cleanup
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Log verbosity; `RUST_LOG` takes precedence when set
    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    pub loglevel: LogLevel,

    /// Path to a TOML config file (default: `FEEDS_CONFIG_FILE`)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch URLs through the cache
    Fetch {
        /// Cache namespace, usually the spider name
        namespace: String,

        #[arg(required = true)]
        urls: Vec<String>,

        /// Neither read from nor write to the cache
        #[arg(long)]
        dont_cache: bool,

        /// Keep the responses for at most this many seconds
        #[arg(long)]
        expires_secs: Option<u64>,
    },

    /// Print a cached object as JSON
    Get { namespace: String, key: String },

    /// Remove the cached response for a URL and the responses that led to it
    Purge { namespace: String, url: String },

    /// Remove expired and disallowed entries from the cache
    Cleanup,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}
