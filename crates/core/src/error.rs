//! Unified error types for feeds.
//!
//! A missing cache entry is never an error: read paths return `Ok(None)`.
//! These variants cover the failures a caller may want to act on.

use std::path::{Path, PathBuf};

use crate::config::ConfigError;

/// Unified error types for the feeds cache and fetch pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Filesystem operation on a cache entry failed for a reason other than "not found".
    #[error("CACHE_IO: {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Object value could not be encoded or decoded.
    #[error("SERIALIZE: {0}")]
    Serialize(String),

    /// Configuration rejected before any filesystem mutation.
    #[error("CONFIG: {0}")]
    Config(#[from] ConfigError),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Invalid input (e.g., a namespace that is not a single path component).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Network or protocol error while fetching.
    #[error("HTTP_ERROR: {0}")]
    Http(String),

    /// A blocking filesystem task panicked or was cancelled.
    #[error("BLOCKING_TASK: {0}")]
    BlockingTask(String),
}

impl Error {
    pub(crate) fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Io { path: path.as_ref().to_path_buf(), source }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialize(err.to_string())
    }
}
