//! Capability set shared by the persistent and in-memory backends.

use serde::Serialize;
use serde_json::Value;

use crate::Error;
use crate::request::{CachedResponse, CrawlRequest};

/// Summary of a cleanup walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Entries whose metadata was read.
    pub visited: usize,
    /// Entries removed because they outlived their effective expiry.
    pub expired: usize,
    /// Responses removed because their status is ignored.
    pub disallowed: usize,
    /// Parent entries removed along with a disallowed response.
    pub cascaded: usize,
    /// Entries left alone because their metadata could not be read.
    pub skipped: usize,
    /// Empty shard and namespace directories removed.
    pub pruned_dirs: usize,
}

impl CleanupReport {
    /// Total number of entries deleted.
    pub fn removed(&self) -> usize {
        self.expired + self.disallowed + self.cascaded
    }
}

/// Storage backend interface.
///
/// The response methods default to "not cached", which is what a backend
/// that does not persist HTTP responses should report.
pub trait CacheStorage: Send + Sync {
    fn retrieve_object(&self, namespace: &str, key: &str) -> Result<Option<Value>, Error>;

    fn store_object(&self, namespace: &str, key: &str, value: &Value) -> Result<(), Error>;

    fn retrieve_response(&self, _namespace: &str, _request: &CrawlRequest) -> Result<Option<CachedResponse>, Error> {
        Ok(None)
    }

    fn store_response(&self, _namespace: &str, _request: &CrawlRequest, _response: &CachedResponse) -> Result<(), Error> {
        Ok(())
    }

    /// Remove the response for `request` and the entries it descends from.
    /// Returns the number of entries deleted.
    fn remove_response(&self, _namespace: &str, _request: &CrawlRequest) -> Result<usize, Error> {
        Ok(0)
    }

    fn cleanup(&self) -> Result<CleanupReport, Error>;
}
