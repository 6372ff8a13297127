//! Single entry point to whichever backend the configuration selects.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::filesystem::FilesystemStorage;
use super::hash::Fingerprinter;
use super::memory::MemoryStorage;
use super::provenance::Provenance;
use super::storage::{CacheStorage, CleanupReport};
use crate::Error;
use crate::config::CacheConfig;
use crate::request::{CachedResponse, CrawlRequest};

/// The two storage variants.
#[derive(Debug)]
pub enum CacheBackend {
    Persistent(FilesystemStorage),
    InMemory(MemoryStorage),
}

/// Cache façade handed to every component that reads or writes the cache.
#[derive(Debug)]
pub struct Cache {
    backend: CacheBackend,
    fingerprinter: Fingerprinter,
}

impl Cache {
    /// Select the backend from `config.enabled`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the cache section does not validate.
    pub fn from_config(config: &CacheConfig) -> Result<Self, Error> {
        config.validate()?;
        if config.enabled {
            tracing::debug!(dir = %config.dir.display(), "using persistent cache");
            Ok(Self::persistent(FilesystemStorage::from_config(config)?))
        } else {
            tracing::debug!("persistent cache disabled, using in-memory cache");
            Ok(Self {
                backend: CacheBackend::InMemory(MemoryStorage::new()),
                fingerprinter: Fingerprinter::from_config(config),
            })
        }
    }

    pub fn persistent(storage: FilesystemStorage) -> Self {
        let fingerprinter = storage.fingerprinter().clone();
        Self { backend: CacheBackend::Persistent(storage), fingerprinter }
    }

    pub fn in_memory() -> Self {
        Self { backend: CacheBackend::InMemory(MemoryStorage::new()), fingerprinter: Fingerprinter::default() }
    }

    pub fn backend(&self) -> &CacheBackend {
        &self.backend
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, CacheBackend::Persistent(_))
    }

    /// Provenance tracker keyed the same way as the stored responses.
    pub fn provenance(&self) -> Provenance {
        Provenance::new(self.fingerprinter.clone())
    }

    fn storage(&self) -> &dyn CacheStorage {
        match &self.backend {
            CacheBackend::Persistent(storage) => storage,
            CacheBackend::InMemory(storage) => storage,
        }
    }

    /// Object stored under `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns `Error::Serialize` if the stored value does not decode as `T`.
    pub fn get<T: DeserializeOwned>(&self, namespace: &str, key: &str) -> Result<Option<T>, Error> {
        match self.storage().retrieve_object(namespace, key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize + ?Sized>(&self, namespace: &str, key: &str, value: &T) -> Result<(), Error> {
        let value = serde_json::to_value(value)?;
        self.storage().store_object(namespace, key, &value)
    }

    /// Return the value stored under `key`, storing `default` first if there
    /// is none. A stored value is never replaced.
    pub fn set_if_absent<T>(&self, namespace: &str, key: &str, default: T) -> Result<T, Error>
    where
        T: Serialize + DeserializeOwned,
    {
        if let Some(existing) = self.get(namespace, key)? {
            return Ok(existing);
        }
        self.set(namespace, key, &default)?;
        Ok(default)
    }

    /// First time `item_id` was observed in `namespace`, pinned to `now` on
    /// the first call.
    pub fn first_seen(&self, namespace: &str, item_id: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, Error> {
        self.set_if_absent(namespace, &format!("{item_id}|updated"), now)
    }

    pub fn retrieve_response(&self, namespace: &str, request: &CrawlRequest) -> Result<Option<CachedResponse>, Error> {
        self.storage().retrieve_response(namespace, request)
    }

    pub fn store_response(&self, namespace: &str, request: &CrawlRequest, response: &CachedResponse) -> Result<(), Error> {
        self.storage().store_response(namespace, request, response)
    }

    /// Remove the response for `request` and its recorded parents.
    pub fn purge_response(&self, namespace: &str, request: &CrawlRequest) -> Result<usize, Error> {
        self.storage().remove_response(namespace, request)
    }

    pub fn cleanup(&self) -> Result<CleanupReport, Error> {
        self.storage().cleanup()
    }
}
