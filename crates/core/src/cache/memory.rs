//! Volatile cache used when persistent caching is disabled.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde_json::Value;

use super::storage::{CacheStorage, CleanupReport};
use crate::Error;

/// Namespace → key → value map that lives as long as the process.
///
/// HTTP responses are never held here; the response methods keep their
/// "not cached" defaults.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: RwLock<HashMap<String, HashMap<String, Value>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects held across all namespaces.
    pub fn len(&self) -> usize {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        data.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStorage for MemoryStorage {
    fn retrieve_object(&self, namespace: &str, key: &str) -> Result<Option<Value>, Error> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        Ok(data.get(namespace).and_then(|ns| ns.get(key)).cloned())
    }

    fn store_object(&self, namespace: &str, key: &str, value: &Value) -> Result<(), Error> {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.entry(namespace.to_owned()).or_default().insert(key.to_owned(), value.clone());
        Ok(())
    }

    /// Nothing outlives the process, so there is nothing to clean.
    fn cleanup(&self) -> Result<CleanupReport, Error> {
        Ok(CleanupReport::default())
    }
}
