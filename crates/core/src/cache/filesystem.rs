//! Filesystem-backed cache storage.
//!
//! # Directory layout
//!
//! ```text
//! <root>/
//!   <namespace>/
//!     <key[0..2]>/
//!       <key>/
//!         meta.json         metadata (authoritative)
//!         meta              metadata, pretty-printed
//!         object            generic object payload (JSON)
//!         response_head     response URL, status and headers (JSON)
//!         response_body     raw response body
//!         request_headers   request headers (JSON)
//! ```
//!
//! `key` is the request fingerprint for responses and the hash of the
//! caller's key for objects. Every key maps to exactly one directory, so
//! removing an entry only touches its own directory and those of its
//! recorded parents.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::Value;

use super::hash::{Fingerprinter, is_cache_key, object_key};
use super::meta::{EntryKind, EntryMeta, read_meta, remove_meta, write_meta};
use super::policy::CachePolicy;
use super::storage::{CacheStorage, CleanupReport};
use crate::Error;
use crate::config::CacheConfig;
use crate::request::{CachedResponse, CrawlRequest};

const OBJECT_FILE: &str = "object";
const RESPONSE_HEAD_FILE: &str = "response_head";
const RESPONSE_BODY_FILE: &str = "response_body";
const REQUEST_HEADERS_FILE: &str = "request_headers";

/// Durable cache rooted at a directory, one subtree per namespace.
#[derive(Debug, Clone)]
pub struct FilesystemStorage {
    root: PathBuf,
    policy: CachePolicy,
    fingerprinter: Fingerprinter,
}

impl FilesystemStorage {
    /// Create a storage handle. Nothing is written until the first store.
    pub fn new(root: impl Into<PathBuf>, policy: CachePolicy, fingerprinter: Fingerprinter) -> Self {
        Self { root: root.into(), policy, fingerprinter }
    }

    /// # Errors
    ///
    /// Returns `Error::Config` if the cache section does not validate.
    pub fn from_config(config: &CacheConfig) -> Result<Self, Error> {
        let policy = CachePolicy::from_config(config)?;
        Ok(Self::new(&config.dir, policy, Fingerprinter::from_config(config)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn fingerprinter(&self) -> &Fingerprinter {
        &self.fingerprinter
    }

    /// Directory of the entry stored under `key` in `namespace`.
    pub fn entry_path(&self, namespace: &str, key: &str) -> Result<PathBuf, Error> {
        if !is_cache_key(key) {
            return Err(Error::InvalidInput(format!("not a cache key: {key:?}")));
        }
        Ok(self.namespace_dir(namespace)?.join(&key[..2]).join(key))
    }

    /// Directory of the response entry for `request`.
    pub fn request_path(&self, namespace: &str, request: &CrawlRequest) -> Result<PathBuf, Error> {
        self.entry_path(namespace, &self.fingerprinter.fingerprint(request))
    }

    /// Directory of the object entry for `key`.
    pub fn object_path(&self, namespace: &str, key: &str) -> Result<PathBuf, Error> {
        self.entry_path(namespace, &object_key(key))
    }

    fn namespace_dir(&self, namespace: &str) -> Result<PathBuf, Error> {
        let valid = !namespace.is_empty()
            && namespace != "."
            && namespace != ".."
            && !namespace.contains(['/', '\\', '\0']);
        if !valid {
            return Err(Error::InvalidInput(format!("invalid cache namespace: {namespace:?}")));
        }
        Ok(self.root.join(namespace))
    }

    /// Delete the entry at `entry_dir`.
    ///
    /// With `remove_parents`, the entries named in its `parents` are deleted
    /// first, without following their own parents. Returns the number of
    /// entries deleted; a missing entry is a no-op.
    pub fn remove_cache_entry(&self, entry_dir: &Path, remove_parents: bool) -> Result<usize, Error> {
        let Some(meta) = read_meta(entry_dir)? else {
            tracing::debug!(path = %entry_dir.display(), "no cache entry to remove");
            return Ok(0);
        };

        let mut removed = 0;
        if remove_parents && let Some(namespace_dir) = entry_dir.parent().and_then(Path::parent) {
            for parent in meta.parents() {
                if !is_cache_key(parent) {
                    tracing::warn!(path = %entry_dir.display(), parent, "skipping malformed parent fingerprint");
                    continue;
                }
                removed += self.remove_cache_entry(&namespace_dir.join(&parent[..2]).join(parent), false)?;
            }
        }

        match std::fs::remove_dir_all(entry_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io(entry_dir, e)),
        }
        tracing::debug!(path = %entry_dir.display(), "removed cache entry");

        Ok(removed + 1)
    }
}

impl CacheStorage for FilesystemStorage {
    fn retrieve_object(&self, namespace: &str, key: &str) -> Result<Option<Value>, Error> {
        let path = self.object_path(namespace, key)?;
        let Some(meta) = read_meta(&path)? else {
            return Ok(None);
        };
        if meta.kind != EntryKind::Object {
            return Ok(None);
        }
        let Some(data) = read_optional(&path.join(OBJECT_FILE))? else {
            return Ok(None);
        };
        match serde_json::from_slice(&data) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::debug!(namespace, key, error = %e, "ignoring unreadable cached object");
                Ok(None)
            }
        }
    }

    fn store_object(&self, namespace: &str, key: &str, value: &Value) -> Result<(), Error> {
        let path = self.object_path(namespace, key)?;
        std::fs::create_dir_all(&path).map_err(|e| Error::io(&path, e))?;
        write_file(&path.join(OBJECT_FILE), &serde_json::to_vec(value)?)?;
        write_meta(&path, &EntryMeta::object(Utc::now()))
    }

    fn retrieve_response(&self, namespace: &str, request: &CrawlRequest) -> Result<Option<CachedResponse>, Error> {
        let path = self.request_path(namespace, request)?;
        let Some(meta) = read_meta(&path)? else {
            tracing::debug!(namespace, url = %request.url, "response not in cache");
            return Ok(None);
        };
        let EntryKind::Response { status, .. } = meta.kind else {
            return Ok(None);
        };
        if self.policy.is_ignored(status) {
            tracing::debug!(namespace, url = %request.url, status, "response not cached");
            return Ok(None);
        }

        let (Some(head), Some(body)) =
            (read_optional(&path.join(RESPONSE_HEAD_FILE))?, read_optional(&path.join(RESPONSE_BODY_FILE))?)
        else {
            tracing::debug!(namespace, url = %request.url, "cached response is incomplete");
            return Ok(None);
        };
        let mut response: CachedResponse = match serde_json::from_slice(&head) {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(namespace, url = %request.url, error = %e, "ignoring unreadable cached response");
                return Ok(None);
            }
        };
        if response.status != status {
            tracing::debug!(
                namespace,
                url = %request.url,
                status,
                head_status = response.status,
                "cached response does not match its metadata"
            );
            return Ok(None);
        }
        response.body = body;

        tracing::debug!(namespace, url = %request.url, status, "retrieved response from cache");
        Ok(Some(response))
    }

    fn store_response(&self, namespace: &str, request: &CrawlRequest, response: &CachedResponse) -> Result<(), Error> {
        let key = self.fingerprinter.fingerprint(request);
        let path = self.entry_path(namespace, &key)?;
        let old_meta = read_meta(&path)?;

        if old_meta.is_some() {
            remove_meta(&path)?;
        }
        std::fs::create_dir_all(&path).map_err(|e| Error::io(&path, e))?;
        write_file(&path.join(REQUEST_HEADERS_FILE), &serde_json::to_vec(&request.headers)?)?;
        write_file(&path.join(RESPONSE_HEAD_FILE), &serde_json::to_vec(response)?)?;
        write_file(&path.join(RESPONSE_BODY_FILE), &response.body)?;

        let mut parents = ancestors(&key, &request.meta.fingerprints);
        if let Some(old) = &old_meta {
            parents.extend(old.parents().filter(|p| *p != key).map(str::to_owned));
        }

        let meta = EntryMeta {
            timestamp: Utc::now(),
            cache_expires: request.meta.cache_expires.map(|d| d.as_secs() + u64::from(d.subsec_nanos() > 0)),
            kind: EntryKind::Response {
                method: request.method.to_ascii_uppercase(),
                url: request.url.to_string(),
                status: response.status,
                parents,
            },
        };
        write_meta(&path, &meta)?;

        tracing::debug!(namespace, fingerprint = %key, url = %request.url, status = response.status, "stored response");
        Ok(())
    }

    fn remove_response(&self, namespace: &str, request: &CrawlRequest) -> Result<usize, Error> {
        let path = self.request_path(namespace, request)?;
        let removed = self.remove_cache_entry(&path, true)?;
        tracing::debug!(namespace, url = %request.url, removed, "purged response and its parents");
        Ok(removed)
    }

    fn cleanup(&self) -> Result<CleanupReport, Error> {
        self.cleanup_at(Utc::now())
    }
}

/// Ancestors recorded for an entry keyed `own`: the provenance chain without
/// its trailing element when that is the entry's own fingerprint, and never
/// the entry itself.
fn ancestors(own: &str, chain: &[String]) -> BTreeSet<String> {
    let chain = match chain.split_last() {
        Some((last, rest)) if last == own => rest,
        _ => chain,
    };
    chain.iter().filter(|fp| *fp != own).cloned().collect()
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, Error> {
    match std::fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(path, e)),
    }
}

fn write_file(path: &Path, data: &[u8]) -> Result<(), Error> {
    std::fs::write(path, data).map_err(|e| Error::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::meta::META_FILE;
    use chrono::TimeZone;
    use std::time::Duration;
    use url::Url;

    fn storage(root: &Path) -> FilesystemStorage {
        let policy = CachePolicy::new(Duration::from_secs(90 * 86400), 400..600);
        FilesystemStorage::new(root, policy, Fingerprinter::default())
    }

    fn request(url: &str) -> CrawlRequest {
        CrawlRequest::get(Url::parse(url).unwrap())
    }

    fn response(url: &str, status: u16, body: &str) -> CachedResponse {
        CachedResponse {
            url: url.into(),
            status,
            headers: vec![("Content-Type".into(), "text/html".into())],
            body: body.as_bytes().to_vec(),
        }
    }

    fn stored_parents(storage: &FilesystemStorage, request: &CrawlRequest) -> Vec<String> {
        let meta = read_meta(&storage.request_path("ns", request).unwrap()).unwrap().unwrap();
        meta.parents().map(str::to_owned).collect()
    }

    #[test]
    fn test_store_and_retrieve_response() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let req = request("https://example.com/article/1");
        let resp = response("https://example.com/article/1", 200, "<html>hello</html>");

        storage.store_response("ns", &req, &resp).unwrap();

        assert_eq!(storage.retrieve_response("ns", &req).unwrap(), Some(resp));
    }

    #[test]
    fn test_layout_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let req = request("https://example.com/");
        storage.store_response("ns", &req, &response("https://example.com/", 200, "x")).unwrap();

        let fp = storage.fingerprinter().fingerprint(&req);
        let entry = dir.path().join("ns").join(&fp[..2]).join(&fp);
        assert_eq!(storage.request_path("ns", &req).unwrap(), entry);
        for file in [META_FILE, "meta", RESPONSE_HEAD_FILE, RESPONSE_BODY_FILE, REQUEST_HEADERS_FILE] {
            assert!(entry.join(file).is_file(), "missing {file}");
        }
    }

    #[test]
    fn test_missing_response_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        assert_eq!(storage.retrieve_response("ns", &request("https://example.com/")).unwrap(), None);
    }

    #[test]
    fn test_disallowed_status_hidden_but_kept() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let req = request("https://example.com/gone");

        storage.store_response("ns", &req, &response("https://example.com/gone", 404, "nope")).unwrap();

        assert_eq!(storage.retrieve_response("ns", &req).unwrap(), None);
        let meta = read_meta(&storage.request_path("ns", &req).unwrap()).unwrap().unwrap();
        assert_eq!(meta.status(), Some(404));
    }

    #[test]
    fn test_policy_change_applies_to_stored_entries() {
        let dir = tempfile::tempdir().unwrap();
        let req = request("https://example.com/flaky");
        storage(dir.path())
            .store_response("ns", &req, &response("https://example.com/flaky", 503, "later"))
            .unwrap();

        let policy = CachePolicy::new(Duration::from_secs(86400), [404]);
        let lenient = FilesystemStorage::new(dir.path(), policy, Fingerprinter::default());
        let restored = lenient.retrieve_response("ns", &req).unwrap().unwrap();
        assert_eq!(restored.status, 503);
    }

    #[test]
    fn test_incomplete_response_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let req = request("https://example.com/partial");
        storage.store_response("ns", &req, &response("https://example.com/partial", 200, "x")).unwrap();

        let path = storage.request_path("ns", &req).unwrap();
        std::fs::remove_file(path.join(RESPONSE_BODY_FILE)).unwrap();
        assert_eq!(storage.retrieve_response("ns", &req).unwrap(), None);

        std::fs::remove_file(path.join(META_FILE)).unwrap();
        assert_eq!(storage.retrieve_response("ns", &req).unwrap(), None);
    }

    #[test]
    fn test_parents_are_merged_across_writes() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let resp = response("https://example.com/k", 200, "k");

        let mut first = request("https://example.com/k");
        first.meta.fingerprints = vec!["aa".into(), "bb".into()];
        storage.store_response("ns", &first, &resp).unwrap();

        let mut second = request("https://example.com/k");
        second.meta.fingerprints = vec!["bb".into(), "cc".into()];
        storage.store_response("ns", &second, &resp).unwrap();

        assert_eq!(stored_parents(&storage, &second), vec!["aa", "bb", "cc"]);
    }

    #[test]
    fn test_own_fingerprint_never_recorded_as_parent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let mut req = request("https://example.com/self");
        let own = storage.fingerprinter().fingerprint(&req);
        req.meta.fingerprints = vec!["aa".into(), own.clone(), "bb".into(), own];

        storage.store_response("ns", &req, &response("https://example.com/self", 200, "")).unwrap();

        assert_eq!(stored_parents(&storage, &req), vec!["aa", "bb"]);
    }

    #[test]
    fn test_cache_expires_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let req = request("https://example.com/hourly").with_cache_expires(Duration::from_secs(3600));

        storage.store_response("ns", &req, &response("https://example.com/hourly", 200, "")).unwrap();

        let meta = read_meta(&storage.request_path("ns", &req).unwrap()).unwrap().unwrap();
        assert_eq!(meta.cache_expires, Some(3600));
    }

    #[test]
    fn test_sub_second_expiry_rounds_up() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let cases = [("https://example.com/a", 1500, 2), ("https://example.com/b", 200, 1), ("https://example.com/c", 2000, 2)];

        for (url, millis, secs) in cases {
            let req = request(url).with_cache_expires(Duration::from_millis(millis));
            storage.store_response("ns", &req, &response(url, 200, "")).unwrap();
            let meta = read_meta(&storage.request_path("ns", &req).unwrap()).unwrap().unwrap();
            assert_eq!(meta.cache_expires, Some(secs), "{millis}ms");
        }
    }

    #[test]
    fn test_payload_mismatching_metadata_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let req = request("https://example.com/moved");
        storage.store_response("ns", &req, &response("https://example.com/moved", 200, "here")).unwrap();

        // Interrupted overwrite: new payload, old metadata.
        let path = storage.request_path("ns", &req).unwrap();
        let gone = response("https://example.com/moved", 404, "gone");
        write_file(&path.join(RESPONSE_HEAD_FILE), &serde_json::to_vec(&gone).unwrap()).unwrap();
        write_file(&path.join(RESPONSE_BODY_FILE), &gone.body).unwrap();

        assert_eq!(read_meta(&path).unwrap().unwrap().status(), Some(200));
        assert_eq!(storage.retrieve_response("ns", &req).unwrap(), None);
    }

    #[test]
    fn test_overwrite_hides_entry_until_metadata_written() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let req = request("https://example.com/again");
        let resp = response("https://example.com/again", 200, "v1");
        storage.store_response("ns", &req, &resp).unwrap();
        let path = storage.request_path("ns", &req).unwrap();

        // Block the payload write: the old metadata must already be gone.
        std::fs::remove_file(path.join(RESPONSE_BODY_FILE)).unwrap();
        std::fs::create_dir(path.join(RESPONSE_BODY_FILE)).unwrap();
        assert!(storage.store_response("ns", &req, &response("https://example.com/again", 404, "v2")).is_err());

        assert!(!path.join(META_FILE).exists());
        assert_eq!(storage.retrieve_response("ns", &req).unwrap(), None);
    }

    #[test]
    fn test_restore_resets_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let req = request("https://example.com/again");
        let resp = response("https://example.com/again", 200, "");
        storage.store_response("ns", &req, &resp).unwrap();

        let path = storage.request_path("ns", &req).unwrap();
        let mut meta = read_meta(&path).unwrap().unwrap();
        meta.timestamp = Utc.timestamp_opt(1_000, 0).unwrap();
        write_meta(&path, &meta).unwrap();

        storage.store_response("ns", &req, &resp).unwrap();
        let meta = read_meta(&path).unwrap().unwrap();
        assert!(meta.timestamp > Utc.timestamp_opt(1_000, 0).unwrap());
    }

    #[test]
    fn test_objects_are_namespaced() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());

        storage.store_object("ns1", "x", &Value::from("v1")).unwrap();
        storage.store_object("ns2", "x", &Value::from("v2")).unwrap();

        assert_eq!(storage.retrieve_object("ns1", "x").unwrap(), Some(Value::from("v1")));
        assert_eq!(storage.retrieve_object("ns2", "x").unwrap(), Some(Value::from("v2")));
        assert_eq!(storage.retrieve_object("ns3", "x").unwrap(), None);
    }

    #[test]
    fn test_object_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());

        storage.store_object("ns", "k", &serde_json::json!({"n": 1})).unwrap();
        storage.store_object("ns", "k", &serde_json::json!({"n": 2})).unwrap();

        assert_eq!(storage.retrieve_object("ns", "k").unwrap(), Some(serde_json::json!({"n": 2})));
        let meta = read_meta(&storage.object_path("ns", "k").unwrap()).unwrap().unwrap();
        assert_eq!(meta.kind, EntryKind::Object);
    }

    #[test]
    fn test_remove_response_cascades_one_level() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let fp = |r: &CrawlRequest| storage.fingerprinter().fingerprint(r);

        let root = request("https://example.com/");
        storage.store_response("ns", &root, &response("https://example.com/", 200, "")).unwrap();

        let mut index = request("https://example.com/index");
        index.meta.fingerprints = vec![fp(&root)];
        storage.store_response("ns", &index, &response("https://example.com/index", 200, "")).unwrap();

        let mut article = request("https://example.com/article");
        article.meta.fingerprints = vec![fp(&index)];
        storage.store_response("ns", &article, &response("https://example.com/article", 200, "")).unwrap();

        assert_eq!(storage.remove_response("ns", &article).unwrap(), 2);
        assert_eq!(storage.retrieve_response("ns", &article).unwrap(), None);
        assert_eq!(storage.retrieve_response("ns", &index).unwrap(), None);
        assert!(storage.retrieve_response("ns", &root).unwrap().is_some());
    }

    #[test]
    fn test_remove_missing_entry_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        assert_eq!(storage.remove_response("ns", &request("https://example.com/none")).unwrap(), 0);
    }

    #[test]
    fn test_invalid_namespace_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        for ns in ["", "..", "a/b", "a\\b"] {
            assert!(matches!(storage.store_object(ns, "k", &Value::Null), Err(Error::InvalidInput(_))), "{ns:?}");
        }
    }

    #[test]
    fn test_ancestors() {
        let chain = vec!["aa".to_string(), "bb".to_string(), "own".to_string()];
        assert_eq!(ancestors("own", &chain).into_iter().collect::<Vec<_>>(), vec!["aa", "bb"]);
        assert_eq!(ancestors("zz", &chain).len(), 3);
        assert!(ancestors("own", &[]).is_empty());
    }
}
