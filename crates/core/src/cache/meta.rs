//! Metadata record stored next to every cache entry.
//!
//! Each entry directory holds two copies of its metadata: `meta.json`, which
//! is authoritative, and `meta`, a pretty-printed copy for humans poking
//! around the cache directory. An entry without a readable `meta.json` is
//! absent.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Machine-readable metadata file name.
pub const META_FILE: &str = "meta.json";

/// Human-readable metadata file name.
pub const META_DEBUG_FILE: &str = "meta";

/// Metadata of a single cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMeta {
    /// Time of the last write to this entry.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,

    /// Per-entry lifetime in seconds, replacing the global default when shorter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_expires: Option<u64>,

    pub kind: EntryKind,
}

/// What an entry holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryKind {
    /// A stored HTTP response.
    Response {
        method: String,
        url: String,
        status: u16,
        /// Fingerprints of the requests that had to be made to arrive here.
        #[serde(default)]
        parents: BTreeSet<String>,
    },
    /// An arbitrary serialized value.
    Object,
}

impl EntryMeta {
    pub fn object(timestamp: DateTime<Utc>) -> Self {
        Self { timestamp, cache_expires: None, kind: EntryKind::Object }
    }

    /// Status code of a response entry.
    pub fn status(&self) -> Option<u16> {
        match &self.kind {
            EntryKind::Response { status, .. } => Some(*status),
            EntryKind::Object => None,
        }
    }

    /// Recorded ancestors of a response entry; empty for objects.
    pub fn parents(&self) -> impl Iterator<Item = &str> {
        let parents = match &self.kind {
            EntryKind::Response { parents, .. } => Some(parents),
            EntryKind::Object => None,
        };
        parents.into_iter().flatten().map(String::as_str)
    }
}

/// Read the metadata of the entry at `entry_dir`.
///
/// Returns `Ok(None)` when the entry does not exist or its metadata cannot be
/// decoded (a partially written entry); other I/O errors propagate.
pub fn read_meta(entry_dir: &Path) -> Result<Option<EntryMeta>, Error> {
    let path = entry_dir.join(META_FILE);
    let data = match std::fs::read(&path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::io(&path, e)),
    };

    match serde_json::from_slice(&data) {
        Ok(meta) => Ok(Some(meta)),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "ignoring unreadable cache metadata");
            Ok(None)
        }
    }
}

/// Write both metadata files into `entry_dir`, which must exist.
///
/// `meta.json` is replaced through a rename so readers never observe a
/// truncated record.
pub fn write_meta(entry_dir: &Path, meta: &EntryMeta) -> Result<(), Error> {
    let debug_path = entry_dir.join(META_DEBUG_FILE);
    std::fs::write(&debug_path, format!("{meta:#?}\n")).map_err(|e| Error::io(&debug_path, e))?;

    let data = serde_json::to_vec(meta)?;
    let tmp_path = entry_dir.join(format!("{META_FILE}.tmp"));
    let path = entry_dir.join(META_FILE);
    std::fs::write(&tmp_path, data).map_err(|e| Error::io(&tmp_path, e))?;
    std::fs::rename(&tmp_path, &path).map_err(|e| Error::io(&path, e))
}

/// Remove the authoritative metadata of `entry_dir`, marking the entry
/// absent while its payload files are rewritten. Missing metadata is fine.
pub fn remove_meta(entry_dir: &Path) -> Result<(), Error> {
    let path = entry_dir.join(META_FILE);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(&path, e)),
    }
}
