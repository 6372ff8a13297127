//! Batch expiry of the persistent store.
//!
//! Run once after a crawl has finished. Every entry is evaluated exactly
//! once: entries past their effective expiry are removed on their own,
//! fresh responses with an ignored status are removed together with their
//! parents. Directories left empty are pruned once a namespace is done.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use super::filesystem::FilesystemStorage;
use super::meta::read_meta;
use super::policy::Verdict;
use super::storage::CleanupReport;
use crate::Error;

impl FilesystemStorage {
    /// Walk the whole store as of `now`.
    ///
    /// An entry that cannot be read or removed is logged and counted in
    /// `skipped`; the walk carries on with the rest of the store.
    pub fn cleanup_at(&self, now: DateTime<Utc>) -> Result<CleanupReport, Error> {
        let mut report = CleanupReport::default();
        tracing::info!(root = %self.root().display(), "cleaning cache entries");

        let namespaces = match list_dirs(self.root()) {
            Ok(dirs) => dirs,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(root = %self.root().display(), "cache directory does not exist");
                return Ok(report);
            }
            Err(e) => return Err(Error::io(self.root(), e)),
        };

        for namespace_dir in namespaces {
            self.clean_namespace(&namespace_dir, now, &mut report);
            prune(&namespace_dir, &mut report);
        }

        tracing::info!(
            visited = report.visited,
            expired = report.expired,
            disallowed = report.disallowed,
            cascaded = report.cascaded,
            skipped = report.skipped,
            pruned_dirs = report.pruned_dirs,
            "finished cleaning cache entries"
        );
        Ok(report)
    }

    fn clean_namespace(&self, namespace_dir: &Path, now: DateTime<Utc>, report: &mut CleanupReport) {
        let shards = match list_dirs(namespace_dir) {
            Ok(dirs) => dirs,
            Err(e) => {
                tracing::warn!(path = %namespace_dir.display(), error = %e, "cannot list cache namespace");
                return;
            }
        };

        for shard_dir in &shards {
            let entries = match list_dirs(shard_dir) {
                Ok(dirs) => dirs,
                Err(e) => {
                    tracing::warn!(path = %shard_dir.display(), error = %e, "cannot list cache shard");
                    continue;
                }
            };
            for entry_dir in entries {
                if let Err(e) = self.clean_entry(&entry_dir, now, report) {
                    tracing::warn!(path = %entry_dir.display(), error = %e, "skipping cache entry");
                    report.skipped += 1;
                }
            }
        }

        // A cascade can empty a shard the walk has already left.
        for shard_dir in &shards {
            prune(shard_dir, report);
        }
    }

    fn clean_entry(&self, entry_dir: &Path, now: DateTime<Utc>, report: &mut CleanupReport) -> Result<(), Error> {
        let Some(meta) = read_meta(entry_dir)? else {
            // Already removed as someone's parent, or never completely written.
            if entry_dir.exists() {
                tracing::debug!(path = %entry_dir.display(), "cache entry has no metadata");
                report.skipped += 1;
                prune(entry_dir, report);
            }
            return Ok(());
        };
        report.visited += 1;

        match self.policy().verdict(&meta, now) {
            Verdict::Fresh => {}
            Verdict::Expired => {
                self.remove_cache_entry(entry_dir, false)?;
                report.expired += 1;
            }
            Verdict::Disallowed => {
                let removed = self.remove_cache_entry(entry_dir, true)?;
                report.disallowed += 1;
                report.cascaded += removed.saturating_sub(1);
            }
        }
        Ok(())
    }
}

/// Subdirectories of `dir`, sorted for a stable walk order.
fn list_dirs(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Remove `dir` if it is empty; anything else is left alone.
fn prune(dir: &Path, report: &mut CleanupReport) {
    if std::fs::remove_dir(dir).is_ok() {
        tracing::debug!(path = %dir.display(), "pruned empty cache directory");
        report.pruned_dirs += 1;
    }
}
