//! Expiry and status policy applied on reads and during cleanup.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::meta::{EntryKind, EntryMeta};
use crate::config::{CacheConfig, ConfigError};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Global lifetime plus the set of status codes that must not be served
/// from cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    expiration: Duration,
    ignore_http_codes: BTreeSet<u16>,
}

/// Outcome of evaluating one entry during cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Fresh,
    /// Older than its effective expiry; remove it alone.
    Expired,
    /// Response with an ignored status; remove it together with its parents.
    Disallowed,
}

impl CachePolicy {
    pub fn new(expiration: Duration, ignore_http_codes: impl IntoIterator<Item = u16>) -> Self {
        Self { expiration, ignore_http_codes: ignore_http_codes.into_iter().collect() }
    }

    /// Build the policy from configuration, rejecting invalid values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` when the cache section does not validate.
    pub fn from_config(config: &CacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let days = u64::try_from(config.expires_days).map_err(|_| ConfigError::Invalid {
            field: "cache.expires_days".into(),
            reason: "must not be negative".into(),
        })?;
        let expiration = Duration::from_secs(days.saturating_mul(SECONDS_PER_DAY));
        Ok(Self::new(expiration, config.ignore_http_codes.iter().copied()))
    }

    /// Global default lifetime.
    pub fn expiration(&self) -> Duration {
        self.expiration
    }

    /// Whether responses with `status` are hidden from reads.
    pub fn is_ignored(&self, status: u16) -> bool {
        self.ignore_http_codes.contains(&status)
    }

    /// Lifetime actually applied to `meta`: the override caps the global
    /// default but never extends it.
    pub fn effective_expiry(&self, meta: &EntryMeta) -> Duration {
        match meta.cache_expires {
            Some(secs) => Duration::from_secs(secs).min(self.expiration),
            None => self.expiration,
        }
    }

    pub fn is_expired(&self, meta: &EntryMeta, now: DateTime<Utc>) -> bool {
        let expiry = chrono::Duration::from_std(self.effective_expiry(meta)).unwrap_or(chrono::Duration::MAX);
        match meta.timestamp.checked_add_signed(expiry) {
            Some(threshold) => now > threshold,
            None => false,
        }
    }

    /// Age is checked first; the status rule only applies to entries that
    /// are still fresh.
    pub fn verdict(&self, meta: &EntryMeta, now: DateTime<Utc>) -> Verdict {
        if self.is_expired(meta, now) {
            return Verdict::Expired;
        }
        match meta.kind {
            EntryKind::Response { status, .. } if self.is_ignored(status) => Verdict::Disallowed,
            _ => Verdict::Fresh,
        }
    }
}
