//! Content-addressed cache for HTTP responses and arbitrary objects.
//!
//! - Responses are keyed by a request fingerprint and remember the
//!   fingerprints of the requests that led to them
//! - Objects are keyed by a hash of the caller's key
//! - Entries expire by age (global default, optionally capped per entry) and
//!   responses whose status is ignored are removed together with their parents
//!
//! [`Cache`] picks the persistent or in-memory backend from configuration.

mod cleanup;
pub mod facade;
pub mod filesystem;
pub mod hash;
pub mod memory;
pub mod meta;
pub mod policy;
pub mod provenance;
pub mod storage;

pub use crate::Error;

pub use facade::{Cache, CacheBackend};
pub use filesystem::FilesystemStorage;
pub use hash::{Fingerprinter, object_key};
pub use memory::MemoryStorage;
pub use meta::{EntryKind, EntryMeta};
pub use policy::{CachePolicy, Verdict};
pub use provenance::Provenance;
pub use storage::{CacheStorage, CleanupReport};
