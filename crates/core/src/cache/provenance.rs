//! Request chaining: which cached requests had to succeed before this one
//! could be made.

use super::hash::Fingerprinter;
use crate::request::CrawlRequest;

/// Attaches ancestor fingerprints to requests as they are scheduled and
/// dispatched.
///
/// Must use the same [`Fingerprinter`] as the storage backend, otherwise the
/// recorded parents name entries that do not exist.
#[derive(Debug, Clone, Default)]
pub struct Provenance {
    fingerprinter: Fingerprinter,
}

impl Provenance {
    pub fn new(fingerprinter: Fingerprinter) -> Self {
        Self { fingerprinter }
    }

    pub fn fingerprinter(&self) -> &Fingerprinter {
        &self.fingerprinter
    }

    /// Called right before `request` is dispatched.
    ///
    /// Appends the request's own fingerprint to its chain, unless the request
    /// opted out of caching. Idempotent.
    pub fn on_dispatch(&self, request: &mut CrawlRequest) {
        if request.meta.dont_cache {
            return;
        }
        let own = self.fingerprinter.fingerprint(request);
        if request.meta.fingerprints.last() != Some(&own) {
            tracing::debug!(
                url = %request.url,
                fingerprint = %own,
                depth = request.meta.fingerprints.len(),
                "extending provenance chain"
            );
            request.meta.fingerprints.push(own);
        }
    }

    /// Schedule `child` as a consequence of `parent`'s response.
    ///
    /// The child inherits a copy of the parent's chain. An uncached parent
    /// does not appear in it, but its own ancestors still do.
    pub fn follow(&self, parent: &CrawlRequest, mut child: CrawlRequest) -> CrawlRequest {
        let mut chain = parent.meta.fingerprints.clone();
        if !parent.meta.dont_cache {
            let own = self.fingerprinter.fingerprint(parent);
            if chain.last() != Some(&own) {
                chain.push(own);
            }
        }
        child.meta.fingerprints = chain;
        child
    }
}
