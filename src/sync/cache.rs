//! In-memory blob cache bookkeeping.
//!
//! Tracks, per relative path, the hash of the content last sent and the
//! hash the compile service confirmed holding for that path. Lives for the
//! process lifetime only: a fresh agent starts empty, so its first sync
//! sends every binary asset in full.

use rustc_hash::{FxHashMap, FxHashSet};

use super::ContentHash;

/// Hash state for one tracked path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileHashRecord {
    /// Hash of the content most recently sent inline.
    pub local: Option<ContentHash>,
    /// Service-side blob id confirmed for that content.
    pub server: Option<String>,
}

#[derive(Debug, Default)]
pub struct HashCache {
    records: FxHashMap<String, FileHashRecord>,
}

impl HashCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `hash` was sent inline for `path`.
    ///
    /// A confirmation obtained for different content is discarded, so a
    /// reference is never emitted for bytes the service has not seen.
    pub fn record_local(&mut self, path: &str, hash: ContentHash) {
        let record = self.records.entry(path.to_string()).or_default();
        if record.local != Some(hash) {
            record.server = None;
        }
        record.local = Some(hash);
    }

    /// Record the service's blob id for the content last sent for `path`.
    ///
    /// Ignored for paths that were never sent: there is no local content
    /// the confirmation could belong to.
    pub fn record_server_confirmation(&mut self, path: &str, server_hash: &str) {
        match self.records.get_mut(path) {
            Some(record) if record.local.is_some() => {
                record.server = Some(server_hash.to_string());
            }
            _ => crate::debug!("cache"; "ignoring confirmation for unsent path {}", path),
        }
    }

    /// The confirmed blob id, if `hash` is exactly what was last sent.
    pub fn cached_reference(&self, path: &str, hash: ContentHash) -> Option<&str> {
        let record = self.records.get(path)?;
        if record.local == Some(hash) {
            record.server.as_deref()
        } else {
            None
        }
    }

    pub fn is_unchanged_and_cacheable(&self, path: &str, hash: ContentHash) -> bool {
        self.cached_reference(path, hash).is_some()
    }

    /// Drop records for paths no longer in the project.
    pub fn retain_paths(&mut self, live: &FxHashSet<&str>) {
        self.records.retain(|path, _| live.contains(path.as_str()));
    }

    pub fn get(&self, path: &str) -> Option<&FileHashRecord> {
        self.records.get(path)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
