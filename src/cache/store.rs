//! Layer cache storage.

use std::collections::HashMap;
use std::sync::RwLock;

use bytes::Bytes;
use metrics::{counter, gauge};
use sha2::{Digest, Sha256};

use crate::domain::ids::DesignId;

use super::keys::LayerKey;
use super::lock::{rw_read, rw_write};
use super::{METRIC_LAYER_CACHE_ENTRIES, METRIC_LAYER_CACHE_INVALIDATE};

const SOURCE: &str = "cache::store";

/// Compute the strong validator for a byte sequence: the quoted hex SHA-256.
pub fn compute_validator(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("\"{}\"", hex::encode(&digest[..]))
}

/// Cached layer image and its validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    bytes: Bytes,
    validator: String,
}

impl CacheEntry {
    /// Build an entry; the validator is a pure function of `bytes`.
    pub fn new(bytes: Bytes) -> Self {
        let validator = compute_validator(&bytes);
        Self { bytes, validator }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn validator(&self) -> &str {
        &self.validator
    }
}

/// Snapshot of the invalidation epoch taken before a read-through fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillTicket(u64);

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<LayerKey, CacheEntry>,
    // Bumped by every invalidation, whether or not an entry was present.
    epoch: u64,
}

/// Concurrency-safe `LayerKey -> CacheEntry` map.
///
/// One lock guards the whole map, so readers observe either the old or the
/// new entry of a key, never a partial one.
#[derive(Debug, Default)]
pub struct LayerCache {
    inner: RwLock<Inner>,
}

impl LayerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an entry without side effects.
    pub fn get(&self, key: &LayerKey) -> Option<CacheEntry> {
        rw_read(&self.inner, SOURCE, "get").entries.get(key).cloned()
    }

    /// Store `bytes` under `key`, replacing any previous entry, and return
    /// the stored entry.
    pub fn put(&self, key: LayerKey, bytes: Bytes) -> CacheEntry {
        let entry = CacheEntry::new(bytes);
        let len = {
            let mut inner = rw_write(&self.inner, SOURCE, "put");
            inner.entries.insert(key, entry.clone());
            inner.entries.len()
        };
        gauge!(METRIC_LAYER_CACHE_ENTRIES).set(len as f64);
        entry
    }

    /// Take a ticket before fetching a missing layer from the blob store.
    pub fn begin_fill(&self) -> FillTicket {
        FillTicket(rw_read(&self.inner, SOURCE, "begin_fill").epoch)
    }

    /// Store fetched bytes unless an invalidation happened since `ticket`
    /// was taken; the bytes may predate an overwrite or delete in that case.
    /// The entry is returned either way so the caller can answer its request.
    pub fn complete_fill(&self, ticket: FillTicket, key: LayerKey, bytes: Bytes) -> CacheEntry {
        let entry = CacheEntry::new(bytes);
        let stored_len = {
            let mut inner = rw_write(&self.inner, SOURCE, "complete_fill");
            if inner.epoch == ticket.0 {
                inner.entries.insert(key, entry.clone());
                Some(inner.entries.len())
            } else {
                None
            }
        };
        if let Some(len) = stored_len {
            gauge!(METRIC_LAYER_CACHE_ENTRIES).set(len as f64);
        }
        entry
    }

    /// Remove the entry for `key`. Absent keys are a no-op.
    pub fn invalidate(&self, key: &LayerKey) {
        let (removed, len) = {
            let mut inner = rw_write(&self.inner, SOURCE, "invalidate");
            inner.epoch = inner.epoch.wrapping_add(1);
            let removed = inner.entries.remove(key).is_some();
            (removed, inner.entries.len())
        };
        if removed {
            counter!(METRIC_LAYER_CACHE_INVALIDATE).increment(1);
            gauge!(METRIC_LAYER_CACHE_ENTRIES).set(len as f64);
        }
    }

    /// Remove every entry belonging to `design_id` and return how many were
    /// dropped.
    pub fn invalidate_all_for(&self, design_id: &DesignId) -> usize {
        let (removed, len) = {
            let mut inner = rw_write(&self.inner, SOURCE, "invalidate_all_for");
            inner.epoch = inner.epoch.wrapping_add(1);
            let before = inner.entries.len();
            inner.entries.retain(|key, _| &key.design_id != design_id);
            (before - inner.entries.len(), inner.entries.len())
        };
        if removed > 0 {
            counter!(METRIC_LAYER_CACHE_INVALIDATE).increment(removed as u64);
            gauge!(METRIC_LAYER_CACHE_ENTRIES).set(len as f64);
        }
        removed
    }

    pub fn len(&self) -> usize {
        rw_read(&self.inner, SOURCE, "len").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
