//! Unbounded Store Module
//!
//! Plain key/value map without eviction. Grows for as long as the process
//! keeps storing distinct keys.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use bytes::Bytes;

use crate::cache::lock::{rw_read, rw_write};
use crate::cache::{Cache, CacheStats};

const SOURCE: &str = "cache::memory";

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, Bytes>,
    bytes: u64,
}

// == Memory Store ==
/// Thread-safe unbounded store.
///
/// Lookups only take the read lock; counters are atomics so hits do not
/// serialize readers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<Entries>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryStore {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cache for MemoryStore {
    fn get(&self, key: &str) -> Option<Bytes> {
        let value = rw_read(&self.entries, SOURCE, "get").map.get(key).cloned();
        match value {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        value
    }

    fn set(&self, key: &str, value: Bytes) {
        let mut entries = rw_write(&self.entries, SOURCE, "set");
        let added = value.len() as u64;
        if let Some(old) = entries.map.insert(key.to_string(), value) {
            entries.bytes -= old.len() as u64;
        }
        entries.bytes += added;
    }

    fn delete(&self, key: &str) {
        let mut entries = rw_write(&self.entries, SOURCE, "delete");
        if let Some(old) = entries.map.remove(key) {
            entries.bytes -= old.len() as u64;
        }
    }

    fn stats(&self) -> CacheStats {
        let entries = rw_read(&self.entries, SOURCE, "stats");
        let mut stats = CacheStats::new();
        stats.hits = self.hits.load(Ordering::Relaxed);
        stats.misses = self.misses.load(Ordering::Relaxed);
        stats.set_occupancy(entries.map.len(), entries.bytes);
        stats
    }
}
