//! Bounded Store Module
//!
//! LRU store limited by item count and/or cumulative value size. Every
//! operation, lookups included, goes through one mutex because a hit
//! promotes the entry and is therefore a mutation.

use std::collections::HashMap;
use std::sync::Mutex;

use bytes::Bytes;
use tracing::debug;

use crate::cache::lock::mutex_lock;
use crate::cache::{Cache, CacheStats, LruList};
use crate::error::{CacheError, Result};

const SOURCE: &str = "cache::store";

// == Slot ==
#[derive(Debug)]
struct Slot {
    key: String,
    value: Bytes,
    size: u64,
}

#[derive(Debug, Default)]
struct LruState {
    /// Key to position in `order`
    index: HashMap<String, usize>,
    /// Recency order, head = most recently used
    order: LruList<Slot>,
    /// Sum of `Slot::size` over `order`
    bytes: u64,
    stats: CacheStats,
}

impl LruState {
    fn remove(&mut self, key: &str) -> Option<Slot> {
        let idx = self.index.remove(key)?;
        let slot = self.order.remove(idx)?;
        self.bytes -= slot.size;
        Some(slot)
    }

    fn evict_oldest(&mut self) -> Option<Slot> {
        let slot = self.order.pop_back()?;
        self.index.remove(&slot.key);
        self.bytes -= slot.size;
        self.stats.record_eviction();
        Some(slot)
    }

    fn sync_occupancy(&mut self) {
        let (entries, bytes) = (self.order.len(), self.bytes);
        self.stats.set_occupancy(entries, bytes);
    }
}

// == LRU Store ==
/// Bounded store with least-recently-used eviction.
///
/// A zero bound disables that dimension. A value larger than `max_size` on
/// its own is still admitted, after every other entry has been evicted.
#[derive(Debug)]
pub struct LruStore {
    max_items: u64,
    max_size: u64,
    state: Mutex<LruState>,
}

impl LruStore {
    // == Constructor ==
    /// Creates a new bounded store.
    ///
    /// # Errors
    /// [`CacheError::InvalidBounds`] when both bounds are zero; such
    /// configurations belong to the unbounded store.
    pub fn new(max_items: u64, max_size: u64) -> Result<Self> {
        if max_items == 0 && max_size == 0 {
            return Err(CacheError::InvalidBounds);
        }

        Ok(Self {
            max_items,
            max_size,
            state: Mutex::new(LruState::default()),
        })
    }

    pub fn max_items(&self) -> u64 {
        self.max_items
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    // == Length ==
    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        mutex_lock(&self.state, SOURCE, "len").order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the current sum of stored value sizes.
    pub fn size(&self) -> u64 {
        mutex_lock(&self.state, SOURCE, "size").bytes
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> Vec<String> {
        let state = mutex_lock(&self.state, SOURCE, "keys");
        state.order.iter().map(|slot| slot.key.clone()).collect()
    }

    fn overflows(&self, state: &LruState, incoming: u64) -> bool {
        let items = state.order.len() as u64 + 1;
        (self.max_items != 0 && items > self.max_items)
            || (self.max_size != 0 && state.bytes + incoming > self.max_size)
    }
}

impl Cache for LruStore {
    fn get(&self, key: &str) -> Option<Bytes> {
        let mut state = mutex_lock(&self.state, SOURCE, "get");

        let Some(idx) = state.index.get(key).copied() else {
            state.stats.record_miss();
            return None;
        };

        state.order.touch(idx);
        state.stats.record_hit();
        state.order.get(idx).map(|slot| slot.value.clone())
    }

    fn set(&self, key: &str, value: Bytes) {
        let mut state = mutex_lock(&self.state, SOURCE, "set");
        let size = value.len() as u64;

        // Replacing counts as a fresh insert at the front.
        state.remove(key);

        while !state.order.is_empty() && self.overflows(&state, size) {
            if let Some(evicted) = state.evict_oldest() {
                debug!(
                    key = %evicted.key,
                    size = evicted.size,
                    "Evicted least recently used entry"
                );
            }
        }

        let idx = state.order.push_front(Slot {
            key: key.to_string(),
            value,
            size,
        });
        state.index.insert(key.to_string(), idx);
        state.bytes += size;
        state.sync_occupancy();
    }

    fn delete(&self, key: &str) {
        let mut state = mutex_lock(&self.state, SOURCE, "delete");
        state.remove(key);
        state.sync_occupancy();
    }

    fn stats(&self) -> CacheStats {
        let mut state = mutex_lock(&self.state, SOURCE, "stats");
        state.sync_occupancy();
        state.stats.clone()
    }
}
