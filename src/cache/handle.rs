//! Store Handle Module
//!
//! The closed set of store kinds a configuration can resolve to.

use std::sync::Arc;

use bytes::Bytes;

use crate::cache::{Cache, CacheStats, LruStore, MemoryStore};

// == Store Handle ==
/// Resolved store for one backend configuration.
///
/// Cloning is cheap and yields a handle to the same underlying store.
#[derive(Debug, Clone)]
pub enum StoreHandle {
    /// Unbounded map
    Memory(Arc<MemoryStore>),
    /// Size/item-bounded LRU
    Lru(Arc<LruStore>),
}

impl StoreHandle {
    /// Wraps a fresh unbounded store.
    pub fn memory() -> Self {
        StoreHandle::Memory(Arc::new(MemoryStore::new()))
    }

    /// True if both handles point at the same store instance.
    pub fn same_store(&self, other: &StoreHandle) -> bool {
        match (self, other) {
            (StoreHandle::Memory(a), StoreHandle::Memory(b)) => Arc::ptr_eq(a, b),
            (StoreHandle::Lru(a), StoreHandle::Lru(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn is_bounded(&self) -> bool {
        matches!(self, StoreHandle::Lru(_))
    }

    fn as_cache(&self) -> &dyn Cache {
        match self {
            StoreHandle::Memory(store) => store.as_ref(),
            StoreHandle::Lru(store) => store.as_ref(),
        }
    }
}

impl From<MemoryStore> for StoreHandle {
    fn from(store: MemoryStore) -> Self {
        StoreHandle::Memory(Arc::new(store))
    }
}

impl From<LruStore> for StoreHandle {
    fn from(store: LruStore) -> Self {
        StoreHandle::Lru(Arc::new(store))
    }
}

impl Cache for StoreHandle {
    fn get(&self, key: &str) -> Option<Bytes> {
        self.as_cache().get(key)
    }

    fn set(&self, key: &str, value: Bytes) {
        self.as_cache().set(key, value)
    }

    fn delete(&self, key: &str) {
        self.as_cache().delete(key)
    }

    fn stats(&self) -> CacheStats {
        self.as_cache().stats()
    }
}
