//! Cache Module
//!
//! Response storage: the [`Cache`] capability, its unbounded and LRU
//! implementations, and the entry codec.

mod entry;
mod handle;
pub(crate) mod lock;
mod lru;
mod memory;
mod stats;
mod store;


use bytes::Bytes;

// Re-export public types
pub use entry::{vary_names, CacheEntry, STORED_AT_FIELD, VARIED_PREFIX};
pub use handle::StoreHandle;
pub use lru::LruList;
pub use memory::MemoryStore;
pub use stats::CacheStats;
pub use store::LruStore;

// == Cache Trait ==
/// Key to bytes storage shared by every store kind.
///
/// Absence is reported as `None`, never as an error. Implementations are
/// safe to call from many threads at once.
pub trait Cache: Send + Sync {
    /// Returns the bytes stored under `key`.
    fn get(&self, key: &str) -> Option<Bytes>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: Bytes);

    /// Removes the value stored under `key`, if any.
    fn delete(&self, key: &str);

    /// Snapshot of the store's counters.
    fn stats(&self) -> CacheStats;
}
