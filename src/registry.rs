//! Cache Registry Module
//!
//! Owns the lifecycle of store instances. Dedicated configurations get a new
//! store on every resolution; shared configurations get one of two lazily
//! created singletons, one per store kind. The registry is an ordinary value:
//! the gateway keeps one for the lifetime of the process and hands it to
//! whatever builds backend clients, tests build their own.

use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::cache::lock::mutex_lock;
use crate::cache::{LruStore, MemoryStore, StoreHandle};
use crate::config::CacheConfig;
use crate::error::Result;

const SOURCE: &str = "registry";

// == Cache Registry ==
#[derive(Debug, Default)]
pub struct CacheRegistry {
    shared_memory: Mutex<Option<Arc<MemoryStore>>>,
    shared_lru: Mutex<Option<Arc<LruStore>>>,
}

impl CacheRegistry {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Resolve ==
    /// Resolves a configuration into a store.
    ///
    /// A configuration with either bound at zero selects the unbounded
    /// store. The shared bounded store keeps the bounds of the first
    /// configuration that created it; later shared configurations with other
    /// bounds get that same store and a warning.
    ///
    /// # Errors
    /// Propagates bounded store construction failures.
    pub fn resolve(&self, config: &CacheConfig) -> Result<StoreHandle> {
        if !config.is_bounded() {
            if !config.shared {
                return Ok(StoreHandle::memory());
            }
            return Ok(self.shared_memory());
        }

        if !config.shared {
            let store = LruStore::new(config.max_items, config.max_size)?;
            return Ok(StoreHandle::Lru(Arc::new(store)));
        }

        let mut shared = mutex_lock(&self.shared_lru, SOURCE, "resolve_shared_lru");
        if let Some(store) = shared.as_ref() {
            if store.max_items() != config.max_items || store.max_size() != config.max_size {
                warn!(
                    requested_max_items = config.max_items,
                    requested_max_size = config.max_size,
                    max_items = store.max_items(),
                    max_size = store.max_size(),
                    "Shared LRU cache already exists, ignoring requested bounds"
                );
            }
            return Ok(StoreHandle::Lru(Arc::clone(store)));
        }

        let store = Arc::new(LruStore::new(config.max_items, config.max_size)?);
        debug!(
            max_items = config.max_items,
            max_size = config.max_size,
            "Created shared LRU cache"
        );
        *shared = Some(Arc::clone(&store));
        Ok(StoreHandle::Lru(store))
    }

    /// Resolves the cache options of a backend's extra configuration.
    ///
    /// # Returns
    /// - `None` when the backend has no cache options (caching disabled)
    /// - a dedicated unbounded store when the options cannot be decoded or
    ///   resolved, so a configuration mistake never fails requests
    /// - the resolved store otherwise
    pub fn resolve_extra_config(&self, extra_config: &Map<String, Value>) -> Option<StoreHandle> {
        let decoded = CacheConfig::from_extra_config(extra_config)?;

        let handle = decoded
            .and_then(|config| self.resolve(&config))
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to a dedicated in-memory cache");
                StoreHandle::memory()
            });
        Some(handle)
    }

    /// Returns the shared unbounded store, creating it on first use.
    pub fn shared_memory(&self) -> StoreHandle {
        let mut shared = mutex_lock(&self.shared_memory, SOURCE, "shared_memory");
        let store = shared.get_or_insert_with(|| {
            debug!("Created shared in-memory cache");
            Arc::new(MemoryStore::new())
        });
        StoreHandle::Memory(Arc::clone(store))
    }

    // == Reset ==
    /// Forgets both shared singletons.
    ///
    /// Handles resolved earlier keep their store alive; later shared
    /// resolutions create fresh singletons.
    pub fn reset(&self) {
        *mutex_lock(&self.shared_memory, SOURCE, "reset") = None;
        *mutex_lock(&self.shared_lru, SOURCE, "reset") = None;
    }
}
