//! Configuration Module
//!
//! Decodes the per-backend cache options block. The surrounding gateway owns
//! configuration loading; this module only looks up [`NAMESPACE`] inside a
//! backend's `extra_config` map and turns the value into a [`CacheConfig`].

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{CacheError, Result};

/// Key of the cache options block inside a backend's extra configuration.
pub const NAMESPACE: &str = "github.com/devopsfaith/krakend-httpcache";

/// Cache options for one backend.
///
/// Missing fields fall back to their defaults, so `{}` selects a dedicated,
/// unbounded store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Reuse the process-wide store instead of a dedicated one
    pub shared: bool,
    /// Byte capacity of the bounded store, 0 = unbounded
    pub max_size: u64,
    /// Item capacity of the bounded store, 0 = unbounded
    pub max_items: u64,
}

impl CacheConfig {
    /// Creates a dedicated or shared unbounded configuration.
    pub fn unbounded(shared: bool) -> Self {
        Self {
            shared,
            max_size: 0,
            max_items: 0,
        }
    }

    /// Creates a bounded configuration.
    pub fn bounded(shared: bool, max_items: u64, max_size: u64) -> Self {
        Self {
            shared,
            max_size,
            max_items,
        }
    }

    /// True only when both bounds are set; a single zero bound means unbounded.
    pub fn is_bounded(&self) -> bool {
        self.max_size != 0 && self.max_items != 0
    }

    /// Decodes a raw options value.
    pub fn from_value(raw: &Value) -> Result<Self> {
        Self::deserialize(raw).map_err(|e| CacheError::InvalidConfig(e.to_string()))
    }

    /// Looks up and decodes the options block of a backend.
    ///
    /// # Returns
    /// - `None` if the backend has no cache namespace (caching disabled)
    /// - `Some(Err(_))` if the block exists but cannot be decoded
    /// - `Some(Ok(config))` otherwise
    pub fn from_extra_config(extra_config: &Map<String, Value>) -> Option<Result<Self>> {
        extra_config.get(NAMESPACE).map(Self::from_value)
    }
}
