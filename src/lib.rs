//! Gateway HTTP Cache - in-memory response caching for backend calls
//!
//! Wraps a backend client's transport so that responses allowed by their
//! `Cache-Control`/`Expires` headers are stored and served again while fresh.
//! Stores are either dedicated to one backend or shared process-wide, and
//! either unbounded or LRU-bounded by item count and byte size.

pub mod cache;
pub mod config;
pub mod error;
pub mod freshness;
pub mod key;
pub mod registry;
pub mod transport;

pub use cache::{Cache, CacheEntry, CacheStats, LruStore, MemoryStore, StoreHandle};
pub use config::{CacheConfig, NAMESPACE};
pub use error::{CacheError, Result};
pub use freshness::Freshness;
pub use key::CacheKey;
pub use registry::CacheRegistry;
pub use transport::{
    new_http_client, BackendClient, CachingTransport, ReqwestTransport, Transport,
};
