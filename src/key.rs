//! Cache Key Module
//!
//! Derives the store key of a request: method plus absolute URL. Header
//! variance is recorded on the stored entry (see `Vary`), not in the key.

use std::fmt;

use http::{Method, Request, Uri};

// == Cache Key ==
/// Deterministic identifier of cache-equivalent requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for `method` on `uri`.
    pub fn new(method: &Method, uri: &Uri) -> Self {
        Self(format!("{} {}", method.as_str(), uri))
    }

    /// Key of a request.
    pub fn from_request<B>(request: &Request<B>) -> Self {
        Self::new(request.method(), request.uri())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
