//! Caching transport.
//!
//! Serves fresh stored responses without touching the network, revalidates
//! stale ones with the stored validators and stores every storable response
//! it receives. Concurrent misses on the same key are not coalesced: each
//! one reaches the origin.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use http::header::{self, HeaderMap, HeaderValue};
use http::{Method, Request, Response, StatusCode, Uri};
use tracing::{debug, warn};

use super::Transport;
use crate::cache::{Cache, CacheEntry, StoreHandle};
use crate::freshness::{evaluate, is_storable, CacheControl, Freshness};
use crate::key::CacheKey;

/// Header set on responses served from the store.
pub const FROM_CACHE_HEADER: &str = "x-from-cache";

// == Caching Transport ==
#[derive(Debug)]
pub struct CachingTransport<T> {
    inner: T,
    store: StoreHandle,
}

impl<T: Transport> CachingTransport<T> {
    pub fn new(inner: T, store: StoreHandle) -> Self {
        Self { inner, store }
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Stored entry for `key` whose varied headers match the request.
    fn lookup(&self, key: &CacheKey, request_headers: &HeaderMap) -> Option<CacheEntry> {
        let raw = self.store.get(key.as_str())?;
        let entry = match CacheEntry::decode(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, error = %e, "Dropping unreadable cache entry");
                self.store.delete(key.as_str());
                return None;
            }
        };

        if !entry.matches_vary(request_headers) {
            debug!(key = %key, "Stored variant does not match request");
            return None;
        }
        Some(entry)
    }

    /// Stores `response` under `key` if it may be stored, drops the old
    /// entry otherwise.
    fn remember(&self, key: &CacheKey, request_headers: &HeaderMap, response: &Response<Bytes>) {
        let now = Utc::now();
        if is_storable(response.status(), response.headers(), now) {
            let entry = CacheEntry::from_response(response, request_headers, now);
            self.store.set(key.as_str(), entry.encode());
            debug!(key = %key, status = %response.status(), "Stored response");
        } else {
            self.store.delete(key.as_str());
        }
    }

    async fn fetch(
        &self,
        key: &CacheKey,
        request: Request<Bytes>,
    ) -> Result<Response<Bytes>, T::Error> {
        let request_headers = request.headers().clone();
        let response = self.inner.execute(request).await?;
        self.remember(key, &request_headers, &response);
        Ok(response)
    }

    async fn revalidate(
        &self,
        key: &CacheKey,
        mut request: Request<Bytes>,
        mut entry: CacheEntry,
    ) -> Result<Response<Bytes>, T::Error> {
        let added_validators = add_validators(request.headers_mut(), &entry.headers);
        let request_headers = request.headers().clone();

        let response = self.inner.execute(request).await?;

        if response.status() == StatusCode::NOT_MODIFIED {
            if !added_validators {
                // Answer to the caller's own validators, the entry stays as is
                return Ok(response);
            }
            let now = Utc::now();
            entry.refresh(response.headers(), now);
            if evaluate(&entry.headers, entry.stored_at, now) == Freshness::NotCacheable {
                self.store.delete(key.as_str());
            } else {
                self.store.set(key.as_str(), entry.encode());
            }
            debug!(key = %key, "Revalidated stale entry");
            return Ok(served(&entry));
        }

        debug!(key = %key, status = %response.status(), "Replacing stale entry");
        self.remember(key, &request_headers, &response);
        Ok(response)
    }

    /// Unsafe methods invalidate what is stored for the same URL.
    fn invalidate(&self, uri: &Uri) {
        for method in [Method::GET, Method::HEAD] {
            let key = CacheKey::new(&method, uri);
            self.store.delete(key.as_str());
        }
    }
}

#[async_trait]
impl<T: Transport> Transport for CachingTransport<T> {
    type Error = T::Error;

    async fn execute(&self, request: Request<Bytes>) -> Result<Response<Bytes>, Self::Error> {
        if !is_cacheable_method(request.method()) {
            let uri = request.uri().clone();
            let response = self.inner.execute(request).await?;
            if !response.status().is_client_error() && !response.status().is_server_error() {
                self.invalidate(&uri);
            }
            return Ok(response);
        }

        let request_cc = CacheControl::from_headers(request.headers());
        if request_cc.no_store {
            return self.inner.execute(request).await;
        }

        let key = CacheKey::from_request(&request);
        let Some(entry) = self.lookup(&key, request.headers()) else {
            debug!(key = %key, "Cache miss");
            return self.fetch(&key, request).await;
        };

        let freshness = match evaluate(&entry.headers, entry.stored_at, Utc::now()) {
            Freshness::Fresh if request_cc.no_cache => Freshness::Stale,
            other => other,
        };

        match freshness {
            Freshness::Fresh => {
                debug!(key = %key, "Cache hit");
                Ok(served(&entry))
            }
            Freshness::Stale => {
                debug!(key = %key, "Cache entry is stale");
                self.revalidate(&key, request, entry).await
            }
            Freshness::NotCacheable => {
                self.store.delete(key.as_str());
                self.fetch(&key, request).await
            }
        }
    }
}

fn is_cacheable_method(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD
}

/// Copies the stored validators onto a revalidation request. Returns false if
/// there was nothing to add or the caller supplied its own validators.
fn add_validators(request_headers: &mut HeaderMap, stored: &HeaderMap) -> bool {
    if request_headers.contains_key(header::IF_NONE_MATCH)
        || request_headers.contains_key(header::IF_MODIFIED_SINCE)
    {
        return false;
    }

    let mut added = false;
    if let Some(etag) = stored.get(header::ETAG) {
        request_headers.insert(header::IF_NONE_MATCH, etag.clone());
        added = true;
    }
    if let Some(last_modified) = stored.get(header::LAST_MODIFIED) {
        request_headers.insert(header::IF_MODIFIED_SINCE, last_modified.clone());
        added = true;
    }
    added
}

fn served(entry: &CacheEntry) -> Response<Bytes> {
    let mut response = entry.to_response();
    response
        .headers_mut()
        .insert(FROM_CACHE_HEADER, HeaderValue::from_static("1"));
    response
}
