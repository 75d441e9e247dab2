//! Transport Module
//!
//! The request-execution seam of a backend client. [`CachingTransport`]
//! decorates any [`Transport`]; [`new_http_client`] decides from a backend's
//! extra configuration whether to decorate at all.

mod caching;
mod client;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use serde_json::{Map, Value};

use crate::registry::CacheRegistry;

pub use caching::{CachingTransport, FROM_CACHE_HEADER};
pub use client::ReqwestTransport;

// == Transport Trait ==
/// Executes one outbound request with a fully buffered body.
#[async_trait]
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn execute(&self, request: Request<Bytes>) -> Result<Response<Bytes>, Self::Error>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    type Error = T::Error;

    async fn execute(&self, request: Request<Bytes>) -> Result<Response<Bytes>, Self::Error> {
        (**self).execute(request).await
    }
}

// == Backend Client ==
/// Transport handed to the gateway for one backend: either the original
/// transport untouched or wrapped in the cache.
#[derive(Debug)]
pub enum BackendClient<T> {
    Direct(T),
    Cached(CachingTransport<T>),
}

impl<T> BackendClient<T> {
    pub fn is_cached(&self) -> bool {
        matches!(self, BackendClient::Cached(_))
    }
}

#[async_trait]
impl<T: Transport> Transport for BackendClient<T> {
    type Error = T::Error;

    async fn execute(&self, request: Request<Bytes>) -> Result<Response<Bytes>, Self::Error> {
        match self {
            BackendClient::Direct(inner) => inner.execute(request).await,
            BackendClient::Cached(cached) => cached.execute(request).await,
        }
    }
}

/// Builds the transport of one backend.
///
/// Without cache options in `extra_config` the inner transport is returned
/// as is and no key is ever derived. Otherwise the store comes from
/// `registry`, see [`CacheRegistry::resolve_extra_config`].
pub fn new_http_client<T: Transport>(
    extra_config: &Map<String, Value>,
    registry: &CacheRegistry,
    inner: T,
) -> BackendClient<T> {
    match registry.resolve_extra_config(extra_config) {
        Some(store) => BackendClient::Cached(CachingTransport::new(inner, store)),
        None => BackendClient::Direct(inner),
    }
}
