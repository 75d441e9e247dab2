//! Integration Tests for Cached Backend Clients
//!
//! Runs real HTTP round trips against a local axum origin that counts the
//! requests it serves, through clients built with `new_http_client`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::{header, Uri};
use axum::Router;
use bytes::Bytes;
use gateway_httpcache::transport::FROM_CACHE_HEADER;
use gateway_httpcache::{
    new_http_client, BackendClient, Cache, CacheRegistry, ReqwestTransport, Transport, NAMESPACE,
};
use http::{Request, StatusCode};
use serde_json::{json, Map, Value};

const BODY: &str = r#"{"status": "ok"}"#;

// == Helper Functions ==

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Local origin that answers every path with a cacheable JSON body.
struct Origin {
    addr: SocketAddr,
    hits: Arc<Mutex<HashMap<String, u64>>>,
}

impl Origin {
    async fn spawn(max_age: u64) -> anyhow::Result<Self> {
        let hits: Arc<Mutex<HashMap<String, u64>>> = Arc::default();
        let counter = Arc::clone(&hits);

        let app = Router::new().fallback(move |uri: Uri| {
            let counter = Arc::clone(&counter);
            async move {
                *counter
                    .lock()
                    .unwrap()
                    .entry(uri.path().to_string())
                    .or_default() += 1;
                (
                    [
                        (header::CACHE_CONTROL, format!("public, max-age={max_age}")),
                        (header::CONTENT_TYPE, "application/json".to_string()),
                    ],
                    BODY,
                )
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self { addr, hits })
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    fn hits(&self, path: &str) -> u64 {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

fn extra_config(options: Value) -> Map<String, Value> {
    let mut extra = Map::new();
    extra.insert(NAMESPACE.to_string(), options);
    extra
}

fn client(
    extra: &Map<String, Value>,
    registry: &CacheRegistry,
) -> BackendClient<ReqwestTransport> {
    new_http_client(extra, registry, ReqwestTransport::default())
}

async fn get(
    client: &BackendClient<ReqwestTransport>,
    url: &str,
) -> anyhow::Result<http::Response<Bytes>> {
    let request = Request::builder().uri(url).body(Bytes::new())?;
    let response = client.execute(request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body(), BODY);
    Ok(response)
}

fn from_cache(response: &http::Response<Bytes>) -> bool {
    response.headers().contains_key(FROM_CACHE_HEADER)
}

// == Shared Stores ==

#[tokio::test]
async fn test_shared_memory_cache_serves_all_clients() -> anyhow::Result<()> {
    init_tracing();
    let origin = Origin::spawn(300).await?;
    let registry = CacheRegistry::new();
    let extra = extra_config(json!({ "shared": true }));

    for _ in 0..4 {
        let client = client(&extra, &registry);
        assert!(client.is_cached());
        for _ in 0..5 {
            get(&client, &origin.url("/shared")).await?;
        }
    }

    assert_eq!(origin.hits("/shared"), 1);
    Ok(())
}

#[tokio::test]
async fn test_shared_lru_cache_serves_all_clients() -> anyhow::Result<()> {
    init_tracing();
    let origin = Origin::spawn(300).await?;
    let registry = CacheRegistry::new();
    let extra = extra_config(json!({ "shared": true, "max_items": 10, "max_size": 10_000 }));

    let clients: Vec<_> = (0..4).map(|_| client(&extra, &registry)).collect();
    for client in &clients {
        get(client, &origin.url("/shared-lru")).await?;
    }

    assert_eq!(origin.hits("/shared-lru"), 1);

    let BackendClient::Cached(first) = &clients[0] else {
        panic!("expected a cached client");
    };
    assert!(first.store().is_bounded());
    assert_eq!(first.store().stats().hits, 3);
    Ok(())
}

#[tokio::test]
async fn test_reset_forgets_shared_stores() -> anyhow::Result<()> {
    init_tracing();
    let origin = Origin::spawn(300).await?;
    let registry = CacheRegistry::new();
    let extra = extra_config(json!({ "shared": true }));

    get(&client(&extra, &registry), &origin.url("/reset")).await?;
    registry.reset();
    get(&client(&extra, &registry), &origin.url("/reset")).await?;

    assert_eq!(origin.hits("/reset"), 2);
    Ok(())
}

// == Dedicated Stores ==

#[tokio::test]
async fn test_dedicated_caches_are_independent() -> anyhow::Result<()> {
    init_tracing();
    let origin = Origin::spawn(300).await?;
    let registry = CacheRegistry::new();

    let memory = client(&extra_config(json!({})), &registry);
    let bounded = client(
        &extra_config(json!({ "max_items": 10, "max_size": 10_000 })),
        &registry,
    );

    for _ in 0..5 {
        get(&memory, &origin.url("/dedicated")).await?;
    }
    assert_eq!(origin.hits("/dedicated"), 1);

    for _ in 0..5 {
        get(&bounded, &origin.url("/dedicated")).await?;
    }
    assert_eq!(origin.hits("/dedicated"), 2);
    Ok(())
}

// == Freshness ==

#[tokio::test]
async fn test_expired_entries_are_refetched() -> anyhow::Result<()> {
    init_tracing();
    let origin = Origin::spawn(1).await?;
    let registry = CacheRegistry::new();
    let client = client(&extra_config(json!({ "shared": true })), &registry);

    for round in 1..=3 {
        let response = get(&client, &origin.url("/refresh")).await?;
        assert!(!from_cache(&response));
        assert_eq!(origin.hits("/refresh"), round);
        tokio::time::sleep(Duration::from_millis(1500)).await;
    }
    Ok(())
}

#[tokio::test]
async fn test_cached_response_round_trip() -> anyhow::Result<()> {
    init_tracing();
    let origin = Origin::spawn(300).await?;
    let registry = CacheRegistry::new();
    let client = client(&extra_config(json!({})), &registry);

    let first = get(&client, &origin.url("/roundtrip")).await?;
    let second = get(&client, &origin.url("/roundtrip")).await?;

    assert!(!from_cache(&first));
    assert!(from_cache(&second));
    assert_eq!(second.headers()[header::CACHE_CONTROL], "public, max-age=300");
    assert_eq!(second.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(first.body(), second.body());
    assert_eq!(origin.hits("/roundtrip"), 1);
    Ok(())
}

// == Bounded Eviction ==

#[tokio::test]
async fn test_lru_evicts_least_recent_response() -> anyhow::Result<()> {
    init_tracing();
    let origin = Origin::spawn(300).await?;
    let registry = CacheRegistry::new();
    // One stored response is a little over 200 bytes, so only one fits
    let client = client(
        &extra_config(json!({ "max_items": 10, "max_size": 250 })),
        &registry,
    );

    get(&client, &origin.url("/b1")).await?;
    get(&client, &origin.url("/b2")).await?;
    get(&client, &origin.url("/b1")).await?;
    let last = get(&client, &origin.url("/b1")).await?;

    assert!(from_cache(&last));
    assert_eq!(origin.hits("/b1"), 2);
    assert_eq!(origin.hits("/b2"), 1);

    let BackendClient::Cached(cached) = &client else {
        panic!("expected a cached client");
    };
    let stats = cached.store().stats();
    assert_eq!(stats.total_entries, 1);
    assert_eq!(stats.evictions, 2);
    Ok(())
}

// == Disabled and Fallback ==

#[tokio::test]
async fn test_no_cache_options_passes_through() -> anyhow::Result<()> {
    init_tracing();
    let origin = Origin::spawn(300).await?;
    let registry = CacheRegistry::new();
    let client = client(&Map::new(), &registry);
    assert!(!client.is_cached());

    for _ in 0..5 {
        let response = get(&client, &origin.url("/direct")).await?;
        assert!(!from_cache(&response));
    }

    assert_eq!(origin.hits("/direct"), 5);
    Ok(())
}

#[tokio::test]
async fn test_invalid_options_fall_back_to_memory_cache() -> anyhow::Result<()> {
    init_tracing();
    let origin = Origin::spawn(300).await?;
    let registry = CacheRegistry::new();
    let client = client(&extra_config(json!({ "max_items": "many" })), &registry);
    assert!(client.is_cached());

    for _ in 0..3 {
        get(&client, &origin.url("/fallback")).await?;
    }

    assert_eq!(origin.hits("/fallback"), 1);
    Ok(())
}
