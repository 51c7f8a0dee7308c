//! End-to-end tests of the router: hello endpoint, trace context, ops endpoints.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use hitcount_core::error::{HitError, Result};
use hitcount_core::{CounterDb, StoreOptions, StorePath};
use hitcount_server::app_state::AppState;
use hitcount_server::config::HitcountConfig;
use hitcount_server::router::build_router;
use hitcount_server::storage::{CounterStore, SqliteCounterStore};

struct BrokenStore;

#[async_trait]
impl CounterStore for BrokenStore {
    async fn increment_and_get(&self, _name: &str) -> Result<i64> {
        Err(HitError::Storage("unable to open database file".into()))
    }
}

fn memory_state() -> AppState {
    let store = SqliteCounterStore::open(&StoreOptions::memory()).unwrap();
    AppState::new(HitcountConfig::default(), Arc::new(store))
}

async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    let resp = app
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

fn ok(body: &str) -> (StatusCode, String) {
    (StatusCode::OK, body.to_owned())
}

#[tokio::test]
async fn hello_counts_per_name() {
    let app = build_router(memory_state());

    assert_eq!(get(&app, "/hello/alice").await, ok("Hello, alice! (#1)\n"));
    assert_eq!(get(&app, "/hello/alice").await, ok("Hello, alice! (#2)\n"));
    assert_eq!(get(&app, "/hello/bob").await, ok("Hello, bob! (#1)\n"));
}

#[tokio::test]
async fn hello_response_is_plain_text() {
    let app = build_router(memory_state());
    let resp = app
        .oneshot(Request::get("/hello/alice").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let ct = resp.headers().get("content-type").unwrap().to_str().unwrap();
    assert!(ct.starts_with("text/plain"));
}

#[tokio::test]
async fn missing_name_is_empty_string() {
    let app = build_router(memory_state());
    assert_eq!(get(&app, "/hello/").await, ok("Hello, ! (#1)\n"));
    assert_eq!(get(&app, "/hello/").await, ok("Hello, ! (#2)\n"));
}

#[tokio::test]
async fn undecodable_name_is_rejected_without_counting() {
    let store = SqliteCounterStore::open(&StoreOptions::memory()).unwrap();
    let db = store.db().clone();
    let app = build_router(AppState::new(HitcountConfig::default(), Arc::new(store)));

    // %FF is not UTF-8, so the path extractor refuses it.
    let (status, _) = get(&app, "/hello/%FF").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(db.count("").unwrap(), None);

    // The empty-name counter is only reached through `/hello/`.
    assert_eq!(get(&app, "/hello/").await, ok("Hello, ! (#1)\n"));
}

#[tokio::test]
async fn percent_encoded_names_are_decoded() {
    let app = build_router(memory_state());
    let (status, body) = get(&app, "/hello/J%C3%BCrgen%20K").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Hello, Jürgen K! (#1)\n");
}

#[tokio::test]
async fn only_get_is_routed() {
    let app = build_router(memory_state());
    let resp = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/hello/alice")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn storage_failure_is_generic_500() {
    let app = build_router(AppState::new(HitcountConfig::default(), Arc::new(BrokenStore)));

    let resp = app
        .oneshot(Request::get("/hello/alice").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.headers().get("x-content-type-options").unwrap(), "nosniff");

    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"failed to update request count\n");
}

#[tokio::test]
async fn locked_database_fails_without_counting() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let opts = StoreOptions {
        path: StorePath::File(file.path().to_path_buf()),
        pool_size: 1,
        busy_timeout: Duration::ZERO,
        connect_timeout: Duration::from_secs(5),
    };
    let store = SqliteCounterStore::new(CounterDb::open(&opts).unwrap());
    let db = store.db().clone();
    let app = build_router(AppState::new(HitcountConfig::default(), Arc::new(store)));

    assert_eq!(get(&app, "/hello/alice").await.1, "Hello, alice! (#1)\n");

    let blocker = r2d2_sqlite::rusqlite::Connection::open(file.path()).unwrap();
    blocker.execute_batch("BEGIN EXCLUSIVE").unwrap();

    let (status, body) = get(&app, "/hello/alice").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "failed to update request count\n");

    blocker.execute_batch("ROLLBACK").unwrap();
    assert_eq!(db.count("alice").unwrap(), Some(1));
    assert_eq!(get(&app, "/hello/alice").await.1, "Hello, alice! (#2)\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_get_distinct_counts() {
    let app = build_router(memory_state());
    assert_eq!(get(&app, "/hello/alice").await.1, "Hello, alice! (#1)\n");

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move { get(&app, "/hello/alice").await })
        })
        .collect();

    let mut seen = BTreeSet::new();
    for t in tasks {
        let (status, body) = t.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        let n: i64 = body
            .trim_end()
            .trim_start_matches("Hello, alice! (#")
            .trim_end_matches(')')
            .parse()
            .unwrap();
        assert!(seen.insert(n), "duplicate count {n}");
    }
    assert_eq!(seen, (2..=33).collect::<BTreeSet<i64>>());
}

#[tokio::test]
async fn traceparent_is_continued() {
    let app = build_router(memory_state());
    let resp = app
        .oneshot(
            Request::get("/hello/alice")
                .header("traceparent", "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let tp = resp.headers().get("traceparent").unwrap().to_str().unwrap();
    assert!(tp.starts_with("00-4bf92f3577b34da6a3ce929d0e0e4736-"));
    assert!(!tp.contains("00f067aa0ba902b7"));
}

#[tokio::test]
async fn traceparent_is_minted_when_absent() {
    let app = build_router(memory_state());
    let resp = app
        .oneshot(Request::get("/hello/alice").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let tp = resp.headers().get("traceparent").unwrap().to_str().unwrap();
    assert_eq!(tp.len(), 55);
    assert!(tp.starts_with("00-"));
}

#[tokio::test]
async fn ops_health_and_metrics() {
    let state = memory_state();
    let app = build_router(state.clone());

    assert_eq!(get(&app, "/healthz").await, (StatusCode::OK, "ok".into()));
    assert_eq!(get(&app, "/readyz").await, (StatusCode::OK, "ready".into()));

    get(&app, "/hello/alice").await;
    let (status, body) = get(&app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("hitcount_hello_requests_total{outcome=\"ok\"} 1"));
    assert!(body.contains("hitcount_storage_duration_micros_count 1"));
    assert!(body.contains("hitcount_hello_in_flight 0"));

    state.set_draining();
    assert_eq!(
        get(&app, "/readyz").await,
        (StatusCode::SERVICE_UNAVAILABLE, "draining".into())
    );
}

#[tokio::test]
async fn failures_are_counted_by_outcome() {
    let state = AppState::new(HitcountConfig::default(), Arc::new(BrokenStore));
    let app = build_router(state.clone());

    get(&app, "/hello/alice").await;
    assert_eq!(state.metrics().hello_requests.get(&[("outcome", "internal")]), 1);
    assert_eq!(state.metrics().hello_requests.get(&[("outcome", "ok")]), 0);
}

#[tokio::test]
async fn ops_can_be_disabled() {
    let mut cfg = HitcountConfig::default();
    cfg.ops.enabled = false;
    let store = SqliteCounterStore::open(&StoreOptions::memory()).unwrap();
    let app = build_router(AppState::new(cfg, Arc::new(store)));

    assert_eq!(get(&app, "/healthz").await.0, StatusCode::NOT_FOUND);
    assert_eq!(get(&app, "/hello/alice").await.0, StatusCode::OK);
}
