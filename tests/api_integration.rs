//! Integration tests for the usage API endpoints

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, NaiveDate};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use xray_usage::analytics::{EngineSettings, SnapshotCache, SnapshotEngine};
use xray_usage::api::{self, AppState};
use xray_usage::models::RawDailyRecord;
use xray_usage::storage::{CsvStore, RecordStore, SqliteStore};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Helper to create test storage with two weeks of data for one user
async fn create_test_store(to: NaiveDate) -> Arc<dyn RecordStore> {
    let store = SqliteStore::new("sqlite::memory:", 1).await.unwrap();
    store.init().await.unwrap();
    for offset in 0..14 {
        let date = to - Duration::days(offset);
        let record = RawDailyRecord::new(date, "alice")
            .with_traffic(1000)
            .with_connections(10)
            .with_domain_traffic("example.com", 700)
            .with_domain_traffic("cdn.net", 200);
        store.upsert_record(&record).await.unwrap();
    }
    store.set_alias("alice", "Alice").await.unwrap();
    Arc::new(store)
}

fn create_app(store: Arc<dyn RecordStore>, cors_allow_any: bool) -> Router {
    let engine = Arc::new(SnapshotEngine::new(store, EngineSettings::default()));
    let snapshots = Arc::new(SnapshotCache::new(
        engine,
        100,
        std::time::Duration::from_secs(30),
    ));
    api::create_api_router(Arc::new(AppState::new(snapshots)), cors_allow_any)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_check() {
    let app = create_app(create_test_store(day(2025, 6, 30)).await, false);

    let (status, json) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_dashboard_endpoint() {
    let app = create_app(create_test_store(day(2025, 6, 30)).await, false);

    let (status, json) = get(app, "/api/usage/dashboard?to=2025-06-30&days=14").await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(json["dates"].as_array().unwrap().len(), 14);
    assert_eq!(json["dates"][0], "2025-06-17");
    assert_eq!(json["meta"]["window_days"], 14);
    assert_eq!(json["meta"]["data_completeness"], "full");

    let global = &json["global"];
    assert_eq!(global["sum7_traffic_bytes"], 7000);
    assert_eq!(global["sum_prev7_traffic_bytes"], 7000);
    assert_eq!(global["delta_traffic_pct"]["kind"], "value");
    assert_eq!(global["delta_traffic_pct"]["value"], 0.0);
    assert_eq!(global["top_domains_traffic"][0]["domain"], "example.com");
    assert_eq!(global["top_domains_traffic"][0]["pct"], 77.78);

    let alice = &json["users"]["alice"];
    assert_eq!(alice["alias"], "Alice");
    assert_eq!(alice["anomaly"], false);

    assert_eq!(json["kpi"]["today_traffic_bytes"], 1000);
    assert_eq!(json["kpi"]["avg7_traffic_bytes"], 1000);
}

#[tokio::test]
async fn test_dashboard_window_alias_and_user_filter() {
    let app = create_app(create_test_store(day(2025, 6, 30)).await, false);

    let (status, json) = get(
        app,
        "/api/usage/dashboard?to=2025-06-30&window=7&user=alice",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["meta"]["window_days"], 7);
    assert_eq!(json["meta"]["user_filter"], "alice");
    assert!(json["meta"]["previous_window"].is_null());
    assert_eq!(json["global"]["delta_traffic_pct"]["kind"], "none");
}

#[tokio::test]
async fn test_dashboard_rejects_bad_input() {
    let store = create_test_store(day(2025, 6, 30)).await;

    let (status, json) = get(
        create_app(Arc::clone(&store), false),
        "/api/usage/dashboard?to=2025-06-30&days=0",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("window"));

    let (status, _) = get(
        create_app(Arc::clone(&store), false),
        "/api/usage/dashboard?to=2025-06-30&days=400",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = get(
        create_app(Arc::clone(&store), false),
        "/api/usage/dashboard?to=30-06-2025",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("30-06-2025"));

    for uri in [
        "/api/usage/dashboard?to=2025-06-30&days=abc",
        "/api/usage/dashboard?to=2025-06-30&window=1.5",
    ] {
        let (status, json) = get(create_app(Arc::clone(&store), false), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"]
            .as_str()
            .unwrap()
            .starts_with("invalid query parameters"));
    }

    let (status, json) = get(
        create_app(store, false),
        "/api/usage/dashboard?to=2025-06-30&user=nobody",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("nobody"));
}

#[tokio::test]
async fn test_unreachable_store_returns_503() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn RecordStore> = Arc::new(CsvStore::new(dir.path().join("gone"), None));
    let app = create_app(store, false);

    let (status, json) = get(app, "/api/usage/dashboard?to=2025-06-30").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_dates_endpoint() {
    let app = create_app(create_test_store(day(2024, 1, 31)).await, false);

    let (status, json) = get(app, "/api/usage/dates").await;
    assert_eq!(status, StatusCode::OK);

    let dates: Vec<&str> = json["dates"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d.as_str().unwrap())
        .collect();
    // Stored days plus the recent two weeks, newest first
    assert!(dates.len() >= 28);
    assert!(dates.contains(&"2024-01-31"));
    assert!(dates.contains(&"2024-01-18"));
    let mut sorted = dates.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(dates, sorted);
}

#[tokio::test]
async fn test_all_time_endpoint() {
    let app = create_app(create_test_store(day(2025, 6, 30)).await, false);

    let (status, json) = get(app, "/api/usage/all-time").await;
    assert_eq!(status, StatusCode::OK);

    let alice = &json["users"][0];
    assert_eq!(alice["user_id"], "alice");
    assert_eq!(alice["alias"], "Alice");
    assert_eq!(alice["traffic_bytes"], 14000);
    assert_eq!(alice["days"], 14);
    assert_eq!(alice["top_domains_traffic"][0]["domain"], "example.com");
}

#[tokio::test]
async fn test_cors_header_when_enabled() {
    let app = create_app(create_test_store(day(2025, 6, 30)).await, true);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(header::ORIGIN, "http://console.local")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}
