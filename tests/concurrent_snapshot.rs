//! Concurrent snapshot tests
//!
//! Snapshots are computed without shared mutable state, so concurrent
//! requests for the same input must agree byte for byte, and the cache must
//! hand out one computation to every waiter.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use xray_usage::analytics::{EngineSettings, SnapshotCache, SnapshotEngine, SnapshotRequest};
use xray_usage::models::RawDailyRecord;
use xray_usage::storage::{RecordStore, StoreResult};

fn to_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 8, 31).unwrap()
}

/// In-memory store that counts how often each day is read
struct CountingStore {
    loads: AtomicUsize,
}

impl CountingStore {
    fn new() -> Self {
        Self {
            loads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RecordStore for CountingStore {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn load_day(&self, date: NaiveDate) -> StoreResult<Vec<RawDailyRecord>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        let n = (to_day() - date).num_days() as u64;
        Ok((0..20)
            .map(|u| {
                RawDailyRecord::new(date, format!("user{:02}", u))
                    .with_traffic(1000 + u * 37 + n * 11)
                    .with_connections(u + n)
                    .with_domain_traffic(format!("site{}.com", u % 7), 500 + n)
                    .with_domain_connections(format!("site{}.com", u % 3), u + 1)
            })
            .collect())
    }

    async fn list_dates(&self) -> StoreResult<Vec<NaiveDate>> {
        Ok((0..30).map(|i| to_day() - Duration::days(i)).collect())
    }

    async fn aliases(&self) -> StoreResult<BTreeMap<String, String>> {
        Ok(BTreeMap::from([("user00".to_string(), "Ops".to_string())]))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_snapshots_are_identical() {
    let store: Arc<dyn RecordStore> = Arc::new(CountingStore::new());
    let engine = Arc::new(SnapshotEngine::new(store, EngineSettings::default()));
    let request = SnapshotRequest::new(30, to_day(), None, 366).unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let engine = Arc::clone(&engine);
        let request = request.clone();
        handles.push(tokio::spawn(async move {
            let snapshot = engine.snapshot(&request).await.unwrap();
            serde_json::to_string(&snapshot).unwrap()
        }));
    }

    let mut outputs = Vec::new();
    for handle in handles {
        outputs.push(handle.await.unwrap());
    }
    assert!(outputs.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cache_shares_one_computation() {
    let counting = Arc::new(CountingStore::new());
    let store: Arc<dyn RecordStore> = counting.clone();
    let engine = Arc::new(SnapshotEngine::new(store, EngineSettings::default()));
    let cache = Arc::new(SnapshotCache::new(
        engine,
        16,
        std::time::Duration::from_secs(60),
    ));
    let request = SnapshotRequest::new(14, to_day(), None, 366).unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = Arc::clone(&cache);
        let request = request.clone();
        handles.push(tokio::spawn(async move { cache.get(&request).await.unwrap() }));
    }
    let mut snapshots = Vec::new();
    for handle in handles {
        snapshots.push(handle.await.unwrap());
    }

    assert_eq!(counting.loads.load(Ordering::SeqCst), 14);
    assert!(snapshots.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));

    // A different window is a different key
    let other = SnapshotRequest::new(7, to_day(), None, 366).unwrap();
    cache.get(&other).await.unwrap();
    assert_eq!(counting.loads.load(Ordering::SeqCst), 21);
}

#[tokio::test]
async fn test_refresh_replaces_cached_snapshot() {
    let counting = Arc::new(CountingStore::new());
    let store: Arc<dyn RecordStore> = counting.clone();
    let engine = Arc::new(SnapshotEngine::new(store, EngineSettings::default()));
    let cache = Arc::new(SnapshotCache::new(
        engine,
        16,
        std::time::Duration::from_secs(60),
    ));
    let request = SnapshotRequest::new(7, to_day(), None, 366).unwrap();

    let first = cache.get(&request).await.unwrap();
    let refreshed = cache.refresh(&request).await.unwrap();
    let cached = cache.get(&request).await.unwrap();

    assert!(!Arc::ptr_eq(&first, &refreshed));
    assert!(Arc::ptr_eq(&refreshed, &cached));
    assert_eq!(*first, *refreshed);
    assert_eq!(counting.loads.load(Ordering::SeqCst), 14);
}

#[tokio::test]
async fn test_refresh_task_stops_on_shutdown() {
    let counting = Arc::new(CountingStore::new());
    let store: Arc<dyn RecordStore> = counting.clone();
    let engine = Arc::new(SnapshotEngine::new(store, EngineSettings::default()));
    let cache = Arc::new(SnapshotCache::new(
        engine,
        16,
        std::time::Duration::from_secs(60),
    ));

    let handle = cache.start_refresh_task(1, || {
        SnapshotRequest::new(7, to_day(), None, 366).ok()
    });

    // The first tick fires immediately
    for _ in 0..50 {
        if counting.loads.load(Ordering::SeqCst) >= 7 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(counting.loads.load(Ordering::SeqCst) >= 7);

    cache.shutdown();
    tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .expect("refresh task did not stop")
        .unwrap();
}
