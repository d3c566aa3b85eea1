//! Boundary cache for computed snapshots
//!
//! The engine never caches. Callers that poll (the dashboard refreshes
//! every 30s) go through [`SnapshotCache`], which keeps whole snapshots in
//! a moka cache and replaces them wholesale. Concurrent misses for the same
//! request share a single computation.

use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

use crate::analytics::snapshot::{SnapshotEngine, SnapshotRequest};
use crate::error::{EngineError, EngineResult};
use crate::models::DashboardSnapshot;

pub struct SnapshotCache {
    engine: Arc<SnapshotEngine>,
    cache: Cache<SnapshotRequest, Arc<DashboardSnapshot>>,
    shutdown_tx: watch::Sender<bool>,
}

impl SnapshotCache {
    pub fn new(engine: Arc<SnapshotEngine>, max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            engine,
            cache,
            shutdown_tx,
        }
    }

    pub fn engine(&self) -> &Arc<SnapshotEngine> {
        &self.engine
    }

    /// Cached snapshot for `request`, computing it on a miss.
    /// Errors are not cached.
    pub async fn get(&self, request: &SnapshotRequest) -> EngineResult<Arc<DashboardSnapshot>> {
        let engine = Arc::clone(&self.engine);
        let key = request.clone();
        self.cache
            .try_get_with(request.clone(), async move {
                engine.snapshot(&key).await.map(Arc::new)
            })
            .await
            .map_err(unshare)
    }

    /// Recompute `request` and swap it in, bypassing any cached value
    pub async fn refresh(&self, request: &SnapshotRequest) -> EngineResult<Arc<DashboardSnapshot>> {
        let snapshot = Arc::new(self.engine.snapshot(request).await?);
        self.cache
            .insert(request.clone(), Arc::clone(&snapshot))
            .await;
        Ok(snapshot)
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Periodically refresh the request produced by `next_request`
    /// (typically the default window ending today) until [`shutdown`](Self::shutdown).
    pub fn start_refresh_task<F>(self: &Arc<Self>, interval_secs: u64, next_request: F) -> JoinHandle<()>
    where
        F: Fn() -> Option<SnapshotRequest> + Send + 'static,
    {
        let this = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut interval = time::interval(Duration::from_secs(interval_secs.max(1)));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let Some(request) = next_request() else {
                            continue;
                        };
                        match this.refresh(&request).await {
                            Ok(_) => tracing::debug!(
                                "Refreshed snapshot ending {} ({} days)",
                                request.to(),
                                request.window_days()
                            ),
                            Err(e) => tracing::error!("Failed to refresh snapshot: {}", e),
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            tracing::info!("Snapshot refresh task shutting down");
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Stop the refresh task
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// moka hands the same error to every waiter behind an `Arc`
fn unshare(err: Arc<EngineError>) -> EngineError {
    match Arc::try_unwrap(err) {
        Ok(err) => err,
        Err(shared) => match shared.as_ref() {
            EngineError::Input(e) => EngineError::Input(e.clone()),
            EngineError::UpstreamUnavailable(reason) => {
                EngineError::UpstreamUnavailable(reason.clone())
            }
            EngineError::Other(e) => EngineError::Other(anyhow::anyhow!("{:#}", e)),
        },
    }
}
