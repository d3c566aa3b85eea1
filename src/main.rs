use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use xray_usage::analytics::{SnapshotCache, SnapshotEngine, SnapshotRequest};
use xray_usage::api::{self, AppState};
use xray_usage::config::Config;
use xray_usage::storage;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    info!("Loaded configuration");

    let store = storage::open_store(&config.store).await?;
    info!("Record store initialized");

    let settings = config.engine.settings();
    let engine = Arc::new(SnapshotEngine::new(Arc::clone(&store), settings));
    let snapshots = Arc::new(SnapshotCache::new(
        engine,
        config.cache.max_entries,
        Duration::from_secs(config.cache.ttl_secs),
    ));

    // Keep the default dashboard view warm
    let refresh_handle = if config.cache.refresh_interval_secs > 0 {
        info!(
            "Refreshing default snapshot every {}s",
            config.cache.refresh_interval_secs
        );
        Some(snapshots.start_refresh_task(
            config.cache.refresh_interval_secs,
            move || {
                let today = chrono::Utc::now().date_naive();
                SnapshotRequest::from_params(None, None, None, today, &settings).ok()
            },
        ))
    } else {
        None
    };

    let state = Arc::new(AppState::new(Arc::clone(&snapshots)));
    let router = api::create_api_router(state, config.api_server.cors_allow_any);

    let addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Usage API listening on http://{}", addr);
    info!("   - Dashboard snapshot at http://{}/api/usage/dashboard", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    snapshots.shutdown();
    if let Some(handle) = refresh_handle {
        let _ = handle.await;
    }

    Ok(())
}
