use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{health_check, usage_all_time, usage_dashboard, usage_dates, AppState};

pub fn create_api_router(state: Arc<AppState>, cors_allow_any: bool) -> Router {
    let usage_routes = Router::new()
        .route("/usage/dashboard", get(usage_dashboard))
        .route("/usage/dates", get(usage_dates))
        .route("/usage/all-time", get(usage_all_time))
        .with_state(state);

    let router = Router::new()
        .route("/health", get(health_check))
        .nest("/api", usage_routes)
        .layer(TraceLayer::new_for_http());

    if cors_allow_any {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
