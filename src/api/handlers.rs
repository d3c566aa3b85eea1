use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::analytics::{self, EngineSettings, SnapshotCache, SnapshotRequest};
use crate::error::{EngineError, InputError};
use crate::models::{AllTimeStats, DashboardSnapshot};
use crate::storage::RecordStore;

pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub snapshots: Arc<SnapshotCache>,
    pub settings: EngineSettings,
}

impl AppState {
    pub fn new(snapshots: Arc<SnapshotCache>) -> Self {
        let engine = snapshots.engine();
        Self {
            store: Arc::clone(engine.store()),
            settings: *engine.settings(),
            snapshots,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Engine errors mapped onto HTTP statuses
pub struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::Input(_) => StatusCode::BAD_REQUEST,
            EngineError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    /// End date (YYYY-MM-DD), defaults to today
    pub to: Option<String>,
    /// Window length in days
    pub days: Option<i64>,
    /// Alias of `days`
    pub window: Option<i64>,
    /// Restrict the snapshot to one user
    pub user: Option<String>,
}

#[derive(Serialize)]
pub struct DatesResponse {
    pub dates: Vec<NaiveDate>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Dashboard snapshot for a window ending at `to`
pub async fn usage_dashboard(
    State(state): State<Arc<AppState>>,
    query: Result<Query<DashboardQuery>, QueryRejection>,
) -> Result<Json<Arc<DashboardSnapshot>>, ApiError> {
    let Query(params) =
        query.map_err(|e| EngineError::from(InputError::InvalidQuery(e.body_text())))?;
    let request = SnapshotRequest::from_params(
        params.to.as_deref(),
        params.days.or(params.window),
        params.user.as_deref(),
        today(),
        &state.settings,
    )
    .map_err(EngineError::from)?;

    let snapshot = state.snapshots.get(&request).await?;
    Ok(Json(snapshot))
}

/// Dates that can be chosen as the end of a window, newest first
pub async fn usage_dates(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DatesResponse>, ApiError> {
    let dates = analytics::available_dates(&state.store, today()).await?;
    Ok(Json(DatesResponse { dates }))
}

/// Lifetime totals per user
pub async fn usage_all_time(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AllTimeStats>, ApiError> {
    let stats = analytics::all_time_stats(&state.store).await?;
    Ok(Json(stats))
}
