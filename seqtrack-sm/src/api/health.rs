//! Health, statistics and event stream routes

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use seqtrack_common::models::SampleStatistics;
use seqtrack_common::SampleStore;

use crate::{ApiResult, AppState};

/// Returns status, module name, and version
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "seqtrack-sm".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /stats
pub async fn statistics(State(state): State<AppState>) -> ApiResult<Json<SampleStatistics>> {
    Ok(Json(state.store.sample_statistics().await?))
}

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(statistics))
        .route("/events", get(super::event_stream))
}
