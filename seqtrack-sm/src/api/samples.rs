//! Sample routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use seqtrack_common::models::{
    AssignRequest, BatchReport, BulkOperationRequest, NewSample, ProcessingStep, Sample,
    SampleFilter, SampleId, SamplePatch, StatusUpdateRequest,
};
use seqtrack_common::SampleStore;

use crate::{ApiResult, AppState};

/// GET /samples
pub async fn list_samples(
    State(state): State<AppState>,
    Query(filter): Query<SampleFilter>,
) -> ApiResult<Json<Vec<Sample>>> {
    Ok(Json(state.store.list_samples(&filter).await?))
}

/// POST /samples
pub async fn create_sample(
    State(state): State<AppState>,
    Json(fields): Json<NewSample>,
) -> ApiResult<(StatusCode, Json<Sample>)> {
    let sample = state.store.create_sample(fields).await?;
    Ok((StatusCode::CREATED, Json(sample)))
}

/// GET /samples/:id
pub async fn get_sample(
    State(state): State<AppState>,
    Path(id): Path<SampleId>,
) -> ApiResult<Json<Sample>> {
    Ok(Json(state.store.get_sample(id).await?))
}

/// PUT /samples/:id
pub async fn update_sample(
    State(state): State<AppState>,
    Path(id): Path<SampleId>,
    Json(patch): Json<SamplePatch>,
) -> ApiResult<Json<Sample>> {
    Ok(Json(state.store.update_sample(id, &patch).await?))
}

/// DELETE /samples/:id
pub async fn delete_sample(
    State(state): State<AppState>,
    Path(id): Path<SampleId>,
) -> ApiResult<StatusCode> {
    state.store.delete_sample(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /samples/:id/status
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<SampleId>,
    Json(body): Json<StatusUpdateRequest>,
) -> ApiResult<Json<Sample>> {
    Ok(Json(state.store.update_sample_status(id, body.status).await?))
}

/// PUT /samples/:id/assign
pub async fn assign_sample(
    State(state): State<AppState>,
    Path(id): Path<SampleId>,
    Json(body): Json<AssignRequest>,
) -> ApiResult<Json<Sample>> {
    Ok(Json(state.store.assign_sample(id, &body).await?))
}

/// POST /samples/bulk
///
/// 400 when the request fails validation (nothing is written); otherwise
/// 200 with a per-item report, even when every item failed.
pub async fn bulk_operation(
    State(state): State<AppState>,
    Json(request): Json<BulkOperationRequest>,
) -> ApiResult<Json<BatchReport>> {
    Ok(Json(state.store.bulk_apply(&request).await?))
}

/// GET /samples/:id/steps
pub async fn get_steps(
    State(state): State<AppState>,
    Path(id): Path<SampleId>,
) -> ApiResult<Json<Vec<ProcessingStep>>> {
    Ok(Json(state.store.get_processing_steps(id).await?))
}

/// POST /samples/:id/steps
pub async fn create_default_steps(
    State(state): State<AppState>,
    Path(id): Path<SampleId>,
) -> ApiResult<Json<Vec<ProcessingStep>>> {
    Ok(Json(state.store.create_default_steps(id).await?))
}

pub fn sample_routes() -> Router<AppState> {
    Router::new()
        .route("/samples", get(list_samples).post(create_sample))
        .route("/samples/bulk", post(bulk_operation))
        .route(
            "/samples/:id",
            get(get_sample).put(update_sample).delete(delete_sample),
        )
        .route("/samples/:id/status", put(update_status))
        .route("/samples/:id/assign", put(assign_sample))
        .route("/samples/:id/steps", get(get_steps).post(create_default_steps))
}
