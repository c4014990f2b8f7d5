//! Processing step routes
//!
//! Illegal transitions answer 409 and leave the step untouched.

use axum::{
    extract::{Path, State},
    routing::{patch, post},
    Json, Router,
};
use seqtrack_common::models::{
    CompleteStepRequest, ProcessingStep, StartStepRequest, StepId, StepNotesRequest, StepPatch,
};
use seqtrack_common::SampleStore;

use crate::{ApiResult, AppState};

/// POST /steps/:id/start
pub async fn start_step(
    State(state): State<AppState>,
    Path(id): Path<StepId>,
    Json(body): Json<StartStepRequest>,
) -> ApiResult<Json<ProcessingStep>> {
    Ok(Json(state.store.start_processing_step(id, body.assigned_to).await?))
}

/// POST /steps/:id/complete
pub async fn complete_step(
    State(state): State<AppState>,
    Path(id): Path<StepId>,
    Json(body): Json<CompleteStepRequest>,
) -> ApiResult<Json<ProcessingStep>> {
    let step = state
        .store
        .complete_processing_step(id, body.notes, body.results_data)
        .await?;
    Ok(Json(step))
}

/// POST /steps/:id/fail
pub async fn fail_step(
    State(state): State<AppState>,
    Path(id): Path<StepId>,
    Json(body): Json<StepNotesRequest>,
) -> ApiResult<Json<ProcessingStep>> {
    Ok(Json(state.store.fail_processing_step(id, body.notes).await?))
}

/// POST /steps/:id/skip
pub async fn skip_step(
    State(state): State<AppState>,
    Path(id): Path<StepId>,
    Json(body): Json<StepNotesRequest>,
) -> ApiResult<Json<ProcessingStep>> {
    Ok(Json(state.store.skip_processing_step(id, body.notes).await?))
}

/// PATCH /steps/:id
pub async fn update_step(
    State(state): State<AppState>,
    Path(id): Path<StepId>,
    Json(body): Json<StepPatch>,
) -> ApiResult<Json<ProcessingStep>> {
    Ok(Json(state.store.update_processing_step(id, &body).await?))
}

pub fn step_routes() -> Router<AppState> {
    Router::new()
        .route("/steps/:id", patch(update_step))
        .route("/steps/:id/start", post(start_step))
        .route("/steps/:id/complete", post(complete_step))
        .route("/steps/:id/fail", post(fail_step))
        .route("/steps/:id/skip", post(skip_step))
}
