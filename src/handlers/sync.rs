//! HTTP surface for the sync executor.
//!
//! POST /api/sync/runs                 — create a run
//! POST /api/sync/runs/{id}/start      — QUEUED→RUNNING
//! POST /api/sync/runs/{id}/step       — advance one chunk
//! POST /api/sync/runs/{id}/cancel     — cooperative cancel
//! GET  /api/sync/runs/{id}            — progress map + log tail
//!
//! Handlers are thin: every decision lives in the executor. Errors come
//! back as JSON, never as an unhandled failure.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::models::sync::{
    CreateRunRequest, RunCreatedResponse, RunStatusResponse, SyncErrorResponse,
};
use crate::sync::run::{StepReport, SyncError};
use crate::AppState;

fn error_response(err: SyncError) -> (StatusCode, Json<SyncErrorResponse>) {
    let status = match &err {
        SyncError::RunNotFound(_) => StatusCode::NOT_FOUND,
        SyncError::Invalid(_) => StatusCode::BAD_REQUEST,
        SyncError::InvalidTransition(_) => StatusCode::CONFLICT,
        SyncError::Credential(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SyncError::BadCursor(_) | SyncError::Store(_) | SyncError::Module(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("Sync endpoint error: {}", err);
    }

    (
        status,
        Json(SyncErrorResponse {
            error: err.to_string(),
        }),
    )
}

pub async fn create_run(
    State(state): State<AppState>,
    Json(request): Json<CreateRunRequest>,
) -> Result<(StatusCode, Json<RunCreatedResponse>), (StatusCode, Json<SyncErrorResponse>)> {
    let run = state
        .executor
        .create_run(
            request.tenant_id,
            request.mode,
            request.period_start,
            request.period_end,
            request.modules,
        )
        .await
        .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(RunCreatedResponse::from(&run))))
}

pub async fn start_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<StepReport>, (StatusCode, Json<SyncErrorResponse>)> {
    let report = state
        .executor
        .start_run(run_id)
        .await
        .map_err(error_response)?;

    Ok(Json(report))
}

pub async fn step_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<StepReport>, (StatusCode, Json<SyncErrorResponse>)> {
    let report = state.executor.step(run_id).await.map_err(error_response)?;
    Ok(Json(report))
}

pub async fn cancel_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<StepReport>, (StatusCode, Json<SyncErrorResponse>)> {
    let report = state
        .executor
        .cancel_run(run_id)
        .await
        .map_err(error_response)?;

    Ok(Json(report))
}

pub async fn run_status(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<RunStatusResponse>, (StatusCode, Json<SyncErrorResponse>)> {
    let (run, logs) = state
        .executor
        .run_status(run_id)
        .await
        .map_err(error_response)?;

    Ok(Json(RunStatusResponse::new(run, logs)))
}
