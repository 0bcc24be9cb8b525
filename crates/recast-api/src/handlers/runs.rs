//! Run intake and reads.
//!
//! Intake is the boundary with the upload collaborator: it hands over an
//! opaque `input_ref` and (optionally) its own run id, gets back 202, and
//! the pipeline proceeds in the background. The run document is the
//! authoritative state for any reader, including late-joining progress
//! subscribers.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use recast_core::models::{Run, RunStatus};

use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 200;

/// Write endpoints require the collaborator's shared secret when one is
/// configured; ownership/authorization proper happens upstream.
pub(crate) fn require_service_key(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = &state.service_api_key else {
        return Ok(());
    };
    let presented = headers
        .get("x-service-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if presented != expected {
        return Err(ApiError::unauthorized("Missing or invalid service key"));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateRunRequest {
    /// Caller-assigned run id; generated when absent.
    pub run_id: Option<Uuid>,
    /// Opaque dereferenceable locator for the uploaded audio.
    pub input_ref: String,
}

#[derive(Debug, Serialize)]
pub struct CreateRunResponse {
    pub run_id: Uuid,
    pub status: RunStatus,
}

pub async fn create_run(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateRunRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_service_key(&state, &headers)?;

    let run = state
        .pipeline
        .create_run(request.run_id, &request.input_ref)
        .await?;

    // The pipeline owns the run from here; failures are recorded on the
    // run document, which is what callers poll.
    let pipeline = state.pipeline.clone();
    let run_id = run.id;
    tokio::spawn(async move {
        if let Err(e) = pipeline.execute(run_id).await {
            tracing::error!(run_id = %run_id, error = %e, "Pipeline execution failed");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateRunResponse {
            run_id: run.id,
            status: run.status,
        }),
    ))
}

pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Run>, ApiError> {
    let run = state
        .runs
        .get(id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found(format!("Run not found: {}", id)))?;
    Ok(Json(run))
}

#[derive(Debug, Deserialize)]
pub struct ListRunsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_runs(
    State(state): State<AppState>,
    Query(query): Query<ListRunsQuery>,
) -> Result<Json<Vec<Run>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            s.parse::<RunStatus>()
                .map_err(|e| ApiError::bad_request(e.to_string()))
        })
        .transpose()?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let offset = query.offset.unwrap_or(0).max(0);

    let runs = state
        .runs
        .list(status, limit, offset)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(runs))
}
