//! `/api/viral-ideas/*` (spec §6).

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::models::{ContentStrategy, ViralAnalysisRequest, ViralRequestStatus};
use crate::utils::{ApiError, ApiResult, Envelope};
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct QueueRequestBody {
    pub session_id: String,
    pub primary_username: String,
    #[serde(default)]
    pub selected_competitors: Vec<String>,
    pub content_strategy: ContentStrategy,
}

pub async fn queue_request(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<QueueRequestBody>,
) -> ApiResult<impl IntoResponse> {
    if let Some(existing) = state.store.request_for_username(&body.primary_username).await? {
        if matches!(existing.status, ViralRequestStatus::Pending | ViralRequestStatus::Processing) {
            return Ok(Envelope::new(existing));
        }
    }
    let request = state
        .store
        .create_viral_request(
            &body.session_id,
            &body.primary_username,
            &body.selected_competitors,
            &body.content_strategy,
        )
        .await?;
    Ok(Envelope::new(request))
}

pub async fn get_by_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let request = state
        .store
        .request_for_session_id(&session_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("no viral-ideas request for session '{session_id}'")))?;
    Ok(Envelope::new(request))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckExistingResponse {
    pub exists: bool,
    pub request: Option<ViralAnalysisRequest>,
}

pub async fn check_existing(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let request = state.store.request_for_username(&username).await?;
    Ok(Envelope::new(CheckExistingResponse { exists: request.is_some(), request }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StartResponse {
    pub started: bool,
    pub message: String,
}

/// Claims the request (PENDING -> PROCESSING) without running the pipeline
/// inline; the background workflow loop (spec §4.7) picks it up next poll.
pub async fn start(
    State(state): State<Arc<AppState>>,
    Path(queue_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let claimed = state.store.claim_viral_request(queue_id).await?;
    let (started, message) = match claimed {
        Some(_) => (true, "processing started".to_string()),
        None => (false, "request not found or already started".to_string()),
    };
    Ok(Envelope::new(StartResponse { started, message }))
}

/// Runs the request's next stage synchronously, for callers that want an
/// immediate result instead of waiting on the poll loop (spec §6).
pub async fn process(
    State(state): State<Arc<AppState>>,
    Path(queue_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    state.viral_engine.process_request(queue_id).await?;
    let request = state
        .store
        .get_viral_request(queue_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("viral-ideas request {queue_id} not found")))?;
    Ok(Envelope::new(request))
}
