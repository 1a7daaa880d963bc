//! Render-job handlers mounted under the configured API prefix.

use axum::extract::{Path, Query, State};
use axum::Json;
use liveframe_models::{
    ClearHistoryResponse, JobId, RenderCreateRequest, RenderCreateResponse, RenderHistoryResponse, RenderStatusResponse,
};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn create_render(
    State(state): State<AppState>,
    Json(req): Json<RenderCreateRequest>,
) -> ApiResult<Json<RenderCreateResponse>> {
    if req.track_id.trim().is_empty() {
        return Err(ApiError::bad_request("track_id must not be empty"));
    }
    if req.album_art_url.trim().is_empty() {
        return Err(ApiError::bad_request("album_art_url must not be empty"));
    }
    let response = state.queue.create_job(req).await?;
    Ok(Json(response))
}

pub async fn get_render(State(state): State<AppState>, Path(job_id): Path<String>) -> ApiResult<Json<RenderStatusResponse>> {
    let status = state
        .queue
        .get_job(&JobId(job_id.clone()))
        .await
        .ok_or_else(|| ApiError::not_found(format!("job {job_id} not found")))?;
    Ok(Json(status))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub include_failed: bool,
}

const DEFAULT_HISTORY_LIMIT: u32 = 20;
const MAX_HISTORY_LIMIT: u32 = 50;

pub async fn list_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<RenderHistoryResponse<RenderStatusResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT);
    let items = state.queue.list_history(limit as usize, query.include_failed).await;
    Json(RenderHistoryResponse { items })
}

pub async fn clear_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<ClearHistoryResponse>> {
    let deleted_count = state.queue.clear_history(query.include_failed).await?;
    Ok(Json(ClearHistoryResponse { deleted_count }))
}
