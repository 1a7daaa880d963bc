//! HTTP request/response bodies for the `/api/v1/renders` surface.

use serde::{Deserialize, Serialize};

use crate::error_code::ErrorCode;
use crate::job::{JobPhase, JobStatus};
use crate::track::RenderTrackInfo;

/// `POST /renders` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderCreateRequest {
    pub track_id: String,
    #[serde(default)]
    pub album_id: Option<String>,
    pub title: String,
    pub artist: String,
    pub album_art_url: String,
    #[serde(default)]
    pub youtube_video_id: Option<String>,
}

/// `POST /renders` response body.
#[derive(Debug, Clone, Serialize)]
pub struct RenderCreateResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub cache_hit: bool,
    pub poll_url: String,
}

/// Result artifacts of a completed render.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
}

/// Error detail of a failed render.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RenderError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `GET /renders/{job_id}` response body.
#[derive(Debug, Clone, Serialize)]
pub struct RenderStatusResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub phase: JobPhase,
    pub progress: u8,
    pub queue_position: u32,
    pub estimated_wait_sec: u64,
    pub track: RenderTrackInfo,
    pub result: RenderResult,
    pub error: RenderError,
}

/// `GET /renders/history` response body.
#[derive(Debug, Clone, Serialize)]
pub struct RenderHistoryResponse<T> {
    pub items: Vec<T>,
}

/// `DELETE /renders/history` response body.
#[derive(Debug, Clone, Serialize)]
pub struct ClearHistoryResponse {
    pub deleted_count: usize,
}
