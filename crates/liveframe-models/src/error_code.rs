//! The render error taxonomy surfaced as `Job.error.code`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable error codes a failed job can carry.
///
/// These are the only codes the core assigns; they are deliberately not a
/// general-purpose application error type (see `liveframe-server::ApiError`
/// for HTTP-layer errors unrelated to a specific job).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The backend rejected the submitted prompt (`node_errors` in the response).
    ComfyWorkflowInvalid,
    /// Transport failure talking to the backend, or an otherwise unclassified exception.
    ComfyHttpError,
    /// The render history never materialized within `render_timeout_sec`.
    ComfyTimeout,
    /// The backend reported `status_str == "error"`.
    ComfyExecError,
    /// No candidate video/gif/image was found in the backend's history outputs.
    OutputNotFound,
    /// Output download, transcode, or thumbnail extraction failed.
    DownloadFailed,
    /// Assigned at startup to jobs that were `queued`/`processing` when the process died.
    RestartInterrupted,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ComfyWorkflowInvalid => "COMFY_WORKFLOW_INVALID",
            ErrorCode::ComfyHttpError => "COMFY_HTTP_ERROR",
            ErrorCode::ComfyTimeout => "COMFY_TIMEOUT",
            ErrorCode::ComfyExecError => "COMFY_EXEC_ERROR",
            ErrorCode::OutputNotFound => "OUTPUT_NOT_FOUND",
            ErrorCode::DownloadFailed => "DOWNLOAD_FAILED",
            ErrorCode::RestartInterrupted => "RESTART_INTERRUPTED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
