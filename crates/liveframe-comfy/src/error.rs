//! ComfyUI client error types.

use liveframe_models::ErrorCode;
use thiserror::Error;

pub type ComfyResult<T> = Result<T, ComfyError>;

/// A render failure, tagged with the stable taxonomy code surfaced as
/// `Job.error.code`.
#[derive(Debug, Error, Clone)]
#[error("{code}: {message}")]
pub struct ComfyError {
    pub code: ErrorCode,
    pub message: String,
}

impl ComfyError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn workflow_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ComfyWorkflowInvalid, message)
    }

    pub fn http_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ComfyHttpError, message)
    }

    pub fn timeout(timeout_sec: u64) -> Self {
        Self::new(ErrorCode::ComfyTimeout, format!("prompt timed out in {timeout_sec}s"))
    }

    pub fn exec_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ComfyExecError, message)
    }

    pub fn output_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::OutputNotFound, message)
    }

    pub fn download_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DownloadFailed, message)
    }
}

impl From<liveframe_media::MediaError> for ComfyError {
    fn from(err: liveframe_media::MediaError) -> Self {
        ComfyError::download_failed(err.to_string())
    }
}
