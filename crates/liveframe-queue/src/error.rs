//! Queue error types.

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

/// Errors the queue surfaces at the HTTP-facing layer. Render failures
/// (ComfyUI taxonomy codes) never reach here — the worker catches those and
/// turns them into a failed [`liveframe_models::Job`], not a `QueueError`.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("storage error: {0}")]
    Storage(#[from] liveframe_storage::StorageError),

    #[error("album art fetch failed: {0}")]
    AlbumArtFetchFailed(String),
}
