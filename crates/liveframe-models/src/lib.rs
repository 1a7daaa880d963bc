//! Shared data models for the render job subsystem.
//!
//! This crate provides the Serde-serializable types shared by every other
//! crate in the workspace: the `Job` record and its id, the taxonomy of
//! render error codes, and the HTTP request/response bodies for the
//! `/api/v1/renders` surface.

pub mod error_code;
pub mod job;
pub mod render;
pub mod track;

pub use error_code::ErrorCode;
pub use job::{Job, JobId, JobPhase, JobStatus, PHASE_PROGRESS};
pub use render::{
    ClearHistoryResponse, RenderCreateRequest, RenderCreateResponse, RenderError,
    RenderHistoryResponse, RenderResult, RenderStatusResponse,
};
pub use track::{RenderTrackInfo, TrackInfo};
