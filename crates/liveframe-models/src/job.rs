//! The `Job` record and its identifier, status, and phase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error_code::ErrorCode;
use crate::render::RenderResult;
use crate::track::TrackInfo;

/// Unique identifier for a render job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coarse lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fine-grained worker stage. Each phase maps to a base progress value via
/// [`JobPhase::base_progress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Queued,
    Preparing,
    Prompting,
    Sampling,
    Assembling,
    Postprocessing,
    Done,
    Error,
}

/// `PHASE_PROGRESS` of the spec: the progress value a phase transition sets
/// unconditionally. Sampling updates refine the value within `sampling`'s
/// band (see `liveframe-queue::ProgressMapper`); every other phase sets this
/// value exactly.
pub const PHASE_PROGRESS: [(JobPhase, u8); 8] = [
    (JobPhase::Queued, 0),
    (JobPhase::Preparing, 10),
    (JobPhase::Prompting, 25),
    (JobPhase::Sampling, 70),
    (JobPhase::Assembling, 90),
    (JobPhase::Postprocessing, 95),
    (JobPhase::Done, 100),
    (JobPhase::Error, 100),
];

impl JobPhase {
    pub fn base_progress(&self) -> u8 {
        PHASE_PROGRESS
            .iter()
            .find(|(phase, _)| phase == self)
            .map(|(_, progress)| *progress)
            .expect("PHASE_PROGRESS covers every JobPhase variant")
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::Queued => "queued",
            JobPhase::Preparing => "preparing",
            JobPhase::Prompting => "prompting",
            JobPhase::Sampling => "sampling",
            JobPhase::Assembling => "assembling",
            JobPhase::Postprocessing => "postprocessing",
            JobPhase::Done => "done",
            JobPhase::Error => "error",
        }
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A render job: the on-disk/in-memory unit of work the rest of the system
/// mutates only through `liveframe-queue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    pub status: JobStatus,
    pub phase: JobPhase,
    pub progress: u8,
    pub track: TrackInfo,
    pub result: RenderResult,
    #[serde(default)]
    pub error_code: Option<ErrorCode>,
    #[serde(default)]
    pub error_message: Option<String>,
    /// The content/identity digest for this render (set as soon as it's computed,
    /// even before the job is known to be a cache hit or miss).
    pub cache_key: String,
    /// Filename of the staged input image. `None` on cache hits, where no
    /// input was ever staged.
    pub image_filename: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_progress_matches_spec_table() {
        assert_eq!(JobPhase::Queued.base_progress(), 0);
        assert_eq!(JobPhase::Preparing.base_progress(), 10);
        assert_eq!(JobPhase::Prompting.base_progress(), 25);
        assert_eq!(JobPhase::Sampling.base_progress(), 70);
        assert_eq!(JobPhase::Assembling.base_progress(), 90);
        assert_eq!(JobPhase::Postprocessing.base_progress(), 95);
        assert_eq!(JobPhase::Done.base_progress(), 100);
        assert_eq!(JobPhase::Error.base_progress(), 100);
    }

    #[test]
    fn job_id_round_trips_through_json() {
        let id = JobId::new();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: JobId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn job_status_terminal_states() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }
}
