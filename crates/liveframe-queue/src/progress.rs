//! `ProgressMapper`: the pure, deterministic mapping from phase transitions
//! and sampling ratios to a job's `status`/`phase`/`progress` triple.
//!
//! Every function here takes `&mut Job` and only ever moves `progress`
//! forward, per invariant 1 of the data model. None of these functions touch
//! the filesystem or the job map directly — `JobStore::mutate` is the only
//! caller, so every call is paired with a write-through.

use chrono::Utc;
use liveframe_models::{ErrorCode, Job, JobPhase, JobStatus, RenderResult};

/// Lower bound of the `sampling` phase's progress band.
const SAMPLING_FLOOR: u8 = 70;
/// Upper bound of the `sampling` phase's progress band (`done`'s floor minus one).
const SAMPLING_CEIL: u8 = 89;

/// Apply a phase transition: set `phase`, reset `progress` to the phase's
/// base value, and mark the job `processing` (unless the phase is `queued`
/// itself, which is the job's pre-worker resting state).
pub fn apply_phase(job: &mut Job, phase: JobPhase) {
    job.phase = phase;
    job.progress = phase.base_progress();
    job.updated_at = Utc::now();
    if phase != JobPhase::Queued {
        job.status = JobStatus::Processing;
    }
}

/// Apply a sampling-ratio update (`ratio` in `[0,1]`). Only takes effect
/// while the job is genuinely in the `sampling` phase and not yet terminal,
/// and only when the mapped progress value is a strict increase — this is
/// what keeps a late, out-of-order sampling event from clobbering a phase
/// transition that has since moved progress further along.
pub fn apply_sampling(job: &mut Job, ratio: f64) {
    if job.phase != JobPhase::Sampling {
        return;
    }
    if !matches!(job.status, JobStatus::Processing | JobStatus::Queued) {
        return;
    }

    let ratio = ratio.clamp(0.0, 1.0);
    let span = (SAMPLING_CEIL - SAMPLING_FLOOR) as f64;
    let mapped = (SAMPLING_FLOOR as f64 + (span * ratio).round()) as u8;

    if mapped <= job.progress {
        return;
    }

    job.progress = mapped;
    job.status = JobStatus::Processing;
    job.updated_at = Utc::now();
}

/// Mark the job `completed`, populate its result, and clear any error.
pub fn apply_completion(job: &mut Job, result: RenderResult) {
    job.status = JobStatus::Completed;
    job.phase = JobPhase::Done;
    job.progress = 100;
    job.result = result;
    job.error_code = None;
    job.error_message = None;
    job.updated_at = Utc::now();
}

/// Mark the job `failed` with the given taxonomy code and message.
pub fn apply_failure(job: &mut Job, code: ErrorCode, message: impl Into<String>) {
    job.status = JobStatus::Failed;
    job.phase = JobPhase::Error;
    job.progress = 100;
    job.error_code = Some(code);
    job.error_message = Some(message.into());
    job.updated_at = Utc::now();
}

#[cfg(test)]
mod tests {
    use super::*;
    use liveframe_models::{JobId, TrackInfo};

    fn job() -> Job {
        let now = Utc::now();
        Job {
            job_id: JobId::new(),
            status: JobStatus::Queued,
            phase: JobPhase::Queued,
            progress: 0,
            track: TrackInfo {
                track_id: "t".to_string(),
                album_id: None,
                title: "Song".to_string(),
                artist: "Artist".to_string(),
                album_art_url: "https://example.com/a.jpg".to_string(),
                youtube_video_id: None,
            },
            result: RenderResult::default(),
            error_code: None,
            error_message: None,
            cache_key: "key".to_string(),
            image_filename: Some("album_key.jpg".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn phase_sequence_is_monotonic() {
        let mut j = job();
        let mut last = 0u8;
        for phase in [
            JobPhase::Preparing,
            JobPhase::Prompting,
            JobPhase::Sampling,
            JobPhase::Assembling,
            JobPhase::Postprocessing,
            JobPhase::Done,
        ] {
            apply_phase(&mut j, phase);
            assert!(j.progress >= last);
            last = j.progress;
        }
    }

    #[test]
    fn phase_queued_does_not_set_processing() {
        let mut j = job();
        j.status = JobStatus::Queued;
        apply_phase(&mut j, JobPhase::Queued);
        assert_eq!(j.status, JobStatus::Queued);
    }

    /// Mirrors scenario S3: ratios 0.5, 0.1, 0.9, 1.0 delivered in sequence
    /// from a fresh `sampling` phase at progress=70. 0.1 maps below the
    /// current progress and is a no-op; the sequence ends at 87, then 89.
    #[test]
    fn sampling_monotonic_within_band() {
        let mut j = job();
        apply_phase(&mut j, JobPhase::Sampling);
        assert_eq!(j.progress, 70);

        apply_sampling(&mut j, 0.5);
        assert_eq!(j.progress, 80);

        let before = j.progress;
        apply_sampling(&mut j, 0.1);
        assert_eq!(j.progress, before);

        apply_sampling(&mut j, 0.9);
        assert_eq!(j.progress, 87);

        apply_sampling(&mut j, 1.0);
        assert_eq!(j.progress, 89);
    }

    #[test]
    fn sampling_ignored_outside_sampling_phase() {
        let mut j = job();
        apply_phase(&mut j, JobPhase::Prompting);
        let before = j.progress;
        apply_sampling(&mut j, 0.9);
        assert_eq!(j.progress, before);
    }

    #[test]
    fn completion_sets_terminal_state() {
        let mut j = job();
        apply_phase(&mut j, JobPhase::Sampling);
        apply_completion(
            &mut j,
            RenderResult {
                video_url: Some("/static/renders/k/video.mp4".to_string()),
                thumbnail_url: Some("/static/renders/k/thumb.jpg".to_string()),
                cache_key: Some("k".to_string()),
            },
        );
        assert_eq!(j.status, JobStatus::Completed);
        assert_eq!(j.phase, JobPhase::Done);
        assert_eq!(j.progress, 100);
        assert!(j.error_code.is_none());
    }

    #[test]
    fn failure_sets_error_terminal_state() {
        let mut j = job();
        apply_phase(&mut j, JobPhase::Prompting);
        apply_failure(&mut j, ErrorCode::ComfyTimeout, "timed out");
        assert_eq!(j.status, JobStatus::Failed);
        assert_eq!(j.phase, JobPhase::Error);
        assert_eq!(j.progress, 100);
        assert_eq!(j.error_code, Some(ErrorCode::ComfyTimeout));
        assert_eq!(j.error_message.as_deref(), Some("timed out"));
    }
}
