//! `JobStore`: the in-memory job map plus its write-through JSON mirror, and
//! the startup crash-recovery sweep.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use liveframe_models::{ErrorCode, Job, JobId, JobPhase, JobStatus};
use liveframe_storage::Storage;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::QueueResult;

/// Durable, write-through store for [`Job`] records.
///
/// Every mutation goes through [`JobStore::mutate`] (or [`JobStore::upsert`]),
/// which writes the JSON document *before* releasing the lock guarding the
/// in-memory map — satisfying invariant 6 of the data model (no caller ever
/// observes a job whose on-disk mirror lags its in-memory state).
pub struct JobStore {
    storage: Arc<Storage>,
    jobs: Mutex<HashMap<JobId, Job>>,
}

impl JobStore {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Load every job document from disk. Any job whose on-disk `status` is
    /// `queued` or `processing` is rewritten to `failed`/`RESTART_INTERRUPTED`
    /// before being admitted to the in-memory map — it is never re-enqueued.
    /// Returns the ids of jobs recovered this way.
    pub async fn recover(&self) -> QueueResult<Vec<JobId>> {
        let loaded: Vec<Job> = self.storage.load_jobs()?;
        let mut recovered = Vec::new();
        let mut jobs = self.jobs.lock().await;

        for mut job in loaded {
            if matches!(job.status, JobStatus::Queued | JobStatus::Processing) {
                job.status = JobStatus::Failed;
                job.phase = JobPhase::Error;
                job.progress = 100;
                job.error_code = Some(ErrorCode::RestartInterrupted);
                job.error_message = Some("job was interrupted by server restart".to_string());
                job.updated_at = Utc::now();
                self.storage.write_job(job.job_id.as_str(), &job)?;
                warn!(job_id = %job.job_id, "recovered interrupted job as failed");
                recovered.push(job.job_id.clone());
            }
            jobs.insert(job.job_id.clone(), job);
        }

        info!(total = jobs.len(), recovered = recovered.len(), "job store recovery complete");
        Ok(recovered)
    }

    /// Insert or overwrite a job, writing its document first.
    pub async fn upsert(&self, job: Job) -> QueueResult<()> {
        self.storage.write_job(job.job_id.as_str(), &job)?;
        self.jobs.lock().await.insert(job.job_id.clone(), job);
        Ok(())
    }

    pub async fn get(&self, job_id: &JobId) -> Option<Job> {
        self.jobs.lock().await.get(job_id).cloned()
    }

    pub async fn list(&self) -> Vec<Job> {
        self.jobs.lock().await.values().cloned().collect()
    }

    /// Apply `f` to the job's in-memory state, write the updated document,
    /// and return the new state. No-op (returns `None`) if the job is gone.
    pub async fn mutate<F>(&self, job_id: &JobId, f: F) -> QueueResult<Option<Job>>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.jobs.lock().await;
        let Some(job) = jobs.get_mut(job_id) else {
            return Ok(None);
        };
        f(job);
        self.storage.write_job(job_id.as_str(), job)?;
        Ok(Some(job.clone()))
    }

    /// Remove a job from the map and delete its document. No-op if absent.
    pub async fn delete(&self, job_id: &JobId) -> QueueResult<()> {
        self.storage.delete_job(job_id.as_str())?;
        self.jobs.lock().await.remove(job_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liveframe_models::{RenderResult, TrackInfo};
    use tempfile::TempDir;

    fn track() -> TrackInfo {
        TrackInfo {
            track_id: "t1".to_string(),
            album_id: None,
            title: "Song".to_string(),
            artist: "Artist".to_string(),
            album_art_url: "https://example.com/art.jpg".to_string(),
            youtube_video_id: None,
        }
    }

    fn job(status: JobStatus, phase: JobPhase) -> Job {
        let now = Utc::now();
        Job {
            job_id: JobId::new(),
            status,
            phase,
            progress: 0,
            track: track(),
            result: RenderResult::default(),
            error_code: None,
            error_message: None,
            cache_key: "key".to_string(),
            image_filename: Some("album_key.jpg".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    fn storage() -> (Arc<Storage>, TempDir, TempDir) {
        let data = TempDir::new().unwrap();
        let comfy = TempDir::new().unwrap();
        (Arc::new(Storage::new(data.path(), comfy.path()).unwrap()), data, comfy)
    }

    #[tokio::test]
    async fn recovery_fails_queued_and_processing_jobs() {
        let (storage, _data, _comfy) = storage();
        let queued = job(JobStatus::Queued, JobPhase::Queued);
        let processing = job(JobStatus::Processing, JobPhase::Sampling);
        let completed = job(JobStatus::Completed, JobPhase::Done);

        storage.write_job(queued.job_id.as_str(), &queued).unwrap();
        storage.write_job(processing.job_id.as_str(), &processing).unwrap();
        storage.write_job(completed.job_id.as_str(), &completed).unwrap();

        let store = JobStore::new(storage);
        let recovered = store.recover().await.unwrap();
        assert_eq!(recovered.len(), 2);

        let queued_after = store.get(&queued.job_id).await.unwrap();
        assert_eq!(queued_after.status, JobStatus::Failed);
        assert_eq!(queued_after.phase, JobPhase::Error);
        assert_eq!(queued_after.progress, 100);
        assert_eq!(queued_after.error_code, Some(ErrorCode::RestartInterrupted));

        let completed_after = store.get(&completed.job_id).await.unwrap();
        assert_eq!(completed_after.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn mutate_writes_through_before_returning() {
        let (storage, _data, _comfy) = storage();
        let store = JobStore::new(storage.clone());
        let j = job(JobStatus::Queued, JobPhase::Queued);
        store.upsert(j.clone()).await.unwrap();

        store
            .mutate(&j.job_id, |job| {
                job.progress = 50;
            })
            .await
            .unwrap();

        let loaded: Vec<Job> = storage.load_jobs().unwrap();
        let on_disk = loaded.into_iter().find(|job| job.job_id == j.job_id).unwrap();
        assert_eq!(on_disk.progress, 50);
    }

    #[tokio::test]
    async fn delete_removes_from_map_and_disk() {
        let (storage, _data, _comfy) = storage();
        let store = JobStore::new(storage.clone());
        let j = job(JobStatus::Completed, JobPhase::Done);
        store.upsert(j.clone()).await.unwrap();

        store.delete(&j.job_id).await.unwrap();
        assert!(store.get(&j.job_id).await.is_none());
        let loaded: Vec<Job> = storage.load_jobs().unwrap();
        assert!(loaded.is_empty());
    }
}
