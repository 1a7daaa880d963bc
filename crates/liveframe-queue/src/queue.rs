//! `QueueService`: the public render-job API, the FIFO pending queue, and
//! the single-worker loop that drives jobs through `liveframe-comfy`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use liveframe_comfy::{ComfyClient, RenderEvent};
use liveframe_models::{
    ErrorCode, Job, JobId, JobPhase, JobStatus, RenderCreateRequest, RenderCreateResponse, RenderError,
    RenderResult, RenderStatusResponse, RenderTrackInfo, TrackInfo,
};
use liveframe_storage::Storage;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::progress;
use crate::store::JobStore;

/// Tunables the worker and `create_job` need beyond storage/comfy themselves.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub workflow_version: String,
    pub render_preset: String,
    pub estimated_job_sec: u64,
}

/// Owns the job map (via [`JobStore`]), the FIFO pending queue, and the
/// single worker loop. Constructed once per process and shared behind an
/// `Arc` with the HTTP layer.
pub struct QueueService {
    store: Arc<JobStore>,
    storage: Arc<Storage>,
    comfy: Arc<ComfyClient>,
    config: QueueConfig,
    pending: Mutex<VecDeque<JobId>>,
    notify: tokio::sync::Notify,
}

/// The metadata document written to `<renders_dir>/<cache_key>/meta.json` on
/// a successful render. See the storage design notes.
#[derive(Debug, Serialize)]
struct RenderMeta {
    track: TrackInfo,
    video_path: String,
    thumb_path: String,
    elapsed_sec: f64,
    workflow_version: String,
    render_preset: String,
    created_at: DateTime<Utc>,
}

impl QueueService {
    /// Construct the service and run the crash-recovery sweep. Does not
    /// start the worker loop — call [`QueueService::spawn_worker`] for that.
    pub async fn new(storage: Arc<Storage>, comfy: Arc<ComfyClient>, config: QueueConfig) -> QueueResult<Arc<Self>> {
        let store = Arc::new(JobStore::new(Arc::clone(&storage)));
        store.recover().await?;

        Ok(Arc::new(Self {
            store,
            storage,
            comfy,
            config,
            pending: Mutex::new(VecDeque::new()),
            notify: tokio::sync::Notify::new(),
        }))
    }

    /// Spawn the dedicated worker task. The returned handle is owned by the
    /// caller (the server binary), which aborts and awaits it on shutdown.
    pub fn spawn_worker(self: &Arc<Self>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move { service.run_worker().await })
    }

    async fn run_worker(self: Arc<Self>) {
        loop {
            let job_id = self.dequeue().await;
            if let Err(e) = self.process_job(&job_id).await {
                error!(job_id = %job_id, error = %e, "worker failed to process job, acking slot anyway");
            }
        }
    }

    async fn enqueue(&self, job_id: JobId) {
        self.pending.lock().await.push_back(job_id);
        self.notify.notify_one();
    }

    async fn dequeue(&self) -> JobId {
        loop {
            if let Some(job_id) = self.pending.lock().await.pop_front() {
                return job_id;
            }
            self.notify.notified().await;
        }
    }

    /// 1-based position in the pending FIFO, or `None` if not queued.
    async fn queue_position(&self, job_id: &JobId) -> Option<u32> {
        self.pending
            .lock()
            .await
            .iter()
            .position(|id| id == job_id)
            .map(|index| index as u32 + 1)
    }

    // ------------------------------------------------------------------
    // Public operations
    // ------------------------------------------------------------------

    pub async fn create_job(&self, req: RenderCreateRequest) -> QueueResult<RenderCreateResponse> {
        let track = TrackInfo {
            track_id: req.track_id,
            album_id: req.album_id.clone(),
            title: req.title,
            artist: req.artist,
            album_art_url: req.album_art_url,
            youtube_video_id: req.youtube_video_id,
        };

        // Step 1: fetch album art bytes.
        let (bytes, ext) = self
            .storage
            .download_album_art(&track.album_art_url)
            .await
            .map_err(|e| QueueError::AlbumArtFetchFailed(e.to_string()))?;
        // Step 2: compute the cache key (folding in the identity branch when
        // `album_id` is present).
        let cache_key = self.storage.compute_cache_key(
            &bytes,
            &self.config.workflow_version,
            &self.config.render_preset,
            track.album_id.as_deref(),
        );

        // Step 3: cache hit -> synthetic completed job.
        if self.storage.cache_exists(&cache_key) {
            return self.complete_cache_hit(track, cache_key).await;
        }

        // Step 4: cache miss. Stage the input image and enqueue.
        let image_filename = self.storage.persist_album_art(&bytes, &cache_key, &ext)?;
        let now = Utc::now();
        let job = Job {
            job_id: JobId::new(),
            status: JobStatus::Queued,
            phase: JobPhase::Queued,
            progress: 0,
            track,
            result: RenderResult::default(),
            error_code: None,
            error_message: None,
            cache_key,
            image_filename: Some(image_filename),
            created_at: now,
            updated_at: now,
        };

        let job_id = job.job_id.clone();
        self.store.upsert(job).await?;
        self.enqueue(job_id.clone()).await;

        Ok(RenderCreateResponse {
            job_id: job_id.to_string(),
            status: JobStatus::Queued,
            cache_hit: false,
            poll_url: format!("/api/v1/renders/{job_id}"),
        })
    }

    async fn complete_cache_hit(&self, track: TrackInfo, cache_key: String) -> QueueResult<RenderCreateResponse> {
        let (video_url, thumbnail_url) = self.storage.result_urls(&cache_key);
        let now = Utc::now();
        let job = Job {
            job_id: JobId::new(),
            status: JobStatus::Completed,
            phase: JobPhase::Done,
            progress: 100,
            track,
            result: RenderResult {
                video_url: Some(video_url),
                thumbnail_url: Some(thumbnail_url),
                cache_key: Some(cache_key.clone()),
            },
            error_code: None,
            error_message: None,
            cache_key,
            image_filename: None,
            created_at: now,
            updated_at: now,
        };
        let job_id = job.job_id.clone();
        self.store.upsert(job).await?;

        Ok(RenderCreateResponse {
            job_id: job_id.to_string(),
            status: JobStatus::Completed,
            cache_hit: true,
            poll_url: format!("/api/v1/renders/{job_id}"),
        })
    }

    pub async fn get_job(&self, job_id: &JobId) -> Option<RenderStatusResponse> {
        let job = self.store.get(job_id).await?;
        let queue_position = if job.status == JobStatus::Queued {
            self.queue_position(job_id).await.unwrap_or(1)
        } else {
            0
        };
        let estimated_wait_sec = if job.status == JobStatus::Queued {
            queue_position as u64 * self.config.estimated_job_sec
        } else {
            0
        };
        Some(to_status_response(&job, queue_position, estimated_wait_sec))
    }

    pub async fn list_history(&self, limit: usize, include_failed: bool) -> Vec<RenderStatusResponse> {
        let mut jobs: Vec<Job> = self
            .store
            .list()
            .await
            .into_iter()
            .filter(|job| job.status == JobStatus::Completed || (include_failed && job.status == JobStatus::Failed))
            .collect();

        jobs.sort_by(|a, b| (b.updated_at, b.created_at).cmp(&(a.updated_at, a.created_at)));
        jobs.truncate(limit);

        jobs.iter()
            .map(|job| {
                let mut response = to_status_response(job, 0, 0);
                if let Some(image_filename) = &job.image_filename {
                    response.track.album_art_url = self.storage.input_image_url(image_filename);
                }
                response
            })
            .collect()
    }

    pub async fn clear_history(&self, include_failed: bool) -> QueueResult<usize> {
        let doomed: Vec<JobId> = self
            .store
            .list()
            .await
            .into_iter()
            .filter(|job| job.status == JobStatus::Completed || (include_failed && job.status == JobStatus::Failed))
            .map(|job| job.job_id)
            .collect();

        let count = doomed.len();
        for job_id in doomed {
            self.store.delete(&job_id).await?;
        }
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Worker
    // ------------------------------------------------------------------

    async fn process_job(&self, job_id: &JobId) -> QueueResult<()> {
        let Some(job) = self.store.get(job_id).await else {
            warn!(job_id = %job_id, "dequeued job vanished from store before processing");
            return Ok(());
        };

        info!(job_id = %job_id, cache_key = %job.cache_key, "worker picked up job");
        self.store.mutate(job_id, |job| progress::apply_phase(job, JobPhase::Preparing)).await?;

        let Some(image_filename) = job.image_filename.clone() else {
            self.fail(job_id, ErrorCode::OutputNotFound, "queued job has no staged input image").await?;
            return Ok(());
        };

        let render_dir = match self.storage.ensure_render_dir(&job.cache_key) {
            Ok(dir) => dir,
            Err(e) => {
                self.fail(job_id, ErrorCode::DownloadFailed, e.to_string()).await?;
                return Ok(());
            }
        };

        let (tx, mut rx) = mpsc::channel::<RenderEvent>(32);
        let store = Arc::clone(&self.store);
        let consumer_job_id = job_id.clone();
        let consumer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let result = match event {
                    RenderEvent::Phase(phase) => {
                        store.mutate(&consumer_job_id, |job| progress::apply_phase(job, phase)).await
                    }
                    RenderEvent::Sampling(ratio) => {
                        store.mutate(&consumer_job_id, |job| progress::apply_sampling(job, ratio)).await
                    }
                };
                if let Err(e) = result {
                    warn!(job_id = %consumer_job_id, error = %e, "failed to persist progress update");
                }
            }
        });

        let started = Instant::now();
        let render_result = self.comfy.render(&image_filename, &job.cache_key, &render_dir, tx).await;
        let _ = consumer.await;

        match render_result {
            Ok((video_path, thumb_path)) => {
                let meta = RenderMeta {
                    track: job.track.clone(),
                    video_path: video_path.to_string_lossy().to_string(),
                    thumb_path: thumb_path.to_string_lossy().to_string(),
                    elapsed_sec: started.elapsed().as_secs_f64(),
                    workflow_version: self.config.workflow_version.clone(),
                    render_preset: self.config.render_preset.clone(),
                    created_at: Utc::now(),
                };
                if let Err(e) = self.storage.write_meta(&job.cache_key, &meta) {
                    self.fail(job_id, ErrorCode::DownloadFailed, e.to_string()).await?;
                    return Ok(());
                }

                let (video_url, thumbnail_url) = self.storage.result_urls(&job.cache_key);
                self.store
                    .mutate(job_id, |job| {
                        progress::apply_completion(
                            job,
                            RenderResult {
                                video_url: Some(video_url),
                                thumbnail_url: Some(thumbnail_url),
                                cache_key: Some(job.cache_key.clone()),
                            },
                        )
                    })
                    .await?;
                info!(job_id = %job_id, "job completed");
            }
            Err(comfy_error) => {
                self.fail(job_id, comfy_error.code, comfy_error.message).await?;
            }
        }

        Ok(())
    }

    async fn fail(&self, job_id: &JobId, code: ErrorCode, message: impl Into<String>) -> QueueResult<()> {
        let message = message.into();
        warn!(job_id = %job_id, code = %code, message = %message, "job failed");
        self.store.mutate(job_id, |job| progress::apply_failure(job, code, message)).await?;
        Ok(())
    }
}

fn to_status_response(job: &Job, queue_position: u32, estimated_wait_sec: u64) -> RenderStatusResponse {
    RenderStatusResponse {
        job_id: job.job_id.to_string(),
        status: job.status,
        phase: job.phase,
        progress: job.progress,
        queue_position,
        estimated_wait_sec,
        track: RenderTrackInfo::from(&job.track),
        result: job.result.clone(),
        error: RenderError {
            code: job.error_code,
            message: job.error_message.clone(),
        },
    }
}
