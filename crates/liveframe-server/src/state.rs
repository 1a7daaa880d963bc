//! Shared application state.

use std::sync::Arc;

use liveframe_comfy::{ComfyClient, ComfyConfig};
use liveframe_queue::{QueueConfig, QueueService};
use liveframe_storage::Storage;

use crate::config::Config;
use crate::error::ApiResult;

/// Shared application state, cloned cheaply behind `Arc`s into every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub storage: Arc<Storage>,
    pub queue: Arc<QueueService>,
}

impl AppState {
    /// Build the storage layer, the ComfyUI client, and the queue service
    /// (running its crash-recovery sweep), but does not start the worker.
    pub async fn new(config: Config) -> ApiResult<Self> {
        let storage = Arc::new(
            Storage::new(&config.data_dir, &config.comfy_input_dir)
                .map_err(|e| crate::error::ApiError::Internal(e.to_string()))?,
        );

        let comfy = Arc::new(
            ComfyClient::new(ComfyConfig {
                base_url: config.comfy_base_url.clone(),
                workflow_path: config.comfy_workflow_path.clone(),
                render_timeout_sec: config.render_timeout_sec,
            })
            .map_err(|e| crate::error::ApiError::Internal(e.to_string()))?,
        );

        let queue_config = QueueConfig {
            workflow_version: config.workflow_version.clone(),
            render_preset: config.render_preset.clone(),
            estimated_job_sec: config.estimated_job_sec,
        };
        let queue = QueueService::new(Arc::clone(&storage), comfy, queue_config).await?;

        Ok(Self { config, storage, queue })
    }
}
