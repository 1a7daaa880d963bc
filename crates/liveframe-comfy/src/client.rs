//! The ComfyUI HTTP+WebSocket client: submits a prompt, streams progress,
//! polls history, and downloads/normalizes the output artifacts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use liveframe_models::JobPhase;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::error::{ComfyError, ComfyResult};
use crate::history::{extract_output_file, HistoryEntry};
use crate::types::ProgressEvent;
use crate::workflow::WorkflowTemplate;

/// Control-plane request timeout (prompt submission, history polling).
const CONTROL_TIMEOUT: Duration = Duration::from_secs(20);
/// Output-download request timeout.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(90);
/// Interval between `/history` polls while waiting for a render to finish.
const HISTORY_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Configuration for talking to a ComfyUI backend.
#[derive(Debug, Clone)]
pub struct ComfyConfig {
    pub base_url: String,
    pub workflow_path: PathBuf,
    pub render_timeout_sec: u64,
}

/// An update emitted while `render` runs: either a coarse phase transition
/// or a refined sampling-progress ratio. The queue's worker loop turns these
/// into `JobStore` mutations via `ProgressMapper`.
#[derive(Debug, Clone)]
pub enum RenderEvent {
    Phase(JobPhase),
    Sampling(f64),
}

/// HTTP+WebSocket client for a ComfyUI backend.
pub struct ComfyClient {
    http: reqwest::Client,
    download_http: reqwest::Client,
    config: ComfyConfig,
    workflow: WorkflowTemplate,
}

impl ComfyClient {
    pub fn new(config: ComfyConfig) -> ComfyResult<Self> {
        let workflow = WorkflowTemplate::load(&config.workflow_path)?;
        let http = reqwest::Client::builder()
            .timeout(CONTROL_TIMEOUT)
            .build()
            .map_err(|e| ComfyError::http_error(e.to_string()))?;
        let download_http = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|e| ComfyError::http_error(e.to_string()))?;
        Ok(Self {
            http,
            download_http,
            config,
            workflow,
        })
    }

    /// Render `image_filename` into `render_dir/{video.mp4,thumb.jpg}`,
    /// streaming phase and sampling updates over `events`.
    pub async fn render(
        &self,
        image_filename: &str,
        cache_key: &str,
        render_dir: &Path,
        events: mpsc::Sender<RenderEvent>,
    ) -> ComfyResult<(PathBuf, PathBuf)> {
        let _ = events.send(RenderEvent::Phase(JobPhase::Prompting)).await;

        let prompt = self.workflow.build_prompt(image_filename, cache_key)?;
        let client_id = Uuid::new_v4().simple().to_string();

        let (prompt_id_tx, prompt_id_rx) = watch::channel(None::<String>);
        let sampling_handle = {
            let ws_url = self.build_ws_url(&client_id)?;
            let events = events.clone();
            let prompt_id_rx = prompt_id_rx.clone();
            tokio::spawn(async move {
                stream_sampling_progress(ws_url, prompt_id_rx, events).await;
            })
        };

        let history_result = self.submit_and_wait(prompt, &client_id, prompt_id_tx, &events).await;

        sampling_handle.abort();
        let _ = sampling_handle.await;

        let history = history_result?;

        let _ = events.send(RenderEvent::Phase(JobPhase::Assembling)).await;
        let output_ref = extract_output_file(&history)?;
        let source_name = Path::new(&output_ref.filename)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "output.mp4".to_string());
        let downloaded_path = render_dir.join(&source_name);
        self.download_output(&output_ref, &downloaded_path).await?;

        let _ = events.send(RenderEvent::Phase(JobPhase::Postprocessing)).await;
        let final_video_path = render_dir.join("video.mp4");
        self.ensure_mp4(&downloaded_path, &final_video_path).await?;
        let thumb_path = render_dir.join("thumb.jpg");
        liveframe_media::generate_thumbnail(&final_video_path, &thumb_path).await?;

        Ok((final_video_path, thumb_path))
    }

    async fn submit_and_wait(
        &self,
        prompt: Value,
        client_id: &str,
        prompt_id_tx: watch::Sender<Option<String>>,
        events: &mpsc::Sender<RenderEvent>,
    ) -> ComfyResult<HistoryEntry> {
        let prompt_id = self.post_prompt(prompt, client_id).await?;
        let _ = prompt_id_tx.send(Some(prompt_id.clone()));
        let _ = events.send(RenderEvent::Phase(JobPhase::Sampling)).await;
        self.wait_for_history(&prompt_id).await
    }

    async fn post_prompt(&self, prompt: Value, client_id: &str) -> ComfyResult<String> {
        let payload = serde_json::json!({ "prompt": prompt, "client_id": client_id });

        let response = self
            .http
            .post(format!("{}/prompt", self.config.base_url))
            .json(&payload)
            .send()
            .await
            .map_err(|e| ComfyError::http_error(format!("failed to queue prompt: {e}")))?;

        let response = response
            .error_for_status()
            .map_err(|e| ComfyError::http_error(format!("failed to queue prompt: {e}")))?;

        let data: Value = response
            .json()
            .await
            .map_err(|e| ComfyError::http_error(format!("failed to queue prompt: {e}")))?;

        if let Some(node_errors) = data.get("node_errors").and_then(Value::as_object) {
            if !node_errors.is_empty() {
                return Err(ComfyError::workflow_invalid(crate::history::summarize_node_errors(
                    node_errors,
                )));
            }
        }

        data.get("prompt_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ComfyError::http_error("ComfyUI response did not carry a prompt_id"))
    }

    fn build_ws_url(&self, client_id: &str) -> ComfyResult<Url> {
        let mut url =
            Url::parse(&self.config.base_url).map_err(|e| ComfyError::http_error(format!("invalid comfy_base_url: {e}")))?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| ComfyError::http_error("invalid comfy_base_url scheme"))?;
        let path = format!("{}/ws", url.path().trim_end_matches('/'));
        url.set_path(&path);
        url.query_pairs_mut().append_pair("clientId", client_id);
        Ok(url)
    }

    async fn get_history(&self, prompt_id: &str) -> ComfyResult<Option<HistoryEntry>> {
        let response = self
            .http
            .get(format!("{}/history/{prompt_id}", self.config.base_url))
            .send()
            .await
            .map_err(|e| ComfyError::http_error(e.to_string()))?;
        let response = response.error_for_status().map_err(|e| ComfyError::http_error(e.to_string()))?;
        let mut map: HashMap<String, HistoryEntry> = response
            .json()
            .await
            .map_err(|e| ComfyError::http_error(e.to_string()))?;
        Ok(map.remove(prompt_id))
    }

    async fn wait_for_history(&self, prompt_id: &str) -> ComfyResult<HistoryEntry> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(self.config.render_timeout_sec);
        loop {
            if let Some(history) = self.get_history(prompt_id).await? {
                if history.has_outputs() {
                    return Ok(history);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ComfyError::timeout(self.config.render_timeout_sec));
            }
            tokio::time::sleep(HISTORY_POLL_INTERVAL).await;
        }
    }

    async fn download_output(&self, file_ref: &crate::history::OutputFileRef, target_path: &Path) -> ComfyResult<()> {
        let url = format!(
            "{}/view?filename={}&subfolder={}&type={}",
            self.config.base_url,
            urlencoding_query(&file_ref.filename),
            urlencoding_query(&file_ref.subfolder),
            urlencoding_query(&file_ref.file_type),
        );

        let response = self
            .download_http
            .get(&url)
            .send()
            .await
            .map_err(|e| ComfyError::download_failed(format!("failed to download output: {e}")))?;
        let response = response
            .error_for_status()
            .map_err(|e| ComfyError::download_failed(format!("failed to download output: {e}")))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ComfyError::download_failed(format!("failed to download output: {e}")))?;

        tokio::fs::write(target_path, &bytes)
            .await
            .map_err(|e| ComfyError::download_failed(format!("failed to write output: {e}")))?;
        Ok(())
    }

    async fn ensure_mp4(&self, downloaded_path: &Path, final_video_path: &Path) -> ComfyResult<()> {
        let is_mp4 = downloaded_path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("mp4"))
            .unwrap_or(false);

        if is_mp4 {
            if downloaded_path != final_video_path {
                tokio::fs::rename(downloaded_path, final_video_path)
                    .await
                    .map_err(|e| ComfyError::download_failed(e.to_string()))?;
            }
            return Ok(());
        }

        liveframe_media::transcode_to_mp4(downloaded_path, final_video_path)
            .await
            .map_err(ComfyError::from)
    }
}

fn urlencoding_query(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Background task: connect to the backend's progress WebSocket and forward
/// sampling-ratio updates for `prompt_id` (once assigned) until a terminal
/// message arrives, the connection ends, or the task is cancelled.
///
/// Failures here are logged and swallowed — progress degradation must never
/// abort a render (see the error handling design).
async fn stream_sampling_progress(ws_url: Url, mut prompt_id_rx: watch::Receiver<Option<String>>, events: mpsc::Sender<RenderEvent>) {
    let (ws_stream, _) = match tokio_tungstenite::connect_async(ws_url.as_str()).await {
        Ok(pair) => pair,
        Err(e) => {
            debug!(error = %e, "failed to connect to comfy progress websocket");
            return;
        }
    };

    let (_write, mut read) = ws_stream.split();

    while let Some(message) = read.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "comfy progress websocket read error");
                return;
            }
        };

        let Message::Text(text) = message else { continue };

        let event: ProgressEvent = match serde_json::from_str(&text) {
            Ok(event) => event,
            Err(_) => continue,
        };

        let target_prompt_id = prompt_id_rx.borrow().clone();
        let Some(target_prompt_id) = target_prompt_id else {
            continue;
        };

        if let Some(event_prompt_id) = event.prompt_id() {
            if event_prompt_id != target_prompt_id {
                continue;
            }
        } else {
            continue;
        }

        if let Some(ratio) = event.sampling_ratio() {
            if events.send(RenderEvent::Sampling(ratio)).await.is_err() {
                return;
            }
        }

        if event.is_terminal() {
            return;
        }
    }
}
