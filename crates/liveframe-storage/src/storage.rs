//! Content-addressed filesystem layout: inputs, renders, job documents.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache_key::{compute_cache_key, identity_cache_key};
use crate::error::{StorageError, StorageResult};

/// Timeout for the album-art lookup request (the "lookups" timeout class).
const ALBUM_ART_TIMEOUT: Duration = Duration::from_secs(12);

/// Directory layout rooted at `data_dir`.
#[derive(Debug, Clone)]
pub struct Storage {
    data_dir: PathBuf,
    inputs_dir: PathBuf,
    renders_dir: PathBuf,
    jobs_dir: PathBuf,
    comfy_input_dir: PathBuf,
    http: reqwest::Client,
}

/// A record written to `<jobs_dir>/<job_id>.json`. Mirrors [`liveframe_models::Job`]
/// field-for-field; kept as a distinct, purely-`serde` type here so this crate
/// doesn't need to depend on the job's behavior, only its shape.
pub type JobDocument = serde_json::Value;

impl Storage {
    /// Construct a `Storage` rooted at `data_dir`, creating every managed
    /// directory (recursively, idempotently).
    pub fn new(
        data_dir: impl Into<PathBuf>,
        comfy_input_dir: impl Into<PathBuf>,
    ) -> StorageResult<Self> {
        let data_dir = data_dir.into();
        let storage = Self {
            inputs_dir: data_dir.join("inputs"),
            renders_dir: data_dir.join("renders"),
            jobs_dir: data_dir.join("jobs"),
            comfy_input_dir: comfy_input_dir.into(),
            data_dir,
            http: reqwest::Client::builder()
                .timeout(ALBUM_ART_TIMEOUT)
                .build()
                .expect("reqwest client builds with static config"),
        };
        storage.ensure_directories()?;
        Ok(storage)
    }

    fn ensure_directories(&self) -> StorageResult<()> {
        for dir in [
            &self.data_dir,
            &self.inputs_dir,
            &self.renders_dir,
            &self.jobs_dir,
            &self.comfy_input_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn inputs_dir(&self) -> &Path {
        &self.inputs_dir
    }

    pub fn jobs_dir(&self) -> &Path {
        &self.jobs_dir
    }

    // ------------------------------------------------------------------
    // Cache key
    // ------------------------------------------------------------------

    /// See [`crate::cache_key::compute_cache_key`].
    pub fn compute_cache_key(
        &self,
        album_art_bytes: &[u8],
        workflow_version: &str,
        render_preset: &str,
        album_identity: Option<&str>,
    ) -> String {
        compute_cache_key(album_art_bytes, workflow_version, render_preset, album_identity)
    }

    /// See [`crate::cache_key::identity_cache_key`].
    pub fn identity_cache_key(&self, album_identity: &str, workflow_version: &str, render_preset: &str) -> String {
        identity_cache_key(album_identity, workflow_version, render_preset)
    }

    // ------------------------------------------------------------------
    // Cache entries
    // ------------------------------------------------------------------

    pub fn render_dir(&self, cache_key: &str) -> PathBuf {
        self.renders_dir.join(cache_key)
    }

    /// A CacheEntry exists when both `video.mp4` and `meta.json` are present.
    pub fn cache_exists(&self, cache_key: &str) -> bool {
        let dir = self.render_dir(cache_key);
        dir.join("video.mp4").exists() && dir.join("meta.json").exists()
    }

    pub fn ensure_render_dir(&self, cache_key: &str) -> StorageResult<PathBuf> {
        let dir = self.render_dir(cache_key);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// `("/static/renders/<cache_key>/video.mp4", "/static/renders/<cache_key>/thumb.jpg")`.
    pub fn result_urls(&self, cache_key: &str) -> (String, String) {
        (
            format!("/static/renders/{cache_key}/video.mp4"),
            format!("/static/renders/{cache_key}/thumb.jpg"),
        )
    }

    /// The local static path a history entry's staged input image is served
    /// from, for the album-art URL substitution described in the storage
    /// design notes.
    pub fn input_image_url(&self, image_filename: &str) -> String {
        format!("/static/inputs/{image_filename}")
    }

    // ------------------------------------------------------------------
    // Album art
    // ------------------------------------------------------------------

    /// Fetch album art bytes over HTTP, deriving a file extension from the
    /// response's `Content-Type` (normalizing `.jpe` to `.jpg`, defaulting to
    /// `.jpg` when the type is missing or unrecognized).
    pub async fn download_album_art(&self, album_art_url: &str) -> StorageResult<(Vec<u8>, String)> {
        let response = self
            .http
            .get(album_art_url)
            .send()
            .await
            .map_err(|e| StorageError::album_art_fetch_failed(e.to_string()))?;
        let response = response
            .error_for_status()
            .map_err(|e| StorageError::album_art_fetch_failed(e.to_string()))?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        let ext = extension_for_content_type(&content_type);
        let bytes = response.bytes().await?.to_vec();
        Ok((bytes, ext))
    }

    /// Write staged artwork to `inputs/album_<cache_key><ext>` and mirror it
    /// into the external inference input directory under the same filename.
    /// Returns the bare filename (the inference backend references by name).
    pub fn persist_album_art(&self, content: &[u8], cache_key: &str, ext: &str) -> StorageResult<String> {
        let filename = format!("album_{cache_key}{ext}");
        let local_input = self.inputs_dir.join(&filename);
        let comfy_input = self.comfy_input_dir.join(&filename);

        std::fs::write(&local_input, content)?;
        std::fs::copy(&local_input, &comfy_input)?;

        Ok(filename)
    }

    // ------------------------------------------------------------------
    // Job documents
    // ------------------------------------------------------------------

    fn job_path(&self, job_id: &str) -> PathBuf {
        self.jobs_dir.join(format!("{job_id}.json"))
    }

    /// Serialize `job` and write it to `<jobs_dir>/<job_id>.json`.
    pub fn write_job<T: Serialize>(&self, job_id: &str, job: &T) -> StorageResult<()> {
        let path = self.job_path(job_id);
        let body = serde_json::to_string_pretty(job)?;
        std::fs::write(path, body)?;
        Ok(())
    }

    pub fn delete_job(&self, job_id: &str) -> StorageResult<()> {
        let path = self.job_path(job_id);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Load every job document under `jobs_dir`, skipping (and logging) any
    /// file that isn't valid JSON or doesn't deserialize as `T`.
    pub fn load_jobs<T: for<'de> Deserialize<'de>>(&self) -> StorageResult<Vec<T>> {
        let mut jobs = Vec::new();
        let entries = match std::fs::read_dir(&self.jobs_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(jobs),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = match std::fs::read_to_string(&path) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable job document");
                    continue;
                }
            };
            match serde_json::from_str::<T>(&raw) {
                Ok(job) => jobs.push(job),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping malformed job document");
                }
            }
        }

        debug!(count = jobs.len(), "loaded job documents from disk");
        Ok(jobs)
    }

    // ------------------------------------------------------------------
    // Render metadata
    // ------------------------------------------------------------------

    /// Write `<renders_dir>/<cache_key>/meta.json`.
    pub fn write_meta<T: Serialize>(&self, cache_key: &str, meta: &T) -> StorageResult<()> {
        let dir = self.ensure_render_dir(cache_key)?;
        let body = serde_json::to_string_pretty(meta)?;
        std::fs::write(dir.join("meta.json"), body)?;
        Ok(())
    }
}

fn extension_for_content_type(content_type: &str) -> String {
    let ext = match content_type {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        "image/tiff" => "tiff",
        _ => "jpg",
    };
    format!(".{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage() -> (Storage, TempDir, TempDir) {
        let data = TempDir::new().unwrap();
        let comfy = TempDir::new().unwrap();
        let storage = Storage::new(data.path(), comfy.path()).unwrap();
        (storage, data, comfy)
    }

    #[test]
    fn ensures_directories_on_construction() {
        let (storage, _data, _comfy) = storage();
        assert!(storage.inputs_dir.exists());
        assert!(storage.renders_dir.exists());
        assert!(storage.jobs_dir.exists());
        assert!(storage.comfy_input_dir.exists());
    }

    #[test]
    fn content_type_extension_normalizes_jpe_and_defaults() {
        assert_eq!(extension_for_content_type("image/jpeg"), ".jpg");
        assert_eq!(extension_for_content_type("image/png"), ".png");
        assert_eq!(extension_for_content_type("application/octet-stream"), ".jpg");
        assert_eq!(extension_for_content_type(""), ".jpg");
    }

    #[test]
    fn cache_exists_requires_both_video_and_meta() {
        let (storage, _data, _comfy) = storage();
        let key = "deadbeef";
        assert!(!storage.cache_exists(key));

        let dir = storage.ensure_render_dir(key).unwrap();
        std::fs::write(dir.join("video.mp4"), b"x").unwrap();
        assert!(!storage.cache_exists(key));

        std::fs::write(dir.join("meta.json"), b"{}").unwrap();
        assert!(storage.cache_exists(key));
    }

    #[test]
    fn persist_album_art_mirrors_into_comfy_input_dir() {
        let (storage, _data, _comfy) = storage();
        let filename = storage.persist_album_art(b"bytes", "cachekey", ".jpg").unwrap();
        assert_eq!(filename, "album_cachekey.jpg");
        assert!(storage.inputs_dir.join(&filename).exists());
        assert!(storage.comfy_input_dir.join(&filename).exists());
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Dummy {
        a: u32,
        b: String,
    }

    #[test]
    fn job_round_trips_through_write_and_load() {
        let (storage, _data, _comfy) = storage();
        let job = Dummy { a: 1, b: "hi".into() };
        storage.write_job("job-1", &job).unwrap();

        let loaded: Vec<Dummy> = storage.load_jobs().unwrap();
        assert_eq!(loaded, vec![job]);
    }

    #[test]
    fn load_jobs_skips_malformed_files() {
        let (storage, _data, _comfy) = storage();
        std::fs::write(storage.jobs_dir.join("bad.json"), b"not json").unwrap();
        storage.write_job("good", &Dummy { a: 2, b: "ok".into() }).unwrap();

        let loaded: Vec<Dummy> = storage.load_jobs().unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn delete_job_removes_document() {
        let (storage, _data, _comfy) = storage();
        storage.write_job("to-delete", &Dummy { a: 3, b: "x".into() }).unwrap();
        storage.delete_job("to-delete").unwrap();
        let loaded: Vec<Dummy> = storage.load_jobs().unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn result_urls_and_input_image_url_match_static_layout() {
        let (storage, _data, _comfy) = storage();
        let (video, thumb) = storage.result_urls("k");
        assert_eq!(video, "/static/renders/k/video.mp4");
        assert_eq!(thumb, "/static/renders/k/thumb.jpg");
        assert_eq!(storage.input_image_url("album_k.jpg"), "/static/inputs/album_k.jpg");
    }
}
