//! Server configuration.

use std::path::PathBuf;

/// Server configuration, loaded from the environment (with `.env` support).
#[derive(Debug, Clone)]
pub struct Config {
    pub api_prefix: String,
    pub comfy_base_url: String,
    pub comfy_input_dir: PathBuf,
    pub comfy_workflow_path: PathBuf,
    pub workflow_version: String,
    pub render_preset: String,
    pub render_timeout_sec: u64,
    pub polling_interval_sec: u64,
    pub estimated_job_sec: u64,
    pub data_dir: PathBuf,
    pub bind_addr: String,
    pub log_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_prefix: "/api/v1".to_string(),
            comfy_base_url: "http://127.0.0.1:8188".to_string(),
            comfy_input_dir: PathBuf::from("../ComfyUI/input"),
            comfy_workflow_path: PathBuf::from("workflows/(API)Final_workflow.json"),
            workflow_version: "qwen_enhancer_v1".to_string(),
            render_preset: "mp4_loop_v1".to_string(),
            render_timeout_sec: 900,
            polling_interval_sec: 3,
            estimated_job_sec: 300,
            data_dir: PathBuf::from("./data"),
            bind_addr: "0.0.0.0:8080".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_prefix: std::env::var("API_PREFIX").unwrap_or(defaults.api_prefix),
            comfy_base_url: std::env::var("COMFY_BASE_URL").unwrap_or(defaults.comfy_base_url),
            comfy_input_dir: std::env::var("COMFY_INPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.comfy_input_dir),
            comfy_workflow_path: std::env::var("COMFY_WORKFLOW_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.comfy_workflow_path),
            workflow_version: std::env::var("WORKFLOW_VERSION").unwrap_or(defaults.workflow_version),
            render_preset: std::env::var("RENDER_PRESET").unwrap_or(defaults.render_preset),
            render_timeout_sec: std::env::var("RENDER_TIMEOUT_SEC")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.render_timeout_sec),
            polling_interval_sec: std::env::var("POLLING_INTERVAL_SEC")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.polling_interval_sec),
            estimated_job_sec: std::env::var("ESTIMATED_JOB_SEC")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.estimated_job_sec),
            data_dir: std::env::var("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            log_format: std::env::var("LOG_FORMAT").unwrap_or(defaults.log_format),
        }
    }

    pub fn is_json_log(&self) -> bool {
        self.log_format.to_lowercase() == "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_table() {
        let config = Config::default();
        assert_eq!(config.api_prefix, "/api/v1");
        assert_eq!(config.comfy_base_url, "http://127.0.0.1:8188");
        assert_eq!(config.render_timeout_sec, 900);
        assert_eq!(config.estimated_job_sec, 300);
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert!(!config.is_json_log());
    }
}
