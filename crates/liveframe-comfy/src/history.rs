//! Parsing ComfyUI's `/history/<prompt_id>` response: locating the output
//! file and summarizing backend-reported failures.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ComfyError, ComfyResult};

/// Node named `"341"` is checked first (the node this client's workflow
/// patches its `filename_prefix` onto); any other node's outputs are a
/// fallback.
const PREFERRED_OUTPUT_NODE: &str = "341";

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub status: Option<HistoryStatus>,
    #[serde(default)]
    pub outputs: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryStatus {
    #[serde(default)]
    pub status_str: String,
    #[serde(default)]
    pub messages: Vec<Value>,
}

impl HistoryEntry {
    pub fn has_outputs(&self) -> bool {
        !self.outputs.is_empty()
    }
}

/// A reference to a single output file inside a history node's outputs.
#[derive(Debug, Clone)]
pub struct OutputFileRef {
    pub filename: String,
    pub subfolder: String,
    pub file_type: String,
}

/// Locate the output file to download, per §4.2's preference order, or
/// surface a `COMFY_EXEC_ERROR`/`OUTPUT_NOT_FOUND` failure.
pub fn extract_output_file(history: &HistoryEntry) -> ComfyResult<OutputFileRef> {
    if let Some(status) = &history.status {
        if status.status_str == "error" {
            return Err(ComfyError::exec_error(summarize_execution_error(status)));
        }
    }

    if let Some(node) = history.outputs.get(PREFERRED_OUTPUT_NODE) {
        if let Some(file) = first_output_file(node) {
            return Ok(file);
        }
    }

    for node in history.outputs.values() {
        if let Some(file) = first_output_file(node) {
            return Ok(file);
        }
    }

    Err(ComfyError::output_not_found("no output file in ComfyUI history"))
}

fn first_output_file(node_output: &Value) -> Option<OutputFileRef> {
    for key in ["videos", "gifs", "images"] {
        let Some(items) = node_output.get(key).and_then(Value::as_array) else {
            continue;
        };
        for item in items {
            let Some(filename) = item.get("filename").and_then(Value::as_str) else {
                continue;
            };
            if filename.is_empty() {
                continue;
            }
            return Some(OutputFileRef {
                filename: filename.to_string(),
                subfolder: item.get("subfolder").and_then(Value::as_str).unwrap_or("").to_string(),
                file_type: item.get("type").and_then(Value::as_str).unwrap_or("output").to_string(),
            });
        }
    }
    None
}

fn summarize_execution_error(status: &HistoryStatus) -> String {
    for item in status.messages.iter().rev() {
        let Some(pair) = item.as_array() else { continue };
        if pair.len() < 2 {
            continue;
        }
        if pair[0].as_str() != Some("execution_error") {
            continue;
        }
        let payload = &pair[1];
        let node_id = payload.get("node_id").and_then(Value::as_str).unwrap_or("?");
        let node_type = payload.get("node_type").and_then(Value::as_str).unwrap_or("unknown");
        let exception_message = payload
            .get("exception_message")
            .and_then(Value::as_str)
            .unwrap_or("execution_error")
            .trim();
        if exception_message.is_empty() {
            return format!("node {node_id} ({node_type}): execution error");
        }
        return format!("node {node_id} ({node_type}): {exception_message}");
    }
    "execution failed without details".to_string()
}

/// Summarize up to the first three offending nodes from a prompt-submission
/// `node_errors` rejection.
pub fn summarize_node_errors(node_errors: &serde_json::Map<String, Value>) -> String {
    let chunks: Vec<String> = node_errors
        .iter()
        .filter_map(|(node_id, value)| {
            let value = value.as_object()?;
            let class_type = value.get("class_type").and_then(Value::as_str).unwrap_or("unknown");
            let message = value
                .get("errors")
                .and_then(Value::as_array)
                .and_then(|errs| errs.first())
                .map(|first| {
                    first
                        .get("details")
                        .or_else(|| first.get("message"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| first.to_string())
                })
                .unwrap_or_else(|| "validation error".to_string());
            Some(format!("node {node_id} ({class_type}): {message}"))
        })
        .take(3)
        .collect();
    format!("workflow validation failed: {}", chunks.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_node_341_over_others() {
        let history: HistoryEntry = serde_json::from_str(
            r#"{"outputs":{"1":{"videos":[{"filename":"a.mp4"}]},"341":{"videos":[{"filename":"preferred.mp4"}]}}}"#,
        )
        .unwrap();
        let file = extract_output_file(&history).unwrap();
        assert_eq!(file.filename, "preferred.mp4");
    }

    #[test]
    fn falls_back_to_first_node_with_output() {
        let history: HistoryEntry =
            serde_json::from_str(r#"{"outputs":{"7":{"gifs":[{"filename":"fallback.gif"}]}}}"#).unwrap();
        let file = extract_output_file(&history).unwrap();
        assert_eq!(file.filename, "fallback.gif");
    }

    #[test]
    fn fails_with_output_not_found_when_empty() {
        let history: HistoryEntry = serde_json::from_str(r#"{"outputs":{}}"#).unwrap();
        let err = extract_output_file(&history).unwrap_err();
        assert_eq!(err.code, liveframe_models::ErrorCode::OutputNotFound);
    }

    #[test]
    fn surfaces_exec_error_from_status() {
        let history: HistoryEntry = serde_json::from_str(
            r#"{"status":{"status_str":"error","messages":[["execution_error",{"node_id":"12","node_type":"KSampler","exception_message":"CUDA OOM"}]]},"outputs":{}}"#,
        )
        .unwrap();
        let err = extract_output_file(&history).unwrap_err();
        assert_eq!(err.code, liveframe_models::ErrorCode::ComfyExecError);
        assert!(err.message.contains("KSampler"));
        assert!(err.message.contains("CUDA OOM"));
    }

    #[test]
    fn summarizes_up_to_three_node_errors() {
        let raw = r#"{
            "1": {"class_type": "LoadImage", "errors": [{"message": "missing file"}]},
            "2": {"class_type": "KSampler", "errors": [{"details": "bad seed"}]},
            "3": {"class_type": "VAEDecode", "errors": []},
            "4": {"class_type": "SaveVideo", "errors": [{"message": "bad path"}]}
        }"#;
        let node_errors: serde_json::Map<String, Value> = serde_json::from_str(raw).unwrap();
        let summary = summarize_node_errors(&node_errors);
        assert!(summary.starts_with("workflow validation failed: "));
        assert_eq!(summary.matches("node ").count(), 3);
    }
}
