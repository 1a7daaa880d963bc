//! Prompt construction from the on-disk workflow template.

use std::path::Path;

use serde_json::Value;

use crate::error::{ComfyError, ComfyResult};

/// Node id whose `image` input is patched with the staged input filename.
const IMAGE_INPUT_NODE: &str = "58";

/// Node id whose `filename_prefix` is patched with the cache-key-qualified
/// output prefix.
const OUTPUT_NODE: &str = "341";

/// The on-disk ComfyUI workflow graph, loaded once at startup and deep-copied
/// per render.
#[derive(Debug, Clone)]
pub struct WorkflowTemplate(Value);

impl WorkflowTemplate {
    pub fn load(path: impl AsRef<Path>) -> ComfyResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ComfyError::http_error(format!("failed to read workflow template {}: {e}", path.display())))?;
        let value: Value = serde_json::from_str(&raw)
            .map_err(|e| ComfyError::http_error(format!("failed to parse workflow template {}: {e}", path.display())))?;
        Ok(Self(value))
    }

    /// Deep-copy the template with the input image and output prefix patched
    /// in for this render.
    pub fn build_prompt(&self, image_filename: &str, cache_key: &str) -> ComfyResult<Value> {
        let mut prompt = self.0.clone();

        prompt
            .get_mut(IMAGE_INPUT_NODE)
            .and_then(|node| node.get_mut("inputs"))
            .and_then(|inputs| inputs.get_mut("image"))
            .map(|slot| *slot = Value::String(image_filename.to_string()))
            .ok_or_else(|| {
                ComfyError::http_error(format!("workflow template is missing node {IMAGE_INPUT_NODE}.inputs.image"))
            })?;

        prompt
            .get_mut(OUTPUT_NODE)
            .and_then(|node| node.get_mut("inputs"))
            .and_then(|inputs| inputs.get_mut("filename_prefix"))
            .map(|slot| *slot = Value::String(format!("Live2D/{cache_key}")))
            .ok_or_else(|| {
                ComfyError::http_error(format!("workflow template is missing node {OUTPUT_NODE}.inputs.filename_prefix"))
            })?;

        Ok(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_template(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("workflow.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"58":{{"inputs":{{"image":"placeholder.png"}}}},"341":{{"inputs":{{"filename_prefix":"old"}}}}}}"#
        )
        .unwrap();
        path
    }

    #[test]
    fn patches_image_and_filename_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_template(&dir);
        let template = WorkflowTemplate::load(&path).unwrap();

        let prompt = template.build_prompt("album_abc.jpg", "cachekey").unwrap();
        assert_eq!(prompt["58"]["inputs"]["image"], "album_abc.jpg");
        assert_eq!(prompt["341"]["inputs"]["filename_prefix"], "Live2D/cachekey");
    }

    #[test]
    fn leaves_template_itself_unmodified() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_template(&dir);
        let template = WorkflowTemplate::load(&path).unwrap();

        let _ = template.build_prompt("a.jpg", "k1").unwrap();
        let second = template.build_prompt("b.jpg", "k2").unwrap();
        assert_eq!(second["58"]["inputs"]["image"], "b.jpg");
    }
}
