//! Client for an external ComfyUI inference backend: prompt submission,
//! progress streaming, history polling, and output retrieval.

mod client;
mod error;
mod history;
mod types;
mod workflow;

pub use client::{ComfyClient, ComfyConfig, RenderEvent};
pub use error::{ComfyError, ComfyResult};
pub use history::{HistoryEntry, HistoryStatus, OutputFileRef};
pub use types::ProgressEvent;
pub use workflow::WorkflowTemplate;
