//! Single-worker FIFO render job queue with durable JSON-backed state.
//!
//! This crate provides:
//! - [`store::JobStore`], the write-through durable job map and its
//!   crash-recovery sweep
//! - [`progress`], the pure phase/sampling-ratio progress mapping functions
//! - [`queue::QueueService`], the public render-job API and the single
//!   worker loop that drives jobs through `liveframe-comfy`

pub mod error;
pub mod progress;
pub mod queue;
pub mod store;

pub use error::{QueueError, QueueResult};
pub use queue::{QueueConfig, QueueService};
pub use store::JobStore;
