//! Content-addressed filesystem layout for the render job subsystem.
//!
//! Owns four directories (inputs, renders, jobs, and the external inference
//! input directory), the cache-key derivation rule, album-art fetch/staging,
//! and per-job JSON document I/O.

pub mod cache_key;
pub mod error;
pub mod storage;

pub use cache_key::{compute_cache_key, identity_cache_key};
pub use error::{StorageError, StorageResult};
pub use storage::{JobDocument, Storage};
