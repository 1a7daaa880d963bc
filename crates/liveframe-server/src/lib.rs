//! HTTP server for the render job queue: the `/api/v1/renders` surface,
//! static artifact serving, and the worker wiring that ties
//! `liveframe-queue` to a real ComfyUI backend.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
