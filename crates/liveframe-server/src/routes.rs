//! HTTP route table.

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers::{clear_history, create_render, get_render, health, list_history};
use crate::state::AppState;

/// Build the full router: the render API under `state.config.api_prefix`,
/// static artifact serving under `/static`, and `GET /` for liveness.
pub fn create_router(state: AppState) -> Router {
    let render_routes = Router::new()
        .route("/renders", post(create_render))
        .route("/renders/history", get(list_history).delete(clear_history))
        .route("/renders/:job_id", get(get_render));

    let static_routes = Router::new().nest_service("/static", ServeDir::new(&state.config.data_dir));

    Router::new()
        .route("/", get(health))
        .nest(&state.config.api_prefix, render_routes)
        .merge(static_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}
