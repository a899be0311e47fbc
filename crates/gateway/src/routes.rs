//! Router assembly.

use crate::auth::auth_middleware;
use crate::handlers::files;
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::{Json, Router, middleware};
use serde_json::json;

/// Builds the full gateway router. All file routes sit behind bearer-token
/// authentication; the health probe does not.
pub fn create_router(state: AppState) -> Router {
    let file_routes = Router::new()
        .route("/upload", post(files::upload))
        .route("/download", get(files::download))
        .route("/ls", get(files::ls))
        .route("/rm", delete(files::rm))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes));

    Router::new()
        .nest("/api/v1/files", file_routes)
        .route("/api/v1/health", get(health))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
