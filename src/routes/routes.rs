//! Defines routes for the upload service.
//!
//! ## Structure
//! - `POST /upload`           stream a file into storage
//! - `GET  /objects/{*key}`   fetch a stored object (original or `modified_` copy)
//! - `GET  /healthz`, `GET /readyz`  liveness and readiness

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        upload_handlers::{get_object, upload_file},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build and return the router for all upload routes.
///
/// The router carries shared state (`AppState`) to all handlers. The body
/// size is enforced by the ingestion session, so axum's default limit is off.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/upload", post(upload_file))
        .route("/objects/{*key}", get(get_object))
        .layer(DefaultBodyLimit::disable())
}
