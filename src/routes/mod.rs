//! API Routes
//!
//! This module organizes all HTTP endpoints for the application:
//! - `/api/upload` - Upload a CSV/XLSX file and analyze it
//! - `/api/reports/{run_id}` - Fetch a finished report
//! - `/api/runs` - List analysis runs
//! - `/api/health` - Health checks
//! - `/` - Upload form

pub mod files;
pub mod health;
pub mod reports;
pub mod static_files;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::apply_cors;
use crate::models::AppState;

/// Create the main application router
///
/// API routes are prefixed with `/api/`; the upload form is served at `/`.
/// Request bodies are capped at the configured upload size.
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let body_limit = state.config.upload.max_upload_bytes;
    let origins = state.config.server.cors_allowed_origins.clone();

    let api_router = Router::new()
        .merge(files::router(state.clone()))
        .merge(reports::router(state.clone()))
        .merge(health::router(state));

    let router = Router::new()
        .merge(api_router)
        .merge(static_files::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http());

    apply_cors(router, &origins)
}
