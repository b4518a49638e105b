use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tracing::{error, info};
use uuid::Uuid;

use crate::data_registry::{RunRecord, RunStatus};
use crate::models::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/reports/{run_id}", get(get_report))
        .route("/api/runs", get(list_runs))
        .with_state(state)
}

fn not_found(message: String) -> Response {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": message }))).into_response()
}

/// GET /api/reports/{run_id} - Plain-text report of a finished run
async fn get_report(State(state): State<AppState>, Path(run_id): Path<Uuid>) -> Response {
    let Some(record) = state.runs.get(&run_id).await else {
        return not_found(format!("Unknown run: {}", run_id));
    };

    let report_path = match (record.status, record.report_path) {
        (RunStatus::Completed, Some(path)) => path,
        (RunStatus::Failed, _) => {
            return (
                StatusCode::CONFLICT,
                Json(serde_json::json!({
                    "error": "Run failed, no report was written",
                    "details": record.error,
                })),
            )
                .into_response();
        }
        _ => return not_found(format!("Report for run {} is not ready", run_id)),
    };

    match tokio::fs::read_to_string(&report_path).await {
        Ok(text) => {
            info!(%run_id, path = %report_path.display(), "Serving report");
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                text,
            )
                .into_response()
        }
        Err(e) => {
            error!(%run_id, error = %e, "Failed to read report");
            not_found(format!("Report for run {} is no longer available", run_id))
        }
    }
}

/// GET /api/runs - Every run this process has seen, newest first
async fn list_runs(State(state): State<AppState>) -> Json<Vec<RunRecord>> {
    Json(state.runs.list().await)
}
