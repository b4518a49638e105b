//! Upload Route
//!
//! `POST /api/upload` accepts a multipart form with a `file` field, streams
//! the file into the upload directory as it arrives and runs the analysis
//! pipeline on it. The response carries the same user-facing messages a page
//! flash would show.

use std::path::{Path, PathBuf};

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::agents::analyze_file;
use crate::data_registry::RunRecord;
use crate::ingest::TabularFormat;
use crate::models::{AppState, UploadResponse};
use crate::storage::{secure_filename, UploadStore};
use crate::types::AppError;

pub const UPLOAD_FIELD: &str = "file";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/upload", post(upload_file))
        .with_state(state)
}

/// Problems with the uploaded data are the client's; anything else is ours
fn analysis_error_status(err: &AppError) -> StatusCode {
    if err.is_reading_failure() || matches!(err, AppError::InvalidRequest(_)) {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn reject(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(UploadResponse::rejected(message))).into_response()
}

/// POST /api/upload - Store and analyze one file
async fn upload_file(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    info!("File upload request received");

    let run_id = Uuid::new_v4();
    let store = UploadStore::new(&state.config.upload.upload_dir);

    let mut stored: Option<(String, PathBuf)> = None;
    loop {
        let mut field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Failed to read multipart body");
                return reject(e.status(), e.body_text());
            }
        };

        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if file_name.trim().is_empty() {
            return reject(StatusCode::BAD_REQUEST, "No selected file");
        }
        if TabularFormat::from_path(Path::new(&file_name)).is_err() {
            return reject(StatusCode::BAD_REQUEST, "Allowed file types are .csv, .xlsx");
        }

        let mut upload = match store.create(&run_id, &file_name).await {
            Ok(upload) => upload,
            Err(AppError::InvalidRequest(message)) => {
                return reject(StatusCode::BAD_REQUEST, message);
            }
            Err(e) => {
                error!(error = %e, "Failed to store upload");
                return reject(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to store upload: {}", e));
            }
        };

        loop {
            match field.chunk().await {
                Ok(Some(bytes)) => {
                    if let Err(e) = upload.write_chunk(&bytes).await {
                        error!(error = %e, "Failed to store upload");
                        upload.discard().await;
                        return reject(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to store upload: {}", e));
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to read uploaded file");
                    upload.discard().await;
                    return reject(e.status(), e.body_text());
                }
            }
        }

        match upload.finish().await {
            Ok(path) => stored = Some((file_name, path)),
            Err(e) => {
                error!(error = %e, "Failed to store upload");
                return reject(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to store upload: {}", e));
            }
        }
        break;
    }

    let Some((file_name, source_path)) = stored else {
        return reject(StatusCode::BAD_REQUEST, "No file part");
    };
    let display_name = secure_filename(&file_name).unwrap_or_else(|| file_name.clone());

    let mut messages = vec![format!(
        "File \"{}\" successfully uploaded! Starting analysis...",
        display_name
    )];
    state.runs.insert(RunRecord::started(run_id, &display_name)).await;

    let report_path = store.report_path(&run_id, &file_name);
    let result = analyze_file(
        state.inference.clone(),
        state.config.analysis.clone(),
        &source_path,
        state.config.upload.chunk_size,
        &report_path,
    )
    .await;

    match result {
        Ok(report) => {
            let rows = report.global_summary.total_rows_processed;
            state.runs.complete(&run_id, report_path.clone(), rows).await;

            let report_name = report_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            messages.push(format!(
                "Analysis complete for '{}'. Results saved to '{}' in the '{}' folder.",
                display_name,
                report_name,
                store.root().display()
            ));
            info!(%run_id, rows, "Upload analyzed");

            let response = UploadResponse {
                status: "success".to_string(),
                run_id: Some(run_id),
                messages,
                report_path: Some(report_path.to_string_lossy().to_string()),
                summary: Some(report.global_summary),
                error: None,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            error!(%run_id, error = %e, "Analysis failed");
            state.runs.fail(&run_id, e.to_string()).await;
            messages.push(format!("Error during analysis of '{}': {}", display_name, e));

            let response = UploadResponse {
                status: "error".to_string(),
                run_id: Some(run_id),
                messages,
                report_path: None,
                summary: None,
                error: Some(e.to_string()),
            };
            (analysis_error_status(&e), Json(response)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_error_status() {
        let empty = AppError::EmptySource { path: PathBuf::from("a.csv") };
        let malformed = AppError::MalformedSource { line: 3, reason: "bad utf-8".into() };
        let io = AppError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));

        assert_eq!(analysis_error_status(&empty), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(analysis_error_status(&malformed), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(analysis_error_status(&io), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
