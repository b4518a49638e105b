use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use oxidized_analyst::config::{AnalysisConfig, Config, LLMConfig, ServerConfig, UploadConfig};
use oxidized_analyst::data_registry::RunRegistry;
use oxidized_analyst::llm::{GenerationSettings, InferenceClient, LLMAdapter};
use oxidized_analyst::types::{AppResult, LLMRequest, LLMResponse};
use oxidized_analyst::routes::create_router;
use oxidized_analyst::AppState;

const BOUNDARY: &str = "----oxidized-analyst-test";

struct CannedAdapter;

#[async_trait]
impl LLMAdapter for CannedAdapter {
    async fn create_chat_completion(&self, _request: &LLMRequest) -> AppResult<LLMResponse> {
        Ok(LLMResponse { content: "Looks steady.".to_string(), finish_reason: None, usage: None })
    }

    fn endpoint(&self) -> &str {
        "stub://canned"
    }
}

fn app(upload_dir: &Path) -> Router {
    let config = Config {
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".to_string(),
            cors_allowed_origins: vec!["*".to_string()],
        },
        llm: LLMConfig::default(),
        upload: UploadConfig {
            upload_dir: upload_dir.to_path_buf(),
            chunk_size: 2,
            max_upload_bytes: 1024 * 1024,
        },
        analysis: AnalysisConfig::default(),
        log_dir: None,
    };
    let inference = InferenceClient::new(
        Arc::new(CannedAdapter),
        GenerationSettings { model: None, temperature: 0.7, max_tokens: 500 },
    );
    create_router(AppState { config, inference, runs: RunRegistry::default() })
}

fn multipart_body(field: &str, file_name: &str, content: &str) -> String {
    format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
Content-Type: application/octet-stream\r\n\r\n{content}\r\n--{b}--\r\n",
        b = BOUNDARY,
        field = field,
        file_name = file_name,
        content = content,
    )
}

fn upload_request(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn health_reports_inference_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path()).oneshot(get("/api/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["inference_endpoint"], "stub://canned");
}

#[tokio::test]
async fn index_serves_upload_form() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path()).oneshot(get("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("/api/upload"));
    assert!(html.contains("name=\"file\""));
}

#[tokio::test]
async fn upload_runs_analysis_and_serves_report() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let csv = "value1,category\n10,a\n20,b\n30,a\n";

    let response = app
        .clone()
        .oneshot(upload_request(multipart_body("file", "Q3 sales.CSV", csv)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "success");
    let messages = json["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].as_str().unwrap().contains("Q3_sales.CSV"));
    assert!(messages[1].as_str().unwrap().starts_with("Analysis complete for"));
    assert_eq!(json["summary"]["total_rows_processed"], 3);
    assert_eq!(json["summary"]["chunks_processed"], 2);

    let report_path = json["report_path"].as_str().unwrap();
    assert!(Path::new(report_path).exists());
    assert!(report_path.contains("analysis_results_Q3_sales_"));

    let run_id = json["run_id"].as_str().unwrap().to_string();
    let response = app
        .clone()
        .oneshot(get(&format!("/api/reports/{}", run_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report = body_text(response).await;
    assert!(report.contains("--- Final Comprehensive LLM Analysis ---\nLooks steady."));

    let response = app.oneshot(get("/api/runs")).await.unwrap();
    let runs = body_json(response).await;
    assert_eq!(runs[0]["id"], run_id.as_str());
    assert_eq!(runs[0]["status"], "completed");
    assert_eq!(runs[0]["rows_processed"], 3);
}

#[tokio::test]
async fn upload_rejects_disallowed_extension() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(upload_request(multipart_body("file", "notes.txt", "hello")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["status"], "error");
    assert_eq!(json["messages"][0], "Allowed file types are .csv, .xlsx");
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn upload_without_file_part() {
    let dir = tempfile::tempdir().unwrap();
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"comment\"\r\n\r\nhi\r\n--{b}--\r\n",
        b = BOUNDARY
    );
    let response = app(dir.path()).oneshot(upload_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["messages"][0], "No file part");
}

#[tokio::test]
async fn upload_without_selected_file() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(upload_request(multipart_body("file", "", "")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["messages"][0], "No selected file");
}

#[tokio::test]
async fn empty_upload_fails_run_without_report() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let response = app
        .clone()
        .oneshot(upload_request(multipart_body("file", "empty.csv", "value1,category\n")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let json = body_json(response).await;
    assert_eq!(json["status"], "error");
    assert!(json.get("report_path").is_none());
    assert!(json["messages"][1]
        .as_str()
        .unwrap()
        .starts_with("Error during analysis of 'empty.csv'"));

    let run_id = json["run_id"].as_str().unwrap().to_string();
    let response = app
        .clone()
        .oneshot(get(&format!("/api/reports/{}", run_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app.oneshot(get("/api/runs")).await.unwrap();
    assert_eq!(body_json(response).await[0]["status"], "failed");
}

#[tokio::test]
async fn unknown_report_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let uri = format!("/api/reports/{}", uuid::Uuid::new_v4());
    let response = app(dir.path()).oneshot(get(&uri)).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn oversized_upload_is_rejected_and_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let mut csv = String::from("value1,category\n");
    while csv.len() < 2 * 1024 * 1024 {
        csv.push_str("12345,abcdef\n");
    }

    let response = app(dir.path())
        .oneshot(upload_request(multipart_body("file", "big.csv", &csv)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(response).await["status"], "error");
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}
