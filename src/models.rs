use std::path::PathBuf;

use crate::analysis::GlobalSummary;
use crate::config::Config;
use crate::data_registry::RunRegistry;
use crate::llm::InferenceClient;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub inference: InferenceClient,
    pub runs: RunRegistry,
}

// Pipeline data model

/// Outcome of one chunk, appended in processing order
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChunkResult {
    /// 1-based, sequential
    pub chunk_id: usize,
    pub row_count: u64,
    pub summary: String,
    pub narrative: String,
    pub inference_failed: bool,
}

/// Terminal artifact of a completed run
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AnalysisReport {
    pub file_path: PathBuf,
    pub chunk_size: usize,
    pub global_summary: GlobalSummary,
    pub chunk_results: Vec<ChunkResult>,
    pub final_narrative: String,
    pub final_inference_failed: bool,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
}

impl AnalysisReport {
    pub fn failed_inference_calls(&self) -> usize {
        self.chunk_results.iter().filter(|r| r.inference_failed).count()
            + usize::from(self.final_inference_failed)
    }
}

// HTTP payloads

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub inference_endpoint: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UploadResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<uuid::Uuid>,
    /// Flash-style messages for the user, in order
    pub messages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<GlobalSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadResponse {
    pub fn rejected(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status: "error".to_string(),
            run_id: None,
            messages: vec![message.clone()],
            report_path: None,
            summary: None,
            error: Some(message),
        }
    }
}
