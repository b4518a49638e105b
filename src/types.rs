// Type definitions and error taxonomy

use std::path::PathBuf;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<LLMMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl LLMRequest {
    /// Single-turn request carrying one user prompt
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            model: None,
            messages: vec![LLMMessage::user(prompt)],
            max_tokens: None,
            temperature: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LLMMessage {
    pub role: String, // "user", "assistant", "system"
    pub content: String,
}

impl LLMMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub finish_reason: Option<String>,
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Failure classes of a single inference round trip.
///
/// The `Display` text of each variant is what ends up in the report when a
/// call fails, so it is written for humans.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    #[error("Error: inference service not running or not reachable at {endpoint}. Please start the model server.")]
    Unreachable { endpoint: String },

    #[error("Error: could not get a response from the inference service (status: {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Error: malformed response from the inference service: {0}")]
    MalformedResponse(String),

    #[error("Error: failed to get a response from the inference service - {0}")]
    Unexpected(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Unsupported file type: {extension}. Only .csv and .xlsx are supported.")]
    UnsupportedFormat { extension: String },

    #[error("The file '{}' was not found or is not readable", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("The file '{}' is empty or contains no data", path.display())]
    EmptySource { path: PathBuf },

    #[error("Malformed source data at line {line}: {reason}")]
    MalformedSource { line: u64, reason: String },

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Errors raised while opening or reading the source, which abort a run
    /// before any report is written.
    pub fn is_reading_failure(&self) -> bool {
        matches!(
            self,
            AppError::UnsupportedFormat { .. }
                | AppError::SourceNotFound { .. }
                | AppError::EmptySource { .. }
                | AppError::MalformedSource { .. }
        )
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
