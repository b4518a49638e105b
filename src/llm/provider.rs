use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::LLMConfig;
use crate::types::{AppError, AppResult, InferenceError, LLMRequest, LLMResponse};

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;

    /// Where requests go, for log lines and error messages
    fn endpoint(&self) -> &str;
}

/// Generation parameters applied to every prompt
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl From<&LLMConfig> for GenerationSettings {
    fn from(config: &LLMConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// Text produced for a prompt: the model's output, or the description of
/// why the call failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Narrative {
    pub text: String,
    pub failed: bool,
}

impl Narrative {
    pub fn generated(text: impl Into<String>) -> Self {
        Self { text: text.into(), failed: false }
    }

    pub fn from_error(error: &InferenceError) -> Self {
        Self { text: error.to_string(), failed: true }
    }
}

/// One synchronous request/response per prompt. No retries; every failure
/// is turned into readable text for the caller.
#[derive(Clone)]
pub struct InferenceClient {
    adapter: Arc<dyn LLMAdapter>,
    settings: GenerationSettings,
}

impl InferenceClient {
    pub fn new(adapter: Arc<dyn LLMAdapter>, settings: GenerationSettings) -> Self {
        Self { adapter, settings }
    }

    pub fn from_config(config: &LLMConfig) -> AppResult<Self> {
        let adapter = crate::llm::openai_compat::OpenAICompatibleAdapter::new(config)?;
        Ok(Self::new(Arc::new(adapter), GenerationSettings::from(config)))
    }

    pub fn endpoint(&self) -> &str {
        self.adapter.endpoint()
    }

    fn build_request(&self, prompt: &str) -> LLMRequest {
        let mut request = LLMRequest::from_prompt(prompt);
        request.model = self.settings.model.clone();
        request.temperature = Some(self.settings.temperature);
        request.max_tokens = Some(self.settings.max_tokens);
        request
    }

    /// Run one round trip, keeping the failure class
    pub async fn try_generate(&self, prompt: &str) -> Result<String, InferenceError> {
        let request = self.build_request(prompt);
        match self.adapter.create_chat_completion(&request).await {
            Ok(response) => Ok(response.content),
            Err(AppError::Inference(e)) => Err(e),
            Err(other) => Err(InferenceError::Unexpected(other.to_string())),
        }
    }

    /// Run one round trip; failures come back as narrative text
    pub async fn generate(&self, prompt: &str) -> Narrative {
        let preview: String = prompt.chars().take(200).collect();
        info!(endpoint = %self.endpoint(), prompt_len = prompt.len(), %preview, "Calling inference service");

        match self.try_generate(prompt).await {
            Ok(text) => {
                info!(response_len = text.len(), "Inference call succeeded");
                Narrative::generated(text)
            }
            Err(e) => {
                warn!(error = %e, "Inference call failed");
                Narrative::from_error(&e)
            }
        }
    }
}
