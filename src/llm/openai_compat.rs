// OpenAI-compatible chat completions adapter
// Works with local model servers that expose /v1/chat/completions
// (LM Studio, llama.cpp server, Ollama, Open WebUI, vLLM).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::LLMConfig;
use crate::llm::provider::LLMAdapter;
use crate::types::{AppError, AppResult, InferenceError, LLMMessage, LLMRequest, LLMResponse, TokenUsage};

pub struct OpenAICompatibleAdapter {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

// Request body
#[derive(Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: &'a [LLMMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

// Response body
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl OpenAICompatibleAdapter {
    /// Build an adapter with the configured per-call timeout
    pub fn new(config: &LLMConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint(),
            api_key: config.api_key.clone(),
        })
    }

    /// Connection failures and timeouts both mean the service is not answering
    fn classify_send_error(&self, err: reqwest::Error) -> InferenceError {
        if err.is_connect() || err.is_timeout() {
            InferenceError::Unreachable { endpoint: self.endpoint.clone() }
        } else {
            InferenceError::Unexpected(err.to_string())
        }
    }
}

#[async_trait]
impl LLMAdapter for OpenAICompatibleAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        let body = ChatRequest {
            model: request.model.as_deref(),
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        };

        let mut builder = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.classify_send_error(e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    self.classify_send_error(e)
                } else {
                    InferenceError::Unexpected(format!("Failed to read response body: {}", e))
                }
            })?;

        if !status.is_success() {
            return Err(InferenceError::Status { status: status.as_u16(), body: text }.into());
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| InferenceError::MalformedResponse(e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| InferenceError::MalformedResponse("response contained no choices".to_string()))?;

        Ok(LLMResponse {
            content: choice.message.content,
            finish_reason: choice.finish_reason,
            usage: parsed.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn config_for(base_url: String) -> LLMConfig {
        LLMConfig {
            base_url,
            timeout_secs: 5,
            ..LLMConfig::default()
        }
    }

    fn request() -> LLMRequest {
        let mut request = LLMRequest::from_prompt("Summarize this chunk");
        request.temperature = Some(0.7);
        request.max_tokens = Some(500);
        request
    }

    #[tokio::test]
    async fn test_success_extracts_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_body(Matcher::PartialJson(json!({
                "messages": [{"role": "user", "content": "Summarize this chunk"}],
                "temperature": 0.7,
                "max_tokens": 500,
                "stream": false
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "choices": [{"message": {"role": "assistant", "content": "Values trend upward."}, "finish_reason": "stop"}],
                    "usage": {"prompt_tokens": 10, "completion_tokens": 4, "total_tokens": 14}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let adapter = OpenAICompatibleAdapter::new(&config_for(server.url())).unwrap();
        let response = adapter.create_chat_completion(&request()).await.unwrap();

        assert_eq!(response.content, "Values trend upward.");
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));
        assert_eq!(response.usage.unwrap().total_tokens, 14);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_bearer_key_is_sent_when_configured() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"ok"}}]}"#)
            .create_async()
            .await;

        let mut config = config_for(server.url());
        config.api_key = Some("secret".to_string());
        let adapter = OpenAICompatibleAdapter::new(&config).unwrap();
        let response = adapter.create_chat_completion(&request()).await.unwrap();
        assert_eq!(response.content, "ok");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_keeps_code_and_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(503)
            .with_body("model is loading")
            .create_async()
            .await;

        let adapter = OpenAICompatibleAdapter::new(&config_for(server.url())).unwrap();
        match adapter.create_chat_completion(&request()).await {
            Err(AppError::Inference(InferenceError::Status { status, body })) => {
                assert_eq!(status, 503);
                assert_eq!(body, "model is loading");
            }
            other => panic!("unexpected: {:?}", other.map(|r| r.content)),
        }
    }

    #[tokio::test]
    async fn test_unparseable_body_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let adapter = OpenAICompatibleAdapter::new(&config_for(server.url())).unwrap();
        let err = adapter.create_chat_completion(&request()).await.unwrap_err();
        assert!(matches!(err, AppError::Inference(InferenceError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_empty_choices_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let adapter = OpenAICompatibleAdapter::new(&config_for(server.url())).unwrap();
        let err = adapter.create_chat_completion(&request()).await.unwrap_err();
        assert!(matches!(err, AppError::Inference(InferenceError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_connection_refused_is_unreachable() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let adapter = OpenAICompatibleAdapter::new(&config_for(format!("http://127.0.0.1:{}", port))).unwrap();
        let err = adapter.create_chat_completion(&request()).await.unwrap_err();
        assert!(matches!(err, AppError::Inference(InferenceError::Unreachable { .. })));
    }

    #[tokio::test]
    async fn test_stalled_service_times_out_as_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let stall = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        });

        let mut config = config_for(format!("http://127.0.0.1:{}", port));
        config.timeout_secs = 1;
        let adapter = OpenAICompatibleAdapter::new(&config).unwrap();
        let err = adapter.create_chat_completion(&request()).await.unwrap_err();

        match err {
            AppError::Inference(InferenceError::Unreachable { endpoint }) => {
                assert_eq!(endpoint, config.endpoint());
            }
            other => panic!("unexpected: {:?}", other),
        }
        stall.abort();
    }
}
