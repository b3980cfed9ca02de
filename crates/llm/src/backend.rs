//! LLM Backend implementations
//!
//! A single OpenAI-compatible chat completions backend. It works with
//! OpenAI itself and with local servers exposing the same API (vLLM,
//! Ollama's `/v1` endpoint, LM Studio).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use wa_agent_config::LlmConfig;

use crate::prompt::Message;
use crate::LlmError;

/// LLM generation result
#[derive(Debug, Clone)]
pub struct GenerationResult {
    /// Generated text
    pub text: String,
    /// Tokens generated
    pub tokens: usize,
    /// Total generation time (ms)
    pub total_time_ms: u64,
    /// Finish reason
    pub finish_reason: FinishReason,
}

/// Finish reason
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
}

/// LLM Backend trait
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generate a response
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError>;

    /// Check if model is available
    async fn is_available(&self) -> bool;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Configuration for OpenAI-compatible backends
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// API endpoint, e.g. `https://api.openai.com/v1`
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: String::new(),
            max_tokens: 400,
            temperature: 0.4,
            timeout: Duration::from_secs(30),
        }
    }
}

impl OpenAIConfig {
    /// Create config for a local OpenAI-compatible server
    pub fn local(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            ..Default::default()
        }
    }
}

impl From<&LlmConfig> for OpenAIConfig {
    fn from(config: &LlmConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone().unwrap_or_default(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: Duration::from_secs(config.timeout_seconds.max(1)),
        }
    }
}

fn is_local(endpoint: &str) -> bool {
    endpoint.starts_with("http://localhost") || endpoint.starts_with("http://127.0.0.1")
}

/// OpenAI-compatible backend
pub struct OpenAIBackend {
    config: OpenAIConfig,
    client: Client,
}

impl OpenAIBackend {
    /// Create new OpenAI backend
    pub fn new(config: OpenAIConfig) -> Result<Self, LlmError> {
        if config.api_key.is_empty() && !is_local(&config.endpoint) {
            return Err(LlmError::Configuration(
                "API key required for remote endpoints".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Get the full API URL for chat completions
    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'))
    }

    fn build_request(&self, messages: &[Message]) -> OpenAIChatRequest {
        OpenAIChatRequest {
            model: self.config.model.clone(),
            messages: messages.iter().map(OpenAIMessage::from).collect(),
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
            stream: Some(false),
        }
    }

    fn parse_response(
        response: OpenAIChatResponse,
        total_time_ms: u64,
    ) -> Result<GenerationResult, LlmError> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?;

        let text = choice.message.content.trim().to_string();
        if text.is_empty() {
            return Err(LlmError::InvalidResponse("Empty completion".to_string()));
        }

        Ok(GenerationResult {
            text,
            tokens: response.usage.map(|u| u.completion_tokens).unwrap_or(0),
            total_time_ms,
            finish_reason: match choice.finish_reason.as_deref() {
                Some("length") => FinishReason::Length,
                _ => FinishReason::Stop,
            },
        })
    }
}

#[async_trait]
impl LlmBackend for OpenAIBackend {
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
        let start = Instant::now();
        let request = self.build_request(messages);

        let mut builder = self.client.post(self.chat_url()).json(&request);
        if !self.config.api_key.is_empty() {
            builder = builder.bearer_auth(&self.config.api_key);
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("HTTP {}: {}", status, error_text)));
        }

        let response: OpenAIChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let result = Self::parse_response(response, start.elapsed().as_millis() as u64)?;
        tracing::debug!(
            model = %self.config.model,
            tokens = result.tokens,
            total_time_ms = result.total_time_ms,
            "LLM generation complete"
        );
        Ok(result)
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/models", self.config.endpoint.trim_end_matches('/'));
        let mut builder = self.client.get(&url).timeout(Duration::from_secs(5));
        if !self.config.api_key.is_empty() {
            builder = builder.bearer_auth(&self.config.api_key);
        }
        builder
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(default)]
    content: String,
}

impl From<&Message> for OpenAIMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role.to_string(),
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIChatResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    completion_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_requires_key_for_remote() {
        assert!(OpenAIBackend::new(OpenAIConfig::default()).is_err());
        assert!(OpenAIBackend::new(OpenAIConfig::local("http://localhost:8000/v1", "llama-3")).is_ok());

        let config = OpenAIConfig {
            api_key: "sk-xxx".to_string(),
            ..Default::default()
        };
        assert!(OpenAIBackend::new(config).is_ok());
    }

    #[test]
    fn test_chat_url() {
        let backend =
            OpenAIBackend::new(OpenAIConfig::local("http://localhost:8000/v1/", "llama-3")).unwrap();
        assert_eq!(backend.chat_url(), "http://localhost:8000/v1/chat/completions");
    }

    #[test]
    fn test_from_settings() {
        let settings = LlmConfig {
            api_key: Some("sk-abc".to_string()),
            timeout_seconds: 12,
            ..Default::default()
        };
        let config = OpenAIConfig::from(&settings);
        assert_eq!(config.api_key, "sk-abc");
        assert_eq!(config.timeout, Duration::from_secs(12));
        assert_eq!(config.model, settings.model);
    }

    #[test]
    fn test_request_serialization() {
        let backend =
            OpenAIBackend::new(OpenAIConfig::local("http://localhost:8000/v1", "llama-3")).unwrap();
        let request = backend.build_request(&[Message::system("sys"), Message::user("halo")]);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "llama-3");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "halo");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_parse_response() {
        let response: OpenAIChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":" Buka jam 10 pagi. "},"finish_reason":"stop"}],
                "usage":{"completion_tokens":7,"prompt_tokens":40,"total_tokens":47}}"#,
        )
        .unwrap();
        let result = OpenAIBackend::parse_response(response, 120).unwrap();
        assert_eq!(result.text, "Buka jam 10 pagi.");
        assert_eq!(result.tokens, 7);
        assert_eq!(result.finish_reason, FinishReason::Stop);

        let truncated: OpenAIChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"Menu kami"},"finish_reason":"length"}]}"#,
        )
        .unwrap();
        let result = OpenAIBackend::parse_response(truncated, 80).unwrap();
        assert_eq!(result.finish_reason, FinishReason::Length);
        assert_eq!(result.tokens, 0);

        let empty: OpenAIChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(OpenAIBackend::parse_response(empty, 0).is_err());
    }
}
