use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::LlmConfig;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM gateway not configured")]
    NotConfigured,

    #[error("LLM gateway request failed: {0}")]
    Transport(String),

    #[error("LLM gateway returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("LLM gateway returned an unreadable response: {0}")]
    Decode(String),

    #[error("LLM gateway returned no content")]
    EmptyCompletion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletion {
    pub content: String,
    pub model: String,
}

#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatCompletion, LlmError>;
}

/// OpenAI-compatible `/chat/completions` gateway
pub struct HttpLlmGateway {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    default_model: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: Option<ChatMessage>,
}

impl HttpLlmGateway {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            default_model: config.default_model.clone(),
        })
    }
}

#[async_trait]
impl LlmGateway for HttpLlmGateway {
    async fn chat_completion(&self, mut request: ChatRequest) -> Result<ChatCompletion, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::NotConfigured);
        }
        if request.model.is_none() {
            request.model = Some(self.default_model.clone());
        }

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Upstream { status: status.as_u16(), message });
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;

        let content = body
            .choices
            .into_iter()
            .find_map(|c| c.message)
            .map(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyCompletion)?;

        Ok(ChatCompletion {
            content,
            model: body.model.or(request.model).unwrap_or_default(),
        })
    }
}
