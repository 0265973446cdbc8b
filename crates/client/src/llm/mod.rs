//! Text generation seam.
//!
//! The pipeline only needs "one prompt in, one text blob out"; everything
//! about the text's internal format is left to the extraction engine.
//!
//! - `TextGenerator` is the trait the coordinator depends on.
//! - `ChatCompletionsClient` talks to any OpenAI-compatible
//!   `/chat/completions` endpoint with bearer authentication.

pub mod error;
pub mod request;

pub use error::GenerateError;

use async_trait::async_trait;
use docket_core::AppConfig;
use request::{ChatMessage, ChatRequest, ChatResponse};
use reqwest::{StatusCode, header};
use std::time::{Duration, Instant};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const DEFAULT_MODEL: &str = "gpt-4o";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Produces one text blob per prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError>;
}

/// Chat completions client configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    /// Base URL without trailing `/chat/completions`.
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            system_prompt: None,
            temperature: Some(0.1),
        }
    }
}

impl LlmConfig {
    /// Build from application config. Fails when no API key is configured.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, GenerateError> {
        let api_key = config.require_llm_api_key().map_err(|_| GenerateError::MissingApiKey)?;
        Ok(Self {
            api_key: api_key.to_string(),
            base_url: config.llm_base_url.clone(),
            model: config.llm_model.clone(),
            timeout: config.llm_timeout(),
            ..Default::default()
        })
    }
}

/// OpenAI-compatible chat completions client.
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl ChatCompletionsClient {
    pub fn new(config: LlmConfig) -> Result<Self, GenerateError> {
        if config.api_key.trim().is_empty() {
            return Err(GenerateError::MissingApiKey);
        }

        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

/// Map a non-success status to an error.
fn status_error(status: StatusCode) -> GenerateError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GenerateError::Auth,
        StatusCode::TOO_MANY_REQUESTS => GenerateError::RateLimited,
        other => GenerateError::Http { status: other.as_u16() },
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionsClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        let start = Instant::now();

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = self.config.system_prompt.as_deref() {
            messages.push(ChatMessage { role: "system", content: system });
        }
        messages.push(ChatMessage { role: "user", content: prompt });

        let body = ChatRequest { model: &self.config.model, messages, temperature: self.config.temperature };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .header(header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(status = status.as_u16(), model = %self.config.model, "chat completion response");

        if !status.is_success() {
            return Err(status_error(status));
        }

        let bytes = response.bytes().await?;
        let parsed: ChatResponse = serde_json::from_slice(&bytes).map_err(|e| GenerateError::Parse(e.to_string()))?;
        let text = parsed.into_text().ok_or(GenerateError::Empty)?;

        tracing::debug!(elapsed_ms = start.elapsed().as_millis() as u64, length = text.len(), "completion received");
        Ok(text)
    }
}
