//! OpenAI-compatible chat completion client.
//!
//! Works with OpenAI and anything exposing the same `/chat/completions`
//! endpoint (Ollama, vLLM, LM Studio, ...).

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::config::Config;

/// Automatic retries for transient transport failures
pub const DEFAULT_MAX_RETRIES: u32 = 5;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Failed to connect to LLM API: {0}")]
    Connection(String),

    #[error("LLM API rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("LLM API server error ({status}): {body}")]
    Server { status: u16, body: String },

    #[error("LLM API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse LLM API response: {0}")]
    InvalidResponse(String),

    #[error("LLM API returned no content")]
    EmptyResponse,
}

impl LlmError {
    /// Connectivity, rate-limit and 5xx failures are worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::Connection(_) | LlmError::RateLimited(_) | LlmError::Server { .. }
        )
    }

    fn from_status(status: StatusCode, body: String) -> Self {
        if status == StatusCode::TOO_MANY_REQUESTS {
            LlmError::RateLimited(body)
        } else if status.is_server_error() {
            LlmError::Server {
                status: status.as_u16(),
                body,
            }
        } else {
            LlmError::Api {
                status: status.as_u16(),
                body,
            }
        }
    }
}

/// A single-turn prompt sent to the model
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            temperature,
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Anything that can answer a chat prompt with text
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_retries: u32,
    initial_backoff: Duration,
}

impl OpenAiClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("arxiv-digest/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model_name.clone(),
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: Duration::from_secs(1),
        })
    }

    pub fn with_retry_policy(mut self, max_retries: u32, initial_backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn backoff(&self, attempt: u32, error: &LlmError) -> Duration {
        // Longer backoff for rate limits
        if matches!(error, LlmError::RateLimited(_)) {
            self.initial_backoff * 15 * (attempt + 1)
        } else {
            self.initial_backoff * 2_u32.pow(attempt)
        }
    }

    async fn try_complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let body = CompletionRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            return Err(LlmError::from_status(status, error_text));
        }

        let completion = response
            .json::<CompletionResponse>()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .ok_or(LlmError::EmptyResponse)
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError> {
        let mut attempt = 0;
        loop {
            match self.try_complete(&request).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let backoff = self.backoff(attempt, &e);
                    warn!(
                        error = %e,
                        retry = attempt + 1,
                        max_retries = self.max_retries,
                        "LLM request failed, retrying in {:?}",
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
