//! The completion-service boundary and its HTTP implementation.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// System message sent with every completion request.
pub const SYSTEM_MESSAGE: &str = "You are an expert SaaS business analyst";

const TEMPERATURE: f64 = 0.3;
const TOP_P: f64 = 1.0;
const MAX_TOKENS: u32 = 1000;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Failure modes of a completion request.
///
/// Callers never surface these; the summarizer logs them and falls back.
#[derive(Error, Debug)]
pub enum CompletionError {
    /// Connection, TLS, or body-decoding failure.
    #[error("completion request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("completion endpoint returned HTTP {0}")]
    Status(StatusCode),

    /// The endpoint answered successfully but with no usable text.
    #[error("completion response contained no text")]
    EmptyResponse,
}

// ── Trait ─────────────────────────────────────────────────────────────────────

/// One-shot text completion against some model provider.
///
/// The pipeline only ever talks to this trait, so tests swap in a mock and
/// the provider can change without touching the summarizer.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

// ── HTTP implementation ───────────────────────────────────────────────────────

/// Connection settings for the chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Base URL, e.g. `https://models.github.ai/inference`.
    pub endpoint: String,
    /// Model identifier, e.g. `openai/gpt-4o`.
    pub model: String,
    /// Bearer token for the endpoint.
    pub api_key: String,
}

/// [`CompletionService`] backed by an OpenAI-style chat-completions API.
pub struct HttpCompletionService {
    client: Client,
    config: ServiceConfig,
}

impl HttpCompletionService {
    pub fn new(config: ServiceConfig) -> Result<HttpCompletionService, CompletionError> {
        let client = Client::builder()
            .user_agent(concat!("growthlens/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpCompletionService { client, config })
    }

    fn url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl CompletionService for HttpCompletionService {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_MESSAGE.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt.to_string(),
                },
            ],
            temperature: TEMPERATURE,
            top_p: TOP_P,
            max_tokens: MAX_TOKENS,
        };

        debug!("Requesting completion from {}", self.url());
        let response = self
            .client
            .post(self.url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CompletionError::Status(status));
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .filter_map(|c| c.message.content)
            .find(|text| !text.trim().is_empty())
            .ok_or(CompletionError::EmptyResponse)
    }
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f64,
    top_p: f64,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
