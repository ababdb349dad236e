//! Generative-model providers.
//!
//! The summarizer only ever talks to a model through [`LlmProvider`]. Two
//! backends ship behind features: the Anthropic Messages API (`anthropic`)
//! and a local Ollama server (`ollama`). Tests and embedders can supply
//! their own implementation.
//!
//! ## Security
//!
//! Credentials go through the [`secrets`] module so they never show up in
//! `Debug` or `Display` output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

mod factory;
pub mod secrets;

#[cfg(feature = "anthropic")]
mod anthropic;

#[cfg(feature = "ollama")]
mod ollama;

pub use factory::{ProviderFactory, ProviderRegistry};
pub use secrets::{ApiCredential, CredentialSource};

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicProvider, AnthropicProviderFactory};

#[cfg(feature = "ollama")]
pub use ollama::{OllamaProvider, OllamaProviderFactory};

/// Errors from model providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. } | ProviderError::HttpError(_))
            || matches!(self, ProviderError::ApiError { status, .. } if *status >= 500)
    }
}

/// Settings for one completion request.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub model: String,

    /// Upper bound on generated tokens
    pub max_tokens: u32,

    /// Low values keep summaries stable across runs
    pub temperature: f32,

    /// Transport-level timeout; the summarizer applies its own hard timeout on top
    pub timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5-20250514".to_string(),
            max_tokens: 800,
            temperature: 0.1,
            timeout: Duration::from_secs(20),
        }
    }
}

/// A chat message for a completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// "system", "user" or "assistant"
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Split a conversation into its system prompt and the remaining turns.
pub(crate) fn split_system(messages: Vec<ChatMessage>) -> (Option<String>, Vec<ChatMessage>) {
    let mut system: Option<String> = None;
    let mut turns = Vec::new();
    for message in messages {
        if message.role == "system" {
            system = Some(match system {
                Some(existing) => format!("{}\n\n{}", existing, message.content),
                None => message.content,
            });
        } else {
            turns.push(message);
        }
    }
    (system, turns)
}

/// Response from a completion.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub usage: TokenUsage,
    pub model: String,
    pub stop_reason: Option<String>,
}

/// Token usage reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// A generative-model backend: prompt in, text out.
///
/// Calls may fail or hang; callers treat every call as best-effort.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    async fn health_check(&self) -> bool;

    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Rough token estimate, about four characters per token.
    fn estimate_tokens(&self, text: &str) -> u32 {
        estimate_tokens(text)
    }
}

pub fn estimate_tokens(text: &str) -> u32 {
    (text.chars().count() / 4) as u32
}

/// Shared HTTP client for provider backends.
#[cfg(any(feature = "anthropic", feature = "ollama"))]
pub(crate) fn http_client() -> Result<&'static reqwest::Client, ProviderError> {
    static CLIENT: std::sync::OnceLock<reqwest::Client> = std::sync::OnceLock::new();
    if let Some(client) = CLIENT.get() {
        return Ok(client);
    }
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;
    Ok(CLIENT.get_or_init(|| client))
}
