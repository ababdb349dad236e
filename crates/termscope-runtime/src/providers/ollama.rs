//! Local Ollama server provider.
//!
//! Uses the non-streaming `/api/generate` endpoint. No credentials.

use super::{
    factory::ProviderFactory, http_client, split_system, ChatMessage, CompletionConfig,
    CompletionResponse, LlmProvider, ProviderError, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.1:8b";

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    base_url: String,
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new(DEFAULT_OLLAMA_URL)
    }
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &JsonValue) -> Self {
        Self::new(config["base_url"].as_str().unwrap_or(DEFAULT_OLLAMA_URL))
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    model: String,
    response: String,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
    #[serde(default)]
    done_reason: Option<String>,
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let client = http_client()?;
        let (system, turns) = split_system(messages);
        let prompt = turns
            .into_iter()
            .map(|m| m.content)
            .collect::<Vec<_>>()
            .join("\n\n");

        let request = GenerateRequest {
            model: config.model.clone(),
            prompt,
            system,
            stream: false,
            options: GenerateOptions {
                temperature: config.temperature,
                num_predict: config.max_tokens,
            },
        };

        let response = client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(config.timeout)
                } else {
                    ProviderError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if status == 429 {
            return Err(ProviderError::RateLimited { retry_after: None });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(CompletionResponse {
            content: body.response,
            usage: TokenUsage {
                prompt_tokens: body.prompt_eval_count,
                completion_tokens: body.eval_count,
            },
            model: if body.model.is_empty() {
                config.model.clone()
            } else {
                body.model
            },
            stop_reason: body.done_reason,
        })
    }

    async fn health_check(&self) -> bool {
        let Ok(client) = http_client() else {
            return false;
        };
        client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Builds [`OllamaProvider`]s.
///
/// ```json
/// { "base_url": "http://localhost:11434" }
/// ```
pub struct OllamaProviderFactory;

impl ProviderFactory for OllamaProviderFactory {
    fn provider_type(&self) -> &'static str {
        "ollama"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        self.validate_config(config)?;
        Ok(Arc::new(OllamaProvider::from_config(config)))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        if let Some(url) = config["base_url"].as_str() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ProviderError::NotConfigured(
                    "base_url must start with http:// or https://".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn default_config(&self) -> JsonValue {
        serde_json::json!({ "base_url": DEFAULT_OLLAMA_URL })
    }

    fn description(&self) -> &'static str {
        "Local Ollama server"
    }
}
