//! Summarizer adapter: the only place a generative model is called.
//!
//! Every call is guarded by the circuit breaker, the token budget and a hard
//! timeout. Any failure along the way (no provider, open circuit, exhausted
//! budget, timeout, transport error, unusable output) yields the rule-based
//! summary instead. Summarization never fails the analysis.

mod response;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use termscope_core::{fallback_summary, ClauseSpan, EngineError, SummaryBundle};

use crate::config::{BudgetConfig, SummarizerConfig};
use crate::prompts::summary_messages;
use crate::providers::{CompletionConfig, LlmProvider, ProviderError, ProviderRegistry};
use crate::resilience::{
    complete_with_retry, BudgetTracker, CircuitBreaker, CircuitBreakerConfig, LlmUsage, RetryConfig,
};

pub use response::{extract_json, parse_summary, ResponseError};

/// Why the rule-based summary was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    NoProvider,
    CircuitOpen,
    BudgetExhausted,
    Timeout,
    ProviderFailed,
    InvalidResponse,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::NoProvider => "no_provider",
            FallbackReason::CircuitOpen => "circuit_open",
            FallbackReason::BudgetExhausted => "budget_exhausted",
            FallbackReason::Timeout => "timeout",
            FallbackReason::ProviderFailed => "provider_failed",
            FallbackReason::InvalidResponse => "invalid_response",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SummaryOutcome {
    pub bundle: SummaryBundle,

    /// Tokens spent on this summary, zero when no call was made
    pub usage: LlmUsage,

    /// Set when `bundle` is the rule-based summary
    pub fallback_reason: Option<FallbackReason>,
}

pub struct SummarizerAdapter {
    provider: Option<Arc<dyn LlmProvider>>,
    completion: CompletionConfig,
    timeout: Duration,
    prompt_token_budget: u32,
    fallback_top_n: usize,
    retry: RetryConfig,
    circuit_breaker: CircuitBreaker,
    budget: BudgetTracker,
}

impl std::fmt::Debug for SummarizerAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummarizerAdapter")
            .field("provider", &self.provider.as_ref().map(|p| p.name().to_string()))
            .field("model", &self.completion.model)
            .field("timeout", &self.timeout)
            .field("circuit_breaker", &self.circuit_breaker)
            .field("budget", &self.budget)
            .finish()
    }
}

impl Default for SummarizerAdapter {
    fn default() -> Self {
        Self::new(
            None,
            &SummarizerConfig::default(),
            CircuitBreakerConfig::default(),
            &BudgetConfig::default(),
        )
    }
}

impl SummarizerAdapter {
    pub fn new(
        provider: Option<Arc<dyn LlmProvider>>,
        config: &SummarizerConfig,
        circuit_breaker: CircuitBreakerConfig,
        budget: &BudgetConfig,
    ) -> Self {
        Self {
            provider,
            completion: CompletionConfig {
                model: config.model_name().to_string(),
                max_tokens: config.max_tokens,
                temperature: config.temperature,
                timeout: config.timeout,
            },
            timeout: config.timeout,
            prompt_token_budget: config.prompt_token_budget,
            fallback_top_n: config.fallback_top_n,
            retry: config.retry.clone(),
            circuit_breaker: CircuitBreaker::new(circuit_breaker),
            budget: BudgetTracker::new(budget.max_tokens),
        }
    }

    /// Build the configured provider from `registry`.
    pub fn from_registry(
        registry: &ProviderRegistry,
        config: &SummarizerConfig,
        circuit_breaker: CircuitBreakerConfig,
        budget: &BudgetConfig,
    ) -> Result<Self, ProviderError> {
        let provider = match config.provider {
            crate::config::ProviderKind::None => None,
            kind => Some(registry.create(kind.as_str(), &config.provider_config)?),
        };
        Ok(Self::new(provider, config, circuit_breaker, budget))
    }

    pub fn provider_name(&self) -> Option<&str> {
        self.provider.as_ref().map(|p| p.name())
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    /// Usage across every call this adapter has made.
    pub fn usage(&self) -> LlmUsage {
        self.budget.usage()
    }

    /// Summarize a document. Always returns a non-empty bundle.
    pub async fn summarize(&self, text: &str, clauses: &[ClauseSpan]) -> SummaryOutcome {
        match self.summarize_with_model(text, clauses).await {
            Ok((bundle, usage)) => SummaryOutcome {
                bundle,
                usage,
                fallback_reason: None,
            },
            Err((reason, usage)) => {
                tracing::info!(reason = reason.as_str(), "Using rule-based summary");
                SummaryOutcome {
                    bundle: fallback_summary(clauses, self.fallback_top_n),
                    usage,
                    fallback_reason: Some(reason),
                }
            }
        }
    }

    async fn summarize_with_model(
        &self,
        text: &str,
        clauses: &[ClauseSpan],
    ) -> Result<(SummaryBundle, LlmUsage), (FallbackReason, LlmUsage)> {
        let no_usage = LlmUsage::default;

        let Some(provider) = self.provider.as_deref() else {
            return Err((FallbackReason::NoProvider, no_usage()));
        };

        if self.circuit_breaker.is_open() {
            tracing::warn!(provider = provider.name(), "Summary circuit open, skipping model");
            return Err((FallbackReason::CircuitOpen, no_usage()));
        }

        let messages = summary_messages(text, clauses, self.prompt_token_budget);
        let estimated: u32 = messages
            .iter()
            .map(|m| provider.estimate_tokens(&m.content))
            .sum::<u32>()
            + self.completion.max_tokens;
        if !self.budget.can_afford(estimated) {
            tracing::warn!(
                estimated_tokens = estimated,
                remaining = self.budget.remaining(),
                "Token budget exhausted, skipping model"
            );
            return Err((FallbackReason::BudgetExhausted, no_usage()));
        }

        let call = complete_with_retry(provider, &messages, &self.completion, &self.retry);
        let response = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                let error = EngineError::ModelUnavailable(e.to_string());
                tracing::warn!(provider = provider.name(), error = %error, "Summary call failed");
                self.circuit_breaker.record_failure();
                return Err((FallbackReason::ProviderFailed, no_usage()));
            }
            Err(_) => {
                tracing::warn!(
                    provider = provider.name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Summary call timed out"
                );
                self.circuit_breaker.record_failure();
                return Err((FallbackReason::Timeout, no_usage()));
            }
        };

        self.budget.record_usage(&response.usage, &response.model);
        let mut usage = LlmUsage::default();
        usage.add(&response.usage, &response.model);

        match parse_summary(&response.content) {
            Ok(bundle) => {
                self.circuit_breaker.record_success();
                Ok((bundle, usage))
            }
            Err(e) => {
                tracing::warn!(provider = provider.name(), error = %e, "Unusable summary output");
                self.circuit_breaker.record_failure();
                Err((FallbackReason::InvalidResponse, usage))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ChatMessage, CompletionResponse, TokenUsage};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use termscope_core::{Category, CategoryTag, SummarySource};

    struct ScriptedProvider {
        reply: Result<&'static str, fn() -> ProviderError>,
        delay: Duration,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn replying(reply: &'static str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply),
                delay: Duration::ZERO,
                calls: AtomicU32::new(0),
            })
        }

        fn failing(error: fn() -> ProviderError) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(error),
                delay: Duration::ZERO,
                calls: AtomicU32::new(0),
            })
        }

        fn hanging() -> Arc<Self> {
            Arc::new(Self {
                reply: Ok("{}"),
                delay: Duration::from_secs(3600),
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn complete(
            &self,
            _messages: Vec<ChatMessage>,
            config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match self.reply {
                Ok(content) => Ok(CompletionResponse {
                    content: content.to_string(),
                    usage: TokenUsage {
                        prompt_tokens: 120,
                        completion_tokens: 40,
                    },
                    model: config.model.clone(),
                    stop_reason: Some("end_turn".into()),
                }),
                Err(make) => Err(make()),
            }
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn clauses() -> Vec<ClauseSpan> {
        let text = "We collect your email address and phone number.";
        vec![ClauseSpan {
            index: 0,
            start: 0,
            end: text.len(),
            text: text.to_string(),
            tags: vec![CategoryTag {
                category: Category::DataCollection,
                confidence: 0.8,
            }],
        }]
    }

    fn adapter(provider: Arc<dyn LlmProvider>, config: SummarizerConfig) -> SummarizerAdapter {
        SummarizerAdapter::new(
            Some(provider),
            &config,
            CircuitBreakerConfig::default(),
            &BudgetConfig::default(),
        )
    }

    fn no_retry() -> SummarizerConfig {
        SummarizerConfig {
            retry: RetryConfig {
                max_retries: 0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_model_summary_used_when_valid() {
        let provider = ScriptedProvider::replying(
            r#"```json
{"summary": "Collects contact details.", "data_collection": ["Email address"], "user_rights": [], "recommendations": ["Use a separate email"]}
```"#,
        );
        let adapter = adapter(provider, no_retry());
        let outcome = adapter.summarize("We collect your email address.", &clauses()).await;

        assert_eq!(outcome.fallback_reason, None);
        assert_eq!(outcome.bundle.source, SummarySource::Model);
        assert_eq!(outcome.bundle.summary, "Collects contact details.");
        assert_eq!(outcome.usage.total_tokens, 160);
        assert_eq!(adapter.usage().llm_calls, 1);
    }

    #[tokio::test]
    async fn test_no_provider_falls_back() {
        let adapter = SummarizerAdapter::default();
        let outcome = adapter.summarize("text", &clauses()).await;
        assert_eq!(outcome.fallback_reason, Some(FallbackReason::NoProvider));
        assert_eq!(outcome.bundle.source, SummarySource::Fallback);
        assert!(!outcome.bundle.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_back() {
        let adapter = adapter(ScriptedProvider::hanging(), no_retry());
        let outcome = adapter.summarize("text", &clauses()).await;
        assert_eq!(outcome.fallback_reason, Some(FallbackReason::Timeout));
        assert_eq!(outcome.bundle.source, SummarySource::Fallback);
        assert_eq!(outcome.usage, LlmUsage::default());
    }

    #[tokio::test]
    async fn test_malformed_output_falls_back_and_counts_usage() {
        let adapter = adapter(ScriptedProvider::replying("Sorry, I can't help with that."), no_retry());
        let outcome = adapter.summarize("text", &clauses()).await;
        assert_eq!(outcome.fallback_reason, Some(FallbackReason::InvalidResponse));
        assert_eq!(outcome.usage.llm_calls, 1);
    }

    #[tokio::test]
    async fn test_repeated_failures_open_circuit() {
        let provider = ScriptedProvider::failing(|| ProviderError::ApiError {
            status: 400,
            message: "bad request".into(),
        });
        let adapter = adapter(provider.clone(), no_retry());

        for _ in 0..3 {
            let outcome = adapter.summarize("text", &clauses()).await;
            assert_eq!(outcome.fallback_reason, Some(FallbackReason::ProviderFailed));
        }
        let outcome = adapter.summarize("text", &clauses()).await;
        assert_eq!(outcome.fallback_reason, Some(FallbackReason::CircuitOpen));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_skips_model() {
        let provider = ScriptedProvider::replying(r#"{"summary": "ok"}"#);
        let adapter = SummarizerAdapter::new(
            Some(provider.clone()),
            &no_retry(),
            CircuitBreakerConfig::default(),
            &BudgetConfig { max_tokens: 100 },
        );
        let outcome = adapter.summarize("text", &clauses()).await;
        assert_eq!(outcome.fallback_reason, Some(FallbackReason::BudgetExhausted));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_from_registry_without_provider() {
        let adapter = SummarizerAdapter::from_registry(
            &ProviderRegistry::new(),
            &SummarizerConfig::default(),
            CircuitBreakerConfig::default(),
            &BudgetConfig::default(),
        )
        .unwrap();
        assert_eq!(adapter.provider_name(), None);
    }

    #[test]
    fn test_from_registry_unknown_provider() {
        let config = SummarizerConfig {
            provider: crate::config::ProviderKind::Anthropic,
            ..Default::default()
        };
        let result = SummarizerAdapter::from_registry(
            &ProviderRegistry::new(),
            &config,
            CircuitBreakerConfig::default(),
            &BudgetConfig::default(),
        );
        assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
    }
}
