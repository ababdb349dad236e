//! Retry of transient provider errors.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use serde::{Deserialize, Serialize};

use crate::config::duration_str;
use crate::providers::{ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Extra attempts after the first; 0 disables retry
    pub max_retries: usize,

    #[serde(with = "duration_str")]
    pub min_delay: Duration,

    #[serde(with = "duration_str")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(4),
        }
    }
}

impl RetryConfig {
    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
    }
}

/// Call the provider, retrying rate limits and server errors with
/// exponential backoff. A rate limit's `retry_after` is not honored beyond
/// `max_delay`.
pub async fn complete_with_retry(
    provider: &dyn LlmProvider,
    messages: &[ChatMessage],
    config: &CompletionConfig,
    retry: &RetryConfig,
) -> Result<CompletionResponse, ProviderError> {
    let call = || provider.complete(messages.to_vec(), config);

    call.retry(retry.backoff())
        .sleep(tokio::time::sleep)
        .when(|e: &ProviderError| e.is_transient())
        .notify(|e: &ProviderError, delay: Duration| {
            tracing::debug!(
                provider = provider.name(),
                error = %e,
                delay_ms = delay.as_millis() as u64,
                "Retrying summary call"
            );
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::TokenUsage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyProvider {
        calls: AtomicU32,
        fail_first: u32,
        error: fn() -> ProviderError,
    }

    #[async_trait]
    impl LlmProvider for FlakyProvider {
        async fn complete(
            &self,
            _messages: Vec<ChatMessage>,
            config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                return Err((self.error)());
            }
            Ok(CompletionResponse {
                content: "{}".into(),
                usage: TokenUsage::default(),
                model: config.model.clone(),
                stop_reason: None,
            })
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    fn quick(max_retries: usize) -> RetryConfig {
        RetryConfig {
            max_retries,
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn test_retries_rate_limit() {
        let provider = FlakyProvider {
            calls: AtomicU32::new(0),
            fail_first: 1,
            error: || ProviderError::RateLimited { retry_after: None },
        };
        let result = complete_with_retry(&provider, &[], &CompletionConfig::default(), &quick(2)).await;
        assert!(result.is_ok());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_does_not_retry_permanent_errors() {
        let provider = FlakyProvider {
            calls: AtomicU32::new(0),
            fail_first: 5,
            error: || ProviderError::AuthError,
        };
        let result = complete_with_retry(&provider, &[], &CompletionConfig::default(), &quick(3)).await;
        assert!(matches!(result, Err(ProviderError::AuthError)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_retries_makes_one_call() {
        let provider = FlakyProvider {
            calls: AtomicU32::new(0),
            fail_first: 5,
            error: || ProviderError::HttpError("reset".into()),
        };
        let result = complete_with_retry(&provider, &[], &CompletionConfig::default(), &quick(0)).await;
        assert!(result.is_err());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
