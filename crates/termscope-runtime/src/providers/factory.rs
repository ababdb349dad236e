//! Provider registry.
//!
//! Backends register a factory under a type name ("anthropic", "ollama").
//! The summarizer configuration names a type and passes provider-specific
//! JSON; the registry turns that into a provider instance.
//!
//! ```ignore
//! let registry = ProviderRegistry::with_defaults();
//! let provider = registry.create("ollama", &json!({"model": "llama3.1:8b"}))?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::{LlmProvider, ProviderError};

/// Builds providers of one type from JSON configuration.
pub trait ProviderFactory: Send + Sync {
    /// Type name used in configuration.
    fn provider_type(&self) -> &'static str;

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError>;

    /// Check configuration without building a provider.
    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError>;

    fn default_config(&self) -> JsonValue {
        serde_json::json!({})
    }

    fn description(&self) -> &'static str {
        "Generative model provider"
    }
}

/// Provider factories keyed by type name.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<String, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any factory with the same type name.
    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        self.factories
            .insert(factory.provider_type().to_string(), factory);
    }

    pub fn create(
        &self,
        provider_type: &str,
        config: &JsonValue,
    ) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        self.factory(provider_type)?.create(config)
    }

    pub fn validate(&self, provider_type: &str, config: &JsonValue) -> Result<(), ProviderError> {
        self.factory(provider_type)?.validate_config(config)
    }

    fn factory(&self, provider_type: &str) -> Result<&Arc<dyn ProviderFactory>, ProviderError> {
        self.factories.get(provider_type).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "Unknown provider type: '{}'. Available: {:?}",
                provider_type,
                self.available_types()
            ))
        })
    }

    pub fn available_types(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    pub fn has_provider(&self, provider_type: &str) -> bool {
        self.factories.contains_key(provider_type)
    }

    pub fn default_config(&self, provider_type: &str) -> Option<JsonValue> {
        self.factories
            .get(provider_type)
            .map(|f| f.default_config())
    }

    /// Registry with every provider compiled into this build.
    #[allow(unused_mut)]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        #[cfg(feature = "anthropic")]
        registry.register(Arc::new(super::AnthropicProviderFactory));
        #[cfg(feature = "ollama")]
        registry.register(Arc::new(super::OllamaProviderFactory));
        registry
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.available_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ChatMessage, CompletionConfig, CompletionResponse, TokenUsage};
    use async_trait::async_trait;

    struct EchoProvider {
        name: String,
    }

    #[async_trait]
    impl LlmProvider for EchoProvider {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            Ok(CompletionResponse {
                content: messages.last().map(|m| m.content.clone()).unwrap_or_default(),
                usage: TokenUsage::default(),
                model: config.model.clone(),
                stop_reason: None,
            })
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    struct EchoFactory;

    impl ProviderFactory for EchoFactory {
        fn provider_type(&self) -> &'static str {
            "echo"
        }

        fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
            self.validate_config(config)?;
            let name = config["name"].as_str().unwrap_or("echo").to_string();
            Ok(Arc::new(EchoProvider { name }))
        }

        fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
            if config.get("name").is_some_and(|v| !v.is_string()) {
                return Err(ProviderError::NotConfigured("name must be a string".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_register_and_create() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(EchoFactory));

        assert!(registry.has_provider("echo"));
        let provider = registry
            .create("echo", &serde_json::json!({"name": "local-echo"}))
            .unwrap();
        assert_eq!(provider.name(), "local-echo");
    }

    #[test]
    fn test_unknown_provider_lists_available() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(EchoFactory));

        match registry.create("gpt", &serde_json::json!({})) {
            Err(ProviderError::NotConfigured(msg)) => {
                assert!(msg.contains("Unknown provider type: 'gpt'"));
                assert!(msg.contains("echo"));
            }
            other => panic!("expected NotConfigured, got {:?}", other.map(|p| p.name().to_string())),
        }
    }

    #[test]
    fn test_validate() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(EchoFactory));

        assert!(registry.validate("echo", &serde_json::json!({})).is_ok());
        assert!(registry.validate("echo", &serde_json::json!({"name": 3})).is_err());
        assert!(registry.validate("missing", &serde_json::json!({})).is_err());
    }

    #[test]
    fn test_with_defaults_matches_features() {
        let registry = ProviderRegistry::with_defaults();
        assert_eq!(registry.has_provider("anthropic"), cfg!(feature = "anthropic"));
        assert_eq!(registry.has_provider("ollama"), cfg!(feature = "ollama"));
    }
}
