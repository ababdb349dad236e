//! Engine configuration loaded from YAML.
//!
//! Every section is optional and falls back to its defaults:
//!
//! ```yaml
//! summarizer:
//!   provider: ollama
//!   model: llama3.1:8b
//!   timeout: 20s
//! history:
//!   ttl: 12h
//!   path: /var/lib/termscope/history
//! telemetry:
//!   log_level: debug
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use termscope_core::{
    ClassifierConfig, ComparisonConfig, Engine, NormalizerConfig, ScoringConfig,
};

use crate::resilience::{CircuitBreakerConfig, RetryConfig};

/// Smallest accepted `normalizer.max_clause_chars`.
pub const MIN_CLAUSE_CHARS: usize = 16;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Durations written as humantime strings ("20s", "1h 30m").
pub(crate) mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub normalizer: NormalizerConfig,
    pub classifier: ClassifierConfig,
    pub scoring: ScoringConfig,
    pub summarizer: SummarizerConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub budget: BudgetConfig,
    pub history: HistoryConfig,
    pub comparison: ComparisonConfig,
    pub telemetry: TelemetryConfig,
}

impl EngineConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fraction = self.normalizer.boilerplate_edge_fraction;
        if !(0.0..=0.5).contains(&fraction) {
            return Err(ConfigError::Invalid(format!(
                "normalizer.boilerplate_edge_fraction must be within [0, 0.5], got {}",
                fraction
            )));
        }
        if self.normalizer.max_clause_chars < MIN_CLAUSE_CHARS {
            return Err(ConfigError::Invalid(format!(
                "normalizer.max_clause_chars must be at least {}, got {}",
                MIN_CLAUSE_CHARS, self.normalizer.max_clause_chars
            )));
        }
        for (name, value) in [
            ("classifier.min_tag_confidence", self.classifier.min_tag_confidence),
            ("classifier.high_confidence", self.classifier.high_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.scoring.weight_floor > self.scoring.weight_ceiling {
            return Err(ConfigError::Invalid(
                "scoring.weight_floor exceeds scoring.weight_ceiling".to_string(),
            ));
        }
        if self.comparison.epsilon < 0.0 {
            return Err(ConfigError::Invalid(
                "comparison.epsilon must not be negative".to_string(),
            ));
        }
        if self.summarizer.timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "summarizer.timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Core engine built from the deterministic sections.
    pub fn engine(&self) -> Engine {
        Engine::new(
            self.normalizer.clone(),
            self.classifier.clone(),
            self.scoring.clone(),
            self.summarizer.fallback_top_n,
        )
    }
}

/// Which model backend writes summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Rule-based summaries only
    #[default]
    None,
    Anthropic,
    Ollama,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::None => "none",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Ollama => "ollama",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    pub provider: ProviderKind,

    /// Passed to the provider factory (api_key, base_url, ...)
    pub provider_config: JsonValue,

    /// Model name; the provider's default when unset
    pub model: Option<String>,

    /// Hard limit on one summary call, retries included
    #[serde(with = "duration_str")]
    pub timeout: Duration,

    pub max_tokens: u32,
    pub temperature: f32,

    /// Approximate token budget for document text in the prompt
    pub prompt_token_budget: u32,

    /// Clauses quoted by the rule-based summary
    pub fallback_top_n: usize,

    pub retry: RetryConfig,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::None,
            provider_config: JsonValue::Object(Default::default()),
            model: None,
            timeout: Duration::from_secs(20),
            max_tokens: 800,
            temperature: 0.1,
            prompt_token_budget: 1500,
            fallback_top_n: termscope_core::assembler::DEFAULT_FALLBACK_TOP_N,
            retry: RetryConfig::default(),
        }
    }
}

impl SummarizerConfig {
    pub fn model_name(&self) -> &str {
        match (&self.model, self.provider) {
            (Some(model), _) => model,
            (None, ProviderKind::Ollama) => "llama3.1:8b",
            (None, _) => "claude-sonnet-4-5-20250514",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Model tokens allowed for the life of the process
    pub max_tokens: u32,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self { max_tokens: 200_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_entries: u64,

    /// Records older than this are recomputed
    #[serde(with = "duration_str")]
    pub ttl: Duration,

    /// Directory for persisted records; in-memory only when unset
    pub path: Option<PathBuf>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(24 * 60 * 60),
            path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Default filter when RUST_LOG is unset
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
