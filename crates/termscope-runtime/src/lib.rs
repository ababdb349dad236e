//! # termscope-runtime
//!
//! Async analysis pipeline for Termscope.
//!
//! This crate wraps the deterministic engine in `termscope-core` with the
//! parts that touch the outside world:
//! - Ingestion of text files and web pages
//! - Company name resolution through a CSV directory
//! - History reuse keyed by content fingerprint, in memory or on disk
//! - Model-generated summaries with a rule-based fallback
//!
//! ## Important
//!
//! Scores never depend on the model. A missing, slow or misbehaving provider
//! only changes `summary_source` to `fallback`; the request still succeeds.
//!
//! ## Example
//!
//! ```rust,ignore
//! use termscope_runtime::{AnalysisPipeline, EngineConfig};
//! use termscope_core::SourceKind;
//!
//! let config = EngineConfig::from_yaml_file("termscope.yaml")?;
//! let pipeline = AnalysisPipeline::builder().config(config).build()?;
//!
//! let outcome = pipeline
//!     .analyze_source(SourceKind::Url, "https://example.com/terms", false)
//!     .await?;
//! println!("{} ({:?})", outcome.record.risk_level, outcome.record.summary_source);
//! ```

pub mod config;
pub mod directory;
pub mod history;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod resilience;
pub mod sources;
pub mod summarizer;

pub use config::{ConfigError, EngineConfig, ProviderKind, SummarizerConfig};
pub use directory::{CompanyDirectory, CompanyEntry, CsvDirectory, DirectoryError};
pub use history::{open_store, FileHistory, HistoryError, HistoryStore, MemoryHistory};
pub use orchestrator::{
    AnalysisOutcome, AnalysisPipeline, AnalysisPipelineBuilder, RuntimeError, SourceSpec,
};
pub use providers::{
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError,
    ProviderRegistry, TokenUsage,
};
pub use resilience::{BudgetTracker, CircuitBreaker, CircuitBreakerConfig, LlmUsage};
pub use sources::{DocumentSource, FileSource, SourceRouter};
pub use summarizer::{FallbackReason, SummarizerAdapter, SummaryOutcome};

#[cfg(feature = "http")]
pub use sources::HttpSource;
