//! Analysis pipeline.
//!
//! Drives the core engine stages around the async collaborators:
//! - History lookup by content fingerprint before any work is done
//! - Scoring and model summarization side by side via `tokio::join!`
//! - Assembly at the join point, then write-back to history
//! - Fan-out of 2 to 4 sources for comparison, one failure per entry

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use thiserror::Error;

use termscope_core::{
    comparison::MAX_RECORDS, compare_with, AnalysisRecord, ClauseClassifier, ComparisonCandidate,
    ComparisonConfig, ComparisonResult, Dimension, Document, Engine, EngineError, FetchError,
    Fingerprint, ProfiledView, SourceKind, UserProfile,
};

use crate::config::{ConfigError, EngineConfig, ProviderKind};
use crate::directory::CompanyDirectory;
use crate::history::{open_store, HistoryError, HistoryStore};
use crate::providers::{LlmProvider, ProviderError, ProviderRegistry};
use crate::resilience::LlmUsage;
use crate::sources::{DocumentSource, SourceRouter};
use crate::summarizer::{FallbackReason, SummarizerAdapter};

/// Errors building a pipeline.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Provider not configured: {0}")]
    Provider(#[from] ProviderError),

    #[error("Ingestion setup failed: {0}")]
    Sources(#[from] FetchError),

    #[error("History store unavailable: {0}")]
    History(#[from] HistoryError),
}

/// Result of one pipeline run.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub record: Arc<AnalysisRecord>,

    /// True when the record came from history unchanged
    pub from_history: bool,

    pub elapsed_ms: u64,

    /// Model usage for this run; zero for history hits
    pub llm_usage: LlmUsage,

    /// Why the rule-based summary was used, for fresh records only
    pub fallback_reason: Option<FallbackReason>,
}

/// One source in a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub label: String,
    pub kind: SourceKind,
    pub source_ref: String,
}

impl SourceSpec {
    /// Labelled with its own reference.
    pub fn new(kind: SourceKind, source_ref: impl Into<String>) -> Self {
        let source_ref = source_ref.into();
        Self {
            label: source_ref.clone(),
            kind,
            source_ref,
        }
    }

    pub fn labeled(label: impl Into<String>, kind: SourceKind, source_ref: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind,
            source_ref: source_ref.into(),
        }
    }

    /// `text` for paths, `url` for http(s) references.
    pub fn infer(source_ref: impl Into<String>) -> Self {
        let source_ref = source_ref.into();
        let kind = if source_ref.starts_with("http://") || source_ref.starts_with("https://") {
            SourceKind::Url
        } else {
            SourceKind::Text
        };
        Self::new(kind, source_ref)
    }
}

pub struct AnalysisPipeline {
    engine: Engine,
    summarizer: SummarizerAdapter,
    history: Arc<dyn HistoryStore>,
    sources: Arc<dyn DocumentSource>,
    directory: Option<Arc<dyn CompanyDirectory>>,
    comparison: ComparisonConfig,
}

impl std::fmt::Debug for AnalysisPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisPipeline")
            .field("engine", &self.engine)
            .field("summarizer", &self.summarizer)
            .field("directory", &self.directory.is_some())
            .field("comparison", &self.comparison)
            .finish()
    }
}

impl AnalysisPipeline {
    pub fn builder() -> AnalysisPipelineBuilder {
        AnalysisPipelineBuilder::new()
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn summarizer(&self) -> &SummarizerAdapter {
        &self.summarizer
    }

    /// Analyze a document, reusing history unless `force_refresh` is set.
    ///
    /// Fails only when normalization or classification fails. Summarization
    /// problems are absorbed by the fallback summary.
    pub async fn analyze(
        &self,
        document: &Document,
        force_refresh: bool,
    ) -> Result<AnalysisOutcome, EngineError> {
        let started = Instant::now();
        let source_ref = document.provenance.source_ref.as_str();

        let normalized = self.engine.normalize(document)?;
        let fingerprint = normalized.fingerprint();
        tracing::debug!(
            source_ref,
            fingerprint = fingerprint.short(),
            clauses = normalized.clauses.len(),
            boilerplate_lines = normalized.boilerplate_lines_removed,
            "Normalized document"
        );

        if !force_refresh {
            match self.history.get_by_fingerprint(&fingerprint).await {
                Ok(Some(record)) => {
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    tracing::info!(
                        source_ref,
                        fingerprint = fingerprint.short(),
                        elapsed_ms,
                        "History hit"
                    );
                    return Ok(AnalysisOutcome {
                        record,
                        from_history: true,
                        elapsed_ms,
                        llm_usage: LlmUsage::default(),
                        fallback_reason: None,
                    });
                }
                Ok(None) => {
                    tracing::info!(source_ref, fingerprint = fingerprint.short(), "History miss");
                }
                Err(e) => {
                    tracing::warn!(source_ref, error = %e, "History lookup failed, analyzing anyway");
                }
            }
        }

        let prepared = self.engine.prepare(document, normalized)?;
        tracing::debug!(
            fingerprint = fingerprint.short(),
            tagged = prepared.clauses.iter().filter(|c| c.is_tagged()).count(),
            "Classified clauses"
        );

        let (assessment, summary) = tokio::join!(
            async { self.engine.score(&prepared) },
            self.summarizer.summarize(&prepared.text, &prepared.clauses),
        );

        let record = Arc::new(self.engine.assemble(prepared, assessment, summary.bundle));
        if let Err(e) = self.store(record.clone()).await {
            tracing::warn!(fingerprint = fingerprint.short(), error = %e, "Failed to store record");
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            source_ref,
            fingerprint = fingerprint.short(),
            clauses = record.clauses.len(),
            risk_level = record.risk_level.as_str(),
            summary_source = ?record.summary_source,
            elapsed_ms,
            "Analysis complete"
        );

        Ok(AnalysisOutcome {
            record,
            from_history: false,
            elapsed_ms,
            llm_usage: summary.usage,
            fallback_reason: summary.fallback_reason,
        })
    }

    async fn store(&self, record: Arc<AnalysisRecord>) -> Result<(), HistoryError> {
        self.history.put(record).await
    }

    /// Fetch a document through the configured sources, then analyze it.
    pub async fn analyze_source(
        &self,
        kind: SourceKind,
        source_ref: &str,
        force_refresh: bool,
    ) -> Result<AnalysisOutcome, EngineError> {
        let document = self.sources.fetch(kind, source_ref).await?;
        self.analyze(&document, force_refresh).await
    }

    /// Resolve a company through the directory and analyze its terms.
    pub async fn analyze_company(
        &self,
        name: &str,
        force_refresh: bool,
    ) -> Result<AnalysisOutcome, EngineError> {
        let directory = self
            .directory
            .as_ref()
            .ok_or(FetchError::Unsupported(SourceKind::DirectoryEntry))?;
        let entry = directory.resolve(name).await?;
        tracing::info!(company = %entry.name, url = %entry.terms_url, "Resolved company");

        let fetched = self.sources.fetch(SourceKind::Url, &entry.terms_url).await?;
        let document = Document::new(SourceKind::DirectoryEntry, entry.name, fetched.raw_text);
        self.analyze(&document, force_refresh).await
    }

    /// Analyze up to four sources concurrently and compare them.
    ///
    /// Sources beyond the fourth are dropped with a warning. Sources that
    /// fail are carried as failed entries; the call fails only when fewer
    /// than two score.
    pub async fn compare_sources(
        &self,
        mut specs: Vec<SourceSpec>,
        metrics: Option<&[Dimension]>,
    ) -> Result<ComparisonResult, EngineError> {
        if specs.len() > MAX_RECORDS {
            tracing::warn!(
                given = specs.len(),
                max = MAX_RECORDS,
                "Too many sources to compare, dropping the rest"
            );
            specs.truncate(MAX_RECORDS);
        }

        let outcomes = join_all(
            specs
                .iter()
                .map(|spec| self.analyze_source(spec.kind, &spec.source_ref, false)),
        )
        .await;

        let candidates: Vec<ComparisonCandidate> = specs
            .into_iter()
            .zip(outcomes)
            .map(|(spec, outcome)| match outcome {
                Ok(outcome) => ComparisonCandidate::scored_from(
                    spec.label,
                    spec.source_ref,
                    (*outcome.record).clone(),
                ),
                Err(e) => {
                    tracing::warn!(source_ref = %spec.source_ref, error = %e, "Comparison entry failed");
                    ComparisonCandidate::failed(spec.label, spec.source_ref, &e)
                }
            })
            .collect();

        compare_with(candidates, &self.comparison, metrics)
    }

    /// Compare records the caller already holds.
    pub fn compare_records(
        &self,
        records: Vec<(String, AnalysisRecord)>,
        metrics: Option<&[Dimension]>,
    ) -> Result<ComparisonResult, EngineError> {
        let candidates = records
            .into_iter()
            .map(|(label, record)| ComparisonCandidate::scored(label, record))
            .collect();
        compare_with(candidates, &self.comparison, metrics)
    }

    /// Read-time view of a record for a profile.
    pub fn view(&self, record: &AnalysisRecord, profile: &UserProfile) -> ProfiledView {
        self.engine.view(record, profile)
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<Arc<AnalysisRecord>>, HistoryError> {
        self.history.list_recent(limit).await
    }

    /// A stored, non-stale record by fingerprint.
    pub async fn get_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<Arc<AnalysisRecord>>, HistoryError> {
        self.history.get_by_fingerprint(fingerprint).await
    }

    /// Model usage across the life of this pipeline.
    pub fn usage(&self) -> LlmUsage {
        self.summarizer.usage()
    }
}

/// Builder for [`AnalysisPipeline`].
pub struct AnalysisPipelineBuilder {
    config: EngineConfig,
    provider: Option<Arc<dyn LlmProvider>>,
    registry: Option<ProviderRegistry>,
    classifier: Option<Arc<dyn ClauseClassifier>>,
    history: Option<Arc<dyn HistoryStore>>,
    sources: Option<Arc<dyn DocumentSource>>,
    directory: Option<Arc<dyn CompanyDirectory>>,
}

impl AnalysisPipelineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            provider: None,
            registry: None,
            classifier: None,
            history: None,
            sources: None,
            directory: None,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Use this provider instead of the one named in the configuration.
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Registry used to build the configured provider.
    pub fn registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn ClauseClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn sources(mut self, sources: Arc<dyn DocumentSource>) -> Self {
        self.sources = Some(sources);
        self
    }

    pub fn directory(mut self, directory: Arc<dyn CompanyDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn build(self) -> Result<AnalysisPipeline, RuntimeError> {
        let config = self.config;
        config.validate()?;

        let mut engine = config.engine();
        if let Some(classifier) = self.classifier {
            engine = engine.with_classifier(classifier);
        }

        let summarizer = match self.provider {
            Some(provider) => SummarizerAdapter::new(
                Some(provider),
                &config.summarizer,
                config.circuit_breaker.clone(),
                &config.budget,
            ),
            None if config.summarizer.provider == ProviderKind::None => SummarizerAdapter::new(
                None,
                &config.summarizer,
                config.circuit_breaker.clone(),
                &config.budget,
            ),
            None => {
                let registry = self.registry.unwrap_or_else(ProviderRegistry::with_defaults);
                SummarizerAdapter::from_registry(
                    &registry,
                    &config.summarizer,
                    config.circuit_breaker.clone(),
                    &config.budget,
                )?
            }
        };

        let history = match self.history {
            Some(history) => history,
            None => open_store(&config.history)?,
        };

        let sources = match self.sources {
            Some(sources) => sources,
            None => Arc::new(SourceRouter::with_defaults()?),
        };

        Ok(AnalysisPipeline {
            engine,
            summarizer,
            history,
            sources,
            directory: self.directory,
            comparison: config.comparison,
        })
    }
}

impl Default for AnalysisPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
