//! # termscope-core
//!
//! Deterministic analysis engine for terms-of-service and privacy-policy text.
//!
//! This crate turns a legal document into a structured risk assessment:
//! - Which clauses matter, and what are they about?
//! - How risky is the document on each axis?
//! - How does it compare with another provider's terms?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: same text, same clauses, same offsets, same scores
//! 2. **No model calls**: summaries here are rule-based; the runtime crate adds the model
//! 3. **Consistent scores**: `overall_risk` is always derived from the four subscores
//! 4. **Profile-free records**: user profiles only ever produce read-time views
//!
//! ## Example
//!
//! ```rust,ignore
//! use termscope_core::{analyze, Document, SourceKind};
//!
//! let doc = Document::new(SourceKind::Url, "https://example.com/terms", text);
//! let record = analyze(&doc)?;
//!
//! println!("{} ({:.1})", record.risk_level, record.scores.overall_risk());
//! for line in &record.recommendations {
//!     println!("- {}", line);
//! }
//! ```

pub mod assembler;
pub mod classifier;
pub mod comparison;
pub mod engine;
pub mod error;
pub mod normalizer;
pub mod profile;
pub mod scorer;
pub mod summary;
pub mod types;

// Re-export main types at crate root
pub use assembler::{assemble, Assembler};
pub use classifier::{classify, ClassifierConfig, ClassifierError, ClauseClassifier, PatternClassifier};
pub use comparison::{
    compare, compare_with, ComparisonCandidate, ComparisonConfig, ComparisonEntry, ComparisonResult,
    DimensionDelta,
};
pub use engine::{Engine, PreparedDocument};
pub use error::{EngineError, ErrorKind, ErrorReport, FetchError};
pub use normalizer::{normalize, NormalizedDocument, Normalizer, NormalizerConfig};
pub use profile::{ProfiledView, RiskTolerance, UserProfile};
pub use scorer::{score, RiskAssessment, RiskScorer, ScoringConfig, ScoringWeights};
pub use summary::{fallback_summary, headline_recommendation, SummaryBundle};
pub use types::{
    AnalysisRecord, Category, CategoryTag, ClauseSpan, Dimension, Document, Fingerprint,
    Provenance, RiskLevel, RiskScoreVector, SourceKind, Subscores, SummarySource,
};

/// Analyze a document with the default engine and the rule-based summary.
///
/// This is the synchronous entry point. The runtime crate's pipeline adds
/// history reuse and the generative-model summary on top of the same stages.
pub fn analyze(document: &Document) -> Result<AnalysisRecord, EngineError> {
    Engine::default().analyze(document)
}
