//! The deterministic analysis stages wired together.
//!
//! [`Engine`] owns the configured normalizer, classifier, scorer and
//! assembler. The async runtime drives the same stages one by one so it can
//! consult history and run the model summary beside scoring; [`Engine::analyze`]
//! runs them straight through with the rule-based summary.

use std::sync::Arc;

use crate::assembler::{Assembler, DEFAULT_FALLBACK_TOP_N};
use crate::classifier::{classify, ClassifierConfig, ClauseClassifier, PatternClassifier};
use crate::error::EngineError;
use crate::normalizer::{NormalizedDocument, Normalizer, NormalizerConfig};
use crate::profile::{ProfiledView, UserProfile};
use crate::scorer::{RiskAssessment, RiskScorer, ScoringConfig};
use crate::summary::{fallback_summary, SummaryBundle};
use crate::types::{AnalysisRecord, ClauseSpan, Document, Fingerprint, Provenance};

/// A normalized, classified document ready for scoring and summarization.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub provenance: Provenance,
    pub text: String,
    pub fingerprint: Fingerprint,
    pub clauses: Vec<ClauseSpan>,
}

#[derive(Clone)]
pub struct Engine {
    normalizer: Normalizer,
    classifier: Arc<dyn ClauseClassifier>,
    classifier_config: ClassifierConfig,
    scorer: RiskScorer,
    scoring_config: ScoringConfig,
    assembler: Assembler,
    fallback_top_n: usize,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(
            NormalizerConfig::default(),
            ClassifierConfig::default(),
            ScoringConfig::default(),
            DEFAULT_FALLBACK_TOP_N,
        )
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("normalizer", &self.normalizer)
            .field("classifier", &self.classifier.name())
            .field("classifier_config", &self.classifier_config)
            .field("scoring_config", &self.scoring_config)
            .field("fallback_top_n", &self.fallback_top_n)
            .finish()
    }
}

impl Engine {
    /// Engine with the pattern-table classifier.
    pub fn new(
        normalizer: NormalizerConfig,
        classifier: ClassifierConfig,
        scoring: ScoringConfig,
        fallback_top_n: usize,
    ) -> Self {
        Self {
            normalizer: Normalizer::new(normalizer),
            scorer: RiskScorer::new(scoring.clone(), classifier.high_confidence),
            classifier: Arc::new(PatternClassifier::new()),
            classifier_config: classifier,
            scoring_config: scoring,
            assembler: Assembler::new(fallback_top_n),
            fallback_top_n,
        }
    }

    /// Swap in another classifier implementation.
    pub fn with_classifier(mut self, classifier: Arc<dyn ClauseClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    pub fn normalize(&self, document: &Document) -> Result<NormalizedDocument, EngineError> {
        self.normalizer.normalize(&document.raw_text)
    }

    /// Tag the clauses of a normalized document.
    pub fn prepare(
        &self,
        document: &Document,
        normalized: NormalizedDocument,
    ) -> Result<PreparedDocument, EngineError> {
        let fingerprint = normalized.fingerprint();
        let clauses = classify(normalized.clauses, self.classifier.as_ref(), &self.classifier_config)?;
        Ok(PreparedDocument {
            provenance: document.provenance.clone(),
            text: normalized.text,
            fingerprint,
            clauses,
        })
    }

    /// Score for storage. Stored records always use the neutral profile.
    pub fn score(&self, prepared: &PreparedDocument) -> RiskAssessment {
        self.scorer.score(&prepared.clauses, &UserProfile::neutral())
    }

    pub fn fallback_summary(&self, clauses: &[ClauseSpan]) -> SummaryBundle {
        fallback_summary(clauses, self.fallback_top_n)
    }

    pub fn assemble(
        &self,
        prepared: PreparedDocument,
        assessment: RiskAssessment,
        summary: SummaryBundle,
    ) -> AnalysisRecord {
        self.assembler.assemble(
            prepared.provenance,
            &prepared.text,
            prepared.clauses,
            assessment,
            summary,
        )
    }

    /// Run every stage with the rule-based summary.
    pub fn analyze(&self, document: &Document) -> Result<AnalysisRecord, EngineError> {
        let normalized = self.normalize(document)?;
        let prepared = self.prepare(document, normalized)?;
        let assessment = self.score(&prepared);
        let summary = self.fallback_summary(&prepared.clauses);
        Ok(self.assemble(prepared, assessment, summary))
    }

    /// Read-time view of a stored record for a profile.
    pub fn view(&self, record: &AnalysisRecord, profile: &UserProfile) -> ProfiledView {
        profile.view(record, &self.scoring_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ClassifierError;
    use crate::types::{CategoryTag, SourceKind, SummarySource};

    const POLICY: &str = "We collect your email address when you sign up.\n\
        We may share your personal information with advertising partners.\n\
        We may terminate your account at any time without notice.";

    struct NothingClassifier;

    impl ClauseClassifier for NothingClassifier {
        fn name(&self) -> &str {
            "nothing"
        }

        fn classify_text(&self, _text: &str) -> Result<Vec<CategoryTag>, ClassifierError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_analyze_end_to_end() {
        let engine = Engine::default();
        let record = engine
            .analyze(&Document::new(SourceKind::Url, "https://example.com/terms", POLICY))
            .unwrap();
        assert_eq!(record.clauses.len(), 3);
        assert_eq!(record.summary_source, SummarySource::Fallback);
        assert!(record.scores.data_risk() > 5.0);
        assert!(record.partial_signal);
        assert_eq!(record.provenance.source_ref, "https://example.com/terms");
    }

    #[test]
    fn test_analyze_is_deterministic_in_scores() {
        let engine = Engine::default();
        let doc = Document::text("policy.txt", POLICY);
        let a = engine.analyze(&doc).unwrap();
        let b = engine.analyze(&doc).unwrap();
        assert_eq!(a.content_fingerprint, b.content_fingerprint);
        assert_eq!(a.scores, b.scores);
        assert_eq!(a.clauses, b.clauses);
    }

    #[test]
    fn test_classifier_is_pluggable() {
        let engine = Engine::default().with_classifier(Arc::new(NothingClassifier));
        assert_eq!(engine.classifier_name(), "nothing");
        let record = engine.analyze(&Document::text("policy.txt", POLICY)).unwrap();
        assert!(record.tagged_clauses().next().is_none());
        assert_eq!(record.neutral_dimensions.len(), 3);
    }

    #[test]
    fn test_empty_document_propagates() {
        let err = Engine::default()
            .analyze(&Document::text("blank.txt", "\n\n"))
            .unwrap_err();
        assert!(matches!(err, EngineError::EmptyDocument { .. }));
    }
}
