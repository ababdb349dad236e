//! Analysis assembly.
//!
//! Folds the scoring and summarization outputs into one immutable
//! [`AnalysisRecord`]. Assembly itself cannot fail: an empty summary is
//! replaced by the rule-based fallback, and a partial score signal is carried
//! as a flag. History lookup and persistence happen in the runtime pipeline
//! around this step.

use chrono::Utc;

use crate::scorer::RiskAssessment;
use crate::summary::{fallback_summary, headline_recommendation, SummaryBundle};
use crate::types::{AnalysisRecord, ClauseSpan, Fingerprint, Provenance, SummarySource};

/// Default number of clauses quoted per category in a fallback summary.
pub const DEFAULT_FALLBACK_TOP_N: usize = 3;

/// Assemble a record from already-computed stage outputs.
///
/// `normalized_text` is the text the clauses were cut from; the fingerprint is
/// computed over it, never over the raw source.
pub fn assemble(
    provenance: Provenance,
    normalized_text: &str,
    clauses: Vec<ClauseSpan>,
    assessment: RiskAssessment,
    summary: SummaryBundle,
) -> AnalysisRecord {
    Assembler::default().assemble(provenance, normalized_text, clauses, assessment, summary)
}

#[derive(Debug, Clone)]
pub struct Assembler {
    fallback_top_n: usize,
}

impl Default for Assembler {
    fn default() -> Self {
        Self {
            fallback_top_n: DEFAULT_FALLBACK_TOP_N,
        }
    }
}

impl Assembler {
    pub fn new(fallback_top_n: usize) -> Self {
        Self { fallback_top_n }
    }

    pub fn assemble(
        &self,
        provenance: Provenance,
        normalized_text: &str,
        clauses: Vec<ClauseSpan>,
        assessment: RiskAssessment,
        summary: SummaryBundle,
    ) -> AnalysisRecord {
        let content_fingerprint = Fingerprint::of(normalized_text);
        let risk_level = assessment.vector.risk_level();

        let summary = if summary.is_empty() {
            tracing::info!(
                fingerprint = %content_fingerprint.short(),
                "empty summary replaced by fallback"
            );
            fallback_summary(&clauses, self.fallback_top_n)
        } else {
            summary
        };

        let headline = headline_recommendation(risk_level).to_string();
        let mut recommendations = vec![headline];
        for recommendation in summary.recommendations {
            let recommendation = recommendation.trim().to_string();
            if !recommendation.is_empty() && !recommendations.contains(&recommendation) {
                recommendations.push(recommendation);
            }
        }

        AnalysisRecord {
            content_fingerprint,
            provenance,
            clauses,
            scores: assessment.vector,
            risk_level,
            partial_signal: assessment.partial_signal,
            neutral_dimensions: assessment.neutral_dimensions,
            summary: summary.summary.trim().to_string(),
            summary_source: summary.source,
            data_collection_findings: summary.data_collection_findings,
            user_rights_findings: summary.user_rights_findings,
            recommendations,
            generated_at: Utc::now(),
        }
    }
}

/// Whether a record came from the fallback summary path.
pub fn used_fallback(record: &AnalysisRecord) -> bool {
    record.summary_source == SummarySource::Fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::UserProfile;
    use crate::scorer::score;
    use crate::types::{Category, CategoryTag, Dimension, SourceKind};

    fn clauses() -> Vec<ClauseSpan> {
        vec![ClauseSpan {
            index: 0,
            start: 0,
            end: 31,
            text: "We collect your email address.".into(),
            tags: vec![CategoryTag {
                category: Category::DataCollection,
                confidence: 1.0,
            }],
        }]
    }

    fn provenance(source_ref: &str) -> Provenance {
        Provenance {
            source_kind: SourceKind::Url,
            source_ref: source_ref.into(),
        }
    }

    fn model_summary() -> SummaryBundle {
        SummaryBundle {
            summary: "  Collects contact details.  ".into(),
            data_collection_findings: vec!["Email address".into()],
            user_rights_findings: vec![],
            recommendations: vec!["Use a throwaway address".into(), "".into(), "Use a throwaway address".into()],
            source: SummarySource::Model,
        }
    }

    #[test]
    fn test_fingerprint_is_over_normalized_text() {
        let text = "We collect your email address.";
        let assessment = score(&clauses(), &UserProfile::neutral());
        let a = assemble(provenance("https://a.example/tos"), text, clauses(), assessment.clone(), model_summary());
        let b = assemble(provenance("https://b.example/tos"), text, clauses(), assessment, model_summary());
        assert_eq!(a.content_fingerprint, b.content_fingerprint);
        assert_eq!(a.content_fingerprint, Fingerprint::of(text));
    }

    #[test]
    fn test_headline_first_and_deduplicated() {
        let assessment = score(&clauses(), &UserProfile::neutral());
        let level = assessment.vector.risk_level();
        let record = assemble(provenance("x"), "text", clauses(), assessment, model_summary());
        assert_eq!(record.recommendations[0], headline_recommendation(level));
        assert_eq!(record.recommendations.len(), 2);
        assert_eq!(record.summary, "Collects contact details.");
        assert_eq!(record.summary_source, SummarySource::Model);
        assert_eq!(record.risk_level, level);
    }

    #[test]
    fn test_empty_summary_replaced_by_fallback() {
        let assessment = score(&clauses(), &UserProfile::neutral());
        let empty = SummaryBundle {
            summary: "   ".into(),
            data_collection_findings: vec![],
            user_rights_findings: vec![],
            recommendations: vec![],
            source: SummarySource::Model,
        };
        let record = assemble(provenance("x"), "text", clauses(), assessment, empty);
        assert!(used_fallback(&record));
        assert!(!record.summary.is_empty());
        assert_eq!(record.data_collection_findings, vec!["We collect your email address.".to_string()]);
    }

    #[test]
    fn test_partial_signal_carried() {
        let assessment = score(&clauses(), &UserProfile::neutral());
        let record = assemble(provenance("x"), "text", clauses(), assessment, model_summary());
        assert!(record.partial_signal);
        assert!(record.neutral_dimensions.contains(&Dimension::UserRights));
        assert_eq!(record.scores.user_rights_score(), 5.0);
    }
}
