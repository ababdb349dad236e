//! Clause classification.
//!
//! Classification is a pluggable capability: anything implementing
//! [`ClauseClassifier`] can tag clause text. The pattern-table classifier is
//! the baseline; a learned model can replace it without touching the scorer
//! or the assembler. Clauses are classified independently of one another.

pub mod pattern;
pub mod signatures;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::EngineError;
use crate::types::{CategoryTag, ClauseSpan};

pub use pattern::PatternClassifier;

/// Failure inside a classifier implementation.
#[derive(Error, Debug, Clone)]
#[error("classifier '{classifier}' failed: {reason}")]
pub struct ClassifierError {
    pub classifier: String,
    pub reason: String,
}

/// Capability that tags a single clause's text.
pub trait ClauseClassifier: Send + Sync {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Tags for one clause. Must not depend on any other clause.
    fn classify_text(&self, text: &str) -> Result<Vec<CategoryTag>, ClassifierError>;
}

/// Classifier thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Tags below this confidence are dropped (0.0 keeps any signature hit)
    pub min_tag_confidence: f64,

    /// Tags at or above this confidence count as high-confidence when scoring
    pub high_confidence: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_tag_confidence: 0.0,
            high_confidence: 0.5,
        }
    }
}

/// Attach tags to every clause, returning a new sequence in the same order.
///
/// Untagged clauses stay in the sequence. A classifier failure or a
/// non-finite confidence aborts the analysis.
pub fn classify(
    clauses: Vec<ClauseSpan>,
    classifier: &dyn ClauseClassifier,
    config: &ClassifierConfig,
) -> Result<Vec<ClauseSpan>, EngineError> {
    let mut tagged = Vec::with_capacity(clauses.len());
    for mut clause in clauses {
        let tags = classifier
            .classify_text(&clause.text)
            .map_err(|e| EngineError::Analysis(e.to_string()))?;
        clause.tags = sanitize_tags(tags, config).map_err(|reason| {
            EngineError::Analysis(format!(
                "classifier '{}' produced an invalid tag for clause {}: {}",
                classifier.name(),
                clause.index,
                reason
            ))
        })?;
        tagged.push(clause);
    }

    tracing::debug!(
        classifier = classifier.name(),
        clauses = tagged.len(),
        tagged = tagged.iter().filter(|c| c.is_tagged()).count(),
        "classified clauses"
    );

    Ok(tagged)
}

/// Clamp confidences, drop weak and zero tags, keep one tag per category
/// (the strongest) and order tags by category.
fn sanitize_tags(tags: Vec<CategoryTag>, config: &ClassifierConfig) -> Result<Vec<CategoryTag>, String> {
    let mut kept: Vec<CategoryTag> = Vec::with_capacity(tags.len());
    for tag in tags {
        if !tag.confidence.is_finite() {
            return Err(format!("{} confidence is {}", tag.category, tag.confidence));
        }
        let confidence = tag.confidence.clamp(0.0, 1.0);
        if confidence <= 0.0 || confidence < config.min_tag_confidence {
            continue;
        }
        match kept.iter_mut().find(|t| t.category == tag.category) {
            Some(existing) => existing.confidence = existing.confidence.max(confidence),
            None => kept.push(CategoryTag {
                category: tag.category,
                confidence,
            }),
        }
    }
    kept.sort_by_key(|t| t.category);
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;

    struct FixedClassifier(Vec<CategoryTag>);

    impl ClauseClassifier for FixedClassifier {
        fn name(&self) -> &str {
            "fixed"
        }

        fn classify_text(&self, _text: &str) -> Result<Vec<CategoryTag>, ClassifierError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenClassifier;

    impl ClauseClassifier for BrokenClassifier {
        fn name(&self) -> &str {
            "broken"
        }

        fn classify_text(&self, _text: &str) -> Result<Vec<CategoryTag>, ClassifierError> {
            Err(ClassifierError {
                classifier: "broken".into(),
                reason: "model weights missing".into(),
            })
        }
    }

    fn clause(index: usize, text: &str) -> ClauseSpan {
        ClauseSpan {
            index,
            start: 0,
            end: text.len(),
            text: text.to_string(),
            tags: Vec::new(),
        }
    }

    fn tag(category: Category, confidence: f64) -> CategoryTag {
        CategoryTag { category, confidence }
    }

    #[test]
    fn test_tags_are_sanitized() {
        let classifier = FixedClassifier(vec![
            tag(Category::Termination, 1.7),
            tag(Category::Cookies, 0.0),
            tag(Category::DataCollection, 0.3),
            tag(Category::DataCollection, 0.6),
        ]);
        let out = classify(vec![clause(0, "text")], &classifier, &ClassifierConfig::default()).unwrap();
        assert_eq!(
            out[0].tags,
            vec![tag(Category::DataCollection, 0.6), tag(Category::Termination, 1.0)]
        );
    }

    #[test]
    fn test_min_confidence_filters() {
        let classifier = FixedClassifier(vec![tag(Category::Cookies, 0.2), tag(Category::Liability, 0.8)]);
        let config = ClassifierConfig {
            min_tag_confidence: 0.5,
            ..Default::default()
        };
        let out = classify(vec![clause(0, "text")], &classifier, &config).unwrap();
        assert_eq!(out[0].tags, vec![tag(Category::Liability, 0.8)]);
    }

    #[test]
    fn test_nan_confidence_is_analysis_error() {
        let classifier = FixedClassifier(vec![tag(Category::Cookies, f64::NAN)]);
        let err = classify(vec![clause(0, "text")], &classifier, &ClassifierConfig::default()).unwrap_err();
        assert!(matches!(err, EngineError::Analysis(_)));
    }

    #[test]
    fn test_classifier_failure_propagates() {
        let err = classify(vec![clause(0, "text")], &BrokenClassifier, &ClassifierConfig::default()).unwrap_err();
        assert!(err.to_string().contains("model weights missing"));
    }

    #[test]
    fn test_order_and_untagged_preserved() {
        let classifier = PatternClassifier::new();
        let clauses = vec![
            clause(0, "Welcome to the product tour for new visitors."),
            clause(1, "We use cookies and web beacons to remember you."),
        ];
        let out = classify(clauses, &classifier, &ClassifierConfig::default()).unwrap();
        assert_eq!(out.len(), 2);
        assert!(!out[0].is_tagged());
        assert!(out[1].has_tag(Category::Cookies));
        assert_eq!(out[1].index, 1);
    }
}
