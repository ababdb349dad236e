//! Pattern-table classifier.

use super::signatures::{first_person_collection, SIGNATURES};
use super::{ClassifierError, ClauseClassifier};
use crate::types::{Category, CategoryTag};

/// Baseline classifier backed by the lexical signature tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternClassifier;

impl PatternClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl ClauseClassifier for PatternClassifier {
    fn name(&self) -> &str {
        "pattern"
    }

    fn classify_text(&self, text: &str) -> Result<Vec<CategoryTag>, ClassifierError> {
        let mut tags = Vec::new();
        for signature in SIGNATURES.iter() {
            let mut hits = signature.matched_terms(text).len();
            if signature.category == Category::DataCollection && first_person_collection(text) {
                hits += 1;
            }
            if hits == 0 {
                continue;
            }
            tags.push(CategoryTag {
                category: signature.category,
                confidence: (hits as f64 / signature.term_count() as f64).clamp(0.0, 1.0),
            });
        }
        Ok(tags)
    }
}
