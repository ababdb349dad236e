//! Risk scoring.
//!
//! Converts tagged clauses into four independent subscores on a 0–10 scale
//! and derives `overall_risk` from them. An axis with no tagged clauses gets
//! the neutral midpoint and the assessment is flagged `partial_signal`.
//!
//! Scoring is pure: no I/O, no shared state, no blocking.

pub mod readability;
pub mod weights;

use serde::Serialize;

use crate::classifier::signatures::{
    has_short_notice, right_kinds, DISCRETIONARY_TERMINATION, MUTUAL_TERMINATION, RIGHT_KINDS,
    UNILATERAL_TERMINATION,
};
use crate::profile::UserProfile;
use crate::types::{
    Category, ClauseSpan, Dimension, RiskScoreVector, Subscores, NEUTRAL_SCORE, SCORE_MAX,
};

pub use weights::{ScoringConfig, ScoringWeights};

/// Share of an axis driven by signal strength; the rest is breadth.
const STRENGTH_SHARE: f64 = 0.6;
const BREADTH_SHARE: f64 = 0.4;

/// Severity of a termination clause before asymmetry adjustments.
const BASE_SEVERITY: f64 = 0.5;
const UNILATERAL_SEVERITY: f64 = 1.0;
const DISCRETIONARY_SEVERITY: f64 = 0.75;
const SHORT_NOTICE_SEVERITY: f64 = 0.5;
const MUTUAL_MITIGATION: f64 = 0.5;
const MIN_SEVERITY: f64 = 0.25;
const MAX_SEVERITY: f64 = 2.5;

/// Result of scoring one document for one profile.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RiskAssessment {
    pub vector: RiskScoreVector,
    pub partial_signal: bool,

    /// Dimensions that used the neutral midpoint, in reporting order
    pub neutral_dimensions: Vec<Dimension>,

    pub weights: ScoringWeights,
}

/// Scores with default configuration.
pub fn score(clauses: &[ClauseSpan], profile: &UserProfile) -> RiskAssessment {
    RiskScorer::default().score(clauses, profile)
}

#[derive(Debug, Clone)]
pub struct RiskScorer {
    config: ScoringConfig,
    high_confidence: f64,
}

impl Default for RiskScorer {
    fn default() -> Self {
        Self {
            config: ScoringConfig::default(),
            high_confidence: 0.5,
        }
    }
}

impl RiskScorer {
    pub fn new(config: ScoringConfig, high_confidence: f64) -> Self {
        Self {
            config,
            high_confidence,
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score the tagged clauses under a profile's weights.
    pub fn score(&self, clauses: &[ClauseSpan], profile: &UserProfile) -> RiskAssessment {
        let mut neutral_dimensions = Vec::new();

        let data_risk = self.data_risk(clauses).unwrap_or_else(|| {
            neutral_dimensions.push(Dimension::DataRisk);
            NEUTRAL_SCORE
        });
        let user_rights_score = self.user_rights(clauses).unwrap_or_else(|| {
            neutral_dimensions.push(Dimension::UserRights);
            NEUTRAL_SCORE
        });
        let readability_score =
            readability::readability_score(clauses.iter().map(|c| c.text.as_str()));
        let termination_risk = self.termination_risk(clauses).unwrap_or_else(|| {
            neutral_dimensions.push(Dimension::TerminationRisk);
            NEUTRAL_SCORE
        });

        let weights = profile.weights(clauses, &self.config);
        let vector = RiskScoreVector::from_subscores(
            Subscores {
                data_risk,
                user_rights_score,
                readability_score,
                termination_risk,
            },
            &weights,
        );

        RiskAssessment {
            vector,
            partial_signal: !neutral_dimensions.is_empty(),
            neutral_dimensions,
            weights,
        }
    }

    /// Grows with the number of high-confidence data-exposure clauses, both in
    /// absolute terms and relative to the clause count. `None` when no clause
    /// carries a data-exposure tag.
    fn data_risk(&self, clauses: &[ClauseSpan]) -> Option<f64> {
        let exposure: Vec<f64> = clauses
            .iter()
            .map(|c| {
                c.tags
                    .iter()
                    .filter(|t| t.category.is_data_exposure())
                    .map(|t| t.confidence)
                    .fold(0.0, f64::max)
            })
            .filter(|&confidence| confidence > 0.0)
            .collect();
        if exposure.is_empty() {
            return None;
        }

        let strong = exposure.iter().filter(|&&c| c >= self.high_confidence).count() as f64;
        let total = clauses.len().max(1) as f64;
        Some(
            SCORE_MAX
                * (STRENGTH_SHARE * (1.0 - 0.5f64.powf(strong)) + BREADTH_SHARE * strong / total),
        )
    }

    /// Higher means more favorable rights: combined confidence of rights
    /// clauses plus the number of distinct right kinds granted.
    fn user_rights(&self, clauses: &[ClauseSpan]) -> Option<f64> {
        let rights: Vec<&ClauseSpan> = clauses
            .iter()
            .filter(|c| c.has_tag(Category::UserRights))
            .collect();
        if rights.is_empty() {
            return None;
        }

        let strength: f64 = rights.iter().map(|c| c.confidence(Category::UserRights)).sum();
        let mut kinds: Vec<&str> = rights.iter().flat_map(|c| right_kinds(&c.text)).collect();
        kinds.sort_unstable();
        kinds.dedup();

        let breadth = kinds.len() as f64 / RIGHT_KINDS.len() as f64;
        Some(SCORE_MAX * (STRENGTH_SHARE * (1.0 - 0.5f64.powf(strength)) + BREADTH_SHARE * breadth))
    }

    /// Saturating sum of termination clauses weighted by how one-sided they are.
    fn termination_risk(&self, clauses: &[ClauseSpan]) -> Option<f64> {
        let weighted: Vec<f64> = clauses
            .iter()
            .filter(|c| c.has_tag(Category::Termination))
            .map(|c| termination_severity(&c.text) * c.confidence(Category::Termination))
            .collect();
        if weighted.is_empty() {
            return None;
        }

        let exposure: f64 = weighted.iter().sum();
        Some(SCORE_MAX * (1.0 - 0.5f64.powf(exposure)))
    }
}

fn termination_severity(text: &str) -> f64 {
    let mut severity = BASE_SEVERITY;
    if UNILATERAL_TERMINATION.is_match(text) {
        severity += UNILATERAL_SEVERITY;
    }
    if DISCRETIONARY_TERMINATION.is_match(text) {
        severity += DISCRETIONARY_SEVERITY;
    }
    if has_short_notice(text) {
        severity += SHORT_NOTICE_SEVERITY;
    }
    if MUTUAL_TERMINATION.is_match(text) {
        severity -= MUTUAL_MITIGATION;
    }
    severity.clamp(MIN_SEVERITY, MAX_SEVERITY)
}
