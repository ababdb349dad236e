//! User profiles and profile-adjusted views.
//!
//! A profile never changes a stored record. [`UserProfile::view`] is a pure
//! read-time transform: it re-weights the stored subscores and re-buckets the
//! result, leaving the record and its fingerprint untouched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::scorer::{ScoringConfig, ScoringWeights};
use crate::types::{AnalysisRecord, Category, ClauseSpan, Fingerprint, RiskLevel, RiskScoreVector};

/// How much risk the user is willing to accept.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    Low,
    #[default]
    Medium,
    High,
}

impl RiskTolerance {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTolerance::Low => "low",
            RiskTolerance::Medium => "medium",
            RiskTolerance::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(RiskTolerance::Low),
            "medium" => Some(RiskTolerance::Medium),
            "high" => Some(RiskTolerance::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskTolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calibration input for scoring. Passed explicitly; never stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    #[serde(default)]
    pub risk_tolerance: RiskTolerance,

    #[serde(default)]
    pub data_concerns: BTreeSet<Category>,

    /// Jurisdiction code, e.g. "DE", "US-CA"
    #[serde(default)]
    pub location: Option<String>,
}

impl UserProfile {
    /// Medium tolerance, no concerns, no location. Stored records use this.
    pub fn neutral() -> Self {
        Self::default()
    }

    pub fn is_neutral(&self) -> bool {
        self.risk_tolerance == RiskTolerance::Medium && self.data_concerns.is_empty()
    }

    /// Profile concerns that at least one clause is tagged with.
    pub fn concerns_present(&self, clauses: &[ClauseSpan]) -> Vec<Category> {
        self.data_concerns
            .iter()
            .copied()
            .filter(|category| clauses.iter().any(|c| c.has_tag(*category)))
            .collect()
    }

    /// Aggregation weights for this profile over a document's clauses.
    pub fn weights(&self, clauses: &[ClauseSpan], config: &ScoringConfig) -> ScoringWeights {
        ScoringWeights::default().shifted(
            self.risk_tolerance,
            self.concerns_present(clauses).len(),
            config,
        )
    }

    /// Profile-adjusted view of a stored record.
    pub fn view(&self, record: &AnalysisRecord, config: &ScoringConfig) -> ProfiledView {
        let weights = self.weights(&record.clauses, config);
        let overall_risk = record.scores.recompute_overall(&weights);
        ProfiledView {
            content_fingerprint: record.content_fingerprint.clone(),
            base_scores: record.scores,
            weights,
            overall_risk,
            risk_level: RiskLevel::from_score(overall_risk),
            concerns_present: self.concerns_present(&record.clauses),
            jurisdiction_notes: self
                .location
                .as_deref()
                .map(|location| jurisdiction_notes(location, record))
                .unwrap_or_default(),
        }
    }
}

/// A stored record seen through a user profile.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProfiledView {
    pub content_fingerprint: Fingerprint,

    /// Subscores and overall risk exactly as stored
    pub base_scores: RiskScoreVector,

    pub weights: ScoringWeights,

    /// Overall risk under the profile's weights
    pub overall_risk: f64,

    pub risk_level: RiskLevel,
    pub concerns_present: Vec<Category>,
    pub jurisdiction_notes: Vec<String>,
}

const EEA: &[&str] = &[
    "EU", "EEA", "AT", "BE", "BG", "HR", "CY", "CZ", "DK", "EE", "FI", "FR", "DE", "GR", "HU",
    "IE", "IT", "LV", "LT", "LU", "MT", "NL", "PL", "PT", "RO", "SK", "SI", "ES", "SE", "IS",
    "LI", "NO",
];

fn jurisdiction_notes(location: &str, record: &AnalysisRecord) -> Vec<String> {
    let code = location.trim().to_ascii_uppercase();
    let country = code.split(['-', '_']).next().unwrap_or("");
    let mut notes = Vec::new();

    let regime = if EEA.contains(&country) {
        Some("GDPR")
    } else if country == "GB" || country == "UK" {
        Some("UK GDPR")
    } else if code == "US-CA" || code == "CALIFORNIA" {
        Some("CCPA/CPRA")
    } else if country == "BR" {
        Some("LGPD")
    } else if country == "CA" {
        Some("PIPEDA")
    } else {
        None
    };

    if let Some(regime) = regime {
        notes.push(format!(
            "{} applies in {}: statutory data rights hold regardless of what these terms state",
            regime, code
        ));
        if !record.mentions(Category::UserRights) {
            notes.push(format!(
                "These terms do not describe how to exercise your {} rights",
                regime
            ));
        }
        if regime == "CCPA/CPRA" && record.mentions(Category::DataSharing) {
            notes.push("You can direct the provider not to sell or share your personal information".to_string());
        }
    }
    notes
}
