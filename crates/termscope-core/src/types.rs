//! Core types for Termscope analysis.
//!
//! These are the data structures that flow through the engine: documents and
//! their provenance, tagged clauses, score vectors, and the assembled
//! [`AnalysisRecord`] handed to consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::scorer::ScoringWeights;

/// Lowest value any score can take.
pub const SCORE_MIN: f64 = 0.0;

/// Highest value any score can take.
pub const SCORE_MAX: f64 = 10.0;

/// Population-neutral substitute for a dimension with no signal.
pub const NEUTRAL_SCORE: f64 = 5.0;

/// Tolerance used when checking `overall_risk` against its subscores.
pub const OVERALL_TOLERANCE: f64 = 1e-6;

/// Where a document came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Url,
    Pdf,
    DirectoryEntry,
    /// Plain text supplied directly (pasted or uploaded as text).
    Text,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Url => "url",
            SourceKind::Pdf => "pdf",
            SourceKind::DirectoryEntry => "directory_entry",
            SourceKind::Text => "text",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance of a document: what kind of source and which one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Provenance {
    pub source_kind: SourceKind,

    /// The url, filename, or company key
    pub source_ref: String,
}

/// A fetched legal document. Immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub raw_text: String,
    pub provenance: Provenance,
}

impl Document {
    pub fn new(source_kind: SourceKind, source_ref: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            provenance: Provenance {
                source_kind,
                source_ref: source_ref.into(),
            },
        }
    }

    /// Create a document from directly supplied text.
    pub fn text(source_ref: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self::new(SourceKind::Text, source_ref, raw_text)
    }
}

/// Clause categories recognised by the classifier.
///
/// Declaration order is the canonical tag order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    DataCollection,
    DataSharing,
    ThirdPartySharing,
    Cookies,
    UserRights,
    Termination,
    Liability,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::DataCollection,
        Category::DataSharing,
        Category::ThirdPartySharing,
        Category::Cookies,
        Category::UserRights,
        Category::Termination,
        Category::Liability,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::DataCollection => "data_collection",
            Category::DataSharing => "data_sharing",
            Category::ThirdPartySharing => "third_party_sharing",
            Category::Cookies => "cookies",
            Category::UserRights => "user_rights",
            Category::Termination => "termination",
            Category::Liability => "liability",
        }
    }

    /// Human-readable label used in summaries.
    pub fn label(&self) -> &'static str {
        match self {
            Category::DataCollection => "data collection",
            Category::DataSharing => "data sharing",
            Category::ThirdPartySharing => "third-party sharing",
            Category::Cookies => "cookies and tracking",
            Category::UserRights => "user rights",
            Category::Termination => "termination",
            Category::Liability => "liability",
        }
    }

    /// Categories that feed `data_risk`.
    pub fn is_data_exposure(&self) -> bool {
        matches!(
            self,
            Category::DataCollection | Category::DataSharing | Category::ThirdPartySharing
        )
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL.into_iter().find(|c| c.as_str() == normalized)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A category assigned to a clause with a confidence in `[0, 1]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CategoryTag {
    pub category: Category,
    pub confidence: f64,
}

/// A contiguous span of normalized text considered as one clause.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClauseSpan {
    /// Position in the clause sequence
    pub index: usize,

    /// Byte offset of the first character in the normalized text
    pub start: usize,

    /// Byte offset one past the last character in the normalized text
    pub end: usize,

    pub text: String,

    /// Tags in canonical category order, at most one per category
    #[serde(default)]
    pub tags: Vec<CategoryTag>,
}

impl ClauseSpan {
    pub fn is_tagged(&self) -> bool {
        !self.tags.is_empty()
    }

    pub fn has_tag(&self, category: Category) -> bool {
        self.tags.iter().any(|t| t.category == category)
    }

    /// Confidence for a category, 0.0 when untagged.
    pub fn confidence(&self, category: Category) -> f64 {
        self.tags
            .iter()
            .find(|t| t.category == category)
            .map(|t| t.confidence)
            .unwrap_or(0.0)
    }

    /// Clause text cut to at most `max_chars` characters on a word boundary.
    pub fn excerpt(&self, max_chars: usize) -> String {
        if self.text.chars().count() <= max_chars {
            return self.text.clone();
        }
        let cut: String = self.text.chars().take(max_chars).collect();
        let trimmed = match cut.rfind(char::is_whitespace) {
            Some(pos) if pos > 0 => &cut[..pos],
            _ => cut.as_str(),
        };
        format!("{}...", trimmed.trim_end())
    }
}

/// Stable hash of normalized text; the idempotency and cache key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint normalized text (lowercase hex SHA-256).
    pub fn of(normalized_text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(normalized_text.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Accept a full fingerprint as printed, in either case.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.len() == 64 && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(Self(raw.to_ascii_lowercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for logs.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Risk bucket derived from a score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Bucket a risk-oriented score: `>= 7` high, `>= 4` medium, otherwise low.
    pub fn from_score(score: f64) -> Self {
        if score >= 7.0 {
            RiskLevel::High
        } else if score >= 4.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the five risk dimensions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    OverallRisk,
    DataRisk,
    UserRights,
    Readability,
    TerminationRisk,
}

impl Dimension {
    /// Fixed reporting order.
    pub const ORDER: [Dimension; 5] = [
        Dimension::OverallRisk,
        Dimension::DataRisk,
        Dimension::UserRights,
        Dimension::Readability,
        Dimension::TerminationRisk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::OverallRisk => "overall_risk",
            Dimension::DataRisk => "data_risk",
            Dimension::UserRights => "user_rights_score",
            Dimension::Readability => "readability_score",
            Dimension::TerminationRisk => "termination_risk",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Dimension::OverallRisk => "overall risk",
            Dimension::DataRisk => "data risk",
            Dimension::UserRights => "user rights",
            Dimension::Readability => "readability",
            Dimension::TerminationRisk => "termination risk",
        }
    }

    /// `user_rights_score` is the only axis where a higher value favours the user.
    pub fn higher_is_better(&self) -> bool {
        matches!(self, Dimension::UserRights)
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "overall" | "overall_risk" => Some(Dimension::OverallRisk),
            "data" | "data_risk" => Some(Dimension::DataRisk),
            "user_rights" | "user_rights_score" | "rights" => Some(Dimension::UserRights),
            "readability" | "readability_score" => Some(Dimension::Readability),
            "termination" | "termination_risk" => Some(Dimension::TerminationRisk),
            _ => None,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clamp a score into `[0, 10]`. NaN collapses to 0.
pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        SCORE_MIN
    } else {
        value.clamp(SCORE_MIN, SCORE_MAX)
    }
}

/// The four independently computed subscores.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Subscores {
    pub data_risk: f64,

    /// Higher is better for the user
    pub user_rights_score: f64,

    /// Higher is harder to read
    pub readability_score: f64,

    pub termination_risk: f64,
}

impl Subscores {
    pub fn neutral() -> Self {
        Self {
            data_risk: NEUTRAL_SCORE,
            user_rights_score: NEUTRAL_SCORE,
            readability_score: NEUTRAL_SCORE,
            termination_risk: NEUTRAL_SCORE,
        }
    }

    fn clamped(self) -> Self {
        Self {
            data_risk: clamp_score(self.data_risk),
            user_rights_score: clamp_score(self.user_rights_score),
            readability_score: clamp_score(self.readability_score),
            termination_risk: clamp_score(self.termination_risk),
        }
    }
}

/// Five-dimensional score vector.
///
/// `overall_risk` is always derived from the four subscores; there is no way
/// to set it independently. Deserialization rejects vectors whose stored
/// `overall_risk` disagrees with the default-weight formula.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "RawScoreVector")]
pub struct RiskScoreVector {
    data_risk: f64,
    user_rights_score: f64,
    readability_score: f64,
    termination_risk: f64,
    overall_risk: f64,
}

impl RiskScoreVector {
    /// Build a vector from subscores, deriving `overall_risk` with `weights`.
    pub fn from_subscores(subscores: Subscores, weights: &ScoringWeights) -> Self {
        let s = subscores.clamped();
        Self {
            data_risk: s.data_risk,
            user_rights_score: s.user_rights_score,
            readability_score: s.readability_score,
            termination_risk: s.termination_risk,
            overall_risk: weights.combine(&s),
        }
    }

    /// Every dimension at the neutral midpoint.
    pub fn neutral() -> Self {
        Self::from_subscores(Subscores::neutral(), &ScoringWeights::default())
    }

    pub fn data_risk(&self) -> f64 {
        self.data_risk
    }

    pub fn user_rights_score(&self) -> f64 {
        self.user_rights_score
    }

    pub fn readability_score(&self) -> f64 {
        self.readability_score
    }

    pub fn termination_risk(&self) -> f64 {
        self.termination_risk
    }

    pub fn overall_risk(&self) -> f64 {
        self.overall_risk
    }

    pub fn subscores(&self) -> Subscores {
        Subscores {
            data_risk: self.data_risk,
            user_rights_score: self.user_rights_score,
            readability_score: self.readability_score,
            termination_risk: self.termination_risk,
        }
    }

    /// Raw value of a dimension as stored.
    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::OverallRisk => self.overall_risk,
            Dimension::DataRisk => self.data_risk,
            Dimension::UserRights => self.user_rights_score,
            Dimension::Readability => self.readability_score,
            Dimension::TerminationRisk => self.termination_risk,
        }
    }

    /// Value of a dimension oriented so that higher always means riskier.
    pub fn risk_value(&self, dimension: Dimension) -> f64 {
        let value = self.get(dimension);
        if dimension.higher_is_better() {
            SCORE_MAX - value
        } else {
            value
        }
    }

    /// Bucket a dimension. User rights are inverted before bucketing.
    pub fn level(&self, dimension: Dimension) -> RiskLevel {
        RiskLevel::from_score(self.risk_value(dimension))
    }

    pub fn risk_level(&self) -> RiskLevel {
        RiskLevel::from_score(self.overall_risk)
    }

    /// Recompute `overall_risk` from the stored subscores.
    pub fn recompute_overall(&self, weights: &ScoringWeights) -> f64 {
        weights.combine(&self.subscores())
    }
}

#[derive(Deserialize)]
struct RawScoreVector {
    data_risk: f64,
    user_rights_score: f64,
    readability_score: f64,
    termination_risk: f64,
    overall_risk: f64,
}

impl TryFrom<RawScoreVector> for RiskScoreVector {
    type Error = String;

    fn try_from(raw: RawScoreVector) -> Result<Self, Self::Error> {
        let fields = [
            ("data_risk", raw.data_risk),
            ("user_rights_score", raw.user_rights_score),
            ("readability_score", raw.readability_score),
            ("termination_risk", raw.termination_risk),
            ("overall_risk", raw.overall_risk),
        ];
        for (name, value) in fields {
            if !value.is_finite() || !(SCORE_MIN..=SCORE_MAX).contains(&value) {
                return Err(format!("{} out of range [0, 10]: {}", name, value));
            }
        }

        let vector = RiskScoreVector::from_subscores(
            Subscores {
                data_risk: raw.data_risk,
                user_rights_score: raw.user_rights_score,
                readability_score: raw.readability_score,
                termination_risk: raw.termination_risk,
            },
            &ScoringWeights::default(),
        );
        if (vector.overall_risk - raw.overall_risk).abs() > OVERALL_TOLERANCE {
            return Err(format!(
                "overall_risk {} does not match subscores (expected {})",
                raw.overall_risk, vector.overall_risk
            ));
        }
        Ok(vector)
    }
}

/// Which path produced the summary text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SummarySource {
    Model,
    Fallback,
}

/// The assembled, immutable result of analysing one normalized text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisRecord {
    pub content_fingerprint: Fingerprint,
    pub provenance: Provenance,
    pub clauses: Vec<ClauseSpan>,
    pub scores: RiskScoreVector,
    pub risk_level: RiskLevel,

    /// True when at least one dimension used the neutral substitute
    pub partial_signal: bool,

    /// Dimensions that used the neutral substitute, in reporting order
    #[serde(default)]
    pub neutral_dimensions: Vec<Dimension>,

    pub summary: String,
    pub summary_source: SummarySource,
    pub data_collection_findings: Vec<String>,
    pub user_rights_findings: Vec<String>,
    pub recommendations: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl AnalysisRecord {
    /// Clauses carrying at least one tag.
    pub fn tagged_clauses(&self) -> impl Iterator<Item = &ClauseSpan> {
        self.clauses.iter().filter(|c| c.is_tagged())
    }

    /// Whether any clause carries the given category.
    pub fn mentions(&self, category: Category) -> bool {
        self.clauses.iter().any(|c| c.has_tag(category))
    }
}
