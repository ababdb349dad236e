//! Comparison of two to four analysis records.
//!
//! Two records are compared pairwise; three or four are compared against the
//! group mean. Insights follow the fixed dimension order (overall, data,
//! user rights, readability, termination). Entries that failed to score are
//! kept in the result with their error and never abort the comparison.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, ErrorReport};
use crate::types::{AnalysisRecord, Dimension, RiskLevel, RiskScoreVector};

pub const MIN_RECORDS: usize = 2;
pub const MAX_RECORDS: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Differences up to this value read as "similar"
    pub epsilon: f64,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self { epsilon: 0.05 }
    }
}

/// One input to a comparison.
#[derive(Debug, Clone)]
pub enum ComparisonCandidate {
    Scored {
        label: String,
        /// Reference the caller asked for; may differ from the record's own
        /// provenance when the record was reused by fingerprint
        source_ref: String,
        record: AnalysisRecord,
    },
    Failed {
        label: String,
        source_ref: String,
        error: ErrorReport,
    },
}

impl ComparisonCandidate {
    /// Scored candidate reported under the record's own provenance.
    pub fn scored(label: impl Into<String>, record: AnalysisRecord) -> Self {
        let source_ref = record.provenance.source_ref.clone();
        Self::scored_from(label, source_ref, record)
    }

    /// Scored candidate reported under `source_ref`.
    pub fn scored_from(
        label: impl Into<String>,
        source_ref: impl Into<String>,
        record: AnalysisRecord,
    ) -> Self {
        ComparisonCandidate::Scored {
            label: label.into(),
            source_ref: source_ref.into(),
            record,
        }
    }

    pub fn failed(label: impl Into<String>, source_ref: impl Into<String>, error: &EngineError) -> Self {
        ComparisonCandidate::Failed {
            label: label.into(),
            source_ref: source_ref.into(),
            error: error.report(),
        }
    }

    pub fn is_scored(&self) -> bool {
        matches!(self, ComparisonCandidate::Scored { .. })
    }
}

/// Signed difference on one dimension.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DimensionDelta {
    pub dimension: Dimension,
    pub delta: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonEntry {
    pub label: String,

    /// Neutral midpoint scores for failed entries
    pub scores: RiskScoreVector,

    pub risk_level: RiskLevel,
    pub source_ref: String,
    pub partial_signal: bool,

    /// Against the other record (two entries) or the group mean (three or four)
    pub deltas: Vec<DimensionDelta>,

    pub error: Option<ErrorReport>,
}

impl ComparisonEntry {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonResult {
    pub entries: Vec<ComparisonEntry>,
    pub insights: Vec<String>,
}

/// Compare with default settings over every dimension.
pub fn compare(candidates: Vec<ComparisonCandidate>) -> Result<ComparisonResult, EngineError> {
    compare_with(candidates, &ComparisonConfig::default(), None)
}

/// Compare candidates, optionally restricting insights to `metrics`.
///
/// Requires at least two scored candidates and at most four in total.
pub fn compare_with(
    candidates: Vec<ComparisonCandidate>,
    config: &ComparisonConfig,
    metrics: Option<&[Dimension]>,
) -> Result<ComparisonResult, EngineError> {
    if candidates.len() > MAX_RECORDS {
        return Err(EngineError::TooManyInputs {
            given: candidates.len(),
            max: MAX_RECORDS,
        });
    }
    let scored = candidates.iter().filter(|c| c.is_scored()).count();
    if scored < MIN_RECORDS {
        return Err(EngineError::InsufficientInput {
            given: scored,
            required: MIN_RECORDS,
        });
    }

    let dimensions: Vec<Dimension> = match metrics {
        Some(selected) if !selected.is_empty() => Dimension::ORDER
            .into_iter()
            .filter(|d| selected.contains(d))
            .collect(),
        _ => Dimension::ORDER.to_vec(),
    };

    let mut entries: Vec<ComparisonEntry> = candidates.into_iter().map(entry).collect();
    let scored_idx: Vec<usize> = (0..entries.len()).filter(|&i| !entries[i].is_failed()).collect();

    let mut insights = Vec::new();
    if scored_idx.len() == 2 {
        let (a, b) = (&entries[scored_idx[0]], &entries[scored_idx[1]]);
        for &dimension in &dimensions {
            insights.push(pair_insight(dimension, a, b, config.epsilon));
        }
        let deltas_a = deltas(&entries[scored_idx[0]].scores, |d| entries[scored_idx[1]].scores.get(d));
        let deltas_b = deltas(&entries[scored_idx[1]].scores, |d| entries[scored_idx[0]].scores.get(d));
        entries[scored_idx[0]].deltas = deltas_a;
        entries[scored_idx[1]].deltas = deltas_b;
    } else {
        let group: Vec<&ComparisonEntry> = scored_idx.iter().map(|&i| &entries[i]).collect();
        for &dimension in &dimensions {
            insights.extend(group_insights(dimension, &group, config.epsilon));
        }
        let means: Vec<(Dimension, f64)> = Dimension::ORDER
            .into_iter()
            .map(|d| (d, mean(&group, d)))
            .collect();
        for &i in &scored_idx {
            entries[i].deltas = deltas(&entries[i].scores, |d| {
                means
                    .iter()
                    .find(|(dim, _)| *dim == d)
                    .map(|(_, m)| *m)
                    .unwrap_or(0.0)
            });
        }
    }

    for failed in entries.iter().filter(|e| e.is_failed()) {
        tracing::warn!(
            label = %failed.label,
            source_ref = %failed.source_ref,
            "comparison entry failed to score"
        );
        if let Some(error) = &failed.error {
            insights.push(format!("{} could not be analyzed: {}", failed.label, error.reason));
        }
    }

    Ok(ComparisonResult { entries, insights })
}

fn entry(candidate: ComparisonCandidate) -> ComparisonEntry {
    match candidate {
        ComparisonCandidate::Scored {
            label,
            source_ref,
            record,
        } => {
            ComparisonEntry {
                label: if label.trim().is_empty() { source_ref.clone() } else { label },
                scores: record.scores,
                risk_level: record.risk_level,
                source_ref,
                partial_signal: record.partial_signal,
                deltas: Vec::new(),
                error: None,
            }
        }
        ComparisonCandidate::Failed {
            label,
            source_ref,
            error,
        } => {
            let scores = RiskScoreVector::neutral();
            ComparisonEntry {
                label: if label.trim().is_empty() { source_ref.clone() } else { label },
                risk_level: scores.risk_level(),
                scores,
                source_ref,
                partial_signal: true,
                deltas: Vec::new(),
                error: Some(error),
            }
        }
    }
}

fn deltas(scores: &RiskScoreVector, reference: impl Fn(Dimension) -> f64) -> Vec<DimensionDelta> {
    Dimension::ORDER
        .into_iter()
        .map(|dimension| DimensionDelta {
            dimension,
            delta: scores.get(dimension) - reference(dimension),
        })
        .collect()
}

fn mean(group: &[&ComparisonEntry], dimension: Dimension) -> f64 {
    group.iter().map(|e| e.scores.get(dimension)).sum::<f64>() / group.len() as f64
}

/// "X <verb> than Y" phrasing for the larger value, and the "similar" phrasing.
fn pair_phrases(dimension: Dimension) -> (&'static str, &'static str) {
    match dimension {
        Dimension::OverallRisk => ("has higher overall risk than", "have similar overall risk levels"),
        Dimension::DataRisk => ("has higher data risk than", "have similar data risk"),
        Dimension::UserRights => ("offers stronger user rights than", "offer similar user rights"),
        Dimension::Readability => ("is harder to read than", "are similarly readable"),
        Dimension::TerminationRisk => ("has higher termination risk than", "have similar termination risk"),
    }
}

fn pair_insight(dimension: Dimension, a: &ComparisonEntry, b: &ComparisonEntry, epsilon: f64) -> String {
    let (x, y) = (a.scores.get(dimension), b.scores.get(dimension));
    let (higher, similar) = pair_phrases(dimension);
    let diff = x - y;
    if diff.abs() <= epsilon {
        format!("{} and {} {} ({:.1} vs {:.1})", a.label, b.label, similar, x, y)
    } else if diff > 0.0 {
        format!("{} {} {} ({:.1} vs {:.1})", a.label, higher, b.label, x, y)
    } else {
        format!("{} {} {} ({:.1} vs {:.1})", b.label, higher, a.label, y, x)
    }
}

/// Phrases for the entry with the largest and the smallest value.
fn group_phrases(dimension: Dimension) -> (&'static str, &'static str) {
    match dimension {
        Dimension::OverallRisk => ("has the highest overall risk", "has the lowest overall risk"),
        Dimension::DataRisk => ("has the highest data risk", "has the lowest data risk"),
        Dimension::UserRights => ("offers the strongest user rights", "offers the weakest user rights"),
        Dimension::Readability => ("is hardest to read", "is easiest to read"),
        Dimension::TerminationRisk => ("has the highest termination risk", "has the lowest termination risk"),
    }
}

fn group_insights(dimension: Dimension, group: &[&ComparisonEntry], epsilon: f64) -> Vec<String> {
    let avg = mean(group, dimension);
    let value = |e: &&ComparisonEntry| e.scores.get(dimension);

    // First entry wins ties in both directions
    let mut max = group[0];
    let mut min = group[0];
    for entry in &group[1..] {
        if value(entry) > value(&max) {
            max = entry;
        }
        if value(entry) < value(&min) {
            min = entry;
        }
    }

    if value(&max) - value(&min) <= epsilon {
        let labels: Vec<&str> = group.iter().map(|e| e.label.as_str()).collect();
        return vec![format!(
            "{} have similar {} ({:.1} on average)",
            join_labels(&labels),
            dimension.label(),
            avg
        )];
    }

    let (highest, lowest) = group_phrases(dimension);
    vec![
        format!("{} {} ({:.1}, group average {:.1})", max.label, highest, value(&max), avg),
        format!("{} {} ({:.1}, group average {:.1})", min.label, lowest, value(&min), avg),
    ]
}

fn join_labels(labels: &[&str]) -> String {
    match labels {
        [] => String::new(),
        [only] => only.to_string(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}
