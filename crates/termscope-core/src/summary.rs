//! Summary bundles and the rule-based fallback summary.
//!
//! The fallback is built only from tagged clauses, so it is always available
//! when the generative model is not.

use serde::{Deserialize, Serialize};

use crate::types::{Category, ClauseSpan, RiskLevel, SummarySource};

/// Longest excerpt quoted in a finding.
pub const FINDING_EXCERPT_CHARS: usize = 200;

/// Summary text plus the ordered finding and recommendation lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryBundle {
    pub summary: String,
    pub data_collection_findings: Vec<String>,
    pub user_rights_findings: Vec<String>,
    pub recommendations: Vec<String>,
    pub source: SummarySource,
}

impl SummaryBundle {
    pub fn is_empty(&self) -> bool {
        self.summary.trim().is_empty()
    }
}

/// Headline recommendation for a record's overall risk level.
pub fn headline_recommendation(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::High => "High risk - review carefully before agreeing",
        RiskLevel::Medium => "Moderate risk - standard terms with some concerns",
        RiskLevel::Low => "Low risk - generally favorable terms",
    }
}

/// Tagged clauses ordered by their strongest tag, strongest first.
/// Ties keep document order.
pub fn by_strength(clauses: &[ClauseSpan]) -> Vec<&ClauseSpan> {
    let mut tagged: Vec<&ClauseSpan> = clauses.iter().filter(|c| c.is_tagged()).collect();
    tagged.sort_by(|a, b| {
        strength(b)
            .total_cmp(&strength(a))
            .then(a.index.cmp(&b.index))
    });
    tagged
}

fn strength(clause: &ClauseSpan) -> f64 {
    clause.tags.iter().map(|t| t.confidence).fold(0.0, f64::max)
}

/// Top `n` clauses for a set of categories, highest confidence first.
pub fn top_clauses<'a>(clauses: &'a [ClauseSpan], categories: &[Category], n: usize) -> Vec<&'a ClauseSpan> {
    let score = |c: &ClauseSpan| {
        categories
            .iter()
            .map(|&cat| c.confidence(cat))
            .fold(0.0, f64::max)
    };
    let mut matching: Vec<&ClauseSpan> = clauses.iter().filter(|c| score(c) > 0.0).collect();
    matching.sort_by(|a, b| score(b).total_cmp(&score(a)).then(a.index.cmp(&b.index)));
    matching.truncate(n);
    matching
}

const DATA_FINDING_CATEGORIES: [Category; 4] = [
    Category::DataCollection,
    Category::DataSharing,
    Category::ThirdPartySharing,
    Category::Cookies,
];

/// Top `n` clauses of each category, merged in category order. A clause that
/// leads several categories is listed once, under the first.
pub fn per_category<'a>(clauses: &'a [ClauseSpan], categories: &[Category], n: usize) -> Vec<&'a ClauseSpan> {
    let mut merged: Vec<&ClauseSpan> = Vec::new();
    for &category in categories {
        for clause in top_clauses(clauses, &[category], n) {
            if !merged.iter().any(|c| c.index == clause.index) {
                merged.push(clause);
            }
        }
    }
    merged
}

/// Deterministic summary from the top-N clauses per category.
pub fn fallback_summary(clauses: &[ClauseSpan], top_n: usize) -> SummaryBundle {
    let counts: Vec<(Category, usize)> = Category::ALL
        .iter()
        .map(|&category| (category, clauses.iter().filter(|c| c.has_tag(category)).count()))
        .filter(|(_, count)| *count > 0)
        .collect();

    let mut summary = format!(
        "Analyzed {} clause{}.",
        clauses.len(),
        if clauses.len() == 1 { "" } else { "s" }
    );
    if counts.is_empty() {
        summary.push_str(" None of them match a known risk category.");
    } else {
        let parts: Vec<String> = counts
            .iter()
            .map(|(category, count)| format!("{} about {}", count, category.label()))
            .collect();
        summary.push(' ');
        summary.push_str(&parts.join(", "));
        summary.push('.');
    }
    if let Some(key) = by_strength(clauses).first() {
        summary.push_str(&format!(" Key clause: \"{}\"", key.excerpt(FINDING_EXCERPT_CHARS)));
    }

    let data_collection_findings = per_category(clauses, &DATA_FINDING_CATEGORIES, top_n)
        .into_iter()
        .map(|c| c.excerpt(FINDING_EXCERPT_CHARS))
        .collect();

    let user_rights_findings = top_clauses(clauses, &[Category::UserRights], top_n)
        .into_iter()
        .map(|c| c.excerpt(FINDING_EXCERPT_CHARS))
        .collect();

    let present = |category| counts.iter().any(|(c, _)| *c == category);
    let mut recommendations = Vec::new();
    if present(Category::DataCollection) {
        recommendations.push("Limit the personal information you provide to what the service needs".to_string());
    }
    if present(Category::DataSharing) || present(Category::ThirdPartySharing) {
        recommendations.push("Check which third parties receive your data and whether you can opt out of sharing".to_string());
    }
    if present(Category::Cookies) {
        recommendations.push("Adjust cookie preferences or browser settings to limit tracking".to_string());
    }
    if present(Category::UserRights) {
        recommendations.push("Use the described rights to manage or delete your data when needed".to_string());
    } else {
        recommendations.push("No clear user rights are described; ask the provider how to access or delete your data".to_string());
    }
    if present(Category::Termination) {
        recommendations.push("Keep backups of your content since the provider may suspend or end the service".to_string());
    }
    if present(Category::Liability) {
        recommendations.push("Note the limits on the provider's liability and any arbitration clause".to_string());
    }

    SummaryBundle {
        summary,
        data_collection_findings,
        user_rights_findings,
        recommendations,
        source: SummarySource::Fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CategoryTag;

    fn clause(index: usize, text: &str, tags: &[(Category, f64)]) -> ClauseSpan {
        ClauseSpan {
            index,
            start: 0,
            end: text.len(),
            text: text.to_string(),
            tags: tags
                .iter()
                .map(|&(category, confidence)| CategoryTag { category, confidence })
                .collect(),
        }
    }

    #[test]
    fn test_fallback_picks_top_clauses() {
        let clauses = vec![
            clause(0, "We collect your name.", &[(Category::DataCollection, 0.34)]),
            clause(1, "We collect your email address automatically.", &[(Category::DataCollection, 1.0)]),
            clause(2, "We share data with partners.", &[(Category::DataSharing, 0.67)]),
            clause(3, "Nothing to see here at all.", &[]),
        ];
        let bundle = fallback_summary(&clauses, 1);
        assert_eq!(bundle.source, SummarySource::Fallback);
        assert_eq!(
            bundle.data_collection_findings,
            vec![
                "We collect your email address automatically.".to_string(),
                "We share data with partners.".to_string()
            ]
        );
        assert!(bundle.user_rights_findings.is_empty());
        assert!(bundle.summary.starts_with("Analyzed 4 clauses. 2 about data collection, 1 about data sharing."));
        assert!(bundle.recommendations.iter().any(|r| r.starts_with("No clear user rights")));
    }

    #[test]
    fn test_findings_keep_each_category_in_order() {
        let clauses = vec![
            clause(0, "We use cookies to remember you.", &[(Category::Cookies, 1.0)]),
            clause(1, "Pixels and web beacons track visits.", &[(Category::Cookies, 0.67)]),
            clause(2, "We may record your phone number.", &[(Category::DataCollection, 0.25)]),
            clause(
                3,
                "We collect and share your email address.",
                &[(Category::DataCollection, 0.75), (Category::DataSharing, 0.5)],
            ),
        ];
        let bundle = fallback_summary(&clauses, 1);
        assert_eq!(
            bundle.data_collection_findings,
            vec![
                "We collect and share your email address.".to_string(),
                "We use cookies to remember you.".to_string()
            ]
        );

        let two: Vec<usize> = per_category(&clauses, &DATA_FINDING_CATEGORIES, 2)
            .iter()
            .map(|c| c.index)
            .collect();
        assert_eq!(two, vec![3, 2, 0, 1]);
    }

    #[test]
    fn test_fallback_never_empty() {
        let bundle = fallback_summary(&[], 3);
        assert!(!bundle.is_empty());
        assert_eq!(bundle.summary, "Analyzed 0 clauses. None of them match a known risk category.");
    }

    #[test]
    fn test_headlines() {
        assert!(headline_recommendation(RiskLevel::High).starts_with("High risk"));
        assert!(headline_recommendation(RiskLevel::Medium).starts_with("Moderate risk"));
        assert!(headline_recommendation(RiskLevel::Low).starts_with("Low risk"));
    }

    #[test]
    fn test_by_strength_orders_and_skips_untagged() {
        let clauses = vec![
            clause(0, "a b c d", &[(Category::Cookies, 0.5)]),
            clause(1, "e f g h", &[]),
            clause(2, "i j k l", &[(Category::Liability, 0.9)]),
            clause(3, "m n o p", &[(Category::Termination, 0.5)]),
        ];
        let order: Vec<usize> = by_strength(&clauses).iter().map(|c| c.index).collect();
        assert_eq!(order, vec![2, 0, 3]);
    }
}
