//! Validation of model output.
//!
//! Model text is unwrapped from Markdown code fences, parsed as JSON,
//! checked against `schema/summary.schema.json`, then cleaned into a
//! [`SummaryBundle`]. Anything that fails a step is rejected as a whole.

use std::sync::OnceLock;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use termscope_core::{SummaryBundle, SummarySource};

const SUMMARY_SCHEMA_JSON: &str = include_str!("../../schema/summary.schema.json");

static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

/// Longest summary kept, in characters.
pub const MAX_SUMMARY_CHARS: usize = 2000;

/// Longest list item kept, in characters.
pub const MAX_ITEM_CHARS: usize = 400;

/// Most items kept per list.
pub const MAX_ITEMS: usize = 10;

lazy_static! {
    static ref CODE_FENCE: Regex =
        Regex::new(r"(?s)```[a-zA-Z]*\s*\n?(.*?)\s*```").unwrap();
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResponseError {
    #[error("model returned no content")]
    Empty,

    #[error("model output is not JSON: {0}")]
    NotJson(String),

    #[error("model output does not match the summary schema: {}", .0.join("; "))]
    Schema(Vec<String>),

    #[error("summary schema unavailable: {0}")]
    SchemaUnavailable(String),
}

#[derive(Debug, Deserialize)]
struct ModelSummary {
    summary: String,
    #[serde(default)]
    data_collection: Vec<String>,
    #[serde(default)]
    user_rights: Vec<String>,
    #[serde(default)]
    recommendations: Vec<String>,
}

fn validator() -> Result<&'static jsonschema::Validator, ResponseError> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = match serde_json::from_str(SUMMARY_SCHEMA_JSON) {
            Ok(v) => v,
            Err(e) => return Err(format!("Invalid schema JSON: {}", e)),
        };

        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    result
        .as_ref()
        .map_err(|e| ResponseError::SchemaUnavailable(e.clone()))
}

/// The JSON payload inside model output.
///
/// Fenced output yields the fenced body; otherwise the outermost `{ ... }`
/// span, so stray prose around the object is ignored.
pub fn extract_json(content: &str) -> &str {
    if let Some(body) = CODE_FENCE.captures(content).and_then(|c| c.get(1)) {
        return body.as_str();
    }
    match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if start < end => &content[start..=end],
        _ => content.trim(),
    }
}

/// Parse and validate model output into a model-sourced bundle.
pub fn parse_summary(content: &str) -> Result<SummaryBundle, ResponseError> {
    if content.trim().is_empty() {
        return Err(ResponseError::Empty);
    }

    let value: serde_json::Value = serde_json::from_str(extract_json(content))
        .map_err(|e| ResponseError::NotJson(e.to_string()))?;

    let errors: Vec<String> = validator()?
        .iter_errors(&value)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();
    if !errors.is_empty() {
        return Err(ResponseError::Schema(errors));
    }

    let parsed: ModelSummary =
        serde_json::from_value(value).map_err(|e| ResponseError::NotJson(e.to_string()))?;

    let summary = clip(parsed.summary.trim(), MAX_SUMMARY_CHARS);
    if summary.is_empty() {
        return Err(ResponseError::Schema(vec!["summary is blank".to_string()]));
    }

    Ok(SummaryBundle {
        summary,
        data_collection_findings: clean_list(parsed.data_collection),
        user_rights_findings: clean_list(parsed.user_rights),
        recommendations: clean_list(parsed.recommendations),
        source: SummarySource::Model,
    })
}

/// Trim, drop blanks and duplicates, clip long items, keep order.
fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        let item = clip(item.trim().trim_start_matches(['-', '*', '•']).trim(), MAX_ITEM_CHARS);
        if item.is_empty() || out.contains(&item) {
            continue;
        }
        out.push(item);
        if out.len() == MAX_ITEMS {
            break;
        }
    }
    out
}

fn clip(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", text[..idx].trim_end()),
        None => text.to_string(),
    }
}
