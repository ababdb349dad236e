//! Prompts for the summary model.
//!
//! The system prompt fixes the output contract; the user prompt carries the
//! document. Document content is bounded by a token budget: the strongest
//! tagged clauses go in first, then as much of the normalized text as still
//! fits.

use termscope_core::summary::by_strength;
use termscope_core::ClauseSpan;

use crate::providers::ChatMessage;

/// Characters per token used when sizing prompt content.
pub const CHARS_PER_TOKEN: usize = 4;

/// System prompt shared by every summary call.
///
/// The model only restates what the document says; scores are computed
/// elsewhere and are never asked for.
pub const SYSTEM_PROMPT: &str = r#"
You summarize Terms of Service and privacy policies for ordinary readers.

## Rules
1. Use ONLY what the document says. Do not invent practices or rights.
2. Quote or closely paraphrase the document for every finding.
3. Prefer plain language over legal language.
4. Do not rate or score the document.

## Output Format (JSON only, no prose before or after)
{
  "summary": "two to four sentences on what the user agrees to",
  "data_collection": ["what personal data is collected, shared or tracked"],
  "user_rights": ["what the user can access, delete, export or opt out of"],
  "recommendations": ["concrete steps the user should consider"]
}

Lists may be empty. Keep each list item to one sentence.
"#;

/// Build the user prompt for a document within `token_budget` tokens.
pub fn build_user_prompt(text: &str, clauses: &[ClauseSpan], token_budget: u32) -> String {
    let mut remaining = token_budget as usize * CHARS_PER_TOKEN;
    let mut prompt = String::from("Summarize the following document.\n");

    let mut key_lines = Vec::new();
    for clause in by_strength(clauses) {
        let labels: Vec<&str> = clause.tags.iter().map(|t| t.category.label()).collect();
        let line = format!("- [{}] {}\n", labels.join(", "), clause.text);
        let cost = line.chars().count();
        if cost > remaining {
            break;
        }
        remaining -= cost;
        key_lines.push(line);
    }

    if !key_lines.is_empty() {
        prompt.push_str("\n## Key clauses\n");
        for line in &key_lines {
            prompt.push_str(line);
        }
    }

    if remaining > 0 && !text.trim().is_empty() {
        let body = truncate_chars(text, remaining);
        prompt.push_str("\n## Document text");
        if body.len() < text.len() {
            prompt.push_str(" (truncated)");
        }
        prompt.push('\n');
        prompt.push_str(body);
        prompt.push('\n');
    }

    prompt
}

/// Messages for one summary call.
pub fn summary_messages(text: &str, clauses: &[ClauseSpan], token_budget: u32) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT.trim()),
        ChatMessage::user(build_user_prompt(text, clauses, token_budget)),
    ]
}

/// Longest prefix of at most `max_chars` characters.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
