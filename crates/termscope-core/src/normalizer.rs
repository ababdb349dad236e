//! Text normalization and clause segmentation.
//!
//! Raw extracted text is cleaned (encoding artifacts, whitespace), stripped of
//! repeated boilerplate, and segmented into an ordered sequence of clause
//! candidates with byte offsets into the normalized text.
//!
//! Output is a pure function of the input: the same raw text always yields
//! the same normalized text and the same clause offsets.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::EngineError;
use crate::types::{ClauseSpan, Fingerprint};

/// Words ending in '.' that do not end a sentence.
const ABBREVIATIONS: &[&str] = &[
    "e.g", "i.e", "etc", "inc", "ltd", "llc", "co", "corp", "mr", "mrs", "ms", "dr", "no", "nos",
    "vs", "u.s", "u.k", "e.u", "st", "sec", "art", "para", "approx", "incl",
];

/// A line this short that repeats this often anywhere is navigation chrome.
const NAV_LINE_MAX_WORDS: usize = 3;
const NAV_LINE_MIN_REPEATS: usize = 3;

/// Edge regions never shrink below this many lines on short documents.
const MIN_EDGE_LINES: usize = 3;

/// Lines up to this many words without terminal punctuation read as headings.
const HEADING_MAX_WORDS: usize = 6;

/// Normalizer tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Candidates with fewer word tokens are discarded
    pub min_clause_tokens: usize,

    /// Candidates longer than this (in bytes) are split further
    pub max_clause_chars: usize,

    /// Fewer surviving candidates than this makes the document unanalyzable
    pub min_clauses: usize,

    /// Share of lines at each end of the document checked for boilerplate
    pub boilerplate_edge_fraction: f64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            min_clause_tokens: 4,
            max_clause_chars: 600,
            min_clauses: 2,
            boilerplate_edge_fraction: 0.10,
        }
    }
}

/// Normalized text plus its untagged clause candidates.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedDocument {
    pub text: String,
    pub clauses: Vec<ClauseSpan>,
    pub boilerplate_lines_removed: usize,
}

impl NormalizedDocument {
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.text)
    }
}

/// Normalize with the default configuration.
pub fn normalize(raw_text: &str) -> Result<NormalizedDocument, EngineError> {
    Normalizer::default().normalize(raw_text)
}

/// Cleans raw text and segments it into clause candidates.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    pub fn normalize(&self, raw_text: &str) -> Result<NormalizedDocument, EngineError> {
        let lines = clean_lines(raw_text);
        let (lines, removed) = self.strip_boilerplate(lines);
        let blocks = join_blocks(&lines);
        let text = blocks.join("\n");

        let mut clauses = Vec::new();
        let mut offset = 0;
        for block in &blocks {
            for (start, end) in sentence_ranges(block) {
                for (s, e) in split_long(block, start, end, self.config.max_clause_chars) {
                    let piece = &block[s..e];
                    if token_count(piece) < self.config.min_clause_tokens {
                        continue;
                    }
                    clauses.push(ClauseSpan {
                        index: clauses.len(),
                        start: offset + s,
                        end: offset + e,
                        text: piece.to_string(),
                        tags: Vec::new(),
                    });
                }
            }
            // Blocks are joined by a single '\n'
            offset += block.len() + 1;
        }

        tracing::debug!(
            clauses = clauses.len(),
            boilerplate_removed = removed,
            bytes = text.len(),
            "normalized document"
        );

        if clauses.len() < self.config.min_clauses {
            return Err(EngineError::EmptyDocument {
                reason: format!(
                    "{} clause candidate(s) remain after normalization, at least {} required",
                    clauses.len(),
                    self.config.min_clauses
                ),
            });
        }

        Ok(NormalizedDocument {
            text,
            clauses,
            boilerplate_lines_removed: removed,
        })
    }

    /// Blank out lines that repeat at both ends of the document, and short
    /// navigation lines that repeat throughout it.
    fn strip_boilerplate(&self, mut lines: Vec<String>) -> (Vec<String>, usize) {
        let non_empty: Vec<usize> = (0..lines.len()).filter(|&i| !lines[i].is_empty()).collect();
        let n = non_empty.len();
        if n == 0 {
            return (lines, 0);
        }

        let edge = ((n as f64 * self.config.boilerplate_edge_fraction).ceil() as usize)
            .max(MIN_EDGE_LINES)
            .min(n / 2);
        let keys: HashMap<usize, String> = non_empty
            .iter()
            .map(|&i| (i, lines[i].to_lowercase()))
            .collect();

        let mut total: HashMap<String, usize> = HashMap::new();
        let mut head: HashMap<String, usize> = HashMap::new();
        let mut tail: HashMap<String, usize> = HashMap::new();
        for (pos, i) in non_empty.iter().enumerate() {
            let k = &keys[i];
            *total.entry(k.clone()).or_default() += 1;
            if pos < edge {
                *head.entry(k.clone()).or_default() += 1;
            }
            if pos >= n.saturating_sub(edge) {
                *tail.entry(k.clone()).or_default() += 1;
            }
        }

        let is_boilerplate = |k: &str, line: &str| {
            let count = total.get(k).copied().unwrap_or(0);
            let at_both_edges = head.contains_key(k) && tail.contains_key(k) && count >= 2;
            let nav_chrome = count >= NAV_LINE_MIN_REPEATS
                && line.split_whitespace().count() <= NAV_LINE_MAX_WORDS;
            at_both_edges || nav_chrome
        };

        let mut removed = 0;
        for &i in &non_empty {
            if is_boilerplate(&keys[&i], &lines[i]) {
                lines[i].clear();
                removed += 1;
            }
        }
        (lines, removed)
    }
}

/// Fix encoding artifacts and collapse whitespace, one entry per input line.
fn clean_lines(raw: &str) -> Vec<String> {
    let raw = raw.replace("\r\n", "\n");
    let mut cleaned = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\r' => cleaned.push('\n'),
            '\u{00A0}' | '\u{2007}' | '\u{202F}' | '\t' => cleaned.push(' '),
            '\u{2018}' | '\u{2019}' | '\u{201B}' => cleaned.push('\''),
            '\u{201C}' | '\u{201D}' => cleaned.push('"'),
            '\u{2013}' | '\u{2014}' => cleaned.push('-'),
            '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}' | '\u{FFFD}' => {}
            c if c.is_control() && c != '\n' => {}
            c => cleaned.push(c),
        }
    }

    cleaned
        .split('\n')
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect()
}

/// Group lines into blocks. Wrapped lines are joined; headings and lines
/// ending in terminal punctuation close a block.
fn join_blocks(lines: &[String]) -> Vec<String> {
    let mut blocks: Vec<String> = Vec::new();
    let mut current = String::new();

    for line in lines {
        if line.is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            continue;
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(line);

        let ends_block = line.ends_with(['.', '!', '?', ':', ';'])
            || line.split_whitespace().count() <= HEADING_MAX_WORDS;
        if ends_block {
            blocks.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

/// Byte ranges of sentences within a block.
fn sentence_ranges(block: &str) -> Vec<(usize, usize)> {
    let chars: Vec<(usize, char)> = block.char_indices().collect();
    let len = chars.len();
    let mut ranges = Vec::new();
    let mut start = 0;

    let mut i = 0;
    while i < len {
        let (pos, c) = chars[i];
        if !matches!(c, '.' | '!' | '?') {
            i += 1;
            continue;
        }

        // Closing quotes and brackets belong to the sentence they end
        let mut j = i + 1;
        while j < len && matches!(chars[j].1, '"' | '\'' | ')' | ']') {
            j += 1;
        }
        if j >= len || !chars[j].1.is_whitespace() {
            i = j.max(i + 1);
            continue;
        }

        let mut k = j;
        while k < len && chars[k].1.is_whitespace() {
            k += 1;
        }
        if k >= len {
            break;
        }

        let next = chars[k].1;
        let opens_sentence = next.is_uppercase()
            || next.is_ascii_digit()
            || matches!(next, '"' | '\'' | '(' | '[' | '-' | '\u{2022}');
        if opens_sentence && !(c == '.' && is_abbreviation(&block[start..pos])) {
            ranges.push((start, chars[j].0));
            start = chars[k].0;
        }
        i = k;
    }

    if start < block.len() {
        ranges.push((start, block.len()));
    }
    ranges
}

/// Whether the word before a '.' is an abbreviation, an initial, or a list number.
fn is_abbreviation(before_dot: &str) -> bool {
    let word = before_dot
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or("")
        .trim_start_matches(['(', '[', '"', '\''])
        .to_lowercase();

    if word.is_empty() {
        return false;
    }
    if word.chars().count() == 1 && word.chars().all(char::is_alphabetic) {
        return true;
    }
    if word.len() <= 3 && word.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    ABBREVIATIONS.contains(&word.as_str())
}

/// Split an over-long range at the nearest weaker boundary before the limit.
fn split_long(block: &str, start: usize, end: usize, max_len: usize) -> Vec<(usize, usize)> {
    let mut pieces = Vec::new();
    let mut s = start;

    while end - s > max_len && max_len > 0 {
        let window_end = floor_char_boundary(block, s + max_len);
        let window = &block[s..window_end];

        let cut = ["; ", ": ", ", "]
            .iter()
            .find_map(|sep| window.rfind(sep).map(|p| p + 1))
            .or_else(|| window.rfind(' '))
            .filter(|&p| p > 0)
            .unwrap_or(window.len());

        // A window narrower than one character still takes that character.
        let cut = if cut == 0 {
            block[s..].chars().next().map(char::len_utf8).unwrap_or(1)
        } else {
            cut
        };

        let piece_end = s + cut;
        let (ps, pe) = trim_range(block, s, piece_end);
        if pe > ps {
            pieces.push((ps, pe));
        }
        s = piece_end;
        while s < end && block[s..].starts_with(char::is_whitespace) {
            s += block[s..].chars().next().map(char::len_utf8).unwrap_or(1);
        }
    }

    let (ps, pe) = trim_range(block, s, end);
    if pe > ps {
        pieces.push((ps, pe));
    }
    pieces
}

fn trim_range(text: &str, start: usize, end: usize) -> (usize, usize) {
    let slice = &text[start..end];
    let lead = slice.len() - slice.trim_start().len();
    let trail = slice.len() - slice.trim_end().len();
    if lead + trail >= slice.len() {
        return (start, start);
    }
    (start + lead, end - trail)
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn token_count(text: &str) -> usize {
    text.split_whitespace()
        .filter(|t| t.chars().any(char::is_alphanumeric))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const POLICY: &str = "Acme Privacy Policy\n\
        Home | Products | Contact\n\
        We collect your email address when you register.\n\
        We may share usage data with our advertising partners.\n\
        You can request deletion of your personal data at any time.\n\
        We may terminate your account at any time without notice.\n\
        Acme Privacy Policy\n\
        Home | Products | Contact\n";

    #[test]
    fn test_segments_sentences_with_offsets() {
        let doc = normalize(POLICY).unwrap();
        assert_eq!(doc.clauses.len(), 4);
        for clause in &doc.clauses {
            assert_eq!(&doc.text[clause.start..clause.end], clause.text);
        }
        assert_eq!(doc.clauses[0].text, "We collect your email address when you register.");
        assert_eq!(
            doc.clauses.iter().map(|c| c.index).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn test_repeated_header_and_footer_dropped() {
        let doc = normalize(POLICY).unwrap();
        assert!(!doc.text.contains("Acme Privacy Policy"));
        assert!(!doc.text.contains("Home | Products"));
        assert_eq!(doc.boilerplate_lines_removed, 4);
    }

    #[test]
    fn test_short_candidates_discarded() {
        let text = "Terms.\nWe collect your name and address.\nOK then.\nWe store cookies on your device.";
        let doc = normalize(text).unwrap();
        assert_eq!(doc.clauses.len(), 2);
    }

    #[test]
    fn test_empty_document_error() {
        let err = normalize("   \n\n  ").unwrap_err();
        assert!(matches!(err, EngineError::EmptyDocument { .. }));

        let err = normalize("Only one real sentence lives in here.").unwrap_err();
        assert!(matches!(err, EngineError::EmptyDocument { .. }));
    }

    #[test]
    fn test_abbreviations_do_not_split() {
        let text = "We collect identifiers, e.g. Your IP address and device ID. \
                    Acme Inc. Operates this service for customers worldwide.";
        let doc = normalize(text).unwrap();
        assert_eq!(doc.clauses.len(), 2);
        assert!(doc.clauses[0].text.contains("e.g. Your IP address"));
        assert!(doc.clauses[1].text.starts_with("Acme Inc. Operates"));
    }

    #[test]
    fn test_limit_below_char_width_still_progresses() {
        let normalizer = Normalizer::new(NormalizerConfig {
            max_clause_chars: 3,
            min_clause_tokens: 1,
            min_clauses: 1,
            ..Default::default()
        });
        let doc = normalizer.normalize("We collect \u{1F600}\u{1F600} data here.").unwrap();
        assert!(!doc.clauses.is_empty());
        for clause in &doc.clauses {
            assert_eq!(&doc.text[clause.start..clause.end], clause.text);
        }
    }

    #[test]
    fn test_long_clause_split_before_limit() {
        let long = format!(
            "{}; {}.",
            "we collect information about the pages you view and the links you click".repeat(2),
            "we also collect information about your device and browser settings".repeat(2)
        );
        let text = format!("{}\nWe may terminate your account at any time.", long);
        let normalizer = Normalizer::new(NormalizerConfig {
            max_clause_chars: 160,
            ..Default::default()
        });
        let doc = normalizer.normalize(&text).unwrap();
        assert!(doc.clauses.len() >= 3);
        for clause in &doc.clauses {
            assert!(clause.text.len() <= 160);
            assert_eq!(&doc.text[clause.start..clause.end], clause.text);
        }
    }

    #[test]
    fn test_encoding_artifacts_cleaned() {
        let text = "We\u{00A0}collect   your \u{201C}personal data\u{201D}.\r\nWe don\u{2019}t sell\u{200B} your personal data.";
        let doc = normalize(text).unwrap();
        assert_eq!(doc.clauses[0].text, "We collect your \"personal data\".");
        assert_eq!(doc.clauses[1].text, "We don't sell your personal data.");
    }

    #[test]
    fn test_wrapped_lines_are_joined() {
        let text = "We collect information that you provide when you create an account with\n\
                    the service, including your name and email address.\n\
                    You may delete your account from the settings page.";
        let doc = normalize(text).unwrap();
        assert_eq!(doc.clauses.len(), 2);
        assert!(doc.clauses[0].text.contains("account with the service"));
    }

    proptest! {
        #[test]
        fn prop_normalize_is_deterministic(words in proptest::collection::vec("[a-z]{1,8}", 5..80)) {
            let raw = words
                .chunks(6)
                .map(|c| format!("We {}.", c.join(" ")))
                .collect::<Vec<_>>()
                .join(" ");
            let first = normalize(&raw);
            let second = normalize(&raw);
            match (first, second) {
                (Ok(a), Ok(b)) => {
                    prop_assert_eq!(&a.text, &b.text);
                    prop_assert_eq!(a.clauses.len(), b.clauses.len());
                    for (x, y) in a.clauses.iter().zip(b.clauses.iter()) {
                        prop_assert_eq!((x.start, x.end), (y.start, y.end));
                        prop_assert_eq!(&a.text[x.start..x.end], x.text.as_str());
                    }
                }
                (Err(_), Err(_)) => {}
                _ => prop_assert!(false, "normalize was not deterministic"),
            }
        }
    }
}
