//! Flesch reading ease mapped onto the 0–10 "harder is higher" scale.

use crate::types::clamp_score;

/// Flesch reading ease over a sequence of sentences.
///
/// Returns `None` when there are no words to measure.
pub fn flesch_reading_ease<'a>(sentences: impl IntoIterator<Item = &'a str>) -> Option<f64> {
    let mut sentence_count = 0usize;
    let mut words = 0usize;
    let mut syllables = 0usize;

    for sentence in sentences {
        let mut counted = false;
        for word in sentence.split_whitespace() {
            let letters: String = word
                .chars()
                .filter(|c| c.is_alphabetic())
                .flat_map(char::to_lowercase)
                .collect();
            if letters.is_empty() {
                continue;
            }
            words += 1;
            syllables += count_syllables(&letters);
            counted = true;
        }
        if counted {
            sentence_count += 1;
        }
    }

    if words == 0 || sentence_count == 0 {
        return None;
    }

    let words_per_sentence = words as f64 / sentence_count as f64;
    let syllables_per_word = syllables as f64 / words as f64;
    Some(206.835 - 1.015 * words_per_sentence - 84.6 * syllables_per_word)
}

/// 0 for very easy text, 10 for very hard text. Empty text scores 0.
pub fn readability_score<'a>(sentences: impl IntoIterator<Item = &'a str>) -> f64 {
    match flesch_reading_ease(sentences) {
        Some(ease) => clamp_score((100.0 - ease) / 10.0),
        None => 0.0,
    }
}

/// Vowel-group heuristic with a silent trailing 'e'.
fn count_syllables(word: &str) -> usize {
    let mut count = 0;
    let mut previous_vowel = false;
    for c in word.chars() {
        let vowel = matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
        if vowel && !previous_vowel {
            count += 1;
        }
        previous_vowel = vowel;
    }
    if count > 1 && word.ends_with('e') && !word.ends_with("le") {
        count -= 1;
    }
    count.max(1)
}
