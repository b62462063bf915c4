//! Lexical relevance scoring (no embeddings).

use crate::patterns;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

const PHRASE_WEIGHT: f64 = 10.0;
const EXACT_WORD_WEIGHT: f64 = 2.0;
const PREFIX_WORD_WEIGHT: f64 = 0.5;
const CODE_BONUS: f64 = 1.2;
const HEADER_BONUS: f64 = 1.3;

/// The whole query as one phrase, followed by each word longer than two characters.
pub fn extract_search_terms(query: &str) -> Vec<String> {
    let mut terms = vec![query.to_string()];
    terms.extend(
        query
            .split_whitespace()
            .filter(|w| w.chars().count() > 2)
            .map(str::to_string),
    );
    terms
}

/// Lowercase, strip diacritics, turn punctuation into spaces, collapse whitespace.
pub fn normalize(s: &str) -> String {
    let folded: String = s
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_combining_mark(c: char) -> bool {
    matches!(c, '\u{0300}'..='\u{036f}')
}

pub fn score(chunk: &str, terms: &[String]) -> f64 {
    let text = normalize(chunk);
    let mut total = 0.0;
    for term in terms {
        let term = normalize(term);
        if term.is_empty() {
            continue;
        }
        if text.contains(&term) {
            total += PHRASE_WEIGHT * term.split(' ').count() as f64;
        }
        for word in term.split(' ').filter(|w| w.chars().count() >= 2) {
            let escaped = regex::escape(word);
            total += EXACT_WORD_WEIGHT * count_matches(&format!(r"\b{escaped}\b"), &text);
            total += PREFIX_WORD_WEIGHT * count_matches(&format!(r"\b{escaped}"), &text);
        }
    }
    if total == 0.0 {
        return 0.0;
    }
    if patterns::MD_FENCED_CODE.is_match(chunk) || patterns::MD_INDENTED_CODE.is_match(chunk) {
        total *= CODE_BONUS;
    }
    if patterns::MD_HEADER_LINE.is_match(chunk) {
        total *= HEADER_BONUS;
    }
    total
}

fn count_matches(pattern: &str, text: &str) -> f64 {
    // Escaped input always compiles; a failure just contributes nothing.
    match Regex::new(pattern) {
        Ok(re) => re.find_iter(text).count() as f64,
        Err(_) => 0.0,
    }
}
