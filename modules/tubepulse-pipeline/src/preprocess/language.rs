//! Stop-word overlap language detection.
//!
//! Each supported language scores the number of tokens found in its stop-word
//! list; Turkish additionally scores tokens carrying letters unique to its
//! alphabet. Confidence is the winner's share of all hits. Short or ambiguous
//! comments fall back to the configured default.

use std::collections::HashSet;
use std::sync::LazyLock;

use super::stopwords::LANGUAGES;

/// Below this share of hits the detection is not trusted.
pub const MIN_CONFIDENCE: f64 = 0.35;

/// Fewer alphabetic tokens than this are not enough evidence.
pub const MIN_TOKENS: usize = 2;

const TURKISH_LETTERS: &[char] = &['ç', 'ğ', 'ı', 'ö', 'ş', 'ü', 'İ'];

static LISTS: LazyLock<Vec<(&'static str, HashSet<&'static str>)>> = LazyLock::new(|| {
    LANGUAGES
        .iter()
        .map(|(code, words)| (*code, words.iter().copied().collect()))
        .collect()
});

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub language: String,
    pub confidence: f64,
}

/// Best guess for lowercased `tokens`, or `None` when evidence is too thin.
pub fn detect(tokens: &[String]) -> Option<Detection> {
    let alphabetic: Vec<&str> = tokens
        .iter()
        .map(String::as_str)
        .filter(|t| t.chars().any(char::is_alphabetic))
        .collect();
    if alphabetic.len() < MIN_TOKENS {
        return None;
    }

    let mut scores: Vec<(&str, f64)> = LISTS
        .iter()
        .map(|(code, words)| {
            let mut score = alphabetic.iter().filter(|t| words.contains(*t)).count() as f64;
            if *code == "tr" {
                score += alphabetic
                    .iter()
                    .filter(|t| t.chars().any(|c| TURKISH_LETTERS.contains(&c)))
                    .count() as f64;
            }
            (*code, score)
        })
        .collect();

    let total: f64 = scores.iter().map(|(_, s)| s).sum();
    if total == 0.0 {
        return None;
    }
    // Stable order: highest score, then list order (en first) on ties.
    scores.sort_by(|a, b| b.1.total_cmp(&a.1));
    let (language, best) = scores[0];
    let confidence = best / total;
    if confidence < MIN_CONFIDENCE {
        return None;
    }
    Some(Detection {
        language: language.to_string(),
        confidence,
    })
}

/// `detect`, or `default` when detection is not confident.
pub fn detect_or(tokens: &[String], default: &str) -> String {
    detect(tokens)
        .map(|d| d.language)
        .unwrap_or_else(|| default.to_string())
}
