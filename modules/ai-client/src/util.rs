/// Truncate to at most `max_chars` characters (not bytes).
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// The response's only word, lowercased, with surrounding punctuation and
/// markdown emphasis removed. `None` when the response has no word or more than one.
pub fn sole_word(response: &str) -> Option<String> {
    let mut words = response
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty());
    let word = words.next()?;
    if words.next().is_some() {
        return None;
    }
    Some(word.to_lowercase())
}
