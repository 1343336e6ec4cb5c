use std::collections::HashSet;
use std::sync::LazyLock;

use unicode_normalization::UnicodeNormalization;

pub const ENGLISH: &[&str] = &[
    "a", "about", "after", "all", "also", "am", "an", "and", "any", "are", "as", "at", "be",
    "because", "been", "before", "being", "but", "by", "can", "could", "did", "do", "does",
    "doing", "dont", "for", "from", "get", "got", "had", "has", "have", "he", "her", "here",
    "him", "his", "how", "i", "if", "im", "in", "into", "is", "it", "its", "just", "like",
    "me", "more", "most", "my", "no", "not", "now", "of", "on", "one", "only", "or", "other",
    "our", "out", "over", "really", "said", "so", "some", "still", "than", "that", "the",
    "their", "them", "then", "there", "these", "they", "this", "those", "to", "too", "up",
    "us", "very", "was", "we", "were", "what", "when", "where", "which", "while", "who",
    "why", "will", "with", "would", "you", "your", "youre",
];

pub const TURKISH: &[&str] = &[
    "acaba", "ama", "ancak", "artık", "aslında", "az", "bana", "bazı", "belki", "ben",
    "beni", "benim", "bir", "biraz", "birçok", "biz", "bize", "bu", "buna", "bunu", "bunun",
    "çok", "çünkü", "da", "daha", "de", "defa", "diye", "en", "gibi", "hem", "hep", "her",
    "hiç", "için", "ile", "ise", "kadar", "ki", "kim", "mi", "mı", "mu", "mü", "nasıl",
    "ne", "neden", "nerede", "niye", "o", "olan", "olarak", "oldu", "olduğu", "olsun",
    "ona", "onu", "onun", "öyle", "sen", "seni", "senin", "siz", "şey", "şu", "şimdi",
    "tüm", "ve", "veya", "ya", "yani", "zaten",
];

pub const SPANISH: &[&str] = &[
    "al", "algo", "como", "con", "cuando", "de", "del", "el", "ella", "en", "era", "es",
    "esa", "ese", "eso", "esta", "este", "esto", "está", "fue", "ha", "hay", "la", "las",
    "le", "les", "lo", "los", "más", "me", "mi", "muy", "no", "nos", "para", "pero", "por",
    "porque", "que", "qué", "se", "ser", "si", "sin", "sobre", "son", "su", "sus", "también",
    "te", "todo", "tu", "un", "una", "uno", "y", "ya", "yo",
];

pub const GERMAN: &[&str] = &[
    "aber", "als", "also", "am", "an", "auch", "auf", "aus", "bei", "bin", "bis", "das",
    "dass", "dem", "den", "der", "die", "doch", "du", "ein", "eine", "einem", "einen",
    "einer", "er", "es", "für", "hat", "ich", "ihr", "im", "in", "ist", "ja", "kann",
    "mal", "man", "mein", "mit", "nach", "nicht", "noch", "nur", "oder", "schon", "sehr",
    "sich", "sie", "sind", "so", "und", "uns", "von", "war", "was", "wie", "wir", "wird",
    "zu", "zum", "zur",
];

/// Languages with a stop-word list, by ISO 639-1 code.
pub const LANGUAGES: &[(&str, &[&str])] = &[
    ("en", ENGLISH),
    ("tr", TURKISH),
    ("es", SPANISH),
    ("de", GERMAN),
];

/// Union of every list, used for top-term extraction over mixed-language comments.
pub static ALL: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    LANGUAGES
        .iter()
        .flat_map(|(_, words)| words.iter().copied())
        .collect()
});

/// [`ALL`] passed through [`fold`]. Compare folded words against this, never against `ALL`.
pub static FOLDED: LazyLock<HashSet<String>> = LazyLock::new(|| ALL.iter().map(|w| fold(w)).collect());

/// Lowercase, strip diacritics, and map dotless ı to i so `Şarkı` and `sarki` compare equal.
pub fn fold(term: &str) -> String {
    term.to_lowercase()
        .nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .map(|c| if c == 'ı' { 'i' } else { c })
        .collect()
}

pub fn is_stopword(folded: &str) -> bool {
    FOLDED.contains(folded)
}
