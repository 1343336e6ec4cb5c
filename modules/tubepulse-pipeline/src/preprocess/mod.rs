//! Comment cleaning, language tagging and tokenization.
//!
//! Pure and deterministic: the same `RawComment` and options always yield the
//! same result.

pub mod language;
pub mod stopwords;

use std::sync::LazyLock;

use regex::Regex;
use typed_builder::TypedBuilder;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

use tubepulse_common::{NormalizedComment, RawComment, SkipReason, SkippedComment};

static LINE_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid regex"));
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[a-zA-Z][^>]*>").expect("valid regex"));
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:https?://|www\.)\S+").expect("valid regex"));
static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@[\w.\-]+").expect("valid regex"));
static HASHTAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#\w+").expect("valid regex"));
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

const ENTITIES: &[(&str, &str)] = &[
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&apos;", "'"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&nbsp;", " "),
    ("&amp;", "&"),
];

#[derive(Debug, Clone, TypedBuilder)]
pub struct PreprocessOptions {
    /// Used when language detection is not confident.
    #[builder(default = "en".to_string(), setter(into))]
    pub default_language: String,
    /// Keep emoji as separate sentiment-bearing tokens.
    #[builder(default = true)]
    pub keep_emoji: bool,
    /// Minimum characters after cleaning.
    #[builder(default = 1)]
    pub min_chars: usize,
    /// Longer comments are truncated on a character boundary.
    #[builder(default = 5000)]
    pub max_chars: usize,
    /// When non-empty, only comments containing one of these (case-insensitive) are kept.
    #[builder(default)]
    pub keywords: Vec<String>,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Preprocessed {
    Kept(NormalizedComment),
    Skipped(SkippedComment),
}

#[derive(Debug, Clone)]
pub struct Preprocessor {
    options: PreprocessOptions,
    keywords: Vec<String>,
}

impl Preprocessor {
    pub fn new(options: PreprocessOptions) -> Self {
        let keywords = options
            .keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { options, keywords }
    }

    pub fn process(&self, raw: &RawComment) -> Preprocessed {
        let (text, emoji) = clean(&raw.text);
        let cleaned_text = ai_client::truncate_chars(&text, self.options.max_chars)
            .trim_end()
            .to_string();

        let skip = |reason| {
            Preprocessed::Skipped(SkippedComment {
                comment_id: raw.comment_id.clone(),
                reason,
            })
        };
        if cleaned_text.is_empty() {
            return skip(SkipReason::EmptyAfterCleaning);
        }
        if cleaned_text.chars().count() < self.options.min_chars {
            return skip(SkipReason::TooShort);
        }

        let lowered = cleaned_text.to_lowercase();
        if !self.keywords.is_empty() && !self.keywords.iter().any(|k| lowered.contains(k.as_str())) {
            return skip(SkipReason::KeywordFilter);
        }

        let tokens = tokenize(&lowered);
        let language = language::detect_or(&tokens, &self.options.default_language);

        Preprocessed::Kept(NormalizedComment {
            raw: raw.clone(),
            cleaned_text,
            language,
            tokens,
            emoji: if self.options.keep_emoji { emoji } else { Vec::new() },
        })
    }

    /// Process a batch, splitting kept comments from skipped ones.
    pub fn process_all(&self, raws: &[RawComment]) -> (Vec<NormalizedComment>, Vec<SkippedComment>) {
        let mut kept = Vec::with_capacity(raws.len());
        let mut skipped = Vec::new();
        for raw in raws {
            match self.process(raw) {
                Preprocessed::Kept(c) => kept.push(c),
                Preprocessed::Skipped(s) => skipped.push(s),
            }
        }
        (kept, skipped)
    }
}

/// Strip markup, links, mentions, hashtags and emoji; collapse whitespace.
/// Returns the cleaned text and the emoji graphemes that were removed.
pub fn clean(text: &str) -> (String, Vec<String>) {
    let text = LINE_BREAK_RE.replace_all(text, " ");
    let text = TAG_RE.replace_all(&text, " ");
    let mut text = text.into_owned();
    for (entity, replacement) in ENTITIES {
        text = text.replace(entity, replacement);
    }
    let text: String = text.nfc().collect();
    let text = URL_RE.replace_all(&text, " ");
    let text = MENTION_RE.replace_all(&text, " ");
    let text = HASHTAG_RE.replace_all(&text, " ");

    let mut emoji = Vec::new();
    let mut kept = String::with_capacity(text.len());
    for grapheme in text.graphemes(true) {
        let first = grapheme.chars().next().unwrap_or(' ');
        if is_emoji(first) {
            emoji.push(grapheme.to_string());
            kept.push(' ');
        } else if first.is_control() || is_invisible(first) {
            kept.push(' ');
        } else {
            kept.push_str(grapheme);
        }
    }

    let collapsed = WHITESPACE_RE.replace_all(kept.trim(), " ").into_owned();
    (collapsed, emoji)
}

/// Lowercase word tokens in reading order.
pub fn tokenize(lowered: &str) -> Vec<String> {
    lowered.unicode_words().map(str::to_string).collect()
}

/// Pictographic emoji and the symbols commonly used as emoji in comments.
pub fn is_emoji(c: char) -> bool {
    matches!(
        c as u32,
        0x1F000..=0x1FAFF
            | 0x2600..=0x27BF
            | 0x2300..=0x23FF
            | 0x2B00..=0x2BFF
            | 0x3030
            | 0x303D
            | 0x3297
            | 0x3299
            | 0x203C
            | 0x2049
    )
}

fn is_invisible(c: char) -> bool {
    matches!(c as u32, 0x200B..=0x200F | 0x2060..=0x2064 | 0xFE00..=0xFE0F | 0xFEFF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn raw(text: &str) -> RawComment {
        RawComment {
            video_id: "v1".into(),
            comment_id: "c1".into(),
            parent_id: None,
            author: "someone".into(),
            text: text.into(),
            published_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            like_count: 0,
            reply_count: 0,
        }
    }

    fn kept(p: Preprocessed) -> NormalizedComment {
        match p {
            Preprocessed::Kept(c) => c,
            Preprocessed::Skipped(s) => panic!("unexpectedly skipped: {s:?}"),
        }
    }

    #[test]
    fn strips_markup_links_and_mentions() {
        let (text, _) = clean("Great<br>video &amp; song! <a href=\"x\">link</a> https://t.co/abc @bob #fyp");
        assert_eq!(text, "Great video & song! link");
    }

    #[test]
    fn keeps_heart_emoticon_text() {
        let (text, _) = clean("love it <3");
        assert_eq!(text, "love it <3");
    }

    #[test]
    fn emoji_are_extracted_as_tokens() {
        let pre = Preprocessor::new(PreprocessOptions::default());
        let c = kept(pre.process(&raw("so good 😍😍 👍🏽")));
        assert_eq!(c.cleaned_text, "so good");
        assert_eq!(c.emoji, vec!["😍", "😍", "👍🏽"]);
    }

    #[test]
    fn emoji_dropped_when_not_retained() {
        let pre = Preprocessor::new(PreprocessOptions::builder().keep_emoji(false).build());
        let c = kept(pre.process(&raw("so good 😍")));
        assert!(c.emoji.is_empty());
    }

    #[test]
    fn empty_after_cleaning_is_skipped() {
        let pre = Preprocessor::new(PreprocessOptions::default());
        for text in ["", "   ", "😂😂😂", "https://example.com", "<br><br>"] {
            match pre.process(&raw(text)) {
                Preprocessed::Skipped(s) => assert_eq!(s.reason, SkipReason::EmptyAfterCleaning),
                other => panic!("{text:?} should be skipped, got {other:?}"),
            }
        }
    }

    #[test]
    fn deterministic() {
        let pre = Preprocessor::new(PreprocessOptions::default());
        let r = raw("Bu şarkı   çok güzel olmuş!!");
        assert_eq!(pre.process(&r), pre.process(&r));
        let c = kept(pre.process(&r));
        assert_eq!(c.cleaned_text, "Bu şarkı çok güzel olmuş!!");
        assert_eq!(c.language, "tr");
        assert_eq!(c.tokens, vec!["bu", "şarkı", "çok", "güzel", "olmuş"]);
    }

    #[test]
    fn long_comments_are_truncated() {
        let pre = Preprocessor::new(PreprocessOptions::builder().max_chars(10).build());
        let c = kept(pre.process(&raw("abcdefghij klmnop")));
        assert_eq!(c.cleaned_text, "abcdefghij");
    }

    #[test]
    fn short_comments_are_skipped() {
        let pre = Preprocessor::new(PreprocessOptions::builder().min_chars(5).build());
        assert!(matches!(
            pre.process(&raw("ok")),
            Preprocessed::Skipped(SkippedComment { reason: SkipReason::TooShort, .. })
        ));
    }

    #[test]
    fn keyword_filter_keeps_matching_comments_only() {
        let pre = Preprocessor::new(
            PreprocessOptions::builder()
                .keywords(vec!["Guitar".to_string()])
                .build(),
        );
        assert!(matches!(pre.process(&raw("that guitar solo!")), Preprocessed::Kept(_)));
        assert!(matches!(
            pre.process(&raw("nice vocals")),
            Preprocessed::Skipped(SkippedComment { reason: SkipReason::KeywordFilter, .. })
        ));
    }

    #[test]
    fn process_all_partitions() {
        let pre = Preprocessor::new(PreprocessOptions::default());
        let mut empty = raw("  ");
        empty.comment_id = "c2".into();
        let (kept, skipped) = pre.process_all(&[raw("hello there"), empty]);
        assert_eq!(kept.len(), 1);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].comment_id, "c2");
    }
}
