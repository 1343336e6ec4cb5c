use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;

use tubepulse_common::{ClassificationError, NormalizedComment, Prediction, SentimentLabel};

use super::SentimentScorer;

const POSITIVE_WORDS: &[&str] = &[
    "amazing", "awesome", "beautiful", "best", "brilliant", "cool", "enjoy", "enjoyed",
    "excellent", "fantastic", "favorite", "favourite", "fire", "fun", "funny", "good", "gorgeous",
    "great", "incredible", "legend", "legendary", "love", "loved", "lovely", "masterpiece",
    "nice", "perfect", "thanks", "thank", "underrated", "wonderful", "wow",
    "güzel", "harika", "mükemmel", "süper", "muhteşem", "efsane", "bayıldım", "sevdim",
    "beğendim", "iyi", "tebrikler", "başarılı", "enfes", "şahane", "teşekkürler", "helal",
    "bravo", "genial", "increíble", "hermoso", "toll", "super", "schön", "geil",
];

const NEGATIVE_WORDS: &[&str] = &[
    "annoying", "awful", "bad", "boring", "cringe", "disappointed", "disappointing",
    "disgusting", "dislike", "fake", "garbage", "hate", "hated", "horrible", "lame",
    "mediocre", "overrated", "pathetic", "poor", "sad", "stupid", "terrible", "trash",
    "ugly", "waste", "worse", "worst",
    "kötü", "berbat", "rezalet", "saçma", "iğrenç", "sıkıcı", "nefret", "sevmedim",
    "beğenmedim", "çöp", "rezil", "malo", "basura", "schlecht", "langweilig",
];

/// Flip the polarity of the next two tokens.
const NEGATORS_BEFORE: &[&str] = &[
    "not", "no", "never", "dont", "don't", "isnt", "isn't", "wasnt", "wasn't", "nothing",
    "hardly", "nunca", "nicht", "kein", "keine",
];

/// Flip the polarity of the preceding token (Turkish `güzel değil`).
const NEGATORS_AFTER: &[&str] = &["değil", "degil"];

const POSITIVE_EMOJI: &[char] = &[
    '😍', '😂', '🤣', '❤', '♥', '💖', '💕', '💯', '👍', '👏', '🔥', '😊', '🥰', '😁', '😀',
    '🙌', '✨', '😘', '🤩', '🥳', '💪', '🎉',
];

const NEGATIVE_EMOJI: &[char] = &['👎', '😡', '😠', '🤬', '🤮', '💩', '😢', '😞', '😒', '🙄', '😤', '💔'];

static POSITIVE: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| POSITIVE_WORDS.iter().copied().collect());
static NEGATIVE: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| NEGATIVE_WORDS.iter().copied().collect());

/// Word and emoji lexicon with simple negation handling.
///
/// Confidence is `0.5 + 0.5 * |pos - neg| / (pos + neg)` for polar verdicts and
/// a flat 0.5 for neutral ones (no cues, or balanced cues).
#[derive(Debug, Clone, Default)]
pub struct LexiconSentiment;

impl LexiconSentiment {
    pub fn new() -> Self {
        Self
    }

    /// Positive and negative cue counts after negation.
    pub fn cue_counts(&self, comment: &NormalizedComment) -> (f64, f64) {
        let tokens = &comment.tokens;
        let mut positive = 0.0;
        let mut negative = 0.0;

        for (i, token) in tokens.iter().enumerate() {
            let polarity = if POSITIVE.contains(token.as_str()) {
                1
            } else if NEGATIVE.contains(token.as_str()) {
                -1
            } else {
                continue;
            };

            let negated_before = tokens[i.saturating_sub(2)..i]
                .iter()
                .any(|t| NEGATORS_BEFORE.contains(&t.as_str()));
            let negated_after = tokens
                .get(i + 1)
                .is_some_and(|t| NEGATORS_AFTER.contains(&t.as_str()));
            let polarity = if negated_before ^ negated_after {
                -polarity
            } else {
                polarity
            };

            if polarity > 0 {
                positive += 1.0;
            } else {
                negative += 1.0;
            }
        }

        for emoji in &comment.emoji {
            let Some(first) = emoji.chars().next() else {
                continue;
            };
            if POSITIVE_EMOJI.contains(&first) {
                positive += 1.0;
            } else if NEGATIVE_EMOJI.contains(&first) {
                negative += 1.0;
            }
        }

        (positive, negative)
    }

    pub fn classify(&self, comment: &NormalizedComment) -> Prediction<SentimentLabel> {
        let (positive, negative) = self.cue_counts(comment);
        let total = positive + negative;
        if total == 0.0 || positive == negative {
            return Prediction {
                label: SentimentLabel::Neutral,
                confidence: 0.5,
            };
        }
        let label = if positive > negative {
            SentimentLabel::Positive
        } else {
            SentimentLabel::Negative
        };
        Prediction {
            label,
            confidence: 0.5 + 0.5 * (positive - negative).abs() / total,
        }
    }
}

#[async_trait]
impl SentimentScorer for LexiconSentiment {
    fn name(&self) -> &str {
        "lexicon"
    }

    async fn score_sentiment(
        &self,
        comment: &NormalizedComment,
    ) -> Result<Prediction<SentimentLabel>, ClassificationError> {
        Ok(self.classify(comment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::normalized;

    fn label(text: &str) -> SentimentLabel {
        LexiconSentiment::new().classify(&normalized("v", "c", text)).label
    }

    #[test]
    fn polar_words() {
        assert_eq!(label("this is amazing"), SentimentLabel::Positive);
        assert_eq!(label("worst song ever"), SentimentLabel::Negative);
        assert_eq!(label("uploaded on a tuesday"), SentimentLabel::Neutral);
    }

    #[test]
    fn negation_flips() {
        assert_eq!(label("not good at all"), SentimentLabel::Negative);
        assert_eq!(label("never boring"), SentimentLabel::Positive);
        assert_eq!(label("hiç güzel değil"), SentimentLabel::Negative);
    }

    #[test]
    fn emoji_count_as_cues() {
        assert_eq!(label("ok 😍🔥"), SentimentLabel::Positive);
        assert_eq!(label("hmm 👎"), SentimentLabel::Negative);
    }

    #[test]
    fn confidence_reflects_margin() {
        let c = LexiconSentiment::new().classify(&normalized("v", "c", "great great bad"));
        assert_eq!(c.label, SentimentLabel::Positive);
        assert!((c.confidence - (0.5 + 0.5 / 3.0)).abs() < 1e-9);

        let balanced = LexiconSentiment::new().classify(&normalized("v", "c", "good bad"));
        assert_eq!(balanced.label, SentimentLabel::Neutral);
        assert_eq!(balanced.confidence, 0.5);
    }
}
