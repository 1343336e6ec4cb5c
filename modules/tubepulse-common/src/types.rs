use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ClassificationError, UnknownLabel};

// --- Labels ---

/// What a comment is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicLabel {
    /// The video's subject matter (the song, the product, the match...).
    Subject,
    /// The person or channel that made the video.
    Creator,
    General,
}

impl TopicLabel {
    pub const ALL: [TopicLabel; 3] = [TopicLabel::Subject, TopicLabel::Creator, TopicLabel::General];

    pub fn as_str(&self) -> &'static str {
        match self {
            TopicLabel::Subject => "subject",
            TopicLabel::Creator => "creator",
            TopicLabel::General => "general",
        }
    }
}

impl std::fmt::Display for TopicLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TopicLabel {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "subject" => Ok(TopicLabel::Subject),
            "creator" => Ok(TopicLabel::Creator),
            "general" => Ok(TopicLabel::General),
            _ => Err(UnknownLabel {
                kind: "topic",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub const ALL: [SentimentLabel; 3] = [
        SentimentLabel::Positive,
        SentimentLabel::Negative,
        SentimentLabel::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SentimentLabel {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(SentimentLabel::Positive),
            "negative" => Ok(SentimentLabel::Negative),
            "neutral" => Ok(SentimentLabel::Neutral),
            _ => Err(UnknownLabel {
                kind: "sentiment",
                value: s.to_string(),
            }),
        }
    }
}

/// A label with the scoring model's confidence in it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction<L> {
    pub label: L,
    pub confidence: f64,
}

impl<L> Prediction<L> {
    /// Rejects confidences outside `[0, 1]` (including NaN).
    pub fn new(label: L, confidence: f64, model: &str) -> Result<Self, ClassificationError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ClassificationError::InvalidConfidence {
                model: model.to_string(),
                value: confidence,
            });
        }
        Ok(Self { label, confidence })
    }
}

// --- Videos and comments ---

/// A resolved video. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub title: String,
    pub description: String,
    pub channel_title: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// Platform-reported comment count; an estimate, often stale.
    pub comment_count_estimate: Option<u64>,
    /// Maximum number of comments to retrieve for this video.
    pub sample_size: usize,
}

impl Video {
    pub fn url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.id)
    }
}

/// A comment exactly as the platform returned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawComment {
    pub video_id: String,
    pub comment_id: String,
    /// Set for replies; the top-level comment this answers.
    pub parent_id: Option<String>,
    pub author: String,
    pub text: String,
    pub published_at: DateTime<Utc>,
    pub like_count: u64,
    pub reply_count: u64,
}

/// Cleaned, language-tagged, tokenized form of one `RawComment`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedComment {
    pub raw: RawComment,
    pub cleaned_text: String,
    /// ISO 639-1 code.
    pub language: String,
    pub tokens: Vec<String>,
    /// Emoji kept aside as sentiment-bearing tokens. Empty when emoji retention is off.
    pub emoji: Vec<String>,
}

impl NormalizedComment {
    pub fn comment_id(&self) -> &str {
        &self.raw.comment_id
    }

    pub fn video_id(&self) -> &str {
        &self.raw.video_id
    }
}

/// One panel member's independent verdict on a comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelVerdict {
    pub topic: Option<Prediction<TopicLabel>>,
    pub sentiment: Option<Prediction<SentimentLabel>>,
    /// Set when the member failed on this comment. Panel failures never fail the comment.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedComment {
    pub comment: NormalizedComment,
    pub topic_label: TopicLabel,
    pub topic_confidence: f64,
    pub sentiment_label: SentimentLabel,
    pub sentiment_confidence: f64,
    /// Model name → verdict. Present only in panel mode.
    pub panel: Option<BTreeMap<String, PanelVerdict>>,
}

impl ClassifiedComment {
    pub fn comment_id(&self) -> &str {
        self.comment.comment_id()
    }

    pub fn video_id(&self) -> &str {
        self.comment.video_id()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    EmptyAfterCleaning,
    TooShort,
    KeywordFilter,
}

/// A comment the preprocessor dropped. Counted, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedComment {
    pub comment_id: String,
    pub reason: SkipReason,
}

/// Non-fatal annotation on a fetch: one page gave up after exhausting retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchWarning {
    pub video_id: String,
    pub cursor: String,
    pub attempts: u32,
    pub message: String,
}

// --- Aggregates ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicCounts {
    pub subject: usize,
    pub creator: usize,
    pub general: usize,
}

impl TopicCounts {
    pub fn get(&self, label: TopicLabel) -> usize {
        match label {
            TopicLabel::Subject => self.subject,
            TopicLabel::Creator => self.creator,
            TopicLabel::General => self.general,
        }
    }

    pub fn increment(&mut self, label: TopicLabel) {
        match label {
            TopicLabel::Subject => self.subject += 1,
            TopicLabel::Creator => self.creator += 1,
            TopicLabel::General => self.general += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.subject + self.creator + self.general
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentCounts {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
}

impl SentimentCounts {
    pub fn get(&self, label: SentimentLabel) -> usize {
        match label {
            SentimentLabel::Positive => self.positive,
            SentimentLabel::Negative => self.negative,
            SentimentLabel::Neutral => self.neutral,
        }
    }

    pub fn increment(&mut self, label: SentimentLabel) {
        match label {
            SentimentLabel::Positive => self.positive += 1,
            SentimentLabel::Negative => self.negative += 1,
            SentimentLabel::Neutral => self.neutral += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.positive + self.negative + self.neutral
    }

    /// (positive − negative) / total, 0 when empty.
    pub fn net_score(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.positive as f64 - self.negative as f64) / total as f64
    }
}

/// One fixed-width slice of the sentiment trend. `[start, end)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendBucket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub counts: SentimentCounts,
    pub net_score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermCount {
    pub term: String,
    pub count: usize,
}

/// Short digest of a high-engagement comment, carried for summaries and display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentDigest {
    pub comment_id: String,
    pub author: String,
    pub text: String,
    pub like_count: u64,
    pub sentiment_label: SentimentLabel,
}

/// Summary statistics over one video's classified comments. Recomputed
/// wholesale from the full input set, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoAggregate {
    pub video_id: String,
    pub total_comments: usize,
    pub topic_counts: TopicCounts,
    pub sentiment_counts: SentimentCounts,
    pub mean_sentiment_confidence: f64,
    pub bucket_width_secs: i64,
    pub trend: Vec<TrendBucket>,
    pub top_terms: Vec<TermCount>,
    pub total_likes: u64,
    pub total_replies: u64,
    /// Σ (1 + ln(1 + likes) + 0.5·ln(1 + replies)) over all comments.
    pub engagement_volume: f64,
    pub top_comments: Vec<CommentDigest>,
}

impl VideoAggregate {
    pub fn positive_ratio(&self) -> f64 {
        self.sentiment_share(SentimentLabel::Positive)
    }

    pub fn sentiment_share(&self, label: SentimentLabel) -> f64 {
        share(self.sentiment_counts.get(label), self.total_comments)
    }

    pub fn topic_share(&self, label: TopicLabel) -> f64 {
        share(self.topic_counts.get(label), self.total_comments)
    }
}

fn share(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

// --- Battle ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleSide {
    pub video_id: String,
    pub score: f64,
    pub positive_ratio: f64,
    pub volume_norm: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BattleOutcome {
    Winner { video_id: String },
    Tie,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Leader {
    A,
    B,
    Tie,
}

impl Leader {
    pub fn mirrored(self) -> Self {
        match self {
            Leader::A => Leader::B,
            Leader::B => Leader::A,
            Leader::Tie => Leader::Tie,
        }
    }
}

/// Side-by-side share of one label for both videos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryComparison {
    /// e.g. `topic:creator`, `sentiment:negative`.
    pub metric: String,
    pub share_a: f64,
    pub share_b: f64,
    pub leader: Leader,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleVerdict {
    pub a: BattleSide,
    pub b: BattleSide,
    pub outcome: BattleOutcome,
    pub categories: Vec<CategoryComparison>,
}

impl BattleVerdict {
    pub fn is_tie(&self) -> bool {
        matches!(self.outcome, BattleOutcome::Tie)
    }

    pub fn winner(&self) -> Option<&str> {
        match &self.outcome {
            BattleOutcome::Winner { video_id } => Some(video_id),
            BattleOutcome::Tie => None,
        }
    }
}
