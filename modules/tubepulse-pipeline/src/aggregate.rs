//! Reduction of one video's classified comments into a `VideoAggregate`.
//!
//! Pure: the output depends only on the input set and options, never on input
//! order, so re-running on the same comments yields an identical aggregate.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use typed_builder::TypedBuilder;

use tubepulse_common::{
    AggregationInvariantViolation, ClassifiedComment, CommentDigest, SentimentCounts, TermCount,
    TopicCounts, TrendBucket, VideoAggregate,
};

use crate::preprocess::stopwords::{self, fold};
use crate::preprocess::is_emoji;

/// Characters kept from each top comment's text.
const DIGEST_CHARS: usize = 300;

#[derive(Debug, Clone, TypedBuilder)]
pub struct AggregateOptions {
    /// Trend bucket width. Buckets align to multiples of this since the Unix epoch.
    #[builder(default = 24 * 3600)]
    pub bucket_width_secs: i64,
    #[builder(default = 20)]
    pub top_terms: usize,
    #[builder(default = 5)]
    pub top_comments: usize,
    /// Excluded from top terms in addition to the built-in stop words.
    #[builder(default)]
    pub extra_stopwords: Vec<String>,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

pub fn aggregate(
    video_id: &str,
    comments: &[ClassifiedComment],
    options: &AggregateOptions,
) -> Result<VideoAggregate, AggregationInvariantViolation> {
    let violation = |detail: String| AggregationInvariantViolation {
        video_id: video_id.to_string(),
        detail,
    };
    if options.bucket_width_secs <= 0 {
        return Err(violation(format!(
            "bucket width must be positive, got {}s",
            options.bucket_width_secs
        )));
    }

    let mut seen = HashSet::with_capacity(comments.len());
    for c in comments {
        if c.video_id() != video_id {
            return Err(violation(format!(
                "comment {} belongs to video {}",
                c.comment_id(),
                c.video_id()
            )));
        }
        if !seen.insert(c.comment_id()) {
            return Err(violation(format!("comment {} appears twice", c.comment_id())));
        }
    }

    let mut topic_counts = TopicCounts::default();
    let mut sentiment_counts = SentimentCounts::default();
    let mut confidence_sum = 0.0;
    for c in comments {
        topic_counts.increment(c.topic_label);
        sentiment_counts.increment(c.sentiment_label);
        confidence_sum += c.sentiment_confidence;
    }

    let total = comments.len();
    if topic_counts.total() != total {
        return Err(violation(format!(
            "topic counts sum to {} for {total} comments",
            topic_counts.total()
        )));
    }
    if sentiment_counts.total() != total {
        return Err(violation(format!(
            "sentiment counts sum to {} for {total} comments",
            sentiment_counts.total()
        )));
    }

    let total_likes: u64 = comments.iter().map(|c| c.comment.raw.like_count).sum();
    let total_replies: u64 = comments.iter().map(|c| c.comment.raw.reply_count).sum();

    Ok(VideoAggregate {
        video_id: video_id.to_string(),
        total_comments: total,
        topic_counts,
        sentiment_counts,
        mean_sentiment_confidence: if total == 0 {
            0.0
        } else {
            confidence_sum / total as f64
        },
        bucket_width_secs: options.bucket_width_secs,
        trend: trend(comments, options.bucket_width_secs),
        top_terms: top_terms(comments, options),
        total_likes,
        total_replies,
        engagement_volume: engagement_volume(comments),
        top_comments: top_comments(comments, options.top_comments),
    })
}

/// Contiguous buckets from the earliest to the latest comment, empty ones included.
fn trend(comments: &[ClassifiedComment], width: i64) -> Vec<TrendBucket> {
    let bucket_of = |ts: DateTime<Utc>| ts.timestamp().div_euclid(width);
    let Some(first) = comments.iter().map(|c| bucket_of(c.comment.raw.published_at)).min() else {
        return Vec::new();
    };
    let last = comments
        .iter()
        .map(|c| bucket_of(c.comment.raw.published_at))
        .max()
        .unwrap_or(first);

    let mut counts = vec![SentimentCounts::default(); (last - first + 1) as usize];
    for c in comments {
        let index = (bucket_of(c.comment.raw.published_at) - first) as usize;
        counts[index].increment(c.sentiment_label);
    }

    counts
        .into_iter()
        .enumerate()
        .filter_map(|(i, counts)| {
            let start = DateTime::from_timestamp((first + i as i64) * width, 0)?;
            let end = DateTime::from_timestamp((first + i as i64 + 1) * width, 0)?;
            Some(TrendBucket {
                start,
                end,
                net_score: counts.net_score(),
                counts,
            })
        })
        .collect()
}

fn is_countable(term: &str, stop: &HashSet<String>) -> bool {
    term.chars().count() >= 2
        && !term.chars().all(|c| c.is_ascii_digit())
        && !term.chars().any(is_emoji)
        && !stopwords::is_stopword(term)
        && !stop.contains(term)
}

/// Most frequent folded tokens; ties broken alphabetically.
fn top_terms(comments: &[ClassifiedComment], options: &AggregateOptions) -> Vec<TermCount> {
    let extra: HashSet<String> = options.extra_stopwords.iter().map(|w| fold(w)).collect();
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for c in comments {
        for token in &c.comment.tokens {
            let term = fold(token);
            if is_countable(&term, &extra) {
                *counts.entry(term).or_default() += 1;
            }
        }
    }

    let mut terms: Vec<TermCount> = counts
        .into_iter()
        .map(|(term, count)| TermCount { term, count })
        .collect();
    terms.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.term.cmp(&b.term)));
    terms.truncate(options.top_terms);
    terms
}

/// Σ (1 + ln(1 + likes) + 0.5 · ln(1 + replies)).
pub fn engagement_volume(comments: &[ClassifiedComment]) -> f64 {
    comments
        .iter()
        .map(|c| {
            let likes = c.comment.raw.like_count as f64;
            let replies = c.comment.raw.reply_count as f64;
            1.0 + likes.ln_1p() + 0.5 * replies.ln_1p()
        })
        .sum()
}

fn top_comments(comments: &[ClassifiedComment], n: usize) -> Vec<CommentDigest> {
    let mut ranked: Vec<&ClassifiedComment> = comments.iter().collect();
    ranked.sort_by(|a, b| {
        b.comment
            .raw
            .like_count
            .cmp(&a.comment.raw.like_count)
            .then_with(|| a.comment_id().cmp(b.comment_id()))
    });
    ranked
        .into_iter()
        .take(n)
        .map(|c| CommentDigest {
            comment_id: c.comment_id().to_string(),
            author: c.comment.raw.author.clone(),
            text: ai_client::truncate_chars(&c.comment.cleaned_text, DIGEST_CHARS).to_string(),
            like_count: c.comment.raw.like_count,
            sentiment_label: c.sentiment_label,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::classified;
    use chrono::TimeZone;
    use tubepulse_common::{SentimentLabel, TopicLabel};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn three_comment_scenario() {
        let comments = vec![
            classified("v1", "c1", "love it", TopicLabel::General, SentimentLabel::Positive, at(1, 9)),
            classified("v1", "c2", "so good", TopicLabel::General, SentimentLabel::Positive, at(1, 10)),
            classified("v1", "c3", "meh bad", TopicLabel::General, SentimentLabel::Negative, at(1, 11)),
        ];
        let agg = aggregate("v1", &comments, &AggregateOptions::default()).unwrap();
        assert_eq!(agg.total_comments, 3);
        assert_eq!(
            agg.sentiment_counts,
            SentimentCounts { positive: 2, negative: 1, neutral: 0 }
        );
        assert_eq!(
            agg.topic_counts,
            TopicCounts { subject: 0, creator: 0, general: 3 }
        );
    }

    #[test]
    fn label_sums_match_total() {
        let labels = [
            (TopicLabel::Subject, SentimentLabel::Neutral),
            (TopicLabel::Creator, SentimentLabel::Positive),
            (TopicLabel::Creator, SentimentLabel::Negative),
            (TopicLabel::General, SentimentLabel::Neutral),
        ];
        let comments: Vec<_> = labels
            .iter()
            .enumerate()
            .map(|(i, (t, s))| classified("v1", &format!("c{i}"), "text here", *t, *s, at(2, i as u32)))
            .collect();
        let agg = aggregate("v1", &comments, &AggregateOptions::default()).unwrap();
        assert_eq!(agg.topic_counts.total(), agg.total_comments);
        assert_eq!(agg.sentiment_counts.total(), agg.total_comments);
    }

    #[test]
    fn idempotent_and_order_independent() {
        let mut comments = vec![
            classified("v1", "a", "great guitar", TopicLabel::Subject, SentimentLabel::Positive, at(1, 1)),
            classified("v1", "b", "guitar tone", TopicLabel::Subject, SentimentLabel::Neutral, at(3, 1)),
            classified("v1", "c", "bad mix", TopicLabel::General, SentimentLabel::Negative, at(2, 1)),
        ];
        let options = AggregateOptions::default();
        let first = aggregate("v1", &comments, &options).unwrap();
        assert_eq!(first, aggregate("v1", &comments, &options).unwrap());
        comments.reverse();
        assert_eq!(first, aggregate("v1", &comments, &options).unwrap());
    }

    #[test]
    fn trend_is_contiguous_with_empty_buckets() {
        let comments = vec![
            classified("v1", "a", "x y", TopicLabel::General, SentimentLabel::Positive, at(1, 23)),
            classified("v1", "b", "x y", TopicLabel::General, SentimentLabel::Negative, at(4, 0)),
        ];
        let agg = aggregate("v1", &comments, &AggregateOptions::default()).unwrap();
        assert_eq!(agg.trend.len(), 4);
        assert_eq!(agg.trend[0].start, Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
        assert_eq!(agg.trend[0].net_score, 1.0);
        assert_eq!(agg.trend[1].counts.total(), 0);
        assert_eq!(agg.trend[1].net_score, 0.0);
        assert_eq!(agg.trend[2].net_score, 0.0);
        assert_eq!(agg.trend[3].net_score, -1.0);
        for pair in agg.trend.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn top_terms_fold_case_and_diacritics() {
        let comments = vec![
            classified("v1", "a", "Şarkı harika", TopicLabel::Subject, SentimentLabel::Positive, at(1, 1)),
            classified("v1", "b", "sarki the best 2024", TopicLabel::Subject, SentimentLabel::Positive, at(1, 2)),
            classified("v1", "c", "SARKI", TopicLabel::Subject, SentimentLabel::Neutral, at(1, 3)),
        ];
        let agg = aggregate("v1", &comments, &AggregateOptions::default()).unwrap();
        assert_eq!(agg.top_terms[0], TermCount { term: "sarki".into(), count: 3 });
        let terms: Vec<&str> = agg.top_terms.iter().map(|t| t.term.as_str()).collect();
        assert_eq!(terms, vec!["sarki", "best", "harika"]);
    }

    #[test]
    fn extra_stop_words_are_dropped_from_top_terms() {
        let comments = vec![
            classified("v1", "a", "Lena sarki harika", TopicLabel::Subject, SentimentLabel::Positive, at(1, 1)),
            classified("v1", "b", "lena sarki", TopicLabel::Creator, SentimentLabel::Positive, at(1, 2)),
        ];
        let options = AggregateOptions::builder()
            .extra_stopwords(vec!["LENA".into(), "Şarkı".into()])
            .build();
        let agg = aggregate("v1", &comments, &options).unwrap();
        let terms: Vec<&str> = agg.top_terms.iter().map(|t| t.term.as_str()).collect();
        assert_eq!(terms, vec!["harika"]);
    }

    #[test]
    fn rejects_mixed_videos() {
        let comments = vec![
            classified("v1", "a", "x", TopicLabel::General, SentimentLabel::Neutral, at(1, 1)),
            classified("v2", "b", "x", TopicLabel::General, SentimentLabel::Neutral, at(1, 1)),
        ];
        let err = aggregate("v1", &comments, &AggregateOptions::default()).unwrap_err();
        assert_eq!(err.video_id, "v1");
    }

    #[test]
    fn rejects_duplicate_comments() {
        let c = classified("v1", "a", "x", TopicLabel::General, SentimentLabel::Neutral, at(1, 1));
        assert!(aggregate("v1", &[c.clone(), c], &AggregateOptions::default()).is_err());
    }

    #[test]
    fn empty_input_gives_empty_aggregate() {
        let agg = aggregate("v1", &[], &AggregateOptions::default()).unwrap();
        assert_eq!(agg.total_comments, 0);
        assert!(agg.trend.is_empty());
        assert_eq!(agg.mean_sentiment_confidence, 0.0);
        assert_eq!(agg.engagement_volume, 0.0);
    }
}
