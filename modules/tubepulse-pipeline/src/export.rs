//! Flat tabular views of pipeline results for downstream writers.
//!
//! One `CommentRow` per classified comment, one `BucketRow` per trend bucket and
//! one `AggregateRow` per video. Nothing here picks a file format.

use chrono::{DateTime, Utc};
use serde::Serialize;

use tubepulse_common::{ClassifiedComment, SentimentLabel, TopicLabel, VideoAggregate};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentRow {
    pub video_id: String,
    pub comment_id: String,
    pub parent_id: Option<String>,
    pub author: String,
    pub published_at: DateTime<Utc>,
    pub like_count: u64,
    pub reply_count: u64,
    pub language: String,
    pub text: String,
    pub topic: TopicLabel,
    pub topic_confidence: f64,
    pub sentiment: SentimentLabel,
    pub sentiment_confidence: f64,
    /// Panel verdicts as `model:axis:label:confidence`, `;`-separated, in model-name order.
    pub panel: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketRow {
    pub video_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    pub net_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub video_id: String,
    pub total_comments: usize,
    pub subject: usize,
    pub creator: usize,
    pub general: usize,
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    pub positive_ratio: f64,
    pub mean_sentiment_confidence: f64,
    pub total_likes: u64,
    pub total_replies: u64,
    pub engagement_volume: f64,
}

fn panel_cell(comment: &ClassifiedComment) -> String {
    let Some(panel) = &comment.panel else {
        return String::new();
    };
    let mut parts = Vec::new();
    for (model, verdict) in panel {
        if let Some(p) = &verdict.topic {
            parts.push(format!("{model}:topic:{}:{:.3}", p.label, p.confidence));
        }
        if let Some(p) = &verdict.sentiment {
            parts.push(format!("{model}:sentiment:{}:{:.3}", p.label, p.confidence));
        }
        if verdict.error.is_some() {
            parts.push(format!("{model}:error"));
        }
    }
    parts.join(";")
}

pub fn comment_rows(comments: &[ClassifiedComment]) -> Vec<CommentRow> {
    comments
        .iter()
        .map(|c| CommentRow {
            video_id: c.video_id().to_string(),
            comment_id: c.comment_id().to_string(),
            parent_id: c.comment.raw.parent_id.clone(),
            author: c.comment.raw.author.clone(),
            published_at: c.comment.raw.published_at,
            like_count: c.comment.raw.like_count,
            reply_count: c.comment.raw.reply_count,
            language: c.comment.language.clone(),
            text: c.comment.cleaned_text.clone(),
            topic: c.topic_label,
            topic_confidence: c.topic_confidence,
            sentiment: c.sentiment_label,
            sentiment_confidence: c.sentiment_confidence,
            panel: panel_cell(c),
        })
        .collect()
}

pub fn bucket_rows(aggregate: &VideoAggregate) -> Vec<BucketRow> {
    aggregate
        .trend
        .iter()
        .map(|b| BucketRow {
            video_id: aggregate.video_id.clone(),
            start: b.start,
            end: b.end,
            positive: b.counts.positive,
            negative: b.counts.negative,
            neutral: b.counts.neutral,
            net_score: b.net_score,
        })
        .collect()
}

pub fn aggregate_row(aggregate: &VideoAggregate) -> AggregateRow {
    AggregateRow {
        video_id: aggregate.video_id.clone(),
        total_comments: aggregate.total_comments,
        subject: aggregate.topic_counts.subject,
        creator: aggregate.topic_counts.creator,
        general: aggregate.topic_counts.general,
        positive: aggregate.sentiment_counts.positive,
        negative: aggregate.sentiment_counts.negative,
        neutral: aggregate.sentiment_counts.neutral,
        positive_ratio: aggregate.positive_ratio(),
        mean_sentiment_confidence: aggregate.mean_sentiment_confidence,
        total_likes: aggregate.total_likes,
        total_replies: aggregate.total_replies,
        engagement_volume: aggregate.engagement_volume,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, AggregateOptions};
    use crate::testing::classified;
    use chrono::TimeZone;
    use std::collections::BTreeMap;
    use tubepulse_common::{PanelVerdict, Prediction};

    #[test]
    fn one_row_per_comment_and_bucket() {
        let day = |d| Utc.with_ymd_and_hms(2024, 1, d, 8, 0, 0).unwrap();
        let comments = vec![
            classified("v1", "a", "great", TopicLabel::Subject, SentimentLabel::Positive, day(1)),
            classified("v1", "b", "awful", TopicLabel::Creator, SentimentLabel::Negative, day(3)),
        ];
        let agg = aggregate("v1", &comments, &AggregateOptions::default()).unwrap();
        assert_eq!(comment_rows(&comments).len(), 2);
        assert_eq!(bucket_rows(&agg).len(), 3);
        let row = aggregate_row(&agg);
        assert_eq!(row.subject + row.creator + row.general, row.total_comments);
        assert_eq!(row.positive_ratio, 0.5);
    }

    #[test]
    fn panel_verdicts_flatten_in_model_order() {
        let mut c = classified(
            "v1",
            "a",
            "great",
            TopicLabel::Subject,
            SentimentLabel::Positive,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        );
        let mut panel = BTreeMap::new();
        panel.insert(
            "lexicon".to_string(),
            PanelVerdict {
                topic: None,
                sentiment: Some(Prediction { label: SentimentLabel::Positive, confidence: 0.75 }),
                error: None,
            },
        );
        panel.insert(
            "keyword".to_string(),
            PanelVerdict {
                topic: Some(Prediction { label: TopicLabel::General, confidence: 0.5 }),
                sentiment: None,
                error: None,
            },
        );
        c.panel = Some(panel);
        let rows = comment_rows(&[c]);
        assert_eq!(
            rows[0].panel,
            "keyword:topic:general:0.500;lexicon:sentiment:positive:0.750"
        );
    }
}
