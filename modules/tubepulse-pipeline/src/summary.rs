//! Executive summaries from a local language model.
//!
//! The pipeline hands the provider a small corpus (top comments plus the
//! aggregate's distributions) and gets back plain text. Nothing parses that
//! text; it only has to be non-empty and arrive before the timeout.

use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ai_client::{truncate_chars, AiError, Ollama, PromptBuilder};

use crate::insights::{AudienceInsights, InsightKind};
use tubepulse_common::{ClassifiedComment, SentimentLabel, SummaryError, TopicLabel, Video, VideoAggregate};

/// Comments included in the corpus.
pub const CORPUS_COMMENTS: usize = 100;
/// Characters kept per corpus comment.
pub const CORPUS_COMMENT_CHARS: usize = 300;
/// Audience questions and requests quoted in the prompt.
pub const CORPUS_INSIGHTS: usize = 5;

const PREAMBLE: &str = "You are an analyst summarizing YouTube audience reaction. \
Write a short executive summary (at most 5 sentences) covering overall sentiment, \
what viewers praise, what they criticize, what they ask for, and any recurring themes. \
Plain text only.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRequest {
    pub video_id: String,
    pub title: String,
    pub total_comments: usize,
    /// Percentages, 0-100, in `SentimentLabel::ALL` order.
    pub sentiment_percent: Vec<(SentimentLabel, f64)>,
    pub topic_percent: Vec<(TopicLabel, f64)>,
    /// Most-liked comments first, each truncated.
    pub comments: Vec<String>,
    /// Comments per audience-insight category, in `InsightKind::ALL` order.
    pub audience: Vec<(InsightKind, usize)>,
    pub questions: Vec<String>,
    pub requests: Vec<String>,
}

impl SummaryRequest {
    pub fn build(
        video: &Video,
        aggregate: &VideoAggregate,
        classified: &[ClassifiedComment],
        insights: &AudienceInsights,
    ) -> Self {
        let quoted = |kind: InsightKind| -> Vec<String> {
            insights
                .category(kind)
                .top
                .iter()
                .take(CORPUS_INSIGHTS)
                .map(|i| i.text.clone())
                .collect()
        };

        let mut ranked: Vec<&ClassifiedComment> = classified.iter().collect();
        ranked.sort_by(|a, b| {
            b.comment
                .raw
                .like_count
                .cmp(&a.comment.raw.like_count)
                .then_with(|| a.comment_id().cmp(b.comment_id()))
        });

        Self {
            video_id: video.id.clone(),
            title: video.title.clone(),
            total_comments: aggregate.total_comments,
            sentiment_percent: SentimentLabel::ALL
                .iter()
                .map(|l| (*l, aggregate.sentiment_share(*l) * 100.0))
                .collect(),
            topic_percent: TopicLabel::ALL
                .iter()
                .map(|l| (*l, aggregate.topic_share(*l) * 100.0))
                .collect(),
            comments: ranked
                .into_iter()
                .take(CORPUS_COMMENTS)
                .map(|c| truncate_chars(&c.comment.cleaned_text, CORPUS_COMMENT_CHARS).to_string())
                .collect(),
            audience: InsightKind::ALL
                .iter()
                .map(|k| (*k, insights.category(*k).count))
                .collect(),
            questions: quoted(InsightKind::Question),
            requests: quoted(InsightKind::Request),
        }
    }

    pub fn to_prompt(&self) -> String {
        let mut prompt = String::new();
        let _ = writeln!(prompt, "Video: {}", self.title);
        let _ = writeln!(prompt, "Comments analysed: {}", self.total_comments);
        let sentiment: Vec<String> = self
            .sentiment_percent
            .iter()
            .map(|(l, p)| format!("{l} {p:.1}%"))
            .collect();
        let _ = writeln!(prompt, "Sentiment: {}", sentiment.join(", "));
        let topics: Vec<String> = self
            .topic_percent
            .iter()
            .map(|(l, p)| format!("{l} {p:.1}%"))
            .collect();
        let _ = writeln!(prompt, "Topics: {}", topics.join(", "));
        let audience: Vec<String> = self.audience.iter().map(|(k, n)| format!("{n} {k}")).collect();
        let _ = writeln!(prompt, "Audience: {}", audience.join(", "));
        for (heading, quotes) in [("Viewer questions", &self.questions), ("Viewer requests", &self.requests)] {
            if quotes.is_empty() {
                continue;
            }
            let _ = writeln!(prompt, "\n{heading}:");
            for quote in quotes {
                let _ = writeln!(prompt, "- {quote}");
            }
        }
        let _ = writeln!(prompt, "\nTop comments:");
        for comment in &self.comments {
            let _ = writeln!(prompt, "- {comment}");
        }
        prompt
    }
}

#[async_trait]
pub trait SummaryProvider: Send + Sync {
    async fn summarize(&self, request: &SummaryRequest) -> Result<String, SummaryError>;
}

/// Run `provider` under `timeout` and reject blank output.
pub async fn summarize_with_timeout(
    provider: &dyn SummaryProvider,
    request: &SummaryRequest,
    timeout: Duration,
) -> Result<String, SummaryError> {
    let text = tokio::time::timeout(timeout, provider.summarize(request))
        .await
        .map_err(|_| SummaryError::Timeout(timeout.as_secs()))??;
    let text = text.trim();
    if text.is_empty() {
        warn!(video_id = %request.video_id, "Summary provider returned empty text");
        return Err(SummaryError::Empty);
    }
    info!(video_id = %request.video_id, chars = text.chars().count(), "Summary generated");
    Ok(text.to_string())
}

pub struct LlmSummarizer {
    agent: Ollama,
}

impl LlmSummarizer {
    pub fn new(agent: Ollama) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl SummaryProvider for LlmSummarizer {
    async fn summarize(&self, request: &SummaryRequest) -> Result<String, SummaryError> {
        self.agent
            .prompt(request.to_prompt())
            .preamble(PREAMBLE)
            .temperature(0.1)
            .max_tokens(1000)
            .send()
            .await
            .map_err(|e| match e {
                AiError::EmptyResponse => SummaryError::Empty,
                other => SummaryError::Unavailable(other.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, AggregateOptions};
    use crate::testing::{classified, video, MockSummary};
    use chrono::Utc;

    fn corpus() -> (Video, Vec<ClassifiedComment>) {
        let long = "x".repeat(1000);
        let mut comments: Vec<ClassifiedComment> = (0..150)
            .map(|i| {
                let text = if i == 0 { long.clone() } else { format!("comment number {i}") };
                let mut c = classified(
                    "v1",
                    &format!("c{i:03}"),
                    &text,
                    TopicLabel::General,
                    SentimentLabel::Positive,
                    Utc::now(),
                );
                c.comment.raw.like_count = i as u64;
                c
            })
            .collect();
        comments[0].comment.raw.like_count = 10_000;
        (video("v1"), comments)
    }

    #[test]
    fn corpus_takes_top_liked_and_truncates() {
        let (v, comments) = corpus();
        let agg = aggregate("v1", &comments, &AggregateOptions::default()).unwrap();
        let request = SummaryRequest::build(&v, &agg, &comments, &AudienceInsights::default());
        assert_eq!(request.comments.len(), CORPUS_COMMENTS);
        assert_eq!(request.comments[0].chars().count(), CORPUS_COMMENT_CHARS);
        assert_eq!(request.comments[1], "comment number 149");
        assert_eq!(request.sentiment_percent[0], (SentimentLabel::Positive, 100.0));
        assert!(request.to_prompt().contains("positive 100.0%"));
    }

    #[test]
    fn prompt_quotes_audience_questions_and_requests() {
        let (v, mut comments) = corpus();
        comments.truncate(3);
        for (c, text) in comments.iter_mut().zip([
            "when is the next album coming?",
            "please make a live version",
            "listening on repeat",
        ]) {
            c.comment.cleaned_text = text.to_string();
        }
        let agg = aggregate("v1", &comments, &AggregateOptions::default()).unwrap();
        let insights = crate::insights::extract(&comments, crate::insights::TOP_INSIGHTS);

        let request = SummaryRequest::build(&v, &agg, &comments, &insights);

        assert_eq!(request.audience[0], (InsightKind::Question, 1));
        assert_eq!(request.audience[1], (InsightKind::Request, 1));
        assert_eq!(request.questions, vec!["when is the next album coming?"]);
        let prompt = request.to_prompt();
        assert!(prompt.contains("Audience: 1 questions, 1 requests, 0 suggestions, 0 complaints, 0 praise"));
        assert!(prompt.contains("Viewer requests:\n- please make a live version"));
    }

    #[tokio::test]
    async fn blank_summary_is_an_error() {
        let (v, comments) = corpus();
        let agg = aggregate("v1", &comments, &AggregateOptions::default()).unwrap();
        let request = SummaryRequest::build(&v, &agg, &comments, &AudienceInsights::default());
        let err = summarize_with_timeout(&MockSummary::replying("  \n"), &request, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err, SummaryError::Empty);

        let ok = summarize_with_timeout(&MockSummary::replying(" Viewers love it. "), &request, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(ok, "Viewers love it.");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_summary_times_out() {
        let (v, comments) = corpus();
        let agg = aggregate("v1", &comments, &AggregateOptions::default()).unwrap();
        let request = SummaryRequest::build(&v, &agg, &comments, &AudienceInsights::default());
        let slow = MockSummary::replying("late").with_delay(Duration::from_secs(30));
        let err = summarize_with_timeout(&slow, &request, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err, SummaryError::Timeout(5));
    }
}
