// Test mocks for the analysis pipeline.
//
// One mock per trait boundary:
// - MockSource (CommentSource): (video, cursor)→page map with per-video and per-page failure injection
// - FixedTopic / FixedSentiment (TopicScorer / SentimentScorer): constant labels
// - MockSummary (SummaryProvider): canned reply, optional delay
//
// Plus helpers for constructing Video, RawComment, NormalizedComment and
// ClassifiedComment values.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use tubepulse_common::{
    ClassificationError, ClassifiedComment, NormalizedComment, Prediction, RawComment,
    SentimentLabel, SummaryError, TopicLabel, Video,
};

use crate::classify::{SentimentScorer, TopicScorer};
use crate::preprocess::{PreprocessOptions, Preprocessed, Preprocessor};
use crate::summary::{SummaryProvider, SummaryRequest};
use crate::traits::{CommentPage, CommentSource, PageCursor, SourceError, VideoMeta};

// ---------------------------------------------------------------------------
// MockSource
// ---------------------------------------------------------------------------

/// In-memory comment source. Unregistered pages fail permanently.
/// Builder pattern: `.on_page()`, `.on_video()`, `.on_search()`, `.failing()`, `.flaky()`.
#[derive(Default)]
pub struct MockSource {
    pages: HashMap<(String, PageCursor), CommentPage>,
    videos: HashMap<String, VideoMeta>,
    searches: HashMap<String, Vec<VideoMeta>>,
    failures: HashMap<String, SourceError>,
    // "video/cursor" -> (failing calls before the page is served, error)
    cursor_failures: HashMap<String, (usize, SourceError)>,
    panics: HashSet<String>,
    latency: Option<Duration>,
    calls: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_page(mut self, video_id: &str, cursor: PageCursor, page: CommentPage) -> Self {
        self.pages.insert((video_id.to_string(), cursor), page);
        self
    }

    /// Register `total` top-level comments for `video_id`, `per_page` at a time,
    /// chained by tokens `p1`, `p2`, … Also registers the video's metadata.
    pub fn paged(mut self, video_id: &str, total: usize, per_page: usize) -> Self {
        let per_page = per_page.max(1);
        let pages = total.div_ceil(per_page).max(1);
        for n in 0..pages {
            let cursor = PageCursor::Threads {
                token: (n > 0).then(|| format!("p{n}")),
            };
            let comments = (n * per_page..((n + 1) * per_page).min(total))
                .map(|i| {
                    let mut c = raw_comment(
                        video_id,
                        &format!("{video_id}-c{i}"),
                        &format!("comment {i} love this song"),
                    );
                    c.published_at = base_time() + chrono::Duration::minutes(i as i64);
                    c
                })
                .collect();
            let next = (n + 1 < pages).then(|| PageCursor::Threads {
                token: Some(format!("p{}", n + 1)),
            });
            self.pages.insert(
                (video_id.to_string(), cursor),
                CommentPage {
                    comments,
                    next,
                    branches: Vec::new(),
                },
            );
        }
        self.on_video(meta(video_id))
    }

    pub fn on_video(mut self, meta: VideoMeta) -> Self {
        self.videos.insert(meta.id.clone(), meta);
        self
    }

    pub fn on_search(mut self, query: &str, results: Vec<VideoMeta>) -> Self {
        for meta in &results {
            self.videos.insert(meta.id.clone(), meta.clone());
        }
        self.searches.insert(query.to_string(), results);
        self
    }

    /// Every page request for `video_id` fails with `error`.
    pub fn failing(mut self, video_id: &str, error: SourceError) -> Self {
        self.failures.insert(video_id.to_string(), error);
        self
    }

    /// Every request for this one page fails with `error`; other pages are served.
    pub fn failing_at(self, video_id: &str, cursor: PageCursor, error: SourceError) -> Self {
        self.flaky(video_id, cursor, usize::MAX, error)
    }

    /// The first `times` requests for this page fail with `error`, later ones succeed.
    pub fn flaky(mut self, video_id: &str, cursor: PageCursor, times: usize, error: SourceError) -> Self {
        self.cursor_failures
            .insert(format!("{video_id}/{cursor}"), (times, error));
        self
    }

    /// Page calls for `video_id` panic.
    pub fn panicking(mut self, video_id: &str) -> Self {
        self.panics.insert(video_id.to_string());
        self
    }

    /// Each page call sleeps this long before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Page calls made for `video_id` at the cursor displayed as `cursor`.
    pub fn calls(&self, video_id: &str, cursor: &str) -> usize {
        let calls = self.calls.lock().unwrap();
        calls.get(&format!("{video_id}/{cursor}")).copied().unwrap_or(0)
    }

    /// Page calls made for `video_id` at any cursor.
    pub fn total_calls(&self, video_id: &str) -> usize {
        let prefix = format!("{video_id}/");
        let calls = self.calls.lock().unwrap();
        calls
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .map(|(_, n)| n)
            .sum()
    }

    /// Highest number of page calls that were in progress at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CommentSource for MockSource {
    async fn search(
        &self,
        query: &str,
        _language: Option<&str>,
        limit: usize,
    ) -> Result<Vec<VideoMeta>, SourceError> {
        Ok(self
            .searches
            .get(query)
            .map(|r| r.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn videos(&self, ids: &[String]) -> Result<Vec<VideoMeta>, SourceError> {
        Ok(ids.iter().filter_map(|id| self.videos.get(id).cloned()).collect())
    }

    async fn page(&self, video_id: &str, cursor: &PageCursor) -> Result<CommentPage, SourceError> {
        let key = format!("{video_id}/{cursor}");
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.entry(key.clone()).or_default();
            *n += 1;
            *n
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.panics.contains(video_id) {
            panic!("page source exploded for {video_id}");
        }
        if let Some(error) = self.failures.get(video_id) {
            return Err(error.clone());
        }
        if let Some((times, error)) = self.cursor_failures.get(&key) {
            if attempt <= *times {
                return Err(error.clone());
            }
        }
        self.pages
            .get(&(video_id.to_string(), cursor.clone()))
            .cloned()
            .ok_or_else(|| SourceError::Permanent(format!("no page registered for {video_id} {cursor}")))
    }
}

// ---------------------------------------------------------------------------
// Fixed scorers
// ---------------------------------------------------------------------------

/// Returns the same topic for every comment, except those told to fail or panic.
pub struct FixedTopic {
    name: String,
    label: TopicLabel,
    confidence: f64,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    delay: Option<Duration>,
}

impl FixedTopic {
    pub fn new(label: TopicLabel) -> Self {
        Self {
            name: "fixed-topic".to_string(),
            label,
            confidence: 0.9,
            failing: HashSet::new(),
            panicking: HashSet::new(),
            delay: None,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn failing_on(mut self, comment_id: &str) -> Self {
        self.failing.insert(comment_id.to_string());
        self
    }

    pub fn panicking_on(mut self, comment_id: &str) -> Self {
        self.panicking.insert(comment_id.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl TopicScorer for FixedTopic {
    fn name(&self) -> &str {
        &self.name
    }

    async fn score_topic(
        &self,
        _video: &Video,
        comment: &NormalizedComment,
    ) -> Result<Prediction<TopicLabel>, ClassificationError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panicking.contains(comment.comment_id()) {
            panic!("FixedTopic: told to panic on {}", comment.comment_id());
        }
        if self.failing.contains(comment.comment_id()) {
            return Err(ClassificationError::MalformedOutput {
                model: self.name.clone(),
                output: "???".to_string(),
            });
        }
        // Skips validation so out-of-range values reach the engine.
        Ok(Prediction {
            label: self.label,
            confidence: self.confidence,
        })
    }
}

/// Returns the same sentiment for every comment.
pub struct FixedSentiment {
    name: String,
    label: SentimentLabel,
    confidence: f64,
}

impl FixedSentiment {
    pub fn new(label: SentimentLabel) -> Self {
        Self {
            name: "fixed-sentiment".to_string(),
            label,
            confidence: 0.9,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }
}

#[async_trait]
impl SentimentScorer for FixedSentiment {
    fn name(&self) -> &str {
        &self.name
    }

    async fn score_sentiment(
        &self,
        _comment: &NormalizedComment,
    ) -> Result<Prediction<SentimentLabel>, ClassificationError> {
        Ok(Prediction {
            label: self.label,
            confidence: self.confidence,
        })
    }
}

// ---------------------------------------------------------------------------
// MockSummary
// ---------------------------------------------------------------------------

pub struct MockSummary {
    reply: Result<String, SummaryError>,
    delay: Option<Duration>,
}

impl MockSummary {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            delay: None,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            reply: Err(SummaryError::Unavailable("mock model offline".to_string())),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl SummaryProvider for MockSummary {
    async fn summarize(&self, _request: &SummaryRequest) -> Result<String, SummaryError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone()
    }
}

// ---------------------------------------------------------------------------
// Value helpers
// ---------------------------------------------------------------------------

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn meta(id: &str) -> VideoMeta {
    VideoMeta {
        id: id.to_string(),
        title: format!("Test video {id}"),
        description: String::new(),
        channel_title: Some("Test Channel".to_string()),
        published_at: Some(base_time()),
        comment_count: None,
    }
}

pub fn video(id: &str) -> Video {
    titled_video(id, &format!("Test video {id}"), "Test Channel")
}

pub fn titled_video(id: &str, title: &str, channel: &str) -> Video {
    Video {
        id: id.to_string(),
        title: title.to_string(),
        description: String::new(),
        channel_title: Some(channel.to_string()),
        published_at: Some(base_time()),
        comment_count_estimate: None,
        sample_size: 100,
    }
}

pub fn raw_comment(video_id: &str, comment_id: &str, text: &str) -> RawComment {
    RawComment {
        video_id: video_id.to_string(),
        comment_id: comment_id.to_string(),
        parent_id: None,
        author: "viewer".to_string(),
        text: text.to_string(),
        published_at: base_time(),
        like_count: 0,
        reply_count: 0,
    }
}

/// Panics if the text does not survive preprocessing.
pub fn normalized(video_id: &str, comment_id: &str, text: &str) -> NormalizedComment {
    let preprocessor = Preprocessor::new(PreprocessOptions::default());
    match preprocessor.process(&raw_comment(video_id, comment_id, text)) {
        Preprocessed::Kept(comment) => comment,
        Preprocessed::Skipped(skipped) => {
            panic!("normalized: {comment_id} skipped ({:?})", skipped.reason)
        }
    }
}

pub fn classified(
    video_id: &str,
    comment_id: &str,
    text: &str,
    topic: TopicLabel,
    sentiment: SentimentLabel,
    published_at: DateTime<Utc>,
) -> ClassifiedComment {
    let mut comment = normalized(video_id, comment_id, text);
    comment.raw.published_at = published_at;
    ClassifiedComment {
        comment,
        topic_label: topic,
        topic_confidence: 0.9,
        sentiment_label: sentiment,
        sentiment_confidence: 0.9,
        panel: None,
    }
}
