//! Bounded, cancellable comment retrieval.
//!
//! Each `fetch` spawns one driver task per video. The driver walks a frontier of
//! page cursors (the top-level thread chain plus one chain per reply thread),
//! keeping at most `FetchOptions::concurrency` page tasks in flight for that
//! video. Every page task also holds a permit from the fetcher's shared
//! semaphore while it talks to the source, so the global ceiling holds across
//! all videos fetched through the same `CommentFetcher`.

use std::collections::{HashSet, VecDeque};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use rand::Rng;
use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

use tubepulse_common::{FetchError, FetchWarning, RawComment, Video};

use crate::traits::{CommentPage, CommentSource, PageCursor, SourceError};

/// Upper bound on comments buffered between the driver and a slow consumer.
const MAX_STREAM_BUFFER: usize = 256;

#[derive(Debug, Clone, TypedBuilder)]
pub struct FetchOptions {
    /// Retries per page after the first attempt.
    #[builder(default = 3)]
    pub max_retries: u32,
    /// Page tasks in flight for one video. The fetcher's global ceiling still applies.
    #[builder(default = 3)]
    pub concurrency: usize,
    #[builder(default = Duration::from_millis(500))]
    pub backoff_base: Duration,
    #[builder(default = Duration::from_secs(20))]
    pub page_timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// How a video's fetch ended.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchReport {
    pub collected: usize,
    pub pages: usize,
    pub duplicates: usize,
    /// Pages that gave up after exhausting retries.
    pub warnings: Vec<FetchWarning>,
}

#[derive(Debug, Clone)]
pub struct FetchedComments {
    pub video_id: String,
    pub comments: Vec<RawComment>,
    pub report: FetchReport,
}

// ---------------------------------------------------------------------------
// CommentFetcher
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct CommentFetcher {
    source: Arc<dyn CommentSource>,
    permits: Arc<Semaphore>,
}

impl CommentFetcher {
    /// `global_concurrency` caps in-flight page requests across every video
    /// fetched through this fetcher (and its clones).
    pub fn new(source: Arc<dyn CommentSource>, global_concurrency: usize) -> Self {
        Self {
            source,
            permits: Arc::new(Semaphore::new(global_concurrency.max(1))),
        }
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Start fetching up to `video.sample_size` unique comments. Must be called
    /// inside a tokio runtime. Dropping the returned stream cancels this video's
    /// fetch and nothing else.
    pub fn fetch(&self, video: &Video, options: &FetchOptions) -> CommentStream {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(video.sample_size.clamp(1, MAX_STREAM_BUFFER));

        let driver = FetchDriver {
            source: self.source.clone(),
            permits: self.permits.clone(),
            video_id: video.id.clone(),
            sample_size: video.sample_size,
            options: options.clone(),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(driver.run(tx));

        CommentStream {
            video_id: video.id.clone(),
            rx,
            cancel,
            driver: Some(handle),
        }
    }
}

// ---------------------------------------------------------------------------
// CommentStream
// ---------------------------------------------------------------------------

/// Lazy, finite, non-restartable sequence of one video's comments.
///
/// The stream simply ends on a permanent failure; call [`CommentStream::finish`]
/// or [`CommentStream::collect_all`] to learn how the fetch ended.
pub struct CommentStream {
    video_id: String,
    rx: mpsc::Receiver<RawComment>,
    cancel: CancellationToken,
    driver: Option<JoinHandle<Result<FetchReport, FetchError>>>,
}

impl CommentStream {
    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    /// Consume every remaining comment, then report.
    pub async fn collect_all(mut self) -> Result<FetchedComments, FetchError> {
        let mut comments = Vec::new();
        while let Some(comment) = self.rx.recv().await {
            comments.push(comment);
        }
        let report = self.join_driver().await?;
        Ok(FetchedComments {
            video_id: self.video_id.clone(),
            comments,
            report,
        })
    }

    /// Abandon the rest of the stream and report what happened so far.
    /// Comments still buffered are discarded.
    pub async fn finish(mut self) -> Result<FetchReport, FetchError> {
        self.cancel.cancel();
        self.rx.close();
        while self.rx.recv().await.is_some() {}
        self.join_driver().await
    }

    async fn join_driver(&mut self) -> Result<FetchReport, FetchError> {
        let Some(handle) = self.driver.take() else {
            return Ok(FetchReport::default());
        };
        match handle.await {
            Ok(result) => result,
            Err(e) => {
                warn!(video_id = %self.video_id, error = %e, "Fetch driver task failed");
                Err(FetchError::TaskFailed {
                    video_id: self.video_id.clone(),
                    message: e.to_string(),
                })
            }
        }
    }
}

impl Stream for CommentStream {
    type Item = RawComment;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for CommentStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

struct FetchDriver {
    source: Arc<dyn CommentSource>,
    permits: Arc<Semaphore>,
    video_id: String,
    sample_size: usize,
    options: FetchOptions,
    cancel: CancellationToken,
}

impl FetchDriver {
    async fn run(self, tx: mpsc::Sender<RawComment>) -> Result<FetchReport, FetchError> {
        let mut report = FetchReport::default();
        if self.sample_size == 0 {
            return Ok(report);
        }

        let concurrency = self.options.concurrency.max(1);
        let mut seen: HashSet<String> = HashSet::new();
        let mut frontier = VecDeque::from([PageCursor::start()]);
        let mut in_flight: JoinSet<PageOutcome> = JoinSet::new();

        'pages: loop {
            while in_flight.len() < concurrency && !self.cancel.is_cancelled() {
                let Some(cursor) = frontier.pop_front() else {
                    break;
                };
                in_flight.spawn(fetch_page(self.page_task(cursor)));
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) if e.is_cancelled() => continue,
                Err(e) => {
                    warn!(video_id = %self.video_id, error = %e, "Page task panicked, aborting video");
                    self.cancel.cancel();
                    in_flight.shutdown().await;
                    return Err(FetchError::TaskFailed {
                        video_id: self.video_id.clone(),
                        message: e.to_string(),
                    });
                }
            };

            match outcome {
                PageOutcome::Page(page) => {
                    report.pages += 1;
                    // Keep the top-level chain moving ahead of reply branches.
                    if let Some(next) = page.next {
                        frontier.push_front(next);
                    }
                    frontier.extend(page.branches);

                    for comment in page.comments {
                        if !seen.insert(comment.comment_id.clone()) {
                            report.duplicates += 1;
                            continue;
                        }
                        if tx.send(comment).await.is_err() {
                            debug!(video_id = %self.video_id, "Comment consumer went away, stopping fetch");
                            self.cancel.cancel();
                            break 'pages;
                        }
                        report.collected += 1;
                        if report.collected >= self.sample_size {
                            debug!(video_id = %self.video_id, sample_size = self.sample_size, "Sample size reached");
                            self.cancel.cancel();
                            break 'pages;
                        }
                    }
                }
                PageOutcome::Exhausted(warning) => report.warnings.push(warning),
                PageOutcome::Permanent(reason) => {
                    warn!(video_id = %self.video_id, reason = %reason, "Permanent fetch failure, aborting video");
                    self.cancel.cancel();
                    in_flight.shutdown().await;
                    return Err(FetchError::Permanent {
                        video_id: self.video_id.clone(),
                        reason,
                    });
                }
                PageOutcome::Cancelled => {}
            }
        }

        in_flight.shutdown().await;
        info!(
            video_id = %self.video_id,
            collected = report.collected,
            pages = report.pages,
            duplicates = report.duplicates,
            warnings = report.warnings.len(),
            "Comment fetch finished"
        );
        Ok(report)
    }

    fn page_task(&self, cursor: PageCursor) -> PageTask {
        PageTask {
            source: self.source.clone(),
            permits: self.permits.clone(),
            video_id: self.video_id.clone(),
            cursor,
            options: self.options.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Page tasks
// ---------------------------------------------------------------------------

enum PageOutcome {
    Page(CommentPage),
    Exhausted(FetchWarning),
    Permanent(String),
    Cancelled,
}

struct PageTask {
    source: Arc<dyn CommentSource>,
    permits: Arc<Semaphore>,
    video_id: String,
    cursor: PageCursor,
    options: FetchOptions,
    cancel: CancellationToken,
}

impl PageTask {
    /// One timed call to the source while holding a global permit. Waiting for
    /// the permit does not count against the timeout.
    async fn attempt(&self) -> Result<CommentPage, SourceError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| SourceError::Transient("fetch pool closed".to_string()))?;
        match tokio::time::timeout(
            self.options.page_timeout,
            self.source.page(&self.video_id, &self.cursor),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SourceError::Transient(format!(
                "page timed out after {}ms",
                self.options.page_timeout.as_millis()
            ))),
        }
    }
}

/// Fetch one page, retrying transient failures up to `max_retries` times.
async fn fetch_page(task: PageTask) -> PageOutcome {
    let attempts = task.options.max_retries.saturating_add(1);
    let mut last_error = String::new();

    for attempt in 0..attempts {
        if attempt > 0 {
            let delay = backoff_delay(task.options.backoff_base, attempt - 1);
            warn!(
                video_id = %task.video_id,
                cursor = %task.cursor,
                attempt = attempt + 1,
                backoff_ms = delay.as_millis() as u64,
                error = %last_error,
                "Page fetch failed, retrying after backoff"
            );
            tokio::select! {
                _ = task.cancel.cancelled() => return PageOutcome::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let result = tokio::select! {
            _ = task.cancel.cancelled() => return PageOutcome::Cancelled,
            result = task.attempt() => result,
        };
        match result {
            Ok(page) => return PageOutcome::Page(page),
            Err(SourceError::Permanent(reason)) => return PageOutcome::Permanent(reason),
            Err(SourceError::Transient(message)) => last_error = message,
        }
    }

    warn!(
        video_id = %task.video_id,
        cursor = %task.cursor,
        attempts,
        error = %last_error,
        "Page fetch gave up after exhausting retries"
    );
    PageOutcome::Exhausted(FetchWarning {
        video_id: task.video_id.clone(),
        cursor: task.cursor.to_string(),
        attempts,
        message: last_error,
    })
}

/// `base * 2^retry` plus up to 25% jitter.
fn backoff_delay(base: Duration, retry: u32) -> Duration {
    let backoff = base.saturating_mul(2u32.saturating_pow(retry));
    let max_jitter = (backoff.as_millis() / 4) as u64;
    let jitter = if max_jitter == 0 {
        0
    } else {
        rand::rng().random_range(0..=max_jitter)
    };
    backoff + Duration::from_millis(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_with_bounded_jitter() {
        let base = Duration::from_millis(400);
        for retry in 0..4 {
            let expected = 400u64 * 2u64.pow(retry);
            let delay = backoff_delay(base, retry).as_millis() as u64;
            assert!(delay >= expected, "retry {retry}: {delay} < {expected}");
            assert!(delay <= expected + expected / 4, "retry {retry}: {delay} too large");
        }
    }

    #[test]
    fn zero_base_has_no_jitter() {
        assert_eq!(backoff_delay(Duration::ZERO, 3), Duration::ZERO);
    }

    #[test]
    fn default_options() {
        let options = FetchOptions::default();
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.concurrency, 3);
    }
}
