use std::collections::{BTreeMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

use tubepulse_common::{
    ClassificationError, ClassifiedComment, NormalizedComment, PanelVerdict, Prediction, Video,
};

use super::{PanelMember, SentimentScorer, TopicScorer};

/// A comment that has no result, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentFailure {
    pub comment_id: String,
    pub error: ClassificationError,
}

/// Result of classifying one batch. Every distinct input comment id appears
/// exactly once, either in `classified` or in `failed`. Later copies of an id
/// already taken from the batch are listed in `duplicates` and never scored.
#[derive(Debug, Clone, Default)]
pub struct ClassificationBatch {
    pub classified: Vec<ClassifiedComment>,
    pub failed: Vec<CommentFailure>,
    pub duplicates: Vec<String>,
}

impl ClassificationBatch {
    pub fn unresolved_ids(&self) -> Vec<String> {
        self.failed.iter().map(|f| f.comment_id.clone()).collect()
    }

    /// The classified comments, or `ClassificationError::Unresolved` naming the
    /// comments to re-submit.
    pub fn into_result(self, video_id: &str) -> Result<Vec<ClassifiedComment>, ClassificationError> {
        if self.failed.is_empty() {
            Ok(self.classified)
        } else {
            Err(ClassificationError::Unresolved {
                video_id: video_id.to_string(),
                comment_ids: self.unresolved_ids(),
            })
        }
    }
}

/// Process-wide inference ceiling. Clones share the same permits.
#[derive(Debug, Clone)]
pub struct InferencePool {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl InferencePool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

impl Default for InferencePool {
    fn default() -> Self {
        Self::new(2)
    }
}

/// Applies the canonical topic and sentiment scorers (and the optional panel)
/// to every comment of a batch, concurrently.
#[derive(Clone, TypedBuilder)]
pub struct ClassificationEngine {
    topic: Arc<dyn TopicScorer>,
    sentiment: Arc<dyn SentimentScorer>,
    /// Empty in canonical mode.
    #[builder(default)]
    panel: Vec<PanelMember>,
    /// Shared by every batch run through this engine.
    #[builder(default)]
    pool: InferencePool,
    /// Applied to every individual model call.
    #[builder(default = Duration::from_secs(60))]
    timeout: Duration,
}

impl ClassificationEngine {
    pub fn topic_model(&self) -> &str {
        self.topic.name()
    }

    pub fn sentiment_model(&self) -> &str {
        self.sentiment.name()
    }

    pub fn panel_names(&self) -> Vec<&str> {
        self.panel.iter().map(|m| m.name.as_str()).collect()
    }

    /// Classify `comments` of `video`. Output order is completion order.
    pub async fn classify(&self, video: &Video, comments: Vec<NormalizedComment>) -> ClassificationBatch {
        let video = Arc::new(video.clone());
        let max_in_flight = self.pool.capacity();
        let mut queue: VecDeque<NormalizedComment> = comments.into();
        // Every id taken from the queue; never shrinks.
        let mut seen: HashSet<String> = HashSet::new();
        // Ids whose task has not reported back yet.
        let mut pending: HashSet<String> = HashSet::new();
        let mut tasks: JoinSet<(String, Result<ClassifiedComment, ClassificationError>)> =
            JoinSet::new();
        let mut batch = ClassificationBatch::default();

        loop {
            while tasks.len() < max_in_flight {
                let Some(comment) = queue.pop_front() else {
                    break;
                };
                let comment_id = comment.comment_id().to_string();
                if !seen.insert(comment_id.clone()) {
                    debug!(video_id = %video.id, comment_id = %comment_id, "Duplicate comment id in batch, skipping");
                    batch.duplicates.push(comment_id);
                    continue;
                }
                pending.insert(comment_id.clone());
                let engine = self.clone();
                let video = video.clone();
                tasks.spawn(async move {
                    let result = engine.classify_one(&video, comment).await;
                    (comment_id, result)
                });
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            match joined {
                Ok((comment_id, result)) => {
                    pending.remove(&comment_id);
                    match result {
                        Ok(classified) => batch.classified.push(classified),
                        Err(error) => {
                            warn!(video_id = %video.id, comment_id = %comment_id, error = %error, "Comment classification failed");
                            batch.failed.push(CommentFailure { comment_id, error });
                        }
                    }
                }
                Err(e) => warn!(video_id = %video.id, error = %e, "Classification task died"),
            }
        }

        // Anything still pending belonged to a task that panicked or was aborted.
        let mut orphaned: Vec<String> = pending.into_iter().collect();
        orphaned.sort();
        for comment_id in orphaned {
            batch.failed.push(CommentFailure {
                comment_id,
                error: ClassificationError::TaskAborted {
                    message: "classification task ended without a result".to_string(),
                },
            });
        }

        info!(
            video_id = %video.id,
            classified = batch.classified.len(),
            failed = batch.failed.len(),
            duplicates = batch.duplicates.len(),
            "Classification batch finished"
        );
        batch
    }

    async fn classify_one(
        &self,
        video: &Video,
        comment: NormalizedComment,
    ) -> Result<ClassifiedComment, ClassificationError> {
        let _permit = self
            .pool
            .permits
            .acquire()
            .await
            .map_err(|_| ClassificationError::TaskAborted {
                message: "inference pool closed".to_string(),
            })?;

        let topic = self
            .timed(self.topic.name(), self.topic.score_topic(video, &comment))
            .await?;
        let sentiment = self
            .timed(self.sentiment.name(), self.sentiment.score_sentiment(&comment))
            .await?;

        let panel = if self.panel.is_empty() {
            None
        } else {
            Some(self.run_panel(video, &comment).await)
        };

        debug!(
            comment_id = comment.comment_id(),
            topic = %topic.label,
            sentiment = %sentiment.label,
            "Classified comment"
        );
        Ok(ClassifiedComment {
            comment,
            topic_label: topic.label,
            topic_confidence: topic.confidence,
            sentiment_label: sentiment.label,
            sentiment_confidence: sentiment.confidence,
            panel,
        })
    }

    /// Each member's verdict, recorded independently. A member's failure is
    /// written into its verdict and never fails the comment.
    async fn run_panel(&self, video: &Video, comment: &NormalizedComment) -> BTreeMap<String, PanelVerdict> {
        let mut verdicts = BTreeMap::new();
        for member in &self.panel {
            let mut verdict = PanelVerdict {
                topic: None,
                sentiment: None,
                error: None,
            };
            let mut errors = Vec::new();
            if let Some(scorer) = &member.topic {
                match self.timed(&member.name, scorer.score_topic(video, comment)).await {
                    Ok(p) => verdict.topic = Some(p),
                    Err(e) => errors.push(e.to_string()),
                }
            }
            if let Some(scorer) = &member.sentiment {
                match self.timed(&member.name, scorer.score_sentiment(comment)).await {
                    Ok(p) => verdict.sentiment = Some(p),
                    Err(e) => errors.push(e.to_string()),
                }
            }
            if !errors.is_empty() {
                verdict.error = Some(errors.join("; "));
            }
            verdicts.insert(member.name.clone(), verdict);
        }
        verdicts
    }

    /// Bound a model call by the engine timeout and re-check its confidence.
    async fn timed<L, F>(&self, model: &str, call: F) -> Result<Prediction<L>, ClassificationError>
    where
        F: Future<Output = Result<Prediction<L>, ClassificationError>>,
    {
        let prediction = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| ClassificationError::Timeout {
                model: model.to_string(),
                secs: self.timeout.as_secs(),
            })??;
        Prediction::new(prediction.label, prediction.confidence, model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::LexiconSentiment;
    use crate::testing::{normalized, video, FixedSentiment, FixedTopic};
    use tubepulse_common::{SentimentLabel, TopicLabel};

    fn batch(n: usize) -> Vec<NormalizedComment> {
        (0..n)
            .map(|i| normalized("v1", &format!("c{i}"), "what a great song"))
            .collect()
    }

    fn engine(topic: FixedTopic) -> ClassificationEngine {
        ClassificationEngine::builder()
            .topic(Arc::new(topic))
            .sentiment(Arc::new(FixedSentiment::new(SentimentLabel::Positive)))
            .build()
    }

    #[tokio::test]
    async fn every_comment_is_classified_once() {
        let result = engine(FixedTopic::new(TopicLabel::Creator))
            .classify(&video("v1"), batch(25))
            .await;

        assert_eq!(result.classified.len(), 25);
        assert!(result.failed.is_empty());
        assert!(result
            .classified
            .iter()
            .all(|c| c.topic_label == TopicLabel::Creator && c.panel.is_none()));
        assert_eq!(result.into_result("v1").unwrap().len(), 25);
    }

    #[tokio::test]
    async fn failures_are_named_and_unresolved() {
        let result = engine(FixedTopic::new(TopicLabel::General).failing_on("c2"))
            .classify(&video("v1"), batch(5))
            .await;

        assert_eq!(result.classified.len(), 4);
        assert_eq!(result.unresolved_ids(), vec!["c2".to_string()]);
        let err = result.into_result("v1").unwrap_err();
        assert_eq!(
            err,
            ClassificationError::Unresolved {
                video_id: "v1".into(),
                comment_ids: vec!["c2".into()],
            }
        );
    }

    #[tokio::test]
    async fn duplicate_ids_are_classified_once() {
        let mut comments = batch(2);
        comments.push(comments[0].clone());

        let result = engine(FixedTopic::new(TopicLabel::General))
            .classify(&video("v1"), comments)
            .await;

        let mut ids: Vec<&str> = result.classified.iter().map(|c| c.comment_id()).collect();
        ids.sort();
        assert_eq!(ids, vec!["c0", "c1"]);
        assert!(result.failed.is_empty());
        assert_eq!(result.duplicates, vec!["c0".to_string()]);
        assert_eq!(result.into_result("v1").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_after_first_copy_finished_is_still_skipped() {
        let engine = ClassificationEngine::builder()
            .topic(Arc::new(FixedTopic::new(TopicLabel::General)))
            .sentiment(Arc::new(FixedSentiment::new(SentimentLabel::Neutral)))
            .pool(InferencePool::new(1))
            .build();
        let comments = vec![batch(1).remove(0), batch(1).remove(0)];

        let result = engine.classify(&video("v1"), comments).await;

        assert_eq!(result.classified.len(), 1);
        assert_eq!(result.duplicates, vec!["c0".to_string()]);
    }

    #[tokio::test]
    async fn panicking_scorer_leaves_comment_unresolved() {
        let result = engine(FixedTopic::new(TopicLabel::General).panicking_on("c1"))
            .classify(&video("v1"), batch(3))
            .await;

        assert_eq!(result.classified.len(), 2);
        assert_eq!(result.unresolved_ids(), vec!["c1".to_string()]);
        assert!(matches!(
            result.failed[0].error,
            ClassificationError::TaskAborted { .. }
        ));
    }

    #[tokio::test]
    async fn out_of_range_confidence_is_rejected() {
        let result = engine(FixedTopic::new(TopicLabel::General).with_confidence(1.5))
            .classify(&video("v1"), batch(1))
            .await;

        assert!(result.classified.is_empty());
        assert!(matches!(
            result.failed[0].error,
            ClassificationError::InvalidConfidence { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_scorer_times_out() {
        let engine = ClassificationEngine::builder()
            .topic(Arc::new(
                FixedTopic::new(TopicLabel::General).with_delay(Duration::from_secs(90)),
            ))
            .sentiment(Arc::new(FixedSentiment::new(SentimentLabel::Neutral)))
            .timeout(Duration::from_secs(5))
            .build();

        let result = engine.classify(&video("v1"), batch(1)).await;

        assert_eq!(
            result.failed[0].error,
            ClassificationError::Timeout {
                model: "fixed-topic".into(),
                secs: 5,
            }
        );
    }

    #[tokio::test]
    async fn panel_records_each_member_without_voting() {
        let engine = ClassificationEngine::builder()
            .topic(Arc::new(FixedTopic::new(TopicLabel::Subject)))
            .sentiment(Arc::new(LexiconSentiment::new()))
            .panel(vec![
                PanelMember::topic(Arc::new(FixedTopic::new(TopicLabel::Creator).named("alt"))),
                PanelMember::sentiment(Arc::new(
                    FixedSentiment::new(SentimentLabel::Negative).named("grump"),
                )),
                PanelMember::topic(Arc::new(
                    FixedTopic::new(TopicLabel::General).named("flaky").failing_on("c0"),
                )),
            ])
            .build();

        let result = engine.classify(&video("v1"), batch(1)).await;
        let comment = &result.classified[0];

        assert_eq!(comment.topic_label, TopicLabel::Subject);
        assert_eq!(comment.sentiment_label, SentimentLabel::Positive);
        let panel = comment.panel.as_ref().unwrap();
        assert_eq!(panel.len(), 3);
        assert_eq!(panel["alt"].topic.as_ref().unwrap().label, TopicLabel::Creator);
        assert_eq!(panel["grump"].sentiment.as_ref().unwrap().label, SentimentLabel::Negative);
        assert!(panel["flaky"].topic.is_none());
        assert!(panel["flaky"].error.is_some());
        assert_eq!(engine.panel_names(), vec!["alt", "grump", "flaky"]);
    }

    #[tokio::test]
    async fn shared_permits_are_released() {
        let pool = InferencePool::new(3);
        let engine = ClassificationEngine::builder()
            .topic(Arc::new(FixedTopic::new(TopicLabel::General)))
            .sentiment(Arc::new(FixedSentiment::new(SentimentLabel::Neutral)))
            .pool(pool.clone())
            .build();

        let result = engine.classify(&video("v1"), batch(10)).await;

        assert_eq!(result.classified.len(), 10);
        assert_eq!(pool.available(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn busy_pool_does_not_shrink_batch_fan_out() {
        let pool = InferencePool::new(4);
        let engine = ClassificationEngine::builder()
            .topic(Arc::new(
                FixedTopic::new(TopicLabel::General).with_delay(Duration::from_secs(1)),
            ))
            .sentiment(Arc::new(FixedSentiment::new(SentimentLabel::Neutral)))
            .pool(pool.clone())
            .build();

        let v1 = video("v1");
        let busy = engine.classify(&v1, batch(4));
        let other = async {
            // Starts while the first batch holds every permit.
            tokio::task::yield_now().await;
            let start = tokio::time::Instant::now();
            let result = engine.classify(&video("v2"), (0..4)
                .map(|i| normalized("v2", &format!("d{i}"), "great song"))
                .collect()).await;
            (result, start.elapsed())
        };
        let (first, (second, elapsed)) = tokio::join!(busy, other);

        assert_eq!(first.classified.len(), 4);
        assert_eq!(second.classified.len(), 4);
        // Four tasks queued on the pool together finish in two rounds, not four.
        assert!(elapsed < Duration::from_millis(2500), "took {elapsed:?}");
        assert_eq!(pool.available(), 4);
    }
}
