//! Request-scoped orchestration: resolve → fetch → preprocess → classify →
//! aggregate (→ compare). Each stage hands the next an immutable record; the
//! `Analyzer` itself holds no per-request state.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};
use typed_builder::TypedBuilder;

use ai_client::Ollama;
use tubepulse_common::{
    BattleVerdict, ClassificationError, ClassifiedComment, Config, FetchWarning, PulseError,
    ResolutionError, SkippedComment, Video, VideoAggregate,
};

use crate::aggregate::{aggregate, AggregateOptions};
use crate::battle::BattleComparator;
use crate::classify::{self, ClassificationEngine, LlmTopicClassifier};
use crate::fetcher::{CommentFetcher, FetchOptions, FetchReport};
use crate::insights::{self, AudienceInsights, TOP_INSIGHTS};
use crate::preprocess::{PreprocessOptions, Preprocessor};
use crate::resolver::{VideoQuery, VideoResolver};
use crate::stats::RunStats;
use crate::summary::{summarize_with_timeout, LlmSummarizer, SummaryProvider, SummaryRequest};
use crate::traits::CommentSource;

/// A comment the engine could not classify. Re-submit by id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedComment {
    pub comment_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoAnalysis {
    pub video: Video,
    pub aggregate: VideoAggregate,
    pub comments: Vec<ClassifiedComment>,
    pub skipped: Vec<SkippedComment>,
    pub classification_failures: Vec<FailedComment>,
    pub fetch: FetchReport,
    pub insights: AudienceInsights,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VideoOutcome {
    Analyzed(Box<VideoAnalysis>),
    /// Zero usable comments after retries and cleaning.
    NoData {
        video: Video,
        fetched: usize,
        skipped: usize,
        warnings: Vec<FetchWarning>,
    },
    Failed {
        video: Video,
        error: String,
    },
}

impl VideoOutcome {
    pub fn video(&self) -> &Video {
        match self {
            VideoOutcome::Analyzed(a) => &a.video,
            VideoOutcome::NoData { video, .. } | VideoOutcome::Failed { video, .. } => video,
        }
    }

    pub fn analysis(&self) -> Option<&VideoAnalysis> {
        match self {
            VideoOutcome::Analyzed(a) => Some(a),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub query: VideoQuery,
    pub outcomes: Vec<VideoOutcome>,
    pub stats: RunStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct BattleReport {
    pub a: Box<VideoAnalysis>,
    pub b: Box<VideoAnalysis>,
    pub verdict: BattleVerdict,
}

#[derive(TypedBuilder)]
pub struct Analyzer {
    resolver: VideoResolver,
    fetcher: CommentFetcher,
    preprocessor: Preprocessor,
    engine: ClassificationEngine,
    #[builder(default)]
    fetch_options: FetchOptions,
    #[builder(default)]
    aggregate_options: AggregateOptions,
    #[builder(default)]
    comparator: BattleComparator,
    #[builder(default, setter(strip_option))]
    summarizer: Option<Arc<dyn SummaryProvider>>,
    #[builder(default = Duration::from_secs(120))]
    summary_timeout: Duration,
    #[builder(default = 100)]
    sample_size: usize,
    /// Videos analysed concurrently in a multi-video run.
    #[builder(default = 3)]
    video_parallelism: usize,
}

impl Analyzer {
    /// Wire every stage from configuration. `llm` enables summaries and the `llm`
    /// panel member; pass `None` when the model server is unreachable.
    pub fn from_config(
        source: Arc<dyn CommentSource>,
        config: &Config,
        llm: Option<Ollama>,
        keywords: Vec<String>,
    ) -> Result<Self, PulseError> {
        let classify_timeout = Duration::from_secs(config.classify_timeout_secs);
        let llm_topic = llm
            .clone()
            .map(|agent| LlmTopicClassifier::new(agent, classify_timeout));
        let engine = classify::build_engine(config, llm_topic.as_ref())?;

        let preprocessor = Preprocessor::new(
            PreprocessOptions::builder()
                .default_language(config.default_language.clone())
                .keep_emoji(config.keep_emoji)
                .keywords(keywords)
                .build(),
        );
        let fetch_options = FetchOptions::builder()
            .max_retries(config.max_retries)
            .concurrency(config.video_concurrency)
            .backoff_base(Duration::from_millis(config.backoff_base_ms))
            .page_timeout(Duration::from_secs(config.page_timeout_secs))
            .build();
        let aggregate_options = AggregateOptions::builder()
            .bucket_width_secs(i64::from(config.bucket_hours) * 3600)
            .top_terms(config.top_terms)
            .extra_stopwords(config.stopwords.clone())
            .build();

        let summarizer = llm.map(|agent| {
            Arc::new(LlmSummarizer::new(
                agent.with_timeout(Duration::from_secs(config.summary_timeout_secs)),
            )) as Arc<dyn SummaryProvider>
        });

        Ok(Self {
            resolver: VideoResolver::new(source.clone()),
            fetcher: CommentFetcher::new(source, config.fetch_concurrency),
            preprocessor,
            engine,
            fetch_options,
            aggregate_options,
            comparator: BattleComparator::default(),
            summarizer,
            summary_timeout: Duration::from_secs(config.summary_timeout_secs),
            sample_size: config.sample_size,
            video_parallelism: config.fetch_concurrency.max(1),
        })
    }

    pub fn without_summaries(mut self) -> Self {
        self.summarizer = None;
        self
    }

    pub fn fetcher(&self) -> &CommentFetcher {
        &self.fetcher
    }

    pub fn engine(&self) -> &ClassificationEngine {
        &self.engine
    }

    pub async fn resolve(&self, query: &VideoQuery, max_videos: usize) -> Result<Vec<Video>, PulseError> {
        Ok(self.resolver.resolve(query, max_videos, self.sample_size).await?)
    }

    /// Full pipeline for one resolved video.
    pub async fn analyze_video(&self, video: &Video) -> Result<VideoOutcome, PulseError> {
        let fetched = self
            .fetcher
            .fetch(video, &self.fetch_options)
            .collect_all()
            .await?;
        let fetch = fetched.report;

        let (normalized, skipped) = self.preprocessor.process_all(&fetched.comments);
        if normalized.is_empty() {
            warn!(
                video_id = %video.id,
                fetched = fetch.collected,
                skipped = skipped.len(),
                warnings = fetch.warnings.len(),
                "No usable comments"
            );
            return Ok(VideoOutcome::NoData {
                video: video.clone(),
                fetched: fetch.collected,
                skipped: skipped.len(),
                warnings: fetch.warnings,
            });
        }

        let batch = self.engine.classify(video, normalized).await;
        if batch.classified.is_empty() {
            return Err(ClassificationError::Unresolved {
                video_id: video.id.clone(),
                comment_ids: batch.unresolved_ids(),
            }
            .into());
        }
        let classification_failures = batch
            .failed
            .iter()
            .map(|f| FailedComment {
                comment_id: f.comment_id.clone(),
                error: f.error.to_string(),
            })
            .collect();
        let comments = batch.classified;

        let aggregate = aggregate(&video.id, &comments, &self.aggregate_options)?;
        let insights = insights::extract(&comments, TOP_INSIGHTS);
        let summary = self.summarize(video, &aggregate, &comments, &insights).await;

        info!(
            video_id = %video.id,
            classified = aggregate.total_comments,
            positive_ratio = aggregate.positive_ratio(),
            "Video analysed"
        );
        Ok(VideoOutcome::Analyzed(Box::new(VideoAnalysis {
            video: video.clone(),
            aggregate,
            comments,
            skipped,
            classification_failures,
            fetch,
            insights,
            summary,
        })))
    }

    async fn summarize(
        &self,
        video: &Video,
        aggregate: &VideoAggregate,
        comments: &[ClassifiedComment],
        insights: &AudienceInsights,
    ) -> Option<String> {
        let provider = self.summarizer.as_ref()?;
        let request = SummaryRequest::build(video, aggregate, comments, insights);
        match summarize_with_timeout(provider.as_ref(), &request, self.summary_timeout).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(video_id = %video.id, error = %e, "Summary failed, continuing without one");
                None
            }
        }
    }

    /// Resolve `query` and analyse up to `max_videos` of the results concurrently.
    /// A failing video is recorded in the report and does not stop the others.
    pub async fn analyze(&self, query: &VideoQuery, max_videos: usize) -> Result<RunReport, PulseError> {
        let videos = self.resolve(query, max_videos).await?;

        let mut indexed: Vec<(usize, VideoOutcome)> = stream::iter(videos.into_iter().enumerate())
            .map(|(index, video)| async move {
                let outcome = match self.analyze_video(&video).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(video_id = %video.id, error = %e, "Video analysis failed");
                        VideoOutcome::Failed {
                            video,
                            error: e.to_string(),
                        }
                    }
                };
                (index, outcome)
            })
            .buffer_unordered(self.video_parallelism.max(1))
            .collect()
            .await;
        indexed.sort_by_key(|(index, _)| *index);

        let mut stats = RunStats::default();
        let outcomes: Vec<VideoOutcome> = indexed.into_iter().map(|(_, o)| o).collect();
        for outcome in &outcomes {
            stats.record(outcome);
        }
        info!("{stats}");

        Ok(RunReport {
            query: query.clone(),
            outcomes,
            stats,
        })
    }

    /// Analyse the first video of each query and compare them.
    pub async fn battle(&self, a: &VideoQuery, b: &VideoQuery) -> Result<BattleReport, PulseError> {
        let (video_a, video_b) = tokio::try_join!(self.first_video(a), self.first_video(b))?;
        let (outcome_a, outcome_b) =
            tokio::try_join!(self.analyze_video(&video_a), self.analyze_video(&video_b))?;

        let a = require_analysis(outcome_a)?;
        let b = require_analysis(outcome_b)?;
        let verdict = self.comparator.compare(&a.aggregate, &b.aggregate);
        info!(
            a = %a.video.id,
            b = %b.video.id,
            score_a = verdict.a.score,
            score_b = verdict.b.score,
            winner = verdict.winner().unwrap_or("tie"),
            "Battle decided"
        );
        Ok(BattleReport { a, b, verdict })
    }

    async fn first_video(&self, query: &VideoQuery) -> Result<Video, PulseError> {
        self.resolve(query, 1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ResolutionError::NoResults {
                    query: query_label(query),
                }
                .into()
            })
    }
}

fn query_label(query: &VideoQuery) -> String {
    match query {
        VideoQuery::Url { url } => url.clone(),
        VideoQuery::Search { phrase, .. } => phrase.clone(),
    }
}

fn require_analysis(outcome: VideoOutcome) -> Result<Box<VideoAnalysis>, PulseError> {
    match outcome {
        VideoOutcome::Analyzed(analysis) => Ok(analysis),
        VideoOutcome::NoData { video, .. } => Err(PulseError::NoData { video_id: video.id }),
        VideoOutcome::Failed { video, error } => Err(PulseError::Anyhow(anyhow::anyhow!(
            "analysis of {} failed: {error}",
            video.id
        ))),
    }
}
