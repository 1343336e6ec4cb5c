use thiserror::Error;

/// A label string outside a closed label set. Never coerced to a default.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized {kind} label: {value:?}")]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("search {query:?} returned no videos")]
    NoResults { query: String },

    #[error("not a video URL or id: {url}")]
    InvalidUrl { url: String },

    #[error("video {video_id} does not exist or is private")]
    VideoNotFound { video_id: String },

    #[error("platform query failed: {message}")]
    Source { message: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Timeouts, throttling, 5xx. Retried; surfaces only as a partial-result warning.
    #[error("transient fetch failure for {video_id}: {message}")]
    Transient { video_id: String, message: String },

    /// Comments disabled, video removed. Never retried.
    #[error("permanent fetch failure for {video_id}: {reason}")]
    Permanent { video_id: String, reason: String },

    /// A fetch task panicked. The comments gathered so far cannot be trusted.
    #[error("fetch task failed for {video_id}: {message}")]
    TaskFailed { video_id: String, message: String },
}

impl FetchError {
    pub fn video_id(&self) -> &str {
        match self {
            FetchError::Transient { video_id, .. }
            | FetchError::Permanent { video_id, .. }
            | FetchError::TaskFailed { video_id, .. } => video_id,
        }
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, FetchError::Permanent { .. })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassificationError {
    #[error("model {model} unavailable: {message}")]
    ModelUnavailable { model: String, message: String },

    #[error("model {model} returned unusable output: {output:?}")]
    MalformedOutput { model: String, output: String },

    #[error("model {model} timed out after {secs}s")]
    Timeout { model: String, secs: u64 },

    #[error("model {model} reported confidence {value} outside [0, 1]")]
    InvalidConfidence { model: String, value: f64 },

    #[error(transparent)]
    UnknownLabel(#[from] UnknownLabel),

    #[error("malformed input for comment {comment_id}: {message}")]
    MalformedInput { comment_id: String, message: String },

    #[error("classification task aborted: {message}")]
    TaskAborted { message: String },

    /// Batch-level report: these comments have no result and should be re-submitted.
    #[error("{} comment(s) unresolved for video {video_id}", comment_ids.len())]
    Unresolved {
        video_id: String,
        comment_ids: Vec<String>,
    },
}

/// Label totals disagree with the comment total, or the input set is not one
/// video's unique comments. Indicates an upstream contract breach; never repaired.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("aggregation invariant violated for video {video_id}: {detail}")]
pub struct AggregationInvariantViolation {
    pub video_id: String,
    pub detail: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SummaryError {
    #[error("summary service unavailable: {0}")]
    Unavailable(String),

    #[error("summary timed out after {0}s")]
    Timeout(u64),

    #[error("summary service returned empty text")]
    Empty,
}

#[derive(Error, Debug)]
pub enum PulseError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error(transparent)]
    Aggregation(#[from] AggregationInvariantViolation),

    #[error(transparent)]
    Summary(#[from] SummaryError),

    /// Nothing retrievable for this video after retries and cleaning.
    #[error("no comment data for video {video_id}")]
    NoData { video_id: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
