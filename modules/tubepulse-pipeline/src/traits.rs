// Capability seams for the pipeline.
//
// CommentSource is the source-platform boundary: resolve a query to videos, then
// page through a video's comments by cursor. YoutubeClient implements it for live
// runs; MockSource (testing.rs) implements it in memory.
//
// The scorer traits (TopicScorer, SentimentScorer) live in classify/ and the
// SummaryProvider in summary.rs, next to their implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tubepulse_common::RawComment;
use youtube_client::{YoutubeClient, YoutubeError, MAX_PAGE_SIZE};

// ---------------------------------------------------------------------------
// Cursors and pages
// ---------------------------------------------------------------------------

/// Position in a video's comment listing. Top-level threads form one chain;
/// each thread with replies opens an independent reply chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageCursor {
    Threads {
        token: Option<String>,
    },
    Replies {
        parent_id: String,
        token: Option<String>,
    },
}

impl PageCursor {
    /// First page of top-level threads.
    pub fn start() -> Self {
        PageCursor::Threads { token: None }
    }

    pub fn replies(parent_id: impl Into<String>) -> Self {
        PageCursor::Replies {
            parent_id: parent_id.into(),
            token: None,
        }
    }
}

impl std::fmt::Display for PageCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageCursor::Threads { token: None } => write!(f, "threads"),
            PageCursor::Threads { token: Some(t) } => write!(f, "threads@{t}"),
            PageCursor::Replies {
                parent_id,
                token: None,
            } => write!(f, "replies/{parent_id}"),
            PageCursor::Replies {
                parent_id,
                token: Some(t),
            } => write!(f, "replies/{parent_id}@{t}"),
        }
    }
}

/// One page of comments. `next` continues this chain; `branches` are new,
/// independent chains discovered on this page (reply threads).
#[derive(Debug, Clone, Default)]
pub struct CommentPage {
    pub comments: Vec<RawComment>,
    pub next: Option<PageCursor>,
    pub branches: Vec<PageCursor>,
}

/// Video metadata as the platform reports it, before a sample size is attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMeta {
    pub id: String,
    pub title: String,
    pub description: String,
    pub channel_title: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub comment_count: Option<u64>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// Worth retrying: timeouts, throttling, server errors.
    #[error("transient: {0}")]
    Transient(String),

    /// Retrying cannot help: comments disabled, video removed, bad key.
    #[error("permanent: {0}")]
    Permanent(String),
}

// ---------------------------------------------------------------------------
// CommentSource
// ---------------------------------------------------------------------------

#[async_trait]
pub trait CommentSource: Send + Sync {
    /// Videos matching a search phrase, most relevant first.
    async fn search(
        &self,
        query: &str,
        language: Option<&str>,
        limit: usize,
    ) -> Result<Vec<VideoMeta>, SourceError>;

    /// Metadata for known ids. Unknown ids are omitted from the result.
    async fn videos(&self, ids: &[String]) -> Result<Vec<VideoMeta>, SourceError>;

    /// One page of comments at `cursor`.
    async fn page(&self, video_id: &str, cursor: &PageCursor) -> Result<CommentPage, SourceError>;
}

impl From<YoutubeError> for SourceError {
    fn from(err: YoutubeError) -> Self {
        if err.is_transient() {
            SourceError::Transient(err.to_string())
        } else {
            match err.reason() {
                Some(reason) => SourceError::Permanent(reason.to_string()),
                None => SourceError::Permanent(err.to_string()),
            }
        }
    }
}

fn video_meta(item: youtube_client::VideoItem) -> VideoMeta {
    VideoMeta {
        id: item.id,
        title: item.snippet.title,
        description: item.snippet.description,
        channel_title: item.snippet.channel_title,
        published_at: item.snippet.published_at,
        comment_count: item.statistics.and_then(|s| s.comment_count),
    }
}

fn raw_comment(
    video_id: &str,
    comment: youtube_client::Comment,
    reply_count: u64,
) -> RawComment {
    let snippet = comment.snippet;
    RawComment {
        video_id: video_id.to_string(),
        comment_id: comment.id,
        parent_id: snippet.parent_id,
        author: snippet.author_display_name,
        text: snippet.text_original.unwrap_or(snippet.text_display),
        published_at: snippet.published_at,
        like_count: snippet.like_count,
        reply_count,
    }
}

#[async_trait]
impl CommentSource for YoutubeClient {
    async fn search(
        &self,
        query: &str,
        language: Option<&str>,
        limit: usize,
    ) -> Result<Vec<VideoMeta>, SourceError> {
        let limit = u32::try_from(limit).unwrap_or(u32::MAX);
        let hits = self.search_videos(query, language, limit).await?;
        let ids: Vec<String> = hits.into_iter().filter_map(|hit| hit.id.video_id).collect();
        // search.list snippets carry no statistics; look the hits up again.
        let mut metas = CommentSource::videos(self, &ids).await?;
        metas.sort_by_key(|m| ids.iter().position(|id| *id == m.id));
        Ok(metas)
    }

    async fn videos(&self, ids: &[String]) -> Result<Vec<VideoMeta>, SourceError> {
        let items = self.get_videos(ids).await?;
        Ok(items.into_iter().map(video_meta).collect())
    }

    async fn page(&self, video_id: &str, cursor: &PageCursor) -> Result<CommentPage, SourceError> {
        match cursor {
            PageCursor::Threads { token } => {
                let page = self
                    .comment_threads(video_id, token.as_deref(), MAX_PAGE_SIZE)
                    .await?;
                let mut branches = Vec::new();
                let mut comments = Vec::with_capacity(page.items.len());
                for thread in page.items {
                    let replies = thread.snippet.total_reply_count;
                    if replies > 0 {
                        branches.push(PageCursor::replies(thread.snippet.top_level_comment.id.clone()));
                    }
                    comments.push(raw_comment(video_id, thread.snippet.top_level_comment, replies));
                }
                Ok(CommentPage {
                    comments,
                    next: page
                        .next_page_token
                        .map(|t| PageCursor::Threads { token: Some(t) }),
                    branches,
                })
            }
            PageCursor::Replies { parent_id, token } => {
                let page = self
                    .comment_replies(parent_id, token.as_deref(), MAX_PAGE_SIZE)
                    .await?;
                Ok(CommentPage {
                    comments: page
                        .items
                        .into_iter()
                        .map(|c| raw_comment(video_id, c, 0))
                        .collect(),
                    next: page.next_page_token.map(|t| PageCursor::Replies {
                        parent_id: parent_id.clone(),
                        token: Some(t),
                    }),
                    branches: Vec::new(),
                })
            }
        }
    }
}
