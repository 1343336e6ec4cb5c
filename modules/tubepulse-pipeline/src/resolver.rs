use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use tubepulse_common::{ResolutionError, Video};

use crate::traits::{CommentSource, SourceError, VideoMeta};

static VIDEO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("valid regex"));

const YOUTUBE_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtube-nocookie.com",
    "www.youtube-nocookie.com",
];

/// What the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VideoQuery {
    /// A watch/share URL or a bare video id.
    Url { url: String },
    Search {
        phrase: String,
        /// ISO 639-1 hint for the platform's relevance ranking.
        language: Option<String>,
    },
}

impl VideoQuery {
    /// URLs and plausible bare ids become `Url`, everything else a search.
    /// A bare 11-letter word such as `programming` stays a search.
    pub fn infer(input: &str, language: Option<String>) -> Self {
        let input_is_id = if VIDEO_ID.is_match(input.trim()) {
            looks_like_bare_id(input.trim())
        } else {
            parse_video_id(input).is_some()
        };
        if input_is_id {
            VideoQuery::Url {
                url: input.trim().to_string(),
            }
        } else {
            VideoQuery::Search {
                phrase: input.trim().to_string(),
                language,
            }
        }
    }
}

/// Real ids are random base64; a single-case run of letters is far more likely a word.
fn looks_like_bare_id(token: &str) -> bool {
    let has_lower = token.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = token.chars().any(|c| c.is_ascii_uppercase());
    let has_other = token.chars().any(|c| !c.is_ascii_alphabetic());
    has_other || (has_lower && has_upper)
}

/// Extract the 11-character video id from a URL or bare id.
pub fn parse_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if VIDEO_ID.is_match(input) {
        return Some(input.to_string());
    }

    let with_scheme = if input.contains("://") {
        input.to_string()
    } else {
        format!("https://{input}")
    };
    let url = Url::parse(&with_scheme).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();

    let candidate = if host == "youtu.be" {
        url.path_segments()?.next().map(str::to_string)
    } else if YOUTUBE_HOSTS.contains(&host.as_str()) {
        let mut segments = url.path_segments()?;
        match segments.next() {
            Some("watch") => url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned()),
            Some("shorts" | "embed" | "live" | "v") => segments.next().map(str::to_string),
            _ => None,
        }
    } else {
        None
    };

    candidate.filter(|id| VIDEO_ID.is_match(id))
}

/// Turns a URL or search phrase into canonical `Video` records.
pub struct VideoResolver {
    source: Arc<dyn CommentSource>,
}

impl VideoResolver {
    pub fn new(source: Arc<dyn CommentSource>) -> Self {
        Self { source }
    }

    /// At most `max_count` videos, in platform order, each carrying `sample_size`.
    pub async fn resolve(
        &self,
        query: &VideoQuery,
        max_count: usize,
        sample_size: usize,
    ) -> Result<Vec<Video>, ResolutionError> {
        let metas = match query {
            VideoQuery::Url { url } => {
                let id = parse_video_id(url)
                    .ok_or_else(|| ResolutionError::InvalidUrl { url: url.clone() })?;
                let metas = self
                    .source
                    .videos(std::slice::from_ref(&id))
                    .await
                    .map_err(source_error)?;
                if metas.is_empty() {
                    // An unknown bare token may still be a search phrase.
                    if VIDEO_ID.is_match(url.trim()) {
                        info!(input = %url.trim(), "No video with this id, searching instead");
                        let found = self
                            .source
                            .search(url.trim(), None, max_count)
                            .await
                            .map_err(source_error)?;
                        if !found.is_empty() {
                            return Ok(into_videos(found, max_count, sample_size));
                        }
                    }
                    return Err(ResolutionError::VideoNotFound { video_id: id });
                }
                metas
            }
            VideoQuery::Search { phrase, language } => {
                let metas = self
                    .source
                    .search(phrase, language.as_deref(), max_count)
                    .await
                    .map_err(source_error)?;
                if metas.is_empty() {
                    return Err(ResolutionError::NoResults {
                        query: phrase.clone(),
                    });
                }
                metas
            }
        };

        Ok(into_videos(metas, max_count, sample_size))
    }
}

fn into_videos(metas: Vec<VideoMeta>, max_count: usize, sample_size: usize) -> Vec<Video> {
    let videos: Vec<Video> = metas
        .into_iter()
        .take(max_count.max(1))
        .map(|meta| into_video(meta, sample_size))
        .collect();
    info!(count = videos.len(), "Resolved videos");
    videos
}

fn into_video(meta: VideoMeta, sample_size: usize) -> Video {
    Video {
        id: meta.id,
        title: meta.title,
        description: meta.description,
        channel_title: meta.channel_title,
        published_at: meta.published_at,
        comment_count_estimate: meta.comment_count,
        sample_size,
    }
}

fn source_error(err: SourceError) -> ResolutionError {
    ResolutionError::Source {
        message: err.to_string(),
    }
}
