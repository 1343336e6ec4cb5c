use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

// --- Shared envelope ---

/// Paged list envelope used by every `*.list` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

/// Error body returned alongside non-2xx statuses.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorDetail {
    pub reason: Option<String>,
}

// --- search.list ---

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult {
    pub id: SearchResultId,
    pub snippet: VideoSnippet,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResultId {
    #[serde(rename = "videoId")]
    pub video_id: Option<String>,
}

// --- videos.list ---

#[derive(Debug, Clone, Deserialize)]
pub struct VideoItem {
    pub id: String,
    pub snippet: VideoSnippet,
    pub statistics: Option<VideoStatistics>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoSnippet {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "publishedAt")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(rename = "channelTitle")]
    pub channel_title: Option<String>,
    #[serde(rename = "defaultAudioLanguage")]
    pub default_audio_language: Option<String>,
}

/// Counters arrive as decimal strings and may be absent when hidden by the owner.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoStatistics {
    #[serde(rename = "viewCount", default, deserialize_with = "string_count")]
    pub view_count: Option<u64>,
    #[serde(rename = "likeCount", default, deserialize_with = "string_count")]
    pub like_count: Option<u64>,
    #[serde(rename = "commentCount", default, deserialize_with = "string_count")]
    pub comment_count: Option<u64>,
}

// --- commentThreads.list / comments.list ---

#[derive(Debug, Clone, Deserialize)]
pub struct CommentThread {
    pub id: String,
    pub snippet: CommentThreadSnippet,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentThreadSnippet {
    #[serde(rename = "topLevelComment")]
    pub top_level_comment: Comment,
    #[serde(rename = "totalReplyCount", default)]
    pub total_reply_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub id: String,
    pub snippet: CommentSnippet,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentSnippet {
    #[serde(rename = "authorDisplayName", default)]
    pub author_display_name: String,
    /// Rendered text. May contain `<br>`, `<a>` and HTML entities.
    #[serde(rename = "textDisplay", default)]
    pub text_display: String,
    #[serde(rename = "textOriginal")]
    pub text_original: Option<String>,
    #[serde(rename = "likeCount", default)]
    pub like_count: u64,
    #[serde(rename = "publishedAt")]
    pub published_at: DateTime<Utc>,
    #[serde(rename = "parentId")]
    pub parent_id: Option<String>,
}

fn string_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_thread_page_deserializes() {
        let body = r#"{
            "nextPageToken": "QURTSl9p",
            "items": [{
                "id": "Ugx1",
                "snippet": {
                    "totalReplyCount": 2,
                    "topLevelComment": {
                        "id": "Ugx1",
                        "snippet": {
                            "authorDisplayName": "@someone",
                            "textDisplay": "great video<br>thanks",
                            "textOriginal": "great video\nthanks",
                            "likeCount": 12,
                            "publishedAt": "2024-03-01T10:00:00Z"
                        }
                    }
                }
            }]
        }"#;
        let page: ListResponse<CommentThread> = serde_json::from_str(body).unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("QURTSl9p"));
        assert_eq!(page.items.len(), 1);
        let top = &page.items[0].snippet.top_level_comment;
        assert_eq!(top.snippet.like_count, 12);
        assert_eq!(page.items[0].snippet.total_reply_count, 2);
    }

    #[test]
    fn statistics_parse_string_counters() {
        let body = r#"{"viewCount": "1200", "commentCount": "57"}"#;
        let stats: VideoStatistics = serde_json::from_str(body).unwrap();
        assert_eq!(stats.view_count, Some(1200));
        assert_eq!(stats.comment_count, Some(57));
        assert_eq!(stats.like_count, None);
    }

    #[test]
    fn empty_list_has_no_items() {
        let page: ListResponse<SearchResult> = serde_json::from_str("{}").unwrap();
        assert!(page.items.is_empty());
        assert!(page.next_page_token.is_none());
    }
}
