pub mod error;
pub mod types;

pub use error::{Result, YoutubeError};
pub use types::{
    Comment, CommentSnippet, CommentThread, CommentThreadSnippet, ListResponse, SearchResult,
    VideoItem, VideoSnippet, VideoStatistics,
};

use std::time::Duration;

use serde::de::DeserializeOwned;
use types::ErrorEnvelope;

const BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Largest `maxResults` any list endpoint accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

/// `search.list` caps `maxResults` lower than the comment endpoints.
const MAX_SEARCH_PAGE_SIZE: u32 = 50;

pub struct YoutubeClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl YoutubeClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Per-request timeout applied by the underlying HTTP client.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        self
    }

    /// GET `{base}/{endpoint}` with the API key appended; maps non-2xx bodies to
    /// `YoutubeError::Api` carrying the first error reason.
    async fn get<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let resp = self
            .client
            .get(&url)
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let (reason, message) = match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(env) => (
                    env.error.errors.into_iter().find_map(|e| e.reason),
                    env.error.message,
                ),
                Err(_) => (None, body),
            };
            return Err(YoutubeError::Api {
                status: status.as_u16(),
                reason,
                message,
            });
        }

        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Search for videos matching `query`. `language` biases results toward an
    /// ISO 639-1 language (`relevanceLanguage`) and localises metadata (`hl`).
    pub async fn search_videos(
        &self,
        query: &str,
        language: Option<&str>,
        limit: u32,
    ) -> Result<Vec<SearchResult>> {
        tracing::info!(query, limit, "Searching videos");

        let mut query_params = vec![
            ("part", "snippet".to_string()),
            ("type", "video".to_string()),
            ("q", query.to_string()),
            ("maxResults", limit.clamp(1, MAX_SEARCH_PAGE_SIZE).to_string()),
        ];
        if let Some(lang) = language {
            query_params.push(("relevanceLanguage", lang.to_string()));
            query_params.push(("hl", lang.to_string()));
        }

        let page: ListResponse<SearchResult> = self.get("search", &query_params).await?;
        tracing::info!(count = page.items.len(), "Search returned videos");
        Ok(page.items)
    }

    /// Look up snippet and statistics for up to 50 video ids.
    pub async fn get_videos(&self, ids: &[String]) -> Result<Vec<VideoItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query_params = [
            ("part", "snippet,statistics".to_string()),
            ("id", ids.join(",")),
            ("maxResults", ids.len().min(50).to_string()),
        ];
        let page: ListResponse<VideoItem> = self.get("videos", &query_params).await?;
        Ok(page.items)
    }

    /// One page of top-level comment threads for a video, newest first.
    pub async fn comment_threads(
        &self,
        video_id: &str,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Result<ListResponse<CommentThread>> {
        let mut query_params = vec![
            ("part", "snippet".to_string()),
            ("videoId", video_id.to_string()),
            ("order", "time".to_string()),
            ("textFormat", "html".to_string()),
            ("maxResults", max_results.clamp(1, MAX_PAGE_SIZE).to_string()),
        ];
        if let Some(token) = page_token {
            query_params.push(("pageToken", token.to_string()));
        }

        tracing::debug!(video_id, page_token, "Fetching comment thread page");
        self.get("commentThreads", &query_params).await
    }

    /// One page of replies under a top-level comment.
    pub async fn comment_replies(
        &self,
        parent_id: &str,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Result<ListResponse<Comment>> {
        let mut query_params = vec![
            ("part", "snippet".to_string()),
            ("parentId", parent_id.to_string()),
            ("textFormat", "html".to_string()),
            ("maxResults", max_results.clamp(1, MAX_PAGE_SIZE).to_string()),
        ];
        if let Some(token) = page_token {
            query_params.push(("pageToken", token.to_string()));
        }

        tracing::debug!(parent_id, page_token, "Fetching reply page");
        self.get("comments", &query_params).await
    }
}
