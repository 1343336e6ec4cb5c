use std::time::Duration;

use tracing::debug;

use super::types::*;
use crate::error::AiError;

pub(crate) struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Self {
        let http = match timeout {
            Some(t) => reqwest::Client::builder()
                .timeout(t)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            None => reqwest::Client::new(),
        };
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn generate(&self, request: &GenerateRequest) -> Result<String, AiError> {
        let url = format!("{}/api/generate", self.base_url);

        debug!(model = %request.model, prompt_chars = request.prompt.len(), "Ollama generate request");

        let response = self.http.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            return Err(AiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponse = response.json().await?;
        let text = body.response.trim();
        if text.is_empty() {
            return Err(AiError::EmptyResponse);
        }
        Ok(text.to_string())
    }

    pub async fn tags(&self) -> Result<Vec<String>, AiError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            return Err(AiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: TagsResponse = response.json().await?;
        Ok(body.models.into_iter().map(|m| m.name).collect())
    }
}
