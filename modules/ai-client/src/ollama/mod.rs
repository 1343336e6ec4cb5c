mod client;
pub mod prompt_builder;
pub(crate) mod types;

pub use prompt_builder::OllamaPromptBuilder;

use std::time::Duration;

use client::OllamaClient;

use crate::error::AiError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

// =============================================================================
// Ollama Agent
// =============================================================================

/// Handle to one model on a local Ollama server. Cheap to clone.
#[derive(Clone)]
pub struct Ollama {
    base_url: String,
    pub(crate) model: String,
    pub(crate) use_gpu: bool,
    timeout: Option<Duration>,
}

impl Ollama {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            use_gpu: true,
            timeout: None,
        }
    }

    pub fn from_env(model: impl Into<String>) -> Self {
        let base_url =
            std::env::var("OLLAMA_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base_url, model)
    }

    pub fn with_gpu(mut self, use_gpu: bool) -> Self {
        self.use_gpu = use_gpu;
        self
    }

    /// HTTP-level timeout for every request made through this handle.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn client(&self) -> OllamaClient {
        OllamaClient::new(&self.base_url, self.timeout)
    }

    pub fn prompt(&self, input: impl Into<String>) -> OllamaPromptBuilder {
        OllamaPromptBuilder::new(self.clone(), input.into())
    }

    /// Verify the server answers and has this handle's model pulled.
    pub async fn check_connection(&self) -> Result<(), AiError> {
        let models = self.client().tags().await?;
        let wanted = self.model.as_str();
        let present = models
            .iter()
            .any(|m| m == wanted || m.strip_suffix(":latest") == Some(wanted));
        if present {
            Ok(())
        } else {
            Err(AiError::Config(format!(
                "model '{wanted}' is not pulled on {} (run `ollama pull {wanted}`)",
                self.base_url
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::types::*;
    use super::*;

    #[test]
    fn generate_request_omits_unset_options() {
        let request = GenerateRequest {
            model: "gemma3:4b".to_string(),
            prompt: "hi".to_string(),
            system: None,
            stream: false,
            options: GenerateOptions {
                temperature: Some(0.1),
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], false);
        assert!(json.get("system").is_none());
        assert!(json["options"].get("num_predict").is_none());
        assert!((json["options"]["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn builder_settings_are_kept_on_the_handle() {
        let agent = Ollama::new("http://127.0.0.1:11434", "gemma3:4b")
            .with_gpu(false)
            .with_timeout(Duration::from_secs(5));
        assert_eq!(agent.model(), "gemma3:4b");
        assert!(!agent.use_gpu);
        assert_eq!(agent.timeout, Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn unreachable_server_reports_unavailable() {
        // Port 9 (discard) is closed on test machines; connect is refused immediately.
        let agent = Ollama::new("http://127.0.0.1:9", "gemma3:4b")
            .with_timeout(Duration::from_secs(2));
        let err = agent.check_connection().await.unwrap_err();
        assert!(
            matches!(err, AiError::Unavailable(_) | AiError::Timeout(_) | AiError::Network(_)),
            "unexpected error: {err:?}"
        );
    }
}
