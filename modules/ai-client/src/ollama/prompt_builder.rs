use async_trait::async_trait;

use crate::error::AiError;
use crate::traits::PromptBuilder;

use super::types::{GenerateOptions, GenerateRequest};
use super::Ollama;

pub struct OllamaPromptBuilder {
    agent: Ollama,
    input: String,
    preamble: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl OllamaPromptBuilder {
    pub(crate) fn new(agent: Ollama, input: String) -> Self {
        Self {
            agent,
            input,
            preamble: None,
            temperature: None,
            max_tokens: None,
        }
    }
}

#[async_trait]
impl PromptBuilder for OllamaPromptBuilder {
    fn preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = Some(preamble.into());
        self
    }

    fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    async fn send(self) -> Result<String, AiError> {
        let request = GenerateRequest {
            model: self.agent.model.clone(),
            prompt: self.input,
            system: self.preamble,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
                num_gpu: self.agent.use_gpu.then_some(999),
            },
        };

        self.agent.client().generate(&request).await
    }
}
