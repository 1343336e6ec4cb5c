use async_trait::async_trait;

use crate::error::AiError;

// =============================================================================
// PromptBuilder Trait
// =============================================================================

/// One-shot prompt against a text-generation model.
///
/// Builders are consumed by `send`, so a prompt cannot be accidentally re-sent
/// with stale settings.
#[async_trait]
pub trait PromptBuilder: Send + Sized {
    fn preamble(self, preamble: impl Into<String>) -> Self;
    fn temperature(self, temperature: f32) -> Self;
    /// Upper bound on generated tokens.
    fn max_tokens(self, max_tokens: u32) -> Self;
    async fn send(self) -> Result<String, AiError>;
}
