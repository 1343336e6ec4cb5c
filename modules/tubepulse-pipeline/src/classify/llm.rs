use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use ai_client::{sole_word, truncate_chars, AiError, Ollama, PromptBuilder};
use tubepulse_common::{ClassificationError, NormalizedComment, Prediction, TopicLabel, Video};

use super::TopicScorer;

const PREAMBLE: &str = "You label YouTube comments. Answer with exactly one word: \
subject, creator, or general. subject = the comment is about what the video shows \
(the song, product, game, story). creator = the comment is about or addressed to the \
person or channel who made the video. general = anything else.";

/// Comment text sent to the model is capped at this many characters.
const MAX_COMMENT_CHARS: usize = 500;

/// The model is not asked for a probability; its answers get this fixed confidence.
const LLM_CONFIDENCE: f64 = 0.7;

/// Panel topic classifier backed by a local language model.
#[derive(Clone)]
pub struct LlmTopicClassifier {
    agent: Ollama,
    timeout: Duration,
}

impl LlmTopicClassifier {
    /// `timeout` bounds each HTTP request to the model server.
    pub fn new(agent: Ollama, timeout: Duration) -> Self {
        Self {
            agent: agent.with_timeout(timeout),
            timeout,
        }
    }

    pub fn model(&self) -> &str {
        self.agent.model()
    }
}

pub(crate) fn build_prompt(video: &Video, comment: &NormalizedComment) -> String {
    let channel = video.channel_title.as_deref().unwrap_or("unknown");
    format!(
        "Video title: {}\nChannel: {}\nComment: {}\nLabel:",
        video.title,
        channel,
        truncate_chars(&comment.cleaned_text, MAX_COMMENT_CHARS)
    )
}

/// Strict: the reply must be exactly one of the three labels, give or take
/// punctuation and emphasis.
pub(crate) fn parse_topic(model: &str, output: &str) -> Result<TopicLabel, ClassificationError> {
    let word = sole_word(output).ok_or_else(|| ClassificationError::MalformedOutput {
        model: model.to_string(),
        output: output.to_string(),
    })?;
    Ok(word.parse::<TopicLabel>()?)
}

fn map_ai_error(model: &str, timeout: Duration, err: AiError) -> ClassificationError {
    match err {
        AiError::Timeout(_) => ClassificationError::Timeout {
            model: model.to_string(),
            secs: timeout.as_secs(),
        },
        AiError::EmptyResponse | AiError::Parse(_) => ClassificationError::MalformedOutput {
            model: model.to_string(),
            output: err.to_string(),
        },
        other => ClassificationError::ModelUnavailable {
            model: model.to_string(),
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl TopicScorer for LlmTopicClassifier {
    fn name(&self) -> &str {
        "llm"
    }

    async fn score_topic(
        &self,
        video: &Video,
        comment: &NormalizedComment,
    ) -> Result<Prediction<TopicLabel>, ClassificationError> {
        let output = self
            .agent
            .prompt(build_prompt(video, comment))
            .preamble(PREAMBLE)
            .temperature(0.1)
            .max_tokens(5)
            .send()
            .await
            .map_err(|e| map_ai_error("llm", self.timeout, e))?;

        debug!(comment_id = comment.comment_id(), output = %output.trim(), "LLM topic reply");
        let label = parse_topic("llm", &output)?;
        Ok(Prediction {
            label,
            confidence: LLM_CONFIDENCE,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{normalized, titled_video};

    #[test]
    fn parses_decorated_single_word() {
        assert_eq!(parse_topic("llm", "**Creator**").unwrap(), TopicLabel::Creator);
        assert_eq!(parse_topic("llm", "subject.\n").unwrap(), TopicLabel::Subject);
    }

    #[test]
    fn rejects_anything_else() {
        assert!(matches!(
            parse_topic("llm", "The comment is about the creator"),
            Err(ClassificationError::MalformedOutput { .. })
        ));
        assert!(matches!(
            parse_topic("llm", "neutral"),
            Err(ClassificationError::UnknownLabel(_))
        ));
        assert!(matches!(
            parse_topic("llm", "   "),
            Err(ClassificationError::MalformedOutput { .. })
        ));
    }

    #[test]
    fn label_followed_by_reasoning_is_malformed() {
        assert!(matches!(
            parse_topic("llm", "creator because it's her"),
            Err(ClassificationError::MalformedOutput { .. })
        ));
        assert!(matches!(
            parse_topic("llm", "Subject: the song"),
            Err(ClassificationError::MalformedOutput { .. })
        ));
    }

    #[test]
    fn prompt_carries_context() {
        let v = titled_video("v1", "Midnight Drive", "Lena Park");
        let prompt = build_prompt(&v, &normalized("v1", "c1", "her voice!"));
        assert!(prompt.contains("Midnight Drive"));
        assert!(prompt.contains("Lena Park"));
        assert!(prompt.contains("her voice!"));
    }

    #[tokio::test]
    async fn unreachable_server_is_model_unavailable() {
        let agent = Ollama::new("http://127.0.0.1:9", "gemma3:4b");
        let llm = LlmTopicClassifier::new(agent, Duration::from_secs(2));
        let err = llm
            .score_topic(&titled_video("v1", "t", "c"), &normalized("v1", "c1", "hello there"))
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                ClassificationError::ModelUnavailable { .. } | ClassificationError::Timeout { .. }
            ),
            "unexpected error: {err:?}"
        );
    }
}
