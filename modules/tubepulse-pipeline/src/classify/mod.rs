//! Topic and sentiment scoring.
//!
//! Every model sits behind one of two capability traits with a fixed
//! input/output contract. Which implementation backs the canonical labels, and
//! which run alongside it as a comparison panel, is decided by configuration in
//! [`build_engine`].

pub mod cues;
pub mod engine;
pub mod lexicon;
pub mod linear;
pub mod llm;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use tubepulse_common::{
    ClassificationError, ClassifierMode, Config, NormalizedComment, Prediction, PulseError,
    SentimentLabel, TopicLabel, Video,
};

pub use cues::CueTopicClassifier;
pub use engine::{ClassificationBatch, ClassificationEngine, CommentFailure, InferencePool};
pub use lexicon::LexiconSentiment;
pub use linear::LinearModel;
pub use llm::LlmTopicClassifier;

// ---------------------------------------------------------------------------
// Scorer traits
// ---------------------------------------------------------------------------

/// Maps a comment to one of the closed topic labels.
#[async_trait]
pub trait TopicScorer: Send + Sync {
    fn name(&self) -> &str;

    /// `video` supplies context (title, channel) that separates subject from creator.
    async fn score_topic(
        &self,
        video: &Video,
        comment: &NormalizedComment,
    ) -> Result<Prediction<TopicLabel>, ClassificationError>;
}

/// Maps a comment to a sentiment label with a confidence in `[0, 1]`.
#[async_trait]
pub trait SentimentScorer: Send + Sync {
    fn name(&self) -> &str;

    async fn score_sentiment(
        &self,
        comment: &NormalizedComment,
    ) -> Result<Prediction<SentimentLabel>, ClassificationError>;
}

/// One named entry of the comparison panel. A member may score either axis or both.
#[derive(Clone)]
pub struct PanelMember {
    pub name: String,
    pub topic: Option<Arc<dyn TopicScorer>>,
    pub sentiment: Option<Arc<dyn SentimentScorer>>,
}

impl PanelMember {
    pub fn topic(scorer: Arc<dyn TopicScorer>) -> Self {
        Self {
            name: scorer.name().to_string(),
            topic: Some(scorer),
            sentiment: None,
        }
    }

    pub fn sentiment(scorer: Arc<dyn SentimentScorer>) -> Self {
        Self {
            name: scorer.name().to_string(),
            topic: None,
            sentiment: Some(scorer),
        }
    }
}

// ---------------------------------------------------------------------------
// Construction from config
// ---------------------------------------------------------------------------

fn canonical_topic(config: &Config) -> Result<Arc<dyn TopicScorer>, PulseError> {
    Ok(match &config.topic_model_path {
        Some(path) => Arc::new(LinearModel::<TopicLabel>::load(path)?),
        None => Arc::new(CueTopicClassifier::new()),
    })
}

fn canonical_sentiment(config: &Config) -> Result<Arc<dyn SentimentScorer>, PulseError> {
    Ok(match &config.sentiment_model_path {
        Some(path) => Arc::new(LinearModel::<SentimentLabel>::load(path)?),
        None => Arc::new(LexiconSentiment::new()),
    })
}

/// Panel entry for a configured model name.
fn panel_member(
    name: &str,
    config: &Config,
    llm: Option<&LlmTopicClassifier>,
) -> Result<PanelMember, PulseError> {
    match name {
        "keyword" => Ok(PanelMember::topic(Arc::new(CueTopicClassifier::new()))),
        "lexicon" => Ok(PanelMember::sentiment(Arc::new(LexiconSentiment::new()))),
        "linear" => {
            let topic = match &config.topic_model_path {
                Some(path) => LinearModel::<TopicLabel>::load(path)?,
                None => LinearModel::<TopicLabel>::builtin()?,
            };
            let sentiment = match &config.sentiment_model_path {
                Some(path) => LinearModel::<SentimentLabel>::load(path)?,
                None => LinearModel::<SentimentLabel>::builtin()?,
            };
            Ok(PanelMember {
                name: "linear".to_string(),
                topic: Some(Arc::new(topic)),
                sentiment: Some(Arc::new(sentiment)),
            })
        }
        "llm" => match llm {
            Some(llm) => Ok(PanelMember::topic(Arc::new(llm.clone()))),
            None => Err(PulseError::Config(
                "panel model llm requires a reachable OLLAMA_URL".to_string(),
            )),
        },
        other => Err(PulseError::Config(format!(
            "unknown panel model {other:?} (expected keyword, linear, lexicon or llm)"
        ))),
    }
}

/// Build the engine the configuration asks for. `llm` is only consulted when the
/// panel names it.
pub fn build_engine(
    config: &Config,
    llm: Option<&LlmTopicClassifier>,
) -> Result<ClassificationEngine, PulseError> {
    let panel = match config.classifier_mode {
        ClassifierMode::Canonical => Vec::new(),
        ClassifierMode::Panel => config
            .panel_models
            .iter()
            .map(|name| panel_member(name, config, llm))
            .collect::<Result<Vec<_>, _>>()?,
    };

    let engine = ClassificationEngine::builder()
        .topic(canonical_topic(config)?)
        .sentiment(canonical_sentiment(config)?)
        .panel(panel)
        .pool(InferencePool::new(config.inference_concurrency))
        .timeout(Duration::from_secs(config.classify_timeout_secs))
        .build();

    info!(
        topic = engine.topic_model(),
        sentiment = engine.sentiment_model(),
        panel = %engine.panel_names().join(","),
        "Classification engine ready"
    );
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_mode_has_no_panel() {
        let engine = build_engine(&Config::default(), None).unwrap();
        assert!(engine.panel_names().is_empty());
        assert_eq!(engine.topic_model(), "keyword");
        assert_eq!(engine.sentiment_model(), "lexicon");
    }

    #[test]
    fn panel_mode_builds_named_members() {
        let config = Config {
            classifier_mode: ClassifierMode::Panel,
            ..Config::default()
        };
        let engine = build_engine(&config, None).unwrap();
        assert_eq!(engine.panel_names(), vec!["keyword", "linear", "lexicon"]);
    }

    #[test]
    fn llm_panel_without_server_is_config_error() {
        let config = Config {
            classifier_mode: ClassifierMode::Panel,
            panel_models: vec!["llm".to_string()],
            ..Config::default()
        };
        assert!(build_engine(&config, None).is_err());
    }

    #[test]
    fn unknown_panel_model_is_rejected() {
        let config = Config {
            classifier_mode: ClassifierMode::Panel,
            panel_models: vec!["bert".to_string()],
            ..Config::default()
        };
        assert!(build_engine(&config, None).is_err());
    }
}
