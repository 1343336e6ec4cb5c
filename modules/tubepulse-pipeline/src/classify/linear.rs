//! Pre-fitted bag-of-words linear models loaded from JSON.
//!
//! File format:
//!
//! ```json
//! { "name": "linear",
//!   "labels": ["positive", "negative", "neutral"],
//!   "bias": [0.0, -0.2, 0.4],
//!   "weights": { "love": [1.6, -0.6, -0.6] } }
//! ```
//!
//! Each weight vector lines up with `labels`. A label outside the closed set is
//! a load error, never remapped.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use serde::Deserialize;

use tubepulse_common::{
    ClassificationError, NormalizedComment, Prediction, SentimentLabel, TopicLabel, UnknownLabel,
    Video,
};

use super::{SentimentScorer, TopicScorer};

const BUILTIN_TOPIC: &str = include_str!("models/topic_linear.json");
const BUILTIN_SENTIMENT: &str = include_str!("models/sentiment_linear.json");

#[derive(Debug, Deserialize)]
struct ModelFile {
    name: Option<String>,
    labels: Vec<String>,
    bias: Vec<f64>,
    #[serde(default)]
    weights: HashMap<String, Vec<f64>>,
}

#[derive(Debug, Clone)]
pub struct LinearModel<L> {
    name: String,
    labels: Vec<L>,
    bias: Vec<f64>,
    weights: HashMap<String, Vec<f64>>,
}

impl<L> LinearModel<L>
where
    L: FromStr<Err = UnknownLabel> + Copy + PartialEq,
{
    pub fn load(path: &Path) -> Result<Self, ClassificationError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ClassificationError::ModelUnavailable {
            model: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ClassificationError> {
        let file: ModelFile =
            serde_json::from_str(raw).map_err(|e| ClassificationError::ModelUnavailable {
                model: "linear".to_string(),
                message: format!("invalid model file: {e}"),
            })?;
        let name = file.name.unwrap_or_else(|| "linear".to_string());
        let invalid = |message: String| ClassificationError::ModelUnavailable {
            model: name.clone(),
            message,
        };

        let labels = file
            .labels
            .iter()
            .map(|l| l.parse::<L>())
            .collect::<Result<Vec<L>, UnknownLabel>>()?;
        if labels.is_empty() {
            return Err(invalid("model declares no labels".to_string()));
        }
        let distinct: HashSet<&String> = file.labels.iter().collect();
        if distinct.len() != file.labels.len() {
            return Err(invalid("model declares a label twice".to_string()));
        }
        if file.bias.len() != labels.len() {
            return Err(invalid(format!(
                "bias has {} entries for {} labels",
                file.bias.len(),
                labels.len()
            )));
        }
        if let Some((feature, w)) = file.weights.iter().find(|(_, w)| w.len() != labels.len()) {
            return Err(invalid(format!(
                "weights for {feature:?} have {} entries for {} labels",
                w.len(),
                labels.len()
            )));
        }

        Ok(Self {
            name: name.clone(),
            labels,
            bias: file.bias,
            weights: file.weights,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Softmax over `bias + Σ weights[feature]`; the arg-max label and its probability.
    pub fn predict<'a, I>(&self, features: I) -> Prediction<L>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut scores = self.bias.clone();
        for feature in features {
            if let Some(w) = self.weights.get(feature) {
                for (score, weight) in scores.iter_mut().zip(w) {
                    *score += weight;
                }
            }
        }

        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exp: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
        let sum: f64 = exp.iter().sum();

        let mut best = 0;
        for (i, value) in exp.iter().enumerate() {
            if *value > exp[best] {
                best = i;
            }
        }
        Prediction {
            label: self.labels[best],
            confidence: (exp[best] / sum).clamp(0.0, 1.0),
        }
    }

    fn predict_comment(&self, comment: &NormalizedComment) -> Prediction<L> {
        self.predict(
            comment
                .tokens
                .iter()
                .chain(comment.emoji.iter())
                .map(String::as_str),
        )
    }
}

impl LinearModel<TopicLabel> {
    /// Small topic model shipped with the crate.
    pub fn builtin() -> Result<Self, ClassificationError> {
        Self::from_json(BUILTIN_TOPIC)
    }
}

impl LinearModel<SentimentLabel> {
    /// Small sentiment model shipped with the crate.
    pub fn builtin() -> Result<Self, ClassificationError> {
        Self::from_json(BUILTIN_SENTIMENT)
    }
}

#[async_trait]
impl TopicScorer for LinearModel<TopicLabel> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn score_topic(
        &self,
        _video: &Video,
        comment: &NormalizedComment,
    ) -> Result<Prediction<TopicLabel>, ClassificationError> {
        Ok(self.predict_comment(comment))
    }
}

#[async_trait]
impl SentimentScorer for LinearModel<SentimentLabel> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn score_sentiment(
        &self,
        comment: &NormalizedComment,
    ) -> Result<Prediction<SentimentLabel>, ClassificationError> {
        Ok(self.predict_comment(comment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::normalized;

    #[test]
    fn builtin_models_load() {
        assert!(LinearModel::<TopicLabel>::builtin().is_ok());
        assert!(LinearModel::<SentimentLabel>::builtin().is_ok());
    }

    #[test]
    fn predicts_from_weights() {
        let model = LinearModel::<SentimentLabel>::builtin().unwrap();
        let p = model.predict_comment(&normalized("v", "c", "what a masterpiece 😍"));
        assert_eq!(p.label, SentimentLabel::Positive);
        assert!(p.confidence > 0.5 && p.confidence <= 1.0);

        let neutral = model.predict_comment(&normalized("v", "c", "uploaded tuesday"));
        assert_eq!(neutral.label, SentimentLabel::Neutral);
    }

    #[test]
    fn unknown_label_in_file_is_hard_error() {
        let raw = r#"{"labels": ["positive", "mixed"], "bias": [0, 0]}"#;
        let err = LinearModel::<SentimentLabel>::from_json(raw).unwrap_err();
        assert!(matches!(err, ClassificationError::UnknownLabel(ref u) if u.value == "mixed"));
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let raw = r#"{"labels": ["subject", "creator"], "bias": [0, 0], "weights": {"x": [1]}}"#;
        assert!(LinearModel::<TopicLabel>::from_json(raw).is_err());
        let raw = r#"{"labels": ["subject"], "bias": [0, 0]}"#;
        assert!(LinearModel::<TopicLabel>::from_json(raw).is_err());
    }

    #[test]
    fn missing_file_is_model_unavailable() {
        let err = LinearModel::<TopicLabel>::load(Path::new("/nonexistent/topic.json")).unwrap_err();
        assert!(matches!(err, ClassificationError::ModelUnavailable { .. }));
    }
}
