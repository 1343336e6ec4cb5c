use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::PulseError;

/// Which classifiers run over each comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierMode {
    /// One topic model and one sentiment model.
    Canonical,
    /// Canonical models plus every panel member, each recorded separately.
    Panel,
}

impl std::fmt::Display for ClassifierMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifierMode::Canonical => write!(f, "canonical"),
            ClassifierMode::Panel => write!(f, "panel"),
        }
    }
}

impl FromStr for ClassifierMode {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "canonical" | "single" => Ok(ClassifierMode::Canonical),
            "panel" | "compare" => Ok(ClassifierMode::Panel),
            other => Err(PulseError::Config(format!(
                "CLASSIFIER_MODE must be canonical or panel, got {other:?}"
            ))),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Source platform
    pub youtube_api_key: Option<String>,

    // Local language model
    pub ollama_url: String,
    pub ollama_model: String,
    pub summary_timeout_secs: u64,

    // Fetching
    pub sample_size: usize,
    pub fetch_concurrency: usize,
    pub video_concurrency: usize,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub page_timeout_secs: u64,

    // Classification
    pub classifier_mode: ClassifierMode,
    pub panel_models: Vec<String>,
    pub inference_concurrency: usize,
    pub classify_timeout_secs: u64,
    pub topic_model_path: Option<PathBuf>,
    pub sentiment_model_path: Option<PathBuf>,

    // Preprocessing
    pub default_language: String,
    pub keep_emoji: bool,

    // Aggregation
    pub bucket_hours: u32,
    pub top_terms: usize,
    /// Excluded from top terms on top of the built-in lists.
    pub stopwords: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            youtube_api_key: None,
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "gemma3:4b".to_string(),
            summary_timeout_secs: 120,
            sample_size: 100,
            fetch_concurrency: 5,
            video_concurrency: 3,
            max_retries: 3,
            backoff_base_ms: 500,
            page_timeout_secs: 20,
            classifier_mode: ClassifierMode::Canonical,
            panel_models: vec!["keyword".into(), "linear".into(), "lexicon".into()],
            inference_concurrency: 2,
            classify_timeout_secs: 60,
            topic_model_path: None,
            sentiment_model_path: None,
            default_language: "en".to_string(),
            keep_emoji: true,
            bucket_hours: 24,
            top_terms: 20,
            stopwords: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables. Every variable is optional;
    /// unset ones take their defaults, unparseable ones are an error.
    pub fn from_env() -> Result<Self, PulseError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. `from_env` is this over the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PulseError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let config = Self {
            youtube_api_key: get("YOUTUBE_API_KEY"),
            ollama_url: get("OLLAMA_URL").unwrap_or(defaults.ollama_url),
            ollama_model: get("OLLAMA_MODEL").unwrap_or(defaults.ollama_model),
            summary_timeout_secs: parse_or(&get, "SUMMARY_TIMEOUT_SECS", defaults.summary_timeout_secs)?,
            sample_size: parse_or(&get, "SAMPLE_SIZE", defaults.sample_size)?,
            fetch_concurrency: parse_or(&get, "FETCH_CONCURRENCY", defaults.fetch_concurrency)?,
            video_concurrency: parse_or(&get, "VIDEO_CONCURRENCY", defaults.video_concurrency)?,
            max_retries: parse_or(&get, "MAX_RETRIES", defaults.max_retries)?,
            backoff_base_ms: parse_or(&get, "BACKOFF_BASE_MS", defaults.backoff_base_ms)?,
            page_timeout_secs: parse_or(&get, "PAGE_TIMEOUT_SECS", defaults.page_timeout_secs)?,
            classifier_mode: match get("CLASSIFIER_MODE") {
                Some(v) => v.parse()?,
                None => defaults.classifier_mode,
            },
            panel_models: get("PANEL_MODELS")
                .map(|v| comma_list(&v, |m| m.to_ascii_lowercase()))
                .unwrap_or(defaults.panel_models),
            inference_concurrency: parse_or(&get, "INFERENCE_CONCURRENCY", defaults.inference_concurrency)?,
            classify_timeout_secs: parse_or(&get, "CLASSIFY_TIMEOUT_SECS", defaults.classify_timeout_secs)?,
            topic_model_path: get("TOPIC_MODEL_PATH").map(PathBuf::from),
            sentiment_model_path: get("SENTIMENT_MODEL_PATH").map(PathBuf::from),
            default_language: get("DEFAULT_LANGUAGE")
                .map(|l| l.to_ascii_lowercase())
                .unwrap_or(defaults.default_language),
            keep_emoji: parse_or(&get, "KEEP_EMOJI", defaults.keep_emoji)?,
            bucket_hours: parse_or(&get, "BUCKET_HOURS", defaults.bucket_hours)?,
            top_terms: parse_or(&get, "TOP_TERMS", defaults.top_terms)?,
            stopwords: get("STOPWORDS")
                .map(|v| comma_list(&v, |w| w.to_lowercase()))
                .unwrap_or(defaults.stopwords),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PulseError> {
        let positive = [
            ("SAMPLE_SIZE", self.sample_size),
            ("FETCH_CONCURRENCY", self.fetch_concurrency),
            ("VIDEO_CONCURRENCY", self.video_concurrency),
            ("INFERENCE_CONCURRENCY", self.inference_concurrency),
            ("BUCKET_HOURS", self.bucket_hours as usize),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(PulseError::Config(format!("{key} must be at least 1")));
            }
        }
        if self.classifier_mode == ClassifierMode::Panel && self.panel_models.is_empty() {
            return Err(PulseError::Config(
                "CLASSIFIER_MODE=panel requires at least one PANEL_MODELS entry".into(),
            ));
        }
        Ok(())
    }

    /// The API key, or a config error naming the variable to set.
    pub fn require_youtube_key(&self) -> Result<&str, PulseError> {
        self.youtube_api_key
            .as_deref()
            .ok_or_else(|| PulseError::Config("YOUTUBE_API_KEY environment variable is required".into()))
    }

    /// Log the effective configuration. Secrets are reported as set/unset only.
    pub fn log_redacted(&self) {
        info!(
            youtube_api_key = if self.youtube_api_key.is_some() { "set" } else { "unset" },
            ollama_url = %self.ollama_url,
            ollama_model = %self.ollama_model,
            sample_size = self.sample_size,
            fetch_concurrency = self.fetch_concurrency,
            video_concurrency = self.video_concurrency,
            max_retries = self.max_retries,
            backoff_base_ms = self.backoff_base_ms,
            page_timeout_secs = self.page_timeout_secs,
            classifier_mode = %self.classifier_mode,
            panel_models = %self.panel_models.join(","),
            inference_concurrency = self.inference_concurrency,
            bucket_hours = self.bucket_hours,
            top_terms = self.top_terms,
            stopwords = %self.stopwords.join(","),
            default_language = %self.default_language,
            keep_emoji = self.keep_emoji,
            "Loaded config"
        );
    }
}

fn comma_list(raw: &str, normalize: impl Fn(&str) -> String) -> Vec<String> {
    raw.split(',')
        .map(|item| normalize(item.trim()))
        .filter(|item| !item.is_empty())
        .collect()
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, PulseError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| PulseError::Config(format!("{key} has invalid value {raw:?}"))),
        None => Ok(default),
    }
}
