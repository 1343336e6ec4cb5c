use thiserror::Error;

pub type Result<T> = std::result::Result<T, YoutubeError>;

#[derive(Debug, Error)]
pub enum YoutubeError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("API error (status {status}, reason {reason:?}): {message}")]
    Api {
        status: u16,
        reason: Option<String>,
        message: String,
    },

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Error reasons the Data API reports for conditions that will not change on retry.
const PERMANENT_REASONS: &[&str] = &[
    "commentsDisabled",
    "videoNotFound",
    "channelNotFound",
    "commentThreadNotFound",
    "forbidden",
    "invalidParameter",
    "keyInvalid",
];

/// Error reasons that signal throttling. These come back as 403 and must not be
/// mistaken for a permanent refusal.
const THROTTLE_REASONS: &[&str] = &[
    "quotaExceeded",
    "rateLimitExceeded",
    "userRateLimitExceeded",
    "dailyLimitExceeded",
];

impl YoutubeError {
    /// The machine-readable `reason` of an API error, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            YoutubeError::Api { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }

    /// Whether retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            YoutubeError::Network(_) | YoutubeError::Timeout(_) => true,
            YoutubeError::Parse(_) => false,
            YoutubeError::Api { status, reason, .. } => {
                if let Some(reason) = reason.as_deref() {
                    if THROTTLE_REASONS.contains(&reason) {
                        return true;
                    }
                    if PERMANENT_REASONS.contains(&reason) {
                        return false;
                    }
                }
                *status == 429 || *status >= 500
            }
        }
    }
}

impl From<reqwest::Error> for YoutubeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            YoutubeError::Timeout(err.to_string())
        } else if err.is_decode() {
            YoutubeError::Parse(err.to_string())
        } else {
            YoutubeError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for YoutubeError {
    fn from(err: serde_json::Error) -> Self {
        YoutubeError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16, reason: Option<&str>) -> YoutubeError {
        YoutubeError::Api {
            status,
            reason: reason.map(str::to_string),
            message: String::new(),
        }
    }

    #[test]
    fn quota_exceeded_is_transient_despite_403() {
        assert!(api(403, Some("quotaExceeded")).is_transient());
        assert!(api(403, Some("rateLimitExceeded")).is_transient());
    }

    #[test]
    fn comments_disabled_is_permanent() {
        assert!(!api(403, Some("commentsDisabled")).is_transient());
        assert!(!api(404, Some("videoNotFound")).is_transient());
    }

    #[test]
    fn server_errors_are_transient() {
        assert!(api(500, None).is_transient());
        assert!(api(503, Some("backendError")).is_transient());
        assert!(api(429, None).is_transient());
    }

    #[test]
    fn unknown_client_errors_are_permanent() {
        assert!(!api(400, None).is_transient());
        assert!(!YoutubeError::Parse("bad json".into()).is_transient());
    }
}
