use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to parse response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid adapter configuration: {0}")]
    InvalidConfig(String),
    #[error("unexpected http status {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },
    #[error("request timeout after {seconds}s")]
    Timeout { seconds: u64 },
    #[error("missing credential `{key}` for provider `{provider}`")]
    MissingCredential { provider: String, key: String },
    #[error("unknown provider `{0}` (expected a tag such as openai/, anthropic/ or gemini/)")]
    UnknownProvider(String),
    #[error("API returned an empty response")]
    EmptyResponse,
}

impl AdapterError {
    /// Maps a transport error, turning client-side timeouts into `Timeout`.
    pub(crate) fn from_send(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout {
                seconds: timeout_secs,
            }
        } else {
            AdapterError::Http(err)
        }
    }

    pub fn category(&self) -> FailureCategory {
        match self {
            AdapterError::Timeout { .. } => FailureCategory::Timeout,
            AdapterError::MissingCredential { .. } => FailureCategory::Authentication,
            AdapterError::HttpStatus { status, body } => {
                if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN {
                    FailureCategory::Authentication
                } else if *status == StatusCode::TOO_MANY_REQUESTS {
                    FailureCategory::RateLimit
                } else {
                    FailureCategory::from_message(body)
                }
            }
            other => FailureCategory::from_message(&other.to_string()),
        }
    }
}

/// Coarse failure buckets used by the key smoke test.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FailureCategory {
    #[serde(rename = "Authentication/API Key")]
    Authentication,
    #[serde(rename = "Parameter Restriction")]
    ParameterRestriction,
    Timeout,
    #[serde(rename = "Rate Limit")]
    RateLimit,
    Unknown,
}

impl FailureCategory {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Authentication => "Authentication/API Key",
            Self::ParameterRestriction => "Parameter Restriction",
            Self::Timeout => "Timeout",
            Self::RateLimit => "Rate Limit",
            Self::Unknown => "Unknown",
        }
    }

    pub fn from_message(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("api key")
            || lower.contains("api_key")
            || lower.contains("authentication")
            || lower.contains("unauthorized")
            || lower.contains("credential")
        {
            Self::Authentication
        } else if lower.contains("temperature")
            || lower.contains("unsupported")
            || lower.contains("parameter")
        {
            Self::ParameterRestriction
        } else if lower.contains("timeout") || lower.contains("timed out") {
            Self::Timeout
        } else if lower.contains("rate limit") || lower.contains("quota") {
            Self::RateLimit
        } else {
            Self::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_mentions_timeout() {
        let err = AdapterError::Timeout { seconds: 30 };
        assert!(err.to_string().contains("timeout"));
        assert_eq!(err.category(), FailureCategory::Timeout);
    }

    #[test]
    fn status_codes_map_to_categories() {
        let auth = AdapterError::HttpStatus {
            status: StatusCode::UNAUTHORIZED,
            body: String::new(),
        };
        let limited = AdapterError::HttpStatus {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: String::new(),
        };
        let param = AdapterError::HttpStatus {
            status: StatusCode::BAD_REQUEST,
            body: "Unsupported value: 'temperature' does not support 0.3".to_string(),
        };
        assert_eq!(auth.category(), FailureCategory::Authentication);
        assert_eq!(limited.category(), FailureCategory::RateLimit);
        assert_eq!(param.category(), FailureCategory::ParameterRestriction);
    }

    #[test]
    fn missing_credential_is_an_auth_failure() {
        let err = AdapterError::MissingCredential {
            provider: "gemini".into(),
            key: "GEMINI_API_KEY".into(),
        };
        assert_eq!(err.category(), FailureCategory::Authentication);
        assert_eq!(FailureCategory::from_message("boom"), FailureCategory::Unknown);
    }
}
