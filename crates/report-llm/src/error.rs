use thiserror::Error;

pub type Result<T> = std::result::Result<T, LLMError>;

/// Failure talking to a text-generation backend
///
/// Callers mostly care about one distinction: whether the backend throttled
/// us ([`LLMError::is_rate_limited`]) or failed for any other reason.
#[derive(Error, Debug)]
pub enum LLMError {
    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("Backend rejected the API key")]
    AuthenticationFailed,

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("Bad request for model {model}: {body}")]
    InvalidRequest { model: String, body: String },

    #[error("Backend returned no text: {0}")]
    UnexpectedResponse(String),

    #[error("Missing configuration: {0}")]
    ConfigurationError(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl LLMError {
    pub fn from_status(status: u16, body: String, model: &str) -> Self {
        match status {
            429 => Self::RateLimitExceeded(body),
            401 | 403 => Self::AuthenticationFailed,
            400 | 404 => Self::InvalidRequest {
                model: model.to_string(),
                body,
            },
            _ => Self::RequestFailed(format!("HTTP {status}: {body}")),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::RateLimitExceeded(_) => true,
            Self::Http(e) => e.status().is_some_and(|s| s.as_u16() == 429),
            _ => false,
        }
    }
}
