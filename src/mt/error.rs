use std::time::Duration;
use thiserror::Error;

/// Error types for the Machine Translation module
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MtError {
    /// No backend registered under the requested key
    #[error("no translation backend registered under key '{0}'")]
    BackendNotFound(String),

    /// A backend with the same key is already registered
    #[error("a translation backend is already registered under key '{0}'")]
    DuplicateBackend(String),

    /// The backend cannot translate into the requested language
    #[error("{backend} does not support target language '{language}'")]
    UnsupportedLanguage { backend: String, language: String },

    /// The backend needs a credential the caller did not supply
    #[error("{backend} requires {field}")]
    MissingCredential { backend: String, field: String },

    /// The text is longer than the backend accepts in one request
    #[error("text of {len} characters exceeds the maximum of {max}")]
    TextTooLong { len: usize, max: usize },

    /// The request could not be sent or the response not received
    #[error("network error: {0}")]
    Network(String),

    /// No response within the per-request timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The backend answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Invalid backend or client configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// The run was cancelled before the request completed
    #[error("translation cancelled")]
    Cancelled,
}

impl MtError {
    /// Whether sending the same request again may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            MtError::Network(_) | MtError::Timeout(_) => true,
            MtError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for MtError {
    fn from(err: reqwest::Error) -> Self {
        MtError::Network(err.to_string())
    }
}

/// Result type for MT operations
pub type MtResult<T> = Result<T, MtError>;
