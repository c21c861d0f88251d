//! Error types for the generation client.

use thiserror::Error;
use wds_core::GenerationError;

/// Errors that can occur while talking to the generation API.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GenAiError {
    /// No API key was configured.
    #[error("no API key: set {0}")]
    MissingApiKey(&'static str),

    /// The HTTP client could not be built.
    #[error("failed to create HTTP client: {0}")]
    Client(String),

    /// The request never produced an HTTP response.
    #[error("network error: {0}")]
    Network(String),

    /// The API answered with an error status.
    #[error("{code} {message}")]
    Api {
        /// HTTP status code.
        code: u16,
        /// API status and message, e.g. `UNAVAILABLE: The model is overloaded.`
        message: String,
    },

    /// The response body did not match the expected shape.
    #[error("JSON parse error: {0}")]
    JsonParse(String),

    /// The API answered without any text (blocked prompt, empty candidate).
    #[error("empty response: {0}")]
    EmptyResponse(String),
}

impl GenAiError {
    /// Returns a short message suitable for showing a participant.
    #[must_use]
    pub fn user_message(&self) -> &str {
        match self {
            Self::MissingApiKey(_) | Self::Client(_) => "The model is not configured.",
            Self::Network(_) => "Could not reach the model. Please check your connection.",
            Self::Api { code: 503, .. } => "The model is busy. Please try again.",
            Self::Api { .. } | Self::JsonParse(_) => "The model returned an error.",
            Self::EmptyResponse(_) => "The model returned no answer. Try rephrasing your prompt.",
        }
    }

    /// Returns whether a later attempt may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        wds_core::error::is_transient_message(&self.to_string())
    }
}

impl From<reqwest::Error> for GenAiError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::Api {
                code: status.as_u16(),
                message: err.to_string(),
            },
            None if err.is_decode() => Self::JsonParse(err.to_string()),
            None => Self::Network(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for GenAiError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonParse(err.to_string())
    }
}

/// The participant-facing text leads; the raw error follows in parentheses
/// so the status code still drives the retry gate.
impl From<GenAiError> for GenerationError {
    fn from(err: GenAiError) -> Self {
        GenerationError::classify(format!("{} ({err})", err.user_message()))
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, GenAiError>;
