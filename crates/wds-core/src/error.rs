//! Error types for the survey core.

use std::path::PathBuf;

use thiserror::Error;

use crate::wizard::PageId;

/// Failure of a remote text-generation call.
///
/// The split between the two variants is the retry gate used by
/// [`RetryingGenerator`](crate::generation::RetryingGenerator): only
/// transient failures are retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum GenerationError {
    /// The remote service reported temporary unavailability (overload, 503).
    #[error("{0}")]
    Transient(String),

    /// Any other failure (bad request, authentication, malformed response).
    #[error("{0}")]
    Permanent(String),
}

impl GenerationError {
    /// Classify a raw failure message with the transient-overload signature.
    ///
    /// The message is transient when it contains `"overloaded"`
    /// (case-insensitive) or the status code `"503"`.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_transient_message(&message) {
            Self::Transient(message)
        } else {
            Self::Permanent(message)
        }
    }

    /// Returns whether this failure may succeed on a later attempt.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transient(message) => is_transient_message(message),
            Self::Permanent(_) => false,
        }
    }

    /// The underlying failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Transient(message) | Self::Permanent(message) => message,
        }
    }
}

/// Returns true if the message matches the transient-overload signature.
pub fn is_transient_message(message: &str) -> bool {
    message.to_lowercase().contains("overloaded") || message.contains("503")
}

/// Errors raised while loading the survey configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for the survey schema.
    #[error("failed to parse config {path}: {message}")]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// A field holds a value outside its allowed range.
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Errors raised by page operations issued in the wrong phase.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SurveyError {
    /// No page with this identifier exists in the wizard.
    #[error("unknown page: {0}")]
    UnknownPage(PageId),

    /// The page does not accept participant input (static text page).
    #[error("page {0} does not accept this input")]
    NotInteractive(PageId),

    /// The page has been confirmed and no longer accepts edits.
    #[error("page is locked")]
    PageLocked,

    /// A prompt was submitted while the page was not waiting for one.
    #[error("page is not awaiting a prompt")]
    NotAwaitingPrompt,

    /// A judgment was recorded before any response was shown.
    #[error("page is not awaiting a judgment")]
    NotAwaitingJudgment,

    /// A field that is still gated was edited.
    #[error("{0} is not available yet")]
    FieldLocked(&'static str),

    /// A worker result arrived while the page was not waiting for one.
    #[error("page is not waiting for a result")]
    UnexpectedResult,

    /// Choices were confirmed before the page was complete.
    #[error("page is not complete")]
    Incomplete,

    /// The participant has not accepted the terms yet.
    #[error("the terms have not been accepted")]
    TermsNotAccepted,
}

/// Result alias for survey page operations.
pub type Result<T> = std::result::Result<T, SurveyError>;
