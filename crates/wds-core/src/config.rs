//! Survey configuration.
//!
//! Serialized to TOML. Every field has a default so a partial file (or no
//! file at all) yields a runnable survey.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::generation::RetryPolicy;
use crate::survey::TERMS_TEXT;

/// Default name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "survey.toml";

/// Placeholder question used when the question bank is empty.
pub const QUESTION_PLACEHOLDER: &str = "< QUESTION >";

// =============================================================================
// ROOT CONFIG
// =============================================================================

/// Configuration for one survey session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveyConfig {
    /// Names of the enabled watermarks (the allow-list).
    pub watermarks: Vec<String>,

    /// Secret word and hiding position for the acrostic watermark.
    pub acrostic: AcrosticConfig,

    /// Probability that a detection page is assigned the watermark.
    pub mark_prob: f64,

    /// Number of detection pages.
    pub page_count: usize,

    /// Whether participants may jump between pages through the tab strip.
    pub allow_tab_navigation: bool,

    /// Whether the "previous" control is offered.
    pub allow_prev: bool,

    /// Whether the optional demographics page is included.
    pub include_demographics: bool,

    /// Terms the participant must accept before the survey starts. Empty
    /// text skips the consent step.
    pub terms: String,

    /// Minimum characters for each free-text justification.
    pub min_reasoning_chars: usize,

    /// Minimum word count requested from the model.
    pub min_word_count: usize,

    /// Question bank; one question is drawn per detection page.
    pub questions: Vec<String>,

    /// Remote model name.
    pub model: String,

    /// Retry policy for remote generation.
    pub retry: RetryConfig,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            watermarks: vec!["acrostic".to_string()],
            acrostic: AcrosticConfig::default(),
            mark_prob: 0.5,
            page_count: 4,
            allow_tab_navigation: false,
            allow_prev: false,
            include_demographics: false,
            terms: TERMS_TEXT.to_string(),
            min_reasoning_chars: 30,
            min_word_count: 100,
            questions: Vec::new(),
            model: "gemini-flash-latest".to_string(),
            retry: RetryConfig::default(),
        }
    }
}

impl SurveyConfig {
    /// Load configuration from an explicit path, or from the default
    /// location, falling back to defaults when no file exists there.
    ///
    /// An explicit path that cannot be read is an error; a missing file at
    /// the default location is not.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::config_path();
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    tracing::debug!(path = %path.display(), "no config file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load and validate configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|err| match err {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;
        tracing::info!(path = %path.display(), "loaded survey config");
        Ok(config)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.mark_prob) {
            return Err(ConfigError::Invalid {
                field: "mark_prob",
                reason: format!("{} is not a probability in [0, 1]", self.mark_prob),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "retry.max_attempts",
                reason: "at least one attempt is required".to_string(),
            });
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Invalid {
                field: "retry.initial_delay_ms",
                reason: format!(
                    "{} exceeds retry.max_delay_ms ({})",
                    self.retry.initial_delay_ms, self.retry.max_delay_ms
                ),
            });
        }
        if self.acrostic.mark.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "acrostic.mark",
                reason: "secret word must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Default config file path in the platform config directory.
    pub fn config_path() -> PathBuf {
        directories::ProjectDirs::from("org", "WatermarkStudy", "WDS")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
    }
}

// =============================================================================
// ACROSTIC
// =============================================================================

/// Secret word and position description for the acrostic watermark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcrosticConfig {
    /// Word the hidden letters must spell.
    pub mark: String,

    /// Natural-language description of where the letters are hidden.
    pub position: String,
}

impl Default for AcrosticConfig {
    fn default() -> Self {
        Self {
            mark: "abigail".to_string(),
            position: "the initial letter in the first word of each sentence".to_string(),
        }
    }
}

// =============================================================================
// RETRY
// =============================================================================

/// Serialized retry settings, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay_ms: u64,
    /// Upper bound of the exponential delay.
    pub max_delay_ms: u64,
    /// Upper bound of the random jitter added to each delay.
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 1_000,
            max_delay_ms: 10_000,
            jitter_ms: 1_000,
        }
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        RetryPolicy {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: Duration::from_millis(config.jitter_ms),
        }
    }
}
