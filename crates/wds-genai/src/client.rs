//! Blocking client for the Gemini `generateContent` endpoint.

use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use wds_core::{GenerationError, TextGenerator};

use crate::error::{GenAiError, Result};
use crate::types::{ApiErrorBody, GenerateContentRequest, GenerateContentResponse};

/// Public API base URL.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Environment variables checked for the API key, in order.
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// User agent string for API requests.
const USER_AGENT_VALUE: &str = concat!("watermark-survey/", env!("CARGO_PKG_VERSION"));

/// Request timeout. Long answers from busy models can take a while.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for one model.
#[derive(Clone)]
pub struct GenAiClient {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GenAiClient {
    /// Creates a client for `model` authenticated with `api_key`.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::blocking::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GenAiError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    /// Creates a client with the key taken from the environment.
    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let key = api_key_from(|name| std::env::var(name).ok())?;
        Self::new(key, model)
    }

    /// Points the client at another server (proxies, tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Endpoint URL for the configured model.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    /// Sends one prompt and returns the generated text.
    pub fn generate_content(&self, prompt: &str) -> Result<String> {
        let url = self.endpoint();
        tracing::debug!(model = %self.model, "Sending generateContent request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&GenerateContentRequest::from_prompt(prompt))
            .send()?;
        let body = handle_response(response)?;

        body.text()
            .ok_or_else(|| GenAiError::EmptyResponse(body.empty_reason()))
    }
}

impl TextGenerator for GenAiClient {
    fn generate(&self, prompt: &str) -> std::result::Result<String, GenerationError> {
        self.generate_content(prompt).map_err(GenerationError::from)
    }
}

impl fmt::Debug for GenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenAiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Looks up the API key with `lookup`, trying [`API_KEY_VARS`] in order.
pub fn api_key_from(lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
    API_KEY_VARS
        .iter()
        .find_map(|name| lookup(name).filter(|v| !v.trim().is_empty()))
        .ok_or(GenAiError::MissingApiKey(API_KEY_VARS[0]))
}

/// Checks the status and parses the JSON body.
fn handle_response(response: reqwest::blocking::Response) -> Result<GenerateContentResponse> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        let err = error_from_body(status, &body);
        tracing::debug!(status = status.as_u16(), error = %err, "generateContent failed");
        return Err(err);
    }

    let text = response.text()?;
    Ok(serde_json::from_str(&text)?)
}

/// Builds an [`GenAiError::Api`] from an error status and its body.
///
/// The status code always leads the message so the retry gate can see a
/// `503` even when the body is not the usual JSON envelope.
pub(crate) fn error_from_body(status: StatusCode, body: &str) -> GenAiError {
    let message = match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(ApiErrorBody { error }) if !error.status.is_empty() => {
            format!("{}: {}", error.status, error.message)
        }
        Ok(ApiErrorBody { error }) => error.message,
        Err(_) if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
        Err(_) => body.trim().to_string(),
    };
    GenAiError::Api {
        code: status.as_u16(),
        message,
    }
}
