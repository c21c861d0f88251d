//! Gemini client for the watermark detection survey.
//!
//! [`GenAiClient`] implements [`wds_core::TextGenerator`] against the
//! `generateContent` REST endpoint. Failures are converted into
//! [`wds_core::GenerationError`] with the HTTP status leading the message,
//! so overload responses are retried by
//! [`wds_core::RetryingGenerator`].
//!
//! ```no_run
//! use wds_core::{RetryingGenerator, TextGenerator};
//! use wds_genai::GenAiClient;
//!
//! let client = GenAiClient::from_env("gemini-flash-latest")?;
//! let generator = RetryingGenerator::new(client);
//! let text = generator.generate("Name three rivers.")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod client;
pub mod error;
pub mod types;

pub use client::{API_KEY_VARS, DEFAULT_BASE_URL, GenAiClient, api_key_from};
pub use error::{GenAiError, Result};
