//! Core of the watermark detection survey.
//!
//! - [`wizard`]: paginated wizard with per-page validity gating
//! - [`dispatch`]: background work delivered to a single-consumer inbox
//! - [`generation`]: the text-generation seam and its retry wrapper
//! - [`watermark`]: watermark transforms and the registry that enables them
//! - [`survey`]: the pages of a session and the routing of worker results
//!
//! None of this depends on a UI toolkit; a front end drives a
//! [`survey::Survey`] and renders its pages.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod generation;
pub mod survey;
pub mod timer;
pub mod watermark;
pub mod wizard;

pub use config::SurveyConfig;
pub use dispatch::{Dispatcher, GenerationOutcome};
pub use error::{ConfigError, GenerationError, SurveyError};
pub use generation::{EchoGenerator, RetryPolicy, RetryingGenerator, TextGenerator};
pub use survey::{Survey, SurveyMessage, SurveyPage, SurveySummary};
pub use watermark::{Watermark, WatermarkRegistry};
pub use wizard::{PageId, Transition, Wizard};
