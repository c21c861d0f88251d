//! Survey composition and message routing.
//!
//! A [`Survey`] lays out the wizard (introduction, optional demographics,
//! detection assignments, closing page), dispatches generation requests on
//! behalf of detection pages, and applies worker results through
//! [`Survey::update`]. Results carry the [`PageId`] of the page that asked,
//! so a result that arrives after the participant moved on still lands on
//! its own page.

mod detection;
mod info;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

pub use detection::{
    DetectionPage, DetectionPhase, DetectionRecord, DetectionSettings, GENERATING_TEXT, Judgment,
    ResponseStep, Verdict, WATERMARK_FAILED_TEXT, WATERMARKING_TEXT, wrap_prompt,
};
pub use info::{
    CLOSING_TEXT, Degree, DemographicsPage, Gender, INTRO_TEXT, InfoPage, TERMS_TEXT, age_brackets,
};

use crate::config::SurveyConfig;
use crate::dispatch::{Dispatcher, GenerationOutcome};
use crate::error::{Result, SurveyError};
use crate::generation::TextGenerator;
use crate::watermark::{Watermark, WatermarkRegistry};
use crate::wizard::{NavigationState, PageId, Refusal, Transition, Wizard, WizardOptions};

// =============================================================================
// PAGES AND MESSAGES
// =============================================================================

/// Every kind of page a survey holds.
#[derive(Debug, Clone)]
pub enum SurveyPage {
    Info(InfoPage),
    Demographics(DemographicsPage),
    Detection(Box<DetectionPage>),
}

impl SurveyPage {
    /// Only detection pages can be invalid.
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Detection(page) => page.is_valid(),
            Self::Info(_) | Self::Demographics(_) => true,
        }
    }

    pub fn as_detection(&self) -> Option<&DetectionPage> {
        match self {
            Self::Detection(page) => Some(page.as_ref()),
            _ => None,
        }
    }
}

/// Worker results routed back to their page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurveyMessage {
    /// The model answered the page's prompt.
    ResponseReady {
        page: PageId,
        outcome: GenerationOutcome,
    },
    /// The page's watermark has been applied to the answer.
    WatermarkApplied {
        page: PageId,
        outcome: GenerationOutcome,
    },
}

impl SurveyMessage {
    pub fn page(&self) -> PageId {
        match self {
            Self::ResponseReady { page, .. } | Self::WatermarkApplied { page, .. } => *page,
        }
    }
}

/// Everything collected in one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveySummary {
    pub participant: Option<String>,
    pub started_at: DateTime<Utc>,
    /// When the summary was taken.
    pub finished_at: DateTime<Utc>,
    /// The watermark drawn for this session.
    pub watermark: Option<String>,
    /// When the terms were accepted; `None` when there were none to accept.
    pub terms_accepted_at: Option<DateTime<Utc>>,
    pub demographics: Option<DemographicsPage>,
    pub pages: Vec<DetectionRecord>,
}

impl SurveySummary {
    /// Confirmed pages judged correctly.
    pub fn correct_count(&self) -> usize {
        self.pages.iter().filter(|p| p.correct == Some(true)).count()
    }

    /// Pages that were confirmed.
    pub fn confirmed_count(&self) -> usize {
        self.pages.iter().filter(|p| p.correct.is_some()).count()
    }
}

// =============================================================================
// SURVEY
// =============================================================================

/// One participant session.
pub struct Survey {
    wizard: Wizard<SurveyPage>,
    dispatcher: Dispatcher<SurveyMessage>,
    generator: Arc<dyn TextGenerator>,
    watermark: Option<Watermark>,
    participant: Option<String>,
    terms: Option<String>,
    terms_accepted_at: Option<DateTime<Utc>>,
    started_at: DateTime<Utc>,
}

impl Survey {
    /// Lay out a survey with fresh randomness.
    pub fn new(config: &SurveyConfig, generator: Arc<dyn TextGenerator>) -> Self {
        Self::with_rng(config, generator, &mut rand::rng())
    }

    /// Lay out a survey drawing the watermark, questions and assignments
    /// from `rng`.
    ///
    /// One watermark is drawn from the active set for the whole session;
    /// each detection page then decides on its own whether it uses it.
    pub fn with_rng<R: Rng>(
        config: &SurveyConfig,
        generator: Arc<dyn TextGenerator>,
        rng: &mut R,
    ) -> Self {
        let registry = WatermarkRegistry::from_config(config, Arc::clone(&generator));
        let watermark = registry.active().choose(rng).map(|w| (*w).clone());
        match &watermark {
            Some(w) => tracing::debug!(watermark = w.name(), "session watermark drawn"),
            None => tracing::warn!("no active watermark, every page shows raw output"),
        }

        let mut wizard = Wizard::new(WizardOptions {
            allow_tab_navigation: config.allow_tab_navigation,
            allow_prev: config.allow_prev,
        });
        wizard.add_page(SurveyPage::Info(InfoPage::introduction()), "Introduction");
        if config.include_demographics {
            wizard.add_page(
                SurveyPage::Demographics(DemographicsPage::default()),
                "About you",
            );
        }

        let settings = DetectionSettings::from(config);
        for i in 0..config.page_count {
            let page = DetectionPage::new(rng, &config.questions, watermark.as_ref(), settings);
            wizard.add_page_with_validator(
                SurveyPage::Detection(Box::new(page)),
                format!("Assignment {}", i + 1),
                SurveyPage::is_valid,
            );
        }
        wizard.add_page(SurveyPage::Info(InfoPage::closing()), "Thanks for participating");
        wizard.select_page(0);

        tracing::info!(
            pages = wizard.len(),
            assignments = config.page_count,
            "survey ready"
        );

        Self {
            wizard,
            dispatcher: Dispatcher::new(),
            generator,
            watermark,
            participant: None,
            terms: Some(config.terms.trim().to_string()).filter(|t| !t.is_empty()),
            terms_accepted_at: None,
            started_at: Utc::now(),
        }
    }

    /// Attach a participant identifier to the summary.
    #[must_use]
    pub fn with_participant(mut self, participant: impl Into<String>) -> Self {
        self.participant = Some(participant.into());
        self
    }

    // -------------------------------------------------------------------------
    // State
    // -------------------------------------------------------------------------

    pub fn wizard(&self) -> &Wizard<SurveyPage> {
        &self.wizard
    }

    pub fn navigation(&self) -> &NavigationState {
        self.wizard.navigation()
    }

    pub fn current_id(&self) -> Option<PageId> {
        self.wizard.current_id()
    }

    pub fn current_page(&self) -> Option<&SurveyPage> {
        self.wizard.current_page()
    }

    /// The session's watermark, if any was active.
    pub fn watermark(&self) -> Option<&Watermark> {
        self.watermark.as_ref()
    }

    /// Whether a request is running or its result is waiting.
    pub fn is_busy(&self) -> bool {
        self.dispatcher.is_busy()
    }

    /// Terms shown before the survey starts, if any.
    pub fn terms(&self) -> Option<&str> {
        self.terms.as_deref()
    }

    /// Whether the participant still has to accept the terms. Until then
    /// prompts are refused and the wizard does not advance.
    pub fn needs_consent(&self) -> bool {
        self.terms.is_some() && self.terms_accepted_at.is_none()
    }

    /// Record acceptance of the terms. Only the first acceptance counts.
    pub fn accept_terms(&mut self) {
        if self.terms.is_some() && self.terms_accepted_at.is_none() {
            self.terms_accepted_at = Some(Utc::now());
            tracing::info!("terms accepted");
        }
    }

    /// Whether the closing page is selected.
    pub fn is_finished(&self) -> bool {
        self.wizard
            .current_index()
            .is_some_and(|i| i + 1 == self.wizard.len())
    }

    // -------------------------------------------------------------------------
    // Participant actions
    // -------------------------------------------------------------------------

    /// Submit a prompt on a detection page. Returns whether a request was
    /// dispatched (blank prompts are ignored).
    pub fn submit_prompt(&mut self, page: PageId, text: &str) -> Result<bool> {
        if self.needs_consent() {
            return Err(SurveyError::TermsNotAccepted);
        }
        let wrapped = self.edit_detection(page, |d| d.submit_prompt(text))?;
        let Some(wrapped) = wrapped else {
            return Ok(false);
        };

        tracing::debug!(%page, prompt_chars = wrapped.chars().count(), "dispatching prompt");
        let generator = Arc::clone(&self.generator);
        self.dispatcher.dispatch(
            move || generator.generate(wrapped.trim()),
            move |outcome| SurveyMessage::ResponseReady { page, outcome },
        );
        Ok(true)
    }

    /// Run `f` against a detection page, then re-evaluate navigation.
    pub fn edit_detection<R>(
        &mut self,
        page: PageId,
        f: impl FnOnce(&mut DetectionPage) -> Result<R>,
    ) -> Result<R> {
        self.wizard
            .update_page(page, |p| match p {
                SurveyPage::Detection(d) => f(d.as_mut()),
                _ => Err(SurveyError::NotInteractive(page)),
            })
            .unwrap_or(Err(SurveyError::UnknownPage(page)))
    }

    /// Run `f` against the demographics page.
    pub fn edit_demographics<R>(
        &mut self,
        page: PageId,
        f: impl FnOnce(&mut DemographicsPage) -> R,
    ) -> Result<R> {
        self.wizard
            .update_page(page, |p| match p {
                SurveyPage::Demographics(d) => Ok(f(d)),
                _ => Err(SurveyError::NotInteractive(page)),
            })
            .unwrap_or(Err(SurveyError::UnknownPage(page)))
    }

    /// The "Confirm" control: lock the current detection page and move on.
    ///
    /// Nothing is locked when the page is incomplete or the terms are still
    /// pending; the refusal comes back as [`Refusal::Invalid`].
    pub fn advance(&mut self) -> Transition {
        if self.needs_consent() {
            tracing::debug!("advance refused before the terms were accepted");
            return Transition::Refused(Refusal::Invalid);
        }
        let Some(current) = self.wizard.current_id() else {
            return self.wizard.next_page();
        };
        if !self.wizard.is_page_valid(current) {
            return Transition::Refused(Refusal::Invalid);
        }

        let needs_confirm = self
            .wizard
            .page(current)
            .and_then(SurveyPage::as_detection)
            .is_some_and(|d| d.phase() != DetectionPhase::Locked);
        if needs_confirm
            && let Err(err) = self.edit_detection(current, DetectionPage::confirm_choices)
        {
            tracing::warn!(page = %current, error = %err, "confirmation failed");
            return Transition::Refused(Refusal::Invalid);
        }
        self.wizard.next_page()
    }

    pub fn back(&mut self) -> Transition {
        self.wizard.prev_page()
    }

    pub fn select_tab(&mut self, index: usize) -> Transition {
        if self.needs_consent() {
            return Transition::Refused(Refusal::Invalid);
        }
        self.wizard.tab_selected(index)
    }

    // -------------------------------------------------------------------------
    // Worker results
    // -------------------------------------------------------------------------

    /// Apply one worker result to the page it belongs to.
    pub fn update(&mut self, message: SurveyMessage) -> Result<()> {
        match message {
            SurveyMessage::ResponseReady { page, outcome } => {
                tracing::debug!(%page, ok = outcome.ok, "response received");
                let step = self.edit_detection(page, |d| d.receive_response(outcome))?;
                if let ResponseStep::ApplyWatermark { text, watermark } = step {
                    tracing::debug!(%page, watermark = watermark.name(), "applying watermark");
                    self.dispatcher.dispatch(
                        move || watermark.apply(&text),
                        move |outcome| SurveyMessage::WatermarkApplied { page, outcome },
                    );
                }
                Ok(())
            }
            SurveyMessage::WatermarkApplied { page, outcome } => {
                tracing::debug!(%page, ok = outcome.ok, "watermarked response received");
                self.edit_detection(page, |d| d.receive_watermarked(outcome))
            }
        }
    }

    /// Apply every ready result without blocking. Returns how many were
    /// applied.
    pub fn pump(&mut self) -> usize {
        let messages = self.dispatcher.try_drain();
        let count = messages.len();
        for message in messages {
            self.apply_logged(message);
        }
        count
    }

    /// Wait up to `timeout` for one result and apply it.
    pub fn wait_for_result(&mut self, timeout: Duration) -> bool {
        match self.dispatcher.recv_timeout(timeout) {
            Some(message) => {
                self.apply_logged(message);
                true
            }
            None => false,
        }
    }

    fn apply_logged(&mut self, message: SurveyMessage) {
        let page = message.page();
        if let Err(err) = self.update(message) {
            tracing::warn!(%page, error = %err, "dropping worker result");
        }
    }

    // -------------------------------------------------------------------------
    // Summary
    // -------------------------------------------------------------------------

    /// Collected answers of every page.
    pub fn summary(&self) -> SurveySummary {
        let mut demographics = None;
        let mut pages = Vec::new();
        for (_, _, page) in self.wizard.pages() {
            match page {
                SurveyPage::Detection(d) => pages.push(d.record()),
                SurveyPage::Demographics(d) => demographics = Some(d.clone()),
                SurveyPage::Info(_) => {}
            }
        }
        SurveySummary {
            participant: self.participant.clone(),
            started_at: self.started_at,
            finished_at: Utc::now(),
            watermark: self.watermark.as_ref().map(|w| w.name().to_string()),
            terms_accepted_at: self.terms_accepted_at,
            demographics,
            pages,
        }
    }
}
