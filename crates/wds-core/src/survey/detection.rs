//! The detection assignment page.
//!
//! The participant writes a prompt, the model answers, the answer may be
//! watermarked, and the participant says whether they think it was. The
//! watermark assignment is drawn once when the page is built and never
//! changes.

use std::fmt;

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::config::{QUESTION_PLACEHOLDER, SurveyConfig};
use crate::dispatch::GenerationOutcome;
use crate::error::{Result, SurveyError};
use crate::timer::Stopwatch;
use crate::watermark::Watermark;

/// Text shown while the model is answering.
pub const GENERATING_TEXT: &str = "Generating response...";

/// Text shown while the watermark is being applied.
pub const WATERMARKING_TEXT: &str = "Watermarking...";

/// Text shown when applying the watermark failed.
pub const WATERMARK_FAILED_TEXT: &str =
    "Error: the response could not be prepared. Please submit your prompt again.";

// =============================================================================
// TYPES
// =============================================================================

/// The participant's belief about the shown text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Judgment {
    /// "This text is watermarked."
    Watermarked,
    /// "This text is not watermarked."
    NotWatermarked,
}

/// Where the page is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionPhase {
    AwaitingPrompt,
    GeneratingResponse,
    ApplyingWatermark,
    AwaitingJudgment,
    Locked,
}

/// What the caller must do after a model response arrived.
#[derive(Debug, Clone)]
pub enum ResponseStep {
    /// The request failed; the error is shown and the prompt re-enabled.
    Failed,
    /// The text is shown as is.
    ShowText,
    /// The text must go through `watermark` before it can be shown.
    ApplyWatermark {
        /// Raw model output.
        text: String,
        /// The page's assigned watermark.
        watermark: Watermark,
    },
}

/// Result of confirming a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// What the participant declared.
    pub judgment: Judgment,
    /// Whether the declaration matched the assignment.
    pub correct: bool,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.correct { "Correct!" } else { "Incorrect" })
    }
}

/// Thresholds and probabilities for detection pages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionSettings {
    /// Probability that the page is assigned the watermark.
    pub mark_prob: f64,
    /// Minimum characters per justification.
    pub min_reasoning_chars: usize,
    /// Minimum answer length requested from the model.
    pub min_word_count: usize,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self::from(&SurveyConfig::default())
    }
}

impl From<&SurveyConfig> for DetectionSettings {
    fn from(config: &SurveyConfig) -> Self {
        Self {
            mark_prob: config.mark_prob,
            min_reasoning_chars: config.min_reasoning_chars,
            min_word_count: config.min_word_count,
        }
    }
}

/// Collected answers of one detection page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// Whole seconds spent on the page.
    pub elapsed_secs: u64,
    pub question: String,
    /// Prompt as typed by the participant.
    pub prompt: String,
    /// Text shown to the participant.
    pub response: String,
    /// Name of the assigned watermark, if any.
    pub watermark: Option<String>,
    pub judgment: Option<Judgment>,
    /// Only filled when the participant judged the text watermarked.
    pub detection_reasoning: Option<String>,
    pub removal_reasoning: Option<String>,
    pub edited_text: Option<String>,
    /// Set once the page is confirmed.
    pub correct: Option<bool>,
}

// =============================================================================
// PAGE
// =============================================================================

/// One detection assignment.
#[derive(Debug, Clone)]
pub struct DetectionPage {
    question: String,
    assigned: Option<Watermark>,
    settings: DetectionSettings,
    phase: DetectionPhase,
    prompt: String,
    response: Option<String>,
    judgment: Option<Judgment>,
    detection_reasoning: String,
    removal_reasoning: String,
    edited_text: String,
    verdict: Option<Verdict>,
    stopwatch: Stopwatch,
}

impl DetectionPage {
    /// Build a page, drawing its question and watermark assignment.
    ///
    /// With probability `settings.mark_prob` the page is assigned
    /// `watermark`; otherwise, or when `watermark` is `None`, it shows raw
    /// model output. Probabilities outside `[0, 1]` are clamped and a
    /// non-finite one counts as 0.
    pub fn new<R: Rng>(
        rng: &mut R,
        questions: &[String],
        watermark: Option<&Watermark>,
        settings: DetectionSettings,
    ) -> Self {
        let question = questions
            .choose(rng)
            .map(|q| capitalize(q.trim()))
            .filter(|q| !q.is_empty())
            .unwrap_or_else(|| QUESTION_PLACEHOLDER.to_string());
        let assigned = watermark
            .filter(|_| rng.random_bool(assignment_probability(settings.mark_prob)))
            .cloned();

        Self {
            question,
            assigned,
            settings,
            phase: DetectionPhase::AwaitingPrompt,
            prompt: String::new(),
            response: None,
            judgment: None,
            detection_reasoning: String::new(),
            removal_reasoning: String::new(),
            edited_text: String::new(),
            verdict: None,
            stopwatch: Stopwatch::start(),
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn phase(&self) -> DetectionPhase {
        self.phase
    }

    /// Whether the page was assigned a watermark. Not for display.
    pub fn is_watermarked(&self) -> bool {
        self.assigned.is_some()
    }

    /// The last submitted prompt.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Text in the response area, including progress and failure texts.
    pub fn response_text(&self) -> Option<&str> {
        match self.phase {
            DetectionPhase::GeneratingResponse => Some(GENERATING_TEXT),
            DetectionPhase::ApplyingWatermark => Some(WATERMARKING_TEXT),
            _ => self.response.as_deref(),
        }
    }

    pub fn judgment(&self) -> Option<Judgment> {
        self.judgment
    }

    pub fn detection_reasoning(&self) -> &str {
        &self.detection_reasoning
    }

    pub fn removal_reasoning(&self) -> &str {
        &self.removal_reasoning
    }

    pub fn edited_text(&self) -> &str {
        &self.edited_text
    }

    /// Set once the page is confirmed.
    pub fn verdict(&self) -> Option<Verdict> {
        self.verdict
    }

    pub fn stopwatch(&self) -> &Stopwatch {
        &self.stopwatch
    }

    pub fn settings(&self) -> &DetectionSettings {
        &self.settings
    }

    /// Whether the removal justification and the text editor are open.
    pub fn is_removal_unlocked(&self) -> bool {
        self.judgment == Some(Judgment::Watermarked)
            && char_len(&self.detection_reasoning) >= self.settings.min_reasoning_chars
    }

    // -------------------------------------------------------------------------
    // Prompt and responses
    // -------------------------------------------------------------------------

    /// Accept a prompt. Returns the text to send to the model, or `None` for
    /// a blank prompt (which changes nothing).
    pub fn submit_prompt(&mut self, text: &str) -> Result<Option<String>> {
        self.ensure_unlocked()?;
        if self.phase != DetectionPhase::AwaitingPrompt {
            return Err(SurveyError::NotAwaitingPrompt);
        }
        if text.trim().is_empty() {
            return Ok(None);
        }

        self.prompt = text.to_string();
        self.response = None;
        self.phase = DetectionPhase::GeneratingResponse;
        Ok(Some(wrap_prompt(text, self.settings.min_word_count)))
    }

    /// Handle the model's answer.
    pub fn receive_response(&mut self, outcome: GenerationOutcome) -> Result<ResponseStep> {
        if self.phase != DetectionPhase::GeneratingResponse {
            return Err(SurveyError::UnexpectedResult);
        }
        if !outcome.ok {
            self.fail(outcome.text);
            return Ok(ResponseStep::Failed);
        }

        match &self.assigned {
            Some(watermark) => {
                self.phase = DetectionPhase::ApplyingWatermark;
                Ok(ResponseStep::ApplyWatermark {
                    text: outcome.text,
                    watermark: watermark.clone(),
                })
            }
            None => {
                self.show(outcome.text);
                Ok(ResponseStep::ShowText)
            }
        }
    }

    /// Handle the watermarked text.
    pub fn receive_watermarked(&mut self, outcome: GenerationOutcome) -> Result<()> {
        if self.phase != DetectionPhase::ApplyingWatermark {
            return Err(SurveyError::UnexpectedResult);
        }
        if outcome.ok {
            self.show(outcome.text);
        } else {
            tracing::warn!(error = %outcome.text, "watermark application failed");
            self.fail(WATERMARK_FAILED_TEXT.to_string());
        }
        Ok(())
    }

    fn show(&mut self, text: String) {
        self.edited_text.clone_from(&text);
        self.response = Some(text);
        self.judgment = None;
        self.phase = DetectionPhase::AwaitingJudgment;
    }

    fn fail(&mut self, text: String) {
        self.response = Some(text);
        self.phase = DetectionPhase::AwaitingPrompt;
    }

    // -------------------------------------------------------------------------
    // Judgment
    // -------------------------------------------------------------------------

    /// Record the participant's belief; replaces any earlier choice.
    pub fn choose(&mut self, judgment: Judgment) -> Result<()> {
        self.ensure_judging()?;
        self.judgment = Some(judgment);
        Ok(())
    }

    /// Why the participant thinks the text is watermarked.
    pub fn set_detection_reasoning(&mut self, text: &str) -> Result<()> {
        self.ensure_judging()?;
        if self.judgment != Some(Judgment::Watermarked) {
            return Err(SurveyError::FieldLocked("detection reasoning"));
        }
        self.detection_reasoning = text.to_string();
        Ok(())
    }

    /// How the participant would remove the watermark.
    pub fn set_removal_reasoning(&mut self, text: &str) -> Result<()> {
        self.ensure_judging()?;
        if !self.is_removal_unlocked() {
            return Err(SurveyError::FieldLocked("removal reasoning"));
        }
        self.removal_reasoning = text.to_string();
        Ok(())
    }

    /// The participant's edit of the response with the watermark removed.
    pub fn set_edited_text(&mut self, text: &str) -> Result<()> {
        self.ensure_judging()?;
        if !self.is_removal_unlocked() {
            return Err(SurveyError::FieldLocked("edited text"));
        }
        self.edited_text = text.to_string();
        Ok(())
    }

    /// Whether the page may be left forward.
    pub fn is_valid(&self) -> bool {
        match self.judgment {
            None => false,
            Some(Judgment::NotWatermarked) => true,
            Some(Judgment::Watermarked) => {
                let min = self.settings.min_reasoning_chars;
                char_len(&self.detection_reasoning) >= min
                    && char_len(&self.removal_reasoning) >= min
            }
        }
    }

    /// Lock the page and grade the participant's judgment.
    pub fn confirm_choices(&mut self) -> Result<Verdict> {
        self.ensure_unlocked()?;
        let judgment = match self.judgment {
            Some(judgment) if self.is_valid() => judgment,
            _ => return Err(SurveyError::Incomplete),
        };

        let verdict = Verdict {
            judgment,
            correct: self.assigned.is_some() == (judgment == Judgment::Watermarked),
        };
        self.stopwatch.stop();
        self.phase = DetectionPhase::Locked;
        self.verdict = Some(verdict);
        tracing::info!(
            correct = verdict.correct,
            elapsed_secs = self.stopwatch.elapsed().as_secs(),
            "detection page confirmed"
        );
        Ok(verdict)
    }

    /// Snapshot of the collected answers.
    pub fn record(&self) -> DetectionRecord {
        let marked = self.judgment == Some(Judgment::Watermarked);
        let if_marked = |text: &str| marked.then(|| text.trim().to_string());

        DetectionRecord {
            elapsed_secs: self.stopwatch.elapsed().as_secs(),
            question: self.question.clone(),
            prompt: self.prompt.clone(),
            response: self.response.clone().unwrap_or_default(),
            watermark: self.assigned.as_ref().map(|w| w.name().to_string()),
            judgment: self.judgment,
            detection_reasoning: if_marked(&self.detection_reasoning),
            removal_reasoning: if_marked(&self.removal_reasoning),
            edited_text: if_marked(&self.edited_text),
            correct: self.verdict.map(|v| v.correct),
        }
    }

    fn ensure_unlocked(&self) -> Result<()> {
        if self.phase == DetectionPhase::Locked {
            Err(SurveyError::PageLocked)
        } else {
            Ok(())
        }
    }

    fn ensure_judging(&self) -> Result<()> {
        self.ensure_unlocked()?;
        if self.phase == DetectionPhase::AwaitingJudgment {
            Ok(())
        } else {
            Err(SurveyError::NotAwaitingJudgment)
        }
    }
}

/// Append the answer-length and plaintext instructions to a prompt.
pub fn wrap_prompt(prompt: &str, min_word_count: usize) -> String {
    format!(
        "{prompt}\nYour answer must be at least {min_word_count} words long. \
         Your answer must be entirely plaintext and contain NO highlights or formatting \
         (no bold, italic or any markdown)."
    )
}

/// First character upper case, the rest lower case.
fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

fn assignment_probability(mark_prob: f64) -> f64 {
    if mark_prob.is_finite() {
        mark_prob.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn char_len(text: &str) -> usize {
    text.trim().chars().count()
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn upper() -> Watermark {
        Watermark::pure("upper", str::to_uppercase)
    }

    fn page(mark_prob: f64) -> DetectionPage {
        let settings = DetectionSettings {
            mark_prob,
            ..DetectionSettings::default()
        };
        DetectionPage::new(&mut StdRng::seed_from_u64(1), &[], Some(&upper()), settings)
    }

    fn judging(mark_prob: f64) -> DetectionPage {
        let mut p = page(mark_prob);
        p.submit_prompt("Tell me about owls").unwrap();
        match p.receive_response(GenerationOutcome::success("owls hoot")).unwrap() {
            ResponseStep::ApplyWatermark { text, watermark } => {
                p.receive_watermarked(watermark.apply(&text).into()).unwrap();
            }
            ResponseStep::ShowText => {}
            ResponseStep::Failed => unreachable!(),
        }
        p
    }

    const LONG: &str = "The capital letters spell a hidden word.";

    #[test]
    fn placeholder_question_without_bank() {
        assert_eq!(page(0.5).question(), QUESTION_PLACEHOLDER);
    }

    #[test]
    fn question_is_trimmed_and_capitalized() {
        let questions = vec!["  why is the SKY blue?\n".to_string()];
        let p = DetectionPage::new(
            &mut StdRng::seed_from_u64(3),
            &questions,
            None,
            DetectionSettings::default(),
        );
        assert_eq!(p.question(), "Why is the sky blue?");
    }

    #[test]
    fn wrapped_prompt_text() {
        insta::assert_snapshot!(wrap_prompt("Hi", 100), @r"
        Hi
        Your answer must be at least 100 words long. Your answer must be entirely plaintext and contain NO highlights or formatting (no bold, italic or any markdown).
        ");
    }

    #[test]
    fn blank_prompt_is_ignored() {
        let mut p = page(0.0);
        assert_eq!(p.submit_prompt("  \n").unwrap(), None);
        assert_eq!(p.phase(), DetectionPhase::AwaitingPrompt);
    }

    #[test]
    fn second_prompt_while_generating_is_refused() {
        let mut p = page(0.0);
        p.submit_prompt("first").unwrap();
        assert_eq!(p.response_text(), Some(GENERATING_TEXT));
        assert_eq!(p.submit_prompt("second"), Err(SurveyError::NotAwaitingPrompt));
    }

    #[test]
    fn failure_reenables_prompt() {
        let mut p = page(0.0);
        p.submit_prompt("q").unwrap();
        let step = p
            .receive_response(GenerationOutcome::failure("503 overloaded"))
            .unwrap();
        assert!(matches!(step, ResponseStep::Failed));
        assert_eq!(p.phase(), DetectionPhase::AwaitingPrompt);
        assert_eq!(p.response_text(), Some("Error: 503 overloaded"));
        assert!(p.submit_prompt("again").unwrap().is_some());
    }

    #[test]
    fn unmarked_page_shows_raw_text() {
        let p = judging(0.0);
        assert!(!p.is_watermarked());
        assert_eq!(p.response_text(), Some("owls hoot"));
        assert_eq!(p.phase(), DetectionPhase::AwaitingJudgment);
    }

    #[test]
    fn marked_page_shows_watermarked_text() {
        let p = judging(1.0);
        assert!(p.is_watermarked());
        assert_eq!(p.response_text(), Some("OWLS HOOT"));
        assert_eq!(p.edited_text(), "OWLS HOOT");
    }

    #[test]
    fn watermark_failure_is_surfaced() {
        let mut p = page(1.0);
        p.submit_prompt("q").unwrap();
        p.receive_response(GenerationOutcome::success("text")).unwrap();
        assert_eq!(p.response_text(), Some(WATERMARKING_TEXT));

        p.receive_watermarked(GenerationOutcome::failure("boom")).unwrap();
        assert_eq!(p.phase(), DetectionPhase::AwaitingPrompt);
        assert_eq!(p.response_text(), Some(WATERMARK_FAILED_TEXT));
    }

    #[test]
    fn late_result_is_rejected() {
        let mut p = page(0.0);
        assert_eq!(
            p.receive_response(GenerationOutcome::success("x")).unwrap_err(),
            SurveyError::UnexpectedResult
        );
    }

    #[test]
    fn judgments_are_exclusive() {
        let mut p = judging(0.0);
        p.choose(Judgment::Watermarked).unwrap();
        p.choose(Judgment::NotWatermarked).unwrap();
        assert_eq!(p.judgment(), Some(Judgment::NotWatermarked));
        assert!(p.is_valid());
    }

    #[test]
    fn judgment_before_response_is_refused() {
        let mut p = page(0.0);
        assert_eq!(
            p.choose(Judgment::Watermarked),
            Err(SurveyError::NotAwaitingJudgment)
        );
        assert!(!p.is_valid());
    }

    #[test]
    fn watermarked_needs_both_reasonings() {
        let mut p = judging(1.0);
        p.choose(Judgment::Watermarked).unwrap();
        assert!(!p.is_valid());
        assert_eq!(
            p.set_removal_reasoning(LONG),
            Err(SurveyError::FieldLocked("removal reasoning"))
        );

        p.set_detection_reasoning("too short").unwrap();
        assert!(!p.is_removal_unlocked());

        p.set_detection_reasoning(LONG).unwrap();
        assert!(p.is_removal_unlocked());
        assert!(!p.is_valid());

        p.set_removal_reasoning(LONG).unwrap();
        assert!(p.is_valid());
    }

    #[test]
    fn reasoning_length_ignores_surrounding_whitespace() {
        let mut p = judging(1.0);
        p.choose(Judgment::Watermarked).unwrap();
        p.set_detection_reasoning(&format!("   {}   ", "x".repeat(29)))
            .unwrap();
        assert!(!p.is_removal_unlocked());
    }

    #[test]
    fn confirm_grades_and_locks() {
        let mut p = judging(1.0);
        p.choose(Judgment::Watermarked).unwrap();
        p.set_detection_reasoning(LONG).unwrap();
        p.set_removal_reasoning(LONG).unwrap();
        p.set_edited_text("owls hoot").unwrap();

        let verdict = p.confirm_choices().unwrap();
        assert!(verdict.correct);
        assert_eq!(verdict.to_string(), "Correct!");
        assert_eq!(p.phase(), DetectionPhase::Locked);
        assert!(!p.stopwatch().is_running());
        assert_eq!(p.choose(Judgment::NotWatermarked), Err(SurveyError::PageLocked));
        assert_eq!(p.confirm_choices(), Err(SurveyError::PageLocked));

        let record = p.record();
        assert_eq!(record.watermark.as_deref(), Some("upper"));
        assert_eq!(record.edited_text.as_deref(), Some("owls hoot"));
        assert_eq!(record.correct, Some(true));
    }

    #[test]
    fn wrong_judgment_is_incorrect() {
        let mut p = judging(0.0);
        p.choose(Judgment::Watermarked).unwrap();
        p.set_detection_reasoning(LONG).unwrap();
        p.set_removal_reasoning(LONG).unwrap();
        let verdict = p.confirm_choices().unwrap();
        assert!(!verdict.correct);
        assert_eq!(verdict.to_string(), "Incorrect");
    }

    #[test]
    fn incomplete_page_cannot_be_confirmed() {
        let mut p = judging(0.0);
        assert_eq!(p.confirm_choices(), Err(SurveyError::Incomplete));
    }

    #[test]
    fn record_omits_reasoning_for_not_watermarked() {
        let mut p = judging(0.0);
        p.choose(Judgment::NotWatermarked).unwrap();
        let record = p.record();
        assert_eq!(record.detection_reasoning, None);
        assert_eq!(record.edited_text, None);
        assert_eq!(record.correct, None);
        assert_eq!(record.prompt, "Tell me about owls");
    }

    #[test]
    fn mark_prob_extremes_over_many_pages() {
        let mut rng = StdRng::seed_from_u64(2024);
        let wm = upper();
        let build = |rng: &mut StdRng, mark_prob| {
            let settings = DetectionSettings {
                mark_prob,
                ..DetectionSettings::default()
            };
            DetectionPage::new(rng, &[], Some(&wm), settings)
        };

        assert!((0..1000).all(|_| !build(&mut rng, 0.0).is_watermarked()));
        assert!((0..1000).all(|_| build(&mut rng, 1.0).is_watermarked()));
    }

    #[test]
    fn no_survey_watermark_means_never_marked() {
        let mut rng = StdRng::seed_from_u64(5);
        let settings = DetectionSettings {
            mark_prob: 1.0,
            ..DetectionSettings::default()
        };
        let p = DetectionPage::new(&mut rng, &[], None, settings);
        assert!(!p.is_watermarked());
    }

    #[test]
    fn non_finite_mark_prob_never_marks() {
        let mut rng = StdRng::seed_from_u64(11);
        for mark_prob in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let settings = DetectionSettings {
                mark_prob,
                ..DetectionSettings::default()
            };
            let p = DetectionPage::new(&mut rng, &[], Some(&upper()), settings);
            assert!(!p.is_watermarked());
        }
    }

    #[test]
    fn out_of_range_mark_prob_is_clamped() {
        let mut rng = StdRng::seed_from_u64(12);
        let settings = DetectionSettings {
            mark_prob: 7.5,
            ..DetectionSettings::default()
        };
        assert!(DetectionPage::new(&mut rng, &[], Some(&upper()), settings).is_watermarked());
    }
}
