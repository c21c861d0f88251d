//! Line-oriented front end that drives a [`Survey`].
//!
//! This is the UI loop: it renders the current page, reads one answer at a
//! time, and while a generation request is in flight it waits on the
//! survey's inbox with a short timeout so the spinner keeps turning.
//!
//! Any answer may instead be a command: `:back`, `:page N` or `:quit`.

use std::io::{BufRead, Write};
use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use wds_core::survey::{
    Degree, DetectionPage, DetectionPhase, Gender, Judgment, Survey, SurveyPage, age_brackets,
};
use wds_core::wizard::{PageId, Transition};

use crate::logging::redact_value;

const TICK: Duration = Duration::from_millis(100);

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The participant reached and left the closing page.
    Finished,
    /// Input ended or the participant quit.
    Aborted,
    /// The participant did not accept the terms.
    Declined,
}

/// Navigation typed in place of an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Back,
    /// Zero-based page index.
    Page(usize),
    Quit,
}

/// Parse `:back`, `:page N` (1-based) or `:quit`.
pub fn parse_command(line: &str) -> Option<Command> {
    let rest = line.trim().strip_prefix(':')?;
    let mut parts = rest.split_whitespace();
    match (parts.next()?, parts.next(), parts.next()) {
        ("back", None, None) => Some(Command::Back),
        ("quit" | "q", None, None) => Some(Command::Quit),
        ("page", Some(n), None) => n
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .map(Command::Page),
        _ => None,
    }
}

enum Input {
    Line(String),
    Command(Command),
    Eof,
}

enum Step {
    Stay,
    Done(Completion),
}

enum Answer<T> {
    Value(T),
    Interrupted(Step),
}

#[derive(Clone, Copy)]
enum PageKind {
    Info,
    Demographics,
    Detection,
}

/// Terminal session over any reader and writer.
pub struct Terminal<R, W> {
    input: R,
    output: W,
    spinner: bool,
}

impl<R: BufRead, W: Write> Terminal<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            spinner: false,
        }
    }

    /// Show a spinner on stderr while waiting for the model.
    #[must_use]
    pub fn with_spinner(mut self, enabled: bool) -> Self {
        self.spinner = enabled;
        self
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Drive `survey` until the participant finishes or input ends.
    pub fn run(&mut self, survey: &mut Survey) -> Result<Completion> {
        if survey.needs_consent() && !self.consent(survey)? {
            return Ok(Completion::Declined);
        }
        loop {
            let kind = match survey.current_page() {
                Some(SurveyPage::Info(_)) => PageKind::Info,
                Some(SurveyPage::Demographics(_)) => PageKind::Demographics,
                Some(SurveyPage::Detection(_)) => PageKind::Detection,
                None if survey.wizard().is_empty() => return Ok(Completion::Finished),
                None => {
                    survey.advance();
                    continue;
                }
            };
            let step = match kind {
                PageKind::Info => self.info_page(survey)?,
                PageKind::Demographics => self.demographics_page(survey)?,
                PageKind::Detection => self.detection_page(survey)?,
            };
            if let Step::Done(completion) = step {
                return Ok(completion);
            }
        }
    }

    // =========================================================================
    // PAGES
    // =========================================================================

    /// Show the terms and ask for acceptance. Anything but an explicit yes
    /// declines, apart from unrecognised answers, which ask again.
    fn consent(&mut self, survey: &mut Survey) -> Result<bool> {
        let terms = survey.terms().unwrap_or_default().to_string();
        writeln!(self.output, "Terms and conditions:\n\n{terms}\n")?;
        loop {
            writeln!(self.output, "Accept and continue? [y/n]")?;
            match self.read()? {
                Input::Line(line) => match line.trim().to_lowercase().as_str() {
                    "y" | "yes" => {
                        survey.accept_terms();
                        return Ok(true);
                    }
                    "n" | "no" => break,
                    _ => writeln!(self.output, "Please answer y or n.")?,
                },
                Input::Command(Command::Back | Command::Page(_)) => {
                    writeln!(self.output, "Please accept the terms first.")?;
                }
                Input::Command(Command::Quit) | Input::Eof => break,
            }
        }
        writeln!(self.output, "The terms must be accepted to take part.")?;
        tracing::info!("terms declined");
        Ok(false)
    }

    fn info_page(&mut self, survey: &mut Survey) -> Result<Step> {
        let Some(SurveyPage::Info(page)) = survey.current_page() else {
            return Ok(Step::Stay);
        };
        let (heading, body) = (page.heading.clone(), page.body.clone());
        let last = survey.is_finished();

        self.header(survey)?;
        writeln!(self.output, "{heading}\n\n{body}\n")?;
        writeln!(
            self.output,
            "{}",
            if last {
                "Press Enter to finish."
            } else {
                "Press Enter to continue."
            }
        )?;

        match self.read()? {
            Input::Line(_) if last => Ok(Step::Done(Completion::Finished)),
            Input::Eof if last => Ok(Step::Done(Completion::Finished)),
            Input::Line(_) => {
                self.report(survey.advance())?;
                Ok(Step::Stay)
            }
            other => self.interrupt(survey, other),
        }
    }

    fn demographics_page(&mut self, survey: &mut Survey) -> Result<Step> {
        let Some(id) = survey.current_id() else {
            return Ok(Step::Stay);
        };
        self.header(survey)?;
        writeln!(
            self.output,
            "Optional demographic information. Press Enter to skip a question.\n"
        )?;

        let gender = match self.pick(survey, "Gender:", &owned(&Gender::ALL.map(Gender::label)))? {
            Answer::Value(i) => i.map(|i| Gender::ALL[i]),
            Answer::Interrupted(step) => return Ok(step),
        };
        let degree = match self.pick(
            survey,
            "What degree are you currently pursuing?",
            &owned(&Degree::ALL.map(Degree::label)),
        )? {
            Answer::Value(i) => i.map(|i| Degree::ALL[i]),
            Answer::Interrupted(step) => return Ok(step),
        };
        let brackets = age_brackets();
        let age = match self.pick(survey, "Age:", &brackets)? {
            Answer::Value(i) => i.map(|i| brackets[i].clone()),
            Answer::Interrupted(step) => return Ok(step),
        };
        let uses_ai = match self.pick(survey, "Do you use AI tools often?", &owned(&["Yes", "No"]))? {
            Answer::Value(i) => i.map(|i| i == 0),
            Answer::Interrupted(step) => return Ok(step),
        };

        survey.edit_demographics(id, |d| {
            d.gender = gender;
            d.degree = degree;
            if let Some(age) = &age {
                d.set_age(age);
            }
            d.uses_ai = uses_ai;
        })?;
        self.report(survey.advance())?;
        Ok(Step::Stay)
    }

    fn detection_page(&mut self, survey: &mut Survey) -> Result<Step> {
        let (Some(id), Some(page)) = (
            survey.current_id(),
            survey.current_page().and_then(SurveyPage::as_detection),
        ) else {
            return Ok(Step::Stay);
        };
        let phase = page.phase();
        let question = page.question().to_string();
        let response = page.response_text().map(str::to_string);
        let min_chars = page.settings().min_reasoning_chars;
        let elapsed = page.stopwatch().display();

        self.header(survey)?;
        writeln!(self.output, "Time: {elapsed}")?;
        writeln!(self.output, "Question: {question}\n")?;

        match phase {
            DetectionPhase::GeneratingResponse | DetectionPhase::ApplyingWatermark => {
                self.wait(survey);
                Ok(Step::Stay)
            }
            DetectionPhase::AwaitingPrompt => {
                if let Some(text) = response {
                    writeln!(self.output, "{text}\n")?;
                }
                writeln!(
                    self.output,
                    "Write your prompt, then an empty line to send it:"
                )?;
                let prompt = match self.read_block()? {
                    Input::Line(text) => text,
                    other => return self.interrupt(survey, other),
                };
                tracing::trace!(page = %id, prompt = redact_value(&prompt), "prompt entered");
                if survey.submit_prompt(id, &prompt)? {
                    self.wait(survey);
                }
                Ok(Step::Stay)
            }
            DetectionPhase::AwaitingJudgment => {
                writeln!(self.output, "Response:\n{}\n", response.unwrap_or_default())?;
                self.judge(survey, id, min_chars)
            }
            DetectionPhase::Locked => {
                writeln!(
                    self.output,
                    "This assignment is confirmed.\nPress Enter to continue."
                )?;
                match self.read()? {
                    Input::Line(_) => {
                        self.report(survey.advance())?;
                        Ok(Step::Stay)
                    }
                    other => self.interrupt(survey, other),
                }
            }
        }
    }

    fn judge(&mut self, survey: &mut Survey, id: PageId, min_chars: usize) -> Result<Step> {
        let judgment = loop {
            writeln!(self.output, "Is this text watermarked? [y/n]")?;
            match self.read()? {
                Input::Line(line) => match line.trim().to_lowercase().as_str() {
                    "y" | "yes" => break Judgment::Watermarked,
                    "n" | "no" => break Judgment::NotWatermarked,
                    _ => writeln!(self.output, "Please answer y or n.")?,
                },
                other => return self.interrupt(survey, other),
            }
        };
        survey.edit_detection(id, |d| d.choose(judgment))?;

        if judgment == Judgment::Watermarked {
            let reason = match self.reasoning(survey, "What gave the watermark away?", min_chars)? {
                Answer::Value(text) => text,
                Answer::Interrupted(step) => return Ok(step),
            };
            survey.edit_detection(id, |d| d.set_detection_reasoning(&reason))?;

            let removal = match self.reasoning(
                survey,
                "How would you change the text to remove the watermark?",
                min_chars,
            )? {
                Answer::Value(text) => text,
                Answer::Interrupted(step) => return Ok(step),
            };
            survey.edit_detection(id, |d| d.set_removal_reasoning(&removal))?;

            writeln!(
                self.output,
                "Rewrite the text without the watermark, then an empty line \
                 (an empty answer keeps the text as shown):"
            )?;
            match self.read_block()? {
                Input::Line(text) if text.trim().is_empty() => {}
                Input::Line(text) => survey.edit_detection(id, |d| d.set_edited_text(&text))?,
                other => return self.interrupt(survey, other),
            }
        }

        writeln!(
            self.output,
            "Press Enter to confirm. Your answers cannot be changed afterwards."
        )?;
        match self.read()? {
            Input::Line(_) => {
                self.report(survey.advance())?;
                Ok(Step::Stay)
            }
            other => self.interrupt(survey, other),
        }
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn header(&mut self, survey: &Survey) -> Result<()> {
        let title = survey
            .current_id()
            .and_then(|id| survey.wizard().title(id))
            .unwrap_or_default();
        let progress = survey.navigation().progress;
        writeln!(
            self.output,
            "\n=== {title} ({progress}, {}%) ===",
            progress.percentage()
        )?;
        Ok(())
    }

    fn pick(
        &mut self,
        survey: &mut Survey,
        question: &str,
        options: &[String],
    ) -> Result<Answer<Option<usize>>> {
        loop {
            writeln!(self.output, "{question}")?;
            for (i, option) in options.iter().enumerate() {
                writeln!(self.output, "  {}) {option}", i + 1)?;
            }
            match self.read()? {
                Input::Line(line) if line.trim().is_empty() => return Ok(Answer::Value(None)),
                Input::Line(line) => match line.trim().parse::<usize>() {
                    Ok(n) if (1..=options.len()).contains(&n) => {
                        return Ok(Answer::Value(Some(n - 1)));
                    }
                    _ => writeln!(
                        self.output,
                        "Please enter a number between 1 and {}.",
                        options.len()
                    )?,
                },
                other => return Ok(Answer::Interrupted(self.interrupt(survey, other)?)),
            }
        }
    }

    fn reasoning(
        &mut self,
        survey: &mut Survey,
        question: &str,
        min_chars: usize,
    ) -> Result<Answer<String>> {
        loop {
            writeln!(self.output, "{question} (at least {min_chars} characters)")?;
            match self.read()? {
                Input::Line(line) if line.trim().chars().count() >= min_chars => {
                    return Ok(Answer::Value(line.trim().to_string()));
                }
                Input::Line(_) => writeln!(
                    self.output,
                    "Please write at least {min_chars} characters."
                )?,
                other => return Ok(Answer::Interrupted(self.interrupt(survey, other)?)),
            }
        }
    }

    /// Wait for every in-flight request, applying results as they land.
    fn wait(&mut self, survey: &mut Survey) {
        let spinner = if self.spinner {
            spinner()
        } else {
            ProgressBar::hidden()
        };
        while survey.is_busy() {
            if let Some(text) = survey
                .current_page()
                .and_then(SurveyPage::as_detection)
                .and_then(DetectionPage::response_text)
            {
                spinner.set_message(text.to_string());
            }
            survey.wait_for_result(TICK);
        }
        spinner.finish_and_clear();
    }

    fn interrupt(&mut self, survey: &mut Survey, input: Input) -> Result<Step> {
        match input {
            Input::Eof | Input::Command(Command::Quit) => Ok(Step::Done(Completion::Aborted)),
            Input::Command(Command::Back) => {
                self.report(survey.back())?;
                Ok(Step::Stay)
            }
            Input::Command(Command::Page(index)) => {
                self.report(survey.select_tab(index))?;
                Ok(Step::Stay)
            }
            Input::Line(_) => Ok(Step::Stay),
        }
    }

    fn report(&mut self, transition: Transition) -> Result<()> {
        if let Transition::Refused(refusal) = transition {
            writeln!(self.output, "Cannot move: {refusal}.")?;
        }
        Ok(())
    }

    fn read(&mut self) -> Result<Input> {
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(Input::Eof);
        }
        let line = line.trim_end_matches(['\r', '\n']).to_string();
        Ok(match parse_command(&line) {
            Some(command) => Input::Command(command),
            None => Input::Line(line),
        })
    }

    /// Read lines up to the first empty one.
    fn read_block(&mut self) -> Result<Input> {
        let mut lines = Vec::new();
        loop {
            match self.read()? {
                Input::Line(line) if line.trim().is_empty() => break,
                Input::Line(line) => lines.push(line),
                Input::Eof if !lines.is_empty() => break,
                other => return Ok(other),
            }
        }
        Ok(Input::Line(lines.join("\n")))
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

fn spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(TICK);
    spinner
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command(":back"), Some(Command::Back));
        assert_eq!(parse_command("  :q "), Some(Command::Quit));
        assert_eq!(parse_command(":page 3"), Some(Command::Page(2)));
        assert_eq!(parse_command(":page 0"), None);
        assert_eq!(parse_command(":page x"), None);
        assert_eq!(parse_command("back"), None);
        assert_eq!(parse_command(":back now"), None);
    }
}
