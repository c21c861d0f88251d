//! Scripted terminal sessions against the offline generator.

use std::io::Cursor;
use std::sync::Arc;

use wds_cli::terminal::{Completion, Terminal};
use wds_core::survey::Judgment;
use wds_core::{EchoGenerator, Survey, SurveyConfig};

const DETECTION_REASON: &str = "Everything is written in capital letters.";
const REMOVAL_REASON: &str = "Lowercase the whole text again, sentence by sentence.";

fn survey() -> Survey {
    let config = SurveyConfig {
        watermarks: vec!["upper".to_string()],
        mark_prob: 1.0,
        page_count: 1,
        questions: vec!["describe a nocturnal bird".to_string()],
        ..SurveyConfig::default()
    };
    Survey::new(&config, Arc::new(EchoGenerator)).with_participant("p-01")
}

fn run(survey: &mut Survey, lines: &[&str]) -> (Completion, String) {
    let mut script = lines.join("\n");
    script.push('\n');
    let mut terminal = Terminal::new(Cursor::new(script), Vec::new());
    let completion = terminal.run(survey).unwrap();
    let output = String::from_utf8(terminal.into_output()).unwrap();
    (completion, output)
}

#[test]
fn full_session_finishes_with_correct_judgment() {
    let mut survey = survey();
    let (completion, output) = run(
        &mut survey,
        &[
            "y",
            "",
            "Tell me about owls",
            "",
            "y",
            DETECTION_REASON,
            REMOVAL_REASON,
            "you asked: tell me about owls",
            "",
            "",
            "",
        ],
    );

    assert_eq!(completion, Completion::Finished);
    assert!(output.contains("Terms and conditions:"));
    assert!(output.contains("Question: Describe a nocturnal bird"));
    assert!(output.contains("Time: 00:00:"));
    assert!(output.contains("(2/3, 67%)"));
    assert!(output.contains("YOU ASKED: TELL ME ABOUT OWLS"));
    assert!(output.contains("Thanks for participating"));

    let summary = survey.summary();
    assert_eq!(summary.participant.as_deref(), Some("p-01"));
    assert!(summary.terms_accepted_at.is_some());
    assert_eq!(summary.pages.len(), 1);
    let page = &summary.pages[0];
    assert_eq!(page.judgment, Some(Judgment::Watermarked));
    assert_eq!(page.correct, Some(true));
    assert_eq!(page.watermark.as_deref(), Some("upper"));
    assert_eq!(page.detection_reasoning.as_deref(), Some(DETECTION_REASON));
    assert_eq!(
        page.edited_text.as_deref(),
        Some("you asked: tell me about owls")
    );
    assert_eq!(summary.correct_count(), 1);
}

#[test]
fn short_reasoning_is_asked_again() {
    let mut survey = survey();
    let (_, output) = run(
        &mut survey,
        &["y", "", "Tell me about owls", "", "y", "caps", DETECTION_REASON],
    );

    assert!(output.contains("Please write at least 30 characters."));
    let page = survey.current_page().and_then(|p| p.as_detection()).unwrap();
    assert_eq!(page.detection_reasoning(), DETECTION_REASON);
}

#[test]
fn quit_aborts_without_confirming() {
    let mut survey = survey();
    let (completion, _) = run(&mut survey, &["y", "", "Tell me about owls", "", ":quit"]);

    assert_eq!(completion, Completion::Aborted);
    assert_eq!(survey.summary().confirmed_count(), 0);
}

#[test]
fn end_of_input_aborts() {
    let mut survey = survey();
    let (completion, _) = run(&mut survey, &["y", ""]);
    assert_eq!(completion, Completion::Aborted);
}

#[test]
fn refused_navigation_is_reported() {
    let mut survey = survey();
    let (completion, output) = run(&mut survey, &["y", "", ":back", ":quit"]);

    assert_eq!(completion, Completion::Aborted);
    assert!(output.contains("Cannot move: going back is not allowed."));
}

#[test]
fn not_watermarked_needs_no_reasoning() {
    let mut survey = survey();
    let (completion, _) = run(&mut survey, &["y", "", "Tell me about owls", "", "n", "", ""]);

    assert_eq!(completion, Completion::Finished);
    let summary = survey.summary();
    assert_eq!(summary.pages[0].judgment, Some(Judgment::NotWatermarked));
    assert_eq!(summary.pages[0].correct, Some(false));
    assert!(summary.pages[0].detection_reasoning.is_none());
}

#[test]
fn declining_the_terms_ends_the_session() {
    let mut survey = survey();
    let (completion, output) = run(&mut survey, &["maybe", ":page 2", "n", ""]);

    assert_eq!(completion, Completion::Declined);
    assert!(output.contains("Please answer y or n."));
    assert!(output.contains("Please accept the terms first."));
    assert!(output.contains("The terms must be accepted to take part."));
    assert!(!output.contains("=== Introduction"));
    assert!(survey.needs_consent());
    assert!(survey.summary().terms_accepted_at.is_none());
}

#[test]
fn end_of_input_at_the_terms_declines() {
    let mut survey = survey();
    let (completion, _) = run(&mut survey, &[]);
    assert_eq!(completion, Completion::Declined);
}

#[test]
fn accepting_the_terms_opens_the_introduction() {
    let mut survey = survey();
    let (completion, output) = run(&mut survey, &["yes", ":quit"]);

    assert_eq!(completion, Completion::Aborted);
    assert!(output.contains("=== Introduction (1/3, 33%)"));
    assert!(!survey.needs_consent());
}

#[test]
fn empty_terms_skip_the_consent_step() {
    let config = SurveyConfig {
        terms: String::new(),
        page_count: 1,
        ..SurveyConfig::default()
    };
    let mut survey = Survey::new(&config, Arc::new(EchoGenerator));
    let (completion, output) = run(&mut survey, &[":quit"]);

    assert_eq!(completion, Completion::Aborted);
    assert!(!output.contains("Terms and conditions:"));
}
