//! Static text pages and the optional demographics questionnaire.

use serde::{Deserialize, Serialize};

/// Default introduction shown on the first page.
pub const INTRO_TEXT: &str = "\
In this study you will talk to a language model. On each assignment page, \
write a prompt about the given question and read the answer you receive. \
Some answers carry a hidden watermark, some do not. Decide whether the \
answer you got is watermarked. If you think it is, explain what gave it away \
and edit the answer so the watermark is gone.\n\n\
Once you confirm a page you cannot change it again.";

/// Default terms accepted before the survey starts.
pub const TERMS_TEXT: &str = "\
Taking part is voluntary. Your prompts, judgments and explanations are \
recorded together with the time spent on each assignment and are used for \
research on text watermarks only. No name or contact details are collected. \
Prompts are sent to a third-party language model to produce the answers you \
will read, so do not include personal information in them. You may stop at \
any time; answers from an unfinished session are discarded.";

/// Default text of the closing page.
pub const CLOSING_TEXT: &str = "Thanks for participating!";

/// A page that only shows text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoPage {
    pub heading: String,
    pub body: String,
}

impl InfoPage {
    pub fn new(heading: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            body: body.into(),
        }
    }

    /// The introduction and instructions page.
    pub fn introduction() -> Self {
        Self::new("Introduction & Instructions", INTRO_TEXT)
    }

    /// The closing page.
    pub fn closing() -> Self {
        Self::new("Thanks for participating", CLOSING_TEXT)
    }
}

// =============================================================================
// DEMOGRAPHICS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub const ALL: [Self; 3] = [Self::Male, Self::Female, Self::Other];

    pub fn label(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Other => "Other",
        }
    }
}

/// Degree the participant is currently pursuing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Degree {
    Bsc,
    Msc,
    Phd,
}

impl Degree {
    pub const ALL: [Self; 3] = [Self::Bsc, Self::Msc, Self::Phd];

    pub fn label(self) -> &'static str {
        match self {
            Self::Bsc => "BSc",
            Self::Msc => "MSc",
            Self::Phd => "PhD",
        }
    }
}

/// Age bracket labels, youngest first.
pub fn age_brackets() -> Vec<String> {
    const MIN_AGE: u32 = 20;
    const MAX_AGE: u32 = 50;
    const STEP: u32 = 5;

    let mut brackets = vec!["18 or below".to_string(), format!("18-{MIN_AGE}")];
    brackets.extend(
        (MIN_AGE..MAX_AGE)
            .step_by(STEP as usize)
            .map(|age| format!("{}-{}", age + 1, age + STEP)),
    );
    brackets.push(format!("{} or above", MAX_AGE + 1));
    brackets
}

/// Optional questionnaire; every answer may stay empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemographicsPage {
    pub gender: Option<Gender>,
    pub degree: Option<Degree>,
    /// One of [`age_brackets`].
    pub age: Option<String>,
    /// Whether the participant uses AI tools often.
    pub uses_ai: Option<bool>,
}

impl DemographicsPage {
    /// Set the age bracket. Labels outside [`age_brackets`] are ignored.
    pub fn set_age(&mut self, bracket: &str) -> bool {
        let known = age_brackets().iter().any(|b| b == bracket);
        if known {
            self.age = Some(bracket.to_string());
        }
        known
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_brackets_cover_range() {
        insta::assert_snapshot!(
            age_brackets().join(" | "),
            @"18 or below | 18-20 | 21-25 | 26-30 | 31-35 | 36-40 | 41-45 | 46-50 | 51 or above"
        );
    }

    #[test]
    fn unknown_age_bracket_is_ignored() {
        let mut page = DemographicsPage::default();
        assert!(!page.set_age("99"));
        assert_eq!(page.age, None);
        assert!(page.set_age("26-30"));
        assert_eq!(page.age.as_deref(), Some("26-30"));
    }

    #[test]
    fn labels() {
        let genders: Vec<_> = Gender::ALL.into_iter().map(Gender::label).collect();
        assert_eq!(genders, ["Male", "Female", "Other"]);
        assert_eq!(Degree::Phd.label(), "PhD");
    }
}
