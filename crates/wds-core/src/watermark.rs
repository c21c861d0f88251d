//! Watermark transforms and the registry that enables them.
//!
//! Most watermarks are one-line string rewrites. The acrostic watermark is
//! the exception: it asks the remote model to rephrase the text so that
//! letters at a configured position spell a secret word, so applying it costs
//! one generation request.

use std::fmt;
use std::sync::Arc;

use crate::config::{AcrosticConfig, SurveyConfig};
use crate::error::GenerationError;
use crate::generation::TextGenerator;

/// Uppercase the whole text.
pub const UPPER: &str = "upper";
/// Replace every space with `#`.
pub const SPACE_HASH: &str = "space#";
/// Replace `A`/`a` with `B`/`b`.
pub const AB: &str = "ab";
/// Replace `m` with the look-alike `rn`.
pub const PHISHING: &str = "phishing";
/// Hide a secret word through a remote rephrase.
pub const ACROSTIC: &str = "acrostic";

// =============================================================================
// WATERMARK
// =============================================================================

#[derive(Clone)]
enum Transform {
    Pure(fn(&str) -> String),
    Acrostic {
        config: AcrosticConfig,
        generator: Arc<dyn TextGenerator>,
    },
}

/// A named text transform.
#[derive(Clone)]
pub struct Watermark {
    name: String,
    transform: Transform,
}

impl Watermark {
    /// A watermark backed by a pure string function.
    pub fn pure(name: impl Into<String>, transform: fn(&str) -> String) -> Self {
        Self {
            name: name.into(),
            transform: Transform::Pure(transform),
        }
    }

    /// The acrostic watermark, applied through `generator`.
    pub fn acrostic(config: AcrosticConfig, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            name: ACROSTIC.to_string(),
            transform: Transform::Acrostic { config, generator },
        }
    }

    /// Registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether applying this watermark performs a remote call.
    pub fn is_remote(&self) -> bool {
        matches!(self.transform, Transform::Acrostic { .. })
    }

    /// Apply the watermark to `text`.
    ///
    /// Pure transforms never fail. The acrostic transform blocks on the
    /// remote call and propagates its error.
    pub fn apply(&self, text: &str) -> Result<String, GenerationError> {
        match &self.transform {
            Transform::Pure(f) => Ok(f(text)),
            Transform::Acrostic { config, generator } => {
                tracing::debug!(watermark = %self.name, "requesting acrostic rephrase");
                generator.generate(&acrostic_prompt(config, text))
            }
        }
    }
}

impl fmt::Debug for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watermark")
            .field("name", &self.name)
            .field("remote", &self.is_remote())
            .finish()
    }
}

fn upper(text: &str) -> String {
    text.to_uppercase()
}

fn space_hash(text: &str) -> String {
    text.replace(' ', "#")
}

fn ab(text: &str) -> String {
    text.replace('A', "B").replace('a', "b")
}

fn phishing(text: &str) -> String {
    text.replace('m', "rn")
}

/// Build the rephrase instruction for the acrostic watermark.
pub fn acrostic_prompt(config: &AcrosticConfig, text: &str) -> String {
    let AcrosticConfig { mark, position } = config;
    format!(
        "Consider the poetic technique of the 'acrostic', where the leading letters of the \
         sentences in a poem combine in order to spell a hidden message.\n\
         Below you are given a piece of text. Rephrase it so that the letters at {position} \
         spell the secret word:\n\
         {mark}\n\n\
         * The letters must stay hidden. Add no formatting (bold, italic, isolated letters, \
         capitals) that could draw attention to the word {mark}.\n\
         * The letters must be correct. Taken one after the other, the letters exactly at \
         {position} in the new text must spell the secret word.\n\
         * The position is crucial. Check that no word or letter is skipped or shifted; \
         rephrase as much as needed.\n\
         Keep the original meaning, line breaks and spacing as far as possible. Once the word \
         is fully embedded, do not repeat its letters and leave the rest of the text as is.\n\n\
         Respond with the modified text only.\n\
         The original text follows:\n\n\n\
         {text}"
    )
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Ordered collection of watermarks plus the configured allow-list.
///
/// Registration order is the application order: [`Self::active`] and
/// [`Self::apply_all`] never follow the allow-list's own ordering.
#[derive(Debug, Clone, Default)]
pub struct WatermarkRegistry {
    entries: Vec<Watermark>,
    enabled: Vec<String>,
}

impl WatermarkRegistry {
    /// Empty registry with nothing enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in watermarks, nothing enabled yet.
    pub fn builtin(acrostic: AcrosticConfig, generator: Arc<dyn TextGenerator>) -> Self {
        let mut registry = Self::new();
        registry.register(Watermark::pure(UPPER, upper));
        registry.register(Watermark::pure(SPACE_HASH, space_hash));
        registry.register(Watermark::pure(AB, ab));
        registry.register(Watermark::pure(PHISHING, phishing));
        registry.register(Watermark::acrostic(acrostic, generator));
        registry
    }

    /// Built-in registry with the config's allow-list applied.
    pub fn from_config(config: &SurveyConfig, generator: Arc<dyn TextGenerator>) -> Self {
        let mut registry = Self::builtin(config.acrostic.clone(), generator);
        registry.set_enabled(&config.watermarks);
        registry
    }

    /// Append a watermark. A later registration under an existing name
    /// replaces the earlier one in place.
    pub fn register(&mut self, watermark: Watermark) {
        match self.entries.iter_mut().find(|w| w.name == watermark.name) {
            Some(existing) => *existing = watermark,
            None => self.entries.push(watermark),
        }
    }

    /// Replace the allow-list. Names that are not registered are logged and
    /// ignored.
    pub fn set_enabled<S: AsRef<str>>(&mut self, names: &[S]) {
        self.enabled.clear();
        for name in names {
            let name = name.as_ref();
            if self.get(name).is_some() {
                self.enabled.push(name.to_string());
            } else {
                tracing::warn!(watermark = name, "unknown watermark in allow-list, ignoring");
            }
        }
    }

    /// Whether `name` is on the allow-list.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.iter().any(|n| n == name)
    }

    /// Enabled watermarks, in registration order.
    pub fn active(&self) -> Vec<&Watermark> {
        self.entries
            .iter()
            .filter(|w| self.is_enabled(&w.name))
            .collect()
    }

    /// Fold every active watermark over `text`, in registration order.
    pub fn apply_all(&self, text: &str) -> Result<String, GenerationError> {
        self.active()
            .into_iter()
            .try_fold(text.to_string(), |acc, watermark| watermark.apply(&acc))
    }

    /// Look up a registered watermark.
    pub fn get(&self, name: &str) -> Option<&Watermark> {
        self.entries.iter().find(|w| w.name == name)
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|w| w.name.as_str())
    }

    /// Number of registered watermarks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::EchoGenerator;

    fn registry() -> WatermarkRegistry {
        WatermarkRegistry::builtin(AcrosticConfig::default(), Arc::new(EchoGenerator))
    }

    #[test]
    fn pure_transforms() {
        let r = registry();
        let apply = |name: &str, text: &str| r.get(name).unwrap().apply(text).unwrap();

        assert_eq!(apply(UPPER, "Hello world"), "HELLO WORLD");
        assert_eq!(apply(SPACE_HASH, "a b  c"), "a#b##c");
        assert_eq!(apply(AB, "Abracadabra"), "Bbrbcbdbbrb");
        assert_eq!(apply(PHISHING, "my name"), "rny narne");
    }

    #[test]
    fn builtin_registration_order() {
        let registry = registry();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, vec![UPPER, SPACE_HASH, AB, PHISHING, ACROSTIC]);
    }

    #[test]
    fn only_acrostic_is_remote() {
        let r = registry();
        let remote: Vec<_> = r.names().filter(|n| r.get(n).unwrap().is_remote()).collect();
        assert_eq!(remote, vec![ACROSTIC]);
    }

    #[test]
    fn unknown_names_are_not_enabled() {
        let mut r = registry();
        r.set_enabled(&["upper", "rot13"]);
        assert!(r.is_enabled(UPPER));
        assert!(!r.is_enabled("rot13"));
        assert_eq!(r.active().len(), 1);
    }

    #[test]
    fn register_replaces_same_name_in_place() {
        let mut r = registry();
        r.register(Watermark::pure(UPPER, |s| s.to_lowercase()));
        assert_eq!(r.len(), 5);
        assert_eq!(r.names().next(), Some(UPPER));
        assert_eq!(r.get(UPPER).unwrap().apply("ABC").unwrap(), "abc");
    }

    #[test]
    fn acrostic_prompt_mentions_word_position_and_text() {
        let config = AcrosticConfig {
            mark: "secret".to_string(),
            position: "the second letter of each line".to_string(),
        };
        let prompt = acrostic_prompt(&config, "Original body.");
        assert!(prompt.contains("spell the secret word:\nsecret\n"));
        assert!(prompt.contains("the second letter of each line"));
        assert!(prompt.ends_with("\n\n\nOriginal body."));
    }

    #[test]
    fn acrostic_apply_goes_through_generator() {
        struct Capture(std::sync::Mutex<Option<String>>);
        impl TextGenerator for Capture {
            fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
                *self.0.lock().unwrap() = Some(prompt.to_string());
                Ok("rephrased".to_string())
            }
        }

        let capture = Arc::new(Capture(std::sync::Mutex::new(None)));
        let watermark = Watermark::acrostic(AcrosticConfig::default(), capture.clone());

        assert_eq!(watermark.apply("body").unwrap(), "rephrased");
        let sent = capture.0.lock().unwrap().clone().unwrap();
        assert!(sent.contains("abigail"));
    }
}
