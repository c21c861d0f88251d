//! Derived navigation affordances.
//!
//! Everything here is recomputed from the wizard state after each mutation;
//! nothing in this module is a source of truth.

use std::fmt;

/// Determinate progress indicator: `value` of `maximum`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// `current index + 1`, or 0 when no page is selected.
    pub value: usize,
    /// Number of pages.
    pub maximum: usize,
}

impl Progress {
    /// Fraction in `[0.0, 1.0]`; 0.0 when there are no pages.
    pub fn fraction(&self) -> f32 {
        if self.maximum == 0 {
            0.0
        } else {
            self.value as f32 / self.maximum as f32
        }
    }

    /// Whole percentage, for labels.
    pub fn percentage(&self) -> u32 {
        (self.fraction() * 100.0).round() as u32
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.value, self.maximum)
    }
}

/// Enabled state of the wizard controls.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NavigationState {
    /// The "previous" control.
    pub prev_enabled: bool,
    /// The "next" control; false while the current page is invalid.
    pub next_enabled: bool,
    /// One flag per page tab.
    pub tabs_enabled: Vec<bool>,
    /// Progress indicator.
    pub progress: Progress,
}
