//! Paginated wizard with per-page validity gating.
//!
//! The wizard owns an ordered list of page records. Each record carries its
//! own optional validity predicate; forward navigation from a page is refused
//! while that predicate returns false. Pages are never removed, so a
//! [`PageId`] stays valid for the wizard's lifetime and is what background
//! results use to find their page again.
//!
//! All mutation goes through the wizard, which recomputes the derived
//! [`NavigationState`] afterwards.

mod navigation;

use std::fmt;

pub use navigation::{NavigationState, Progress};

/// Stable identifier of a page within one wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(usize);

impl PageId {
    /// Zero-based position of the page.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0 + 1)
    }
}

/// Outcome of a navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The selection changed.
    Moved {
        /// Previously selected index.
        from: Option<usize>,
        /// Newly selected index.
        to: usize,
    },
    /// An out-of-range index cleared the selection.
    Unselected,
    /// The request was refused; nothing changed.
    Refused(Refusal),
}

impl Transition {
    /// Whether the selection moved to a page.
    pub fn is_moved(&self) -> bool {
        matches!(self, Self::Moved { .. })
    }
}

/// Why a navigation request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    /// The current page's validity predicate returned false.
    Invalid,
    /// Already at the first or last page.
    AtBoundary,
    /// Backward navigation is disabled for this wizard.
    PrevDisabled,
    /// Free tab navigation is disabled and the tab is not the current one.
    TabLocked,
    /// The wizard has no pages.
    NoPages,
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Invalid => "complete this page before continuing",
            Self::AtBoundary => "there is no page in that direction",
            Self::PrevDisabled => "going back is not allowed",
            Self::TabLocked => "pages must be visited in order",
            Self::NoPages => "there are no pages",
        };
        f.write_str(text)
    }
}

/// Wizard-wide navigation switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WizardOptions {
    /// Whether the participant may jump to any page through the tab strip.
    pub allow_tab_navigation: bool,
    /// Whether the "previous" control is offered.
    pub allow_prev: bool,
}

impl Default for WizardOptions {
    fn default() -> Self {
        Self {
            allow_tab_navigation: true,
            allow_prev: true,
        }
    }
}

type Validator<P> = Box<dyn Fn(&P) -> bool>;

struct PageRecord<P> {
    page: P,
    title: String,
    validator: Option<Validator<P>>,
}

impl<P> PageRecord<P> {
    fn is_valid(&self) -> bool {
        self.validator.as_ref().is_none_or(|validator| validator(&self.page))
    }
}

/// The wizard controller.
pub struct Wizard<P> {
    pages: Vec<PageRecord<P>>,
    current: Option<usize>,
    options: WizardOptions,
    navigation: NavigationState,
}

impl<P> Default for Wizard<P> {
    fn default() -> Self {
        Self::new(WizardOptions::default())
    }
}

impl<P> Wizard<P> {
    /// Empty wizard with nothing selected.
    pub fn new(options: WizardOptions) -> Self {
        Self {
            pages: Vec::new(),
            current: None,
            options,
            navigation: NavigationState::default(),
        }
    }

    // =========================================================================
    // PAGES
    // =========================================================================

    /// Append a page that is always valid.
    pub fn add_page(&mut self, page: P, title: impl Into<String>) -> PageId {
        self.push(page, title.into(), None)
    }

    /// Append a page whose forward navigation is gated by `validator`.
    pub fn add_page_with_validator(
        &mut self,
        page: P,
        title: impl Into<String>,
        validator: impl Fn(&P) -> bool + 'static,
    ) -> PageId {
        self.push(page, title.into(), Some(Box::new(validator)))
    }

    fn push(&mut self, page: P, title: String, validator: Option<Validator<P>>) -> PageId {
        let id = PageId(self.pages.len());
        let title = if title.trim().is_empty() {
            format!("Page {}", id.0 + 1)
        } else {
            title
        };
        tracing::debug!(page = %id, %title, gated = validator.is_some(), "page added");
        self.pages.push(PageRecord {
            page,
            title,
            validator,
        });
        self.refresh();
        id
    }

    /// Borrow a page.
    pub fn page(&self, id: PageId) -> Option<&P> {
        self.pages.get(id.0).map(|r| &r.page)
    }

    /// Mutate a page, then re-evaluate navigation.
    ///
    /// This is the "validity changed" signal: every participant edit that
    /// could affect a validator flows through here.
    pub fn update_page<R>(&mut self, id: PageId, f: impl FnOnce(&mut P) -> R) -> Option<R> {
        let record = self.pages.get_mut(id.0)?;
        let result = f(&mut record.page);
        self.refresh();
        Some(result)
    }

    /// Display title of a page.
    pub fn title(&self, id: PageId) -> Option<&str> {
        self.pages.get(id.0).map(|r| r.title.as_str())
    }

    /// Whether a page's validator currently passes (true without one).
    pub fn is_page_valid(&self, id: PageId) -> bool {
        self.pages.get(id.0).is_some_and(PageRecord::is_valid)
    }

    /// All pages in order.
    pub fn pages(&self) -> impl Iterator<Item = (PageId, &str, &P)> {
        self.pages
            .iter()
            .enumerate()
            .map(|(i, r)| (PageId(i), r.title.as_str(), &r.page))
    }

    /// Number of pages.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Whether no page has been added.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    // =========================================================================
    // SELECTION
    // =========================================================================

    /// Selected index, if any.
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Selected page id, if any.
    pub fn current_id(&self) -> Option<PageId> {
        self.current.map(PageId)
    }

    /// Selected page, if any.
    pub fn current_page(&self) -> Option<&P> {
        self.current.and_then(|i| self.pages.get(i)).map(|r| &r.page)
    }

    /// Select a page by index. Out-of-range indices clear the selection.
    pub fn select_page(&mut self, index: usize) -> Transition {
        let from = self.current;
        let transition = if index < self.pages.len() {
            self.current = Some(index);
            Transition::Moved { from, to: index }
        } else {
            self.current = None;
            Transition::Unselected
        };
        tracing::debug!(?from, to = ?self.current, "page selected");
        self.refresh();
        transition
    }

    /// Advance one page, unless the current page is invalid or last.
    ///
    /// From the unselected state this selects the first page.
    pub fn next_page(&mut self) -> Transition {
        let transition = match self.current {
            None if self.pages.is_empty() => Transition::Refused(Refusal::NoPages),
            None => return self.select_page(0),
            Some(i) if !self.pages[i].is_valid() => Transition::Refused(Refusal::Invalid),
            Some(i) if i + 1 >= self.pages.len() => Transition::Refused(Refusal::AtBoundary),
            Some(i) => return self.select_page(i + 1),
        };
        tracing::debug!(current = ?self.current, ?transition, "next refused");
        transition
    }

    /// Go back one page. Never consults a validator.
    pub fn prev_page(&mut self) -> Transition {
        let transition = match self.current {
            _ if !self.options.allow_prev => Transition::Refused(Refusal::PrevDisabled),
            None | Some(0) => Transition::Refused(Refusal::AtBoundary),
            Some(i) => return self.select_page(i - 1),
        };
        tracing::debug!(current = ?self.current, ?transition, "prev refused");
        transition
    }

    /// Tab-strip notification: the participant picked tab `index`.
    pub fn tab_selected(&mut self, index: usize) -> Transition {
        if index >= self.pages.len() {
            return Transition::Refused(Refusal::AtBoundary);
        }
        if !self.options.allow_tab_navigation && self.current != Some(index) {
            return Transition::Refused(Refusal::TabLocked);
        }
        self.select_page(index)
    }

    // =========================================================================
    // NAVIGATION STATE
    // =========================================================================

    /// Current enabled state of the controls and progress.
    pub fn navigation(&self) -> &NavigationState {
        &self.navigation
    }

    /// Navigation switches.
    pub fn options(&self) -> WizardOptions {
        self.options
    }

    /// Re-evaluate navigation after a page changed outside [`Self::update_page`].
    pub fn notify_validity_changed(&mut self) {
        self.refresh();
    }

    fn refresh(&mut self) {
        let n = self.pages.len();
        let current = self.current;

        let next_enabled = match current {
            None => n > 0,
            Some(i) => i + 1 < n && self.pages[i].is_valid(),
        };
        let tabs_enabled = (0..n)
            .map(|i| self.options.allow_tab_navigation || current == Some(i))
            .collect();

        self.navigation = NavigationState {
            prev_enabled: self.options.allow_prev && current.is_some_and(|i| i > 0),
            next_enabled,
            tabs_enabled,
            progress: Progress {
                value: current.map_or(0, |i| i + 1),
                maximum: n,
            },
        };
    }
}

impl<P: fmt::Debug> fmt::Debug for Wizard<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wizard")
            .field("pages", &self.pages.iter().map(|r| &r.title).collect::<Vec<_>>())
            .field("current", &self.current)
            .field("options", &self.options)
            .field("navigation", &self.navigation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    fn wizard(n: usize) -> Wizard<usize> {
        let mut w = Wizard::default();
        for i in 0..n {
            w.add_page(i, "");
        }
        w
    }

    #[test]
    fn test_empty_wizard() {
        let mut w: Wizard<()> = Wizard::default();
        assert_eq!(w.current_index(), None);
        assert_eq!(w.navigation().progress, Progress::default());
        assert!(!w.navigation().next_enabled);
        assert_eq!(w.next_page(), Transition::Refused(Refusal::NoPages));
    }

    #[test]
    fn test_add_page_keeps_selection() {
        let mut w = wizard(2);
        w.select_page(1);
        w.add_page(9, "Extra");
        assert_eq!(w.current_index(), Some(1));
        assert_eq!(w.navigation().progress.maximum, 3);
    }

    #[test]
    fn test_default_titles() {
        let mut w = wizard(1);
        let id = w.add_page(1, "Named");
        assert_eq!(w.title(PageId(0)), Some("Page 1"));
        assert_eq!(w.title(id), Some("Named"));
    }

    #[test]
    fn test_select_out_of_range_unselects() {
        let mut w = wizard(3);
        w.select_page(2);
        assert_eq!(w.select_page(3), Transition::Unselected);
        assert_eq!(w.current_index(), None);
        assert_eq!(w.navigation().progress.value, 0);
    }

    #[test]
    fn test_next_from_unselected_enters_first_page() {
        let mut w = wizard(2);
        assert_eq!(w.next_page(), Transition::Moved { from: None, to: 0 });
    }

    #[test]
    fn test_next_refused_at_last_page() {
        let mut w = wizard(2);
        w.select_page(1);
        assert_eq!(w.next_page(), Transition::Refused(Refusal::AtBoundary));
        assert!(!w.navigation().next_enabled);
    }

    #[test]
    fn test_validator_gates_next() {
        let open = Rc::new(Cell::new(false));
        let gate = Rc::clone(&open);

        let mut w = Wizard::default();
        w.add_page_with_validator((), "Gated", move |_| gate.get());
        w.add_page((), "After");
        w.select_page(0);

        assert!(!w.navigation().next_enabled);
        assert_eq!(w.next_page(), Transition::Refused(Refusal::Invalid));
        assert_eq!(w.current_index(), Some(0));

        open.set(true);
        w.notify_validity_changed();
        assert!(w.navigation().next_enabled);
        assert!(w.next_page().is_moved());
        assert_eq!(w.current_index(), Some(1));
    }

    #[test]
    fn test_update_page_recomputes_navigation() {
        let mut w: Wizard<u32> = Wizard::default();
        let id = w.add_page_with_validator(0, "Count", |n| *n >= 3);
        w.add_page(0, "End");
        w.select_page(0);

        for _ in 0..2 {
            w.update_page(id, |n| *n += 1);
            assert!(!w.navigation().next_enabled);
        }
        w.update_page(id, |n| *n += 1);
        assert!(w.navigation().next_enabled);
    }

    #[test]
    fn test_prev_never_consults_validator() {
        let mut w: Wizard<()> = Wizard::default();
        w.add_page((), "A");
        w.add_page_with_validator((), "B", |_| false);
        w.select_page(1);
        assert_eq!(w.prev_page(), Transition::Moved { from: Some(1), to: 0 });
    }

    #[test]
    fn test_prev_disabled() {
        let mut w: Wizard<usize> = Wizard::new(WizardOptions {
            allow_tab_navigation: false,
            allow_prev: false,
        });
        w.add_page(0, "A");
        w.add_page(1, "B");
        w.select_page(1);
        assert_eq!(w.prev_page(), Transition::Refused(Refusal::PrevDisabled));
        assert!(!w.navigation().prev_enabled);
    }

    #[test]
    fn test_prev_refused_at_first_page() {
        let mut w = wizard(2);
        w.select_page(0);
        assert_eq!(w.prev_page(), Transition::Refused(Refusal::AtBoundary));
        assert!(!w.navigation().prev_enabled);
    }

    #[test]
    fn test_locked_tabs_follow_selection() {
        let mut w: Wizard<usize> = Wizard::new(WizardOptions {
            allow_tab_navigation: false,
            allow_prev: true,
        });
        for i in 0..3 {
            w.add_page(i, "");
        }
        w.select_page(1);
        assert_eq!(w.navigation().tabs_enabled, vec![false, true, false]);
        assert_eq!(w.tab_selected(2), Transition::Refused(Refusal::TabLocked));
        assert_eq!(w.current_index(), Some(1));

        w.select_page(2);
        assert_eq!(w.navigation().tabs_enabled, vec![false, false, true]);
    }

    #[test]
    fn test_free_tabs() {
        let mut w = wizard(3);
        w.select_page(0);
        assert_eq!(w.navigation().tabs_enabled, vec![true, true, true]);
        assert_eq!(w.tab_selected(2), Transition::Moved { from: Some(0), to: 2 });
    }

    #[test]
    fn test_progress_tracks_selection() {
        let mut w = wizard(4);
        w.select_page(2);
        assert_eq!(
            w.navigation().progress,
            Progress {
                value: 3,
                maximum: 4
            }
        );
    }
}
