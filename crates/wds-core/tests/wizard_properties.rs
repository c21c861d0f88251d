//! Property tests for wizard navigation.

use std::cell::Cell;
use std::rc::Rc;

use proptest::prelude::*;
use wds_core::wizard::{Refusal, Transition, Wizard, WizardOptions};

#[derive(Debug, Clone)]
enum Op {
    Add { valid: bool, gated: bool },
    Select(usize),
    Next,
    Prev,
    Toggle(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (any::<bool>(), any::<bool>()).prop_map(|(valid, gated)| Op::Add { valid, gated }),
        (0usize..12).prop_map(Op::Select),
        Just(Op::Next),
        Just(Op::Prev),
        (0usize..12).prop_map(Op::Toggle),
    ]
}

/// Pages are cells so the test can flip validity from outside.
type Page = Rc<Cell<bool>>;

fn add(wizard: &mut Wizard<Page>, valid: bool, gated: bool) {
    let page = Rc::new(Cell::new(valid));
    if gated {
        wizard.add_page_with_validator(page, "", |p: &Page| p.get());
    } else {
        wizard.add_page(page, "");
    }
}

proptest! {
    #[test]
    fn page_count_matches_add_calls(ops in prop::collection::vec(op(), 0..60)) {
        let mut wizard: Wizard<Page> = Wizard::default();
        let mut added = 0;
        for op in ops {
            match op {
                Op::Add { valid, gated } => {
                    add(&mut wizard, valid, gated);
                    added += 1;
                }
                Op::Select(i) => { wizard.select_page(i); }
                Op::Next => { wizard.next_page(); }
                Op::Prev => { wizard.prev_page(); }
                Op::Toggle(_) => {}
            }
            prop_assert_eq!(wizard.len(), added);
            prop_assert_eq!(wizard.navigation().progress.maximum, added);
            prop_assert_eq!(wizard.navigation().tabs_enabled.len(), added);
        }
    }

    #[test]
    fn next_is_gated_by_validity(ops in prop::collection::vec(op(), 0..60)) {
        let mut wizard: Wizard<Page> = Wizard::default();
        for op in ops {
            match op {
                Op::Add { valid, gated } => add(&mut wizard, valid, gated),
                Op::Select(i) => { wizard.select_page(i); }
                Op::Prev => { wizard.prev_page(); }
                Op::Toggle(i) => {
                    let page = wizard.pages().nth(i).map(|(_, _, p)| Rc::clone(p));
                    if let Some(page) = page {
                        page.set(!page.get());
                        wizard.notify_validity_changed();
                    }
                }
                Op::Next => {
                    let before = wizard.current_index();
                    let valid = wizard.current_id().is_none_or(|id| wizard.is_page_valid(id));
                    let transition = wizard.next_page();
                    match before {
                        Some(i) if !valid => {
                            prop_assert_eq!(transition, Transition::Refused(Refusal::Invalid));
                            prop_assert_eq!(wizard.current_index(), Some(i));
                        }
                        Some(i) if i + 1 == wizard.len() => {
                            prop_assert_eq!(transition, Transition::Refused(Refusal::AtBoundary));
                            prop_assert_eq!(wizard.current_index(), Some(i));
                        }
                        Some(i) => {
                            prop_assert_eq!(wizard.current_index(), Some(i + 1));
                        }
                        None if wizard.is_empty() => {
                            prop_assert_eq!(transition, Transition::Refused(Refusal::NoPages));
                        }
                        None => {
                            prop_assert_eq!(wizard.current_index(), Some(0));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn select_page_sets_or_clears_index(
        pages in 0usize..10,
        picks in prop::collection::vec(0usize..20, 1..20),
    ) {
        let mut wizard: Wizard<Page> = Wizard::default();
        for _ in 0..pages {
            add(&mut wizard, true, false);
        }
        for i in picks {
            wizard.select_page(i);
            let expected = (i < pages).then_some(i);
            prop_assert_eq!(wizard.current_index(), expected);
            prop_assert_eq!(wizard.navigation().progress.value, expected.map_or(0, |i| i + 1));
        }
    }

    #[test]
    fn next_enabled_reflects_current_validity(valid in any::<bool>(), pages in 2usize..6) {
        let mut wizard: Wizard<Page> = Wizard::default();
        add(&mut wizard, valid, true);
        for _ in 1..pages {
            add(&mut wizard, true, false);
        }
        wizard.select_page(0);
        prop_assert_eq!(wizard.navigation().next_enabled, valid);
    }
}

/// A yes/no page that needs a justification when "yes" is chosen.
#[derive(Debug, Default)]
struct Question {
    yes: bool,
    no: bool,
    justification: String,
}

impl Question {
    fn is_valid(&self) -> bool {
        if self.yes == self.no {
            return false;
        }
        self.no || self.justification.trim().chars().count() >= 30
    }
}

#[test]
fn justification_unlocks_next() {
    let mut wizard = Wizard::new(WizardOptions {
        allow_tab_navigation: false,
        allow_prev: false,
    });
    let id = wizard.add_page_with_validator(Question::default(), "Question", Question::is_valid);
    wizard.add_page(Question::default(), "Done");
    wizard.select_page(0);

    wizard.update_page(id, |q| {
        q.yes = true;
        q.justification = "x".repeat(10);
    });
    assert_eq!(wizard.next_page(), Transition::Refused(Refusal::Invalid));
    assert_eq!(wizard.current_index(), Some(0));

    wizard.update_page(id, |q| q.justification = "x".repeat(35));
    assert_eq!(wizard.next_page(), Transition::Moved { from: Some(0), to: 1 });
}

#[test]
fn choosing_no_clears_yes() {
    let mut wizard: Wizard<Question> = Wizard::default();
    let id = wizard.add_page_with_validator(Question::default(), "Question", Question::is_valid);
    wizard.add_page(Question::default(), "Done");
    wizard.select_page(0);

    wizard.update_page(id, |q| q.yes = true);
    wizard.update_page(id, |q| {
        q.no = true;
        q.yes = false;
    });
    assert!(wizard.navigation().next_enabled);
    assert!(wizard.next_page().is_moved());
}
