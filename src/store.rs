use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Attempt-scoped state shared between the focus detector and the views
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuizTakingState {
    pub focus_loss_count: u32,
    pub current_question: usize,
    /// question index -> selected choice index
    pub answers: BTreeMap<usize, usize>,
    pub seconds_remaining: Option<f64>,
    pub submitted: bool,
}

/// Shared handle to the quiz-taking state.
///
/// Cloning the handle shares the underlying state; every clone observes the
/// same counter. All access happens on the UI thread, so a `RefCell` is enough.
#[derive(Debug, Clone, Default)]
pub struct QuizStore {
    state: Rc<RefCell<QuizTakingState>>,
}

impl QuizStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> QuizTakingState {
        self.state.borrow().clone()
    }

    pub fn focus_loss_count(&self) -> u32 {
        self.state.borrow().focus_loss_count
    }

    /// Count one focus loss and return the new total
    pub fn record_focus_loss(&self) -> u32 {
        let mut state = self.state.borrow_mut();
        state.focus_loss_count = state.focus_loss_count.saturating_add(1);
        state.focus_loss_count
    }

    /// Clear everything scoped to the current attempt
    pub fn reset(&self) {
        *self.state.borrow_mut() = QuizTakingState::default();
    }

    pub fn current_question(&self) -> usize {
        self.state.borrow().current_question
    }

    pub fn set_current_question(&self, idx: usize) {
        self.state.borrow_mut().current_question = idx;
    }

    pub fn select_answer(&self, question: usize, choice: usize) {
        self.state.borrow_mut().answers.insert(question, choice);
    }

    pub fn answer_for(&self, question: usize) -> Option<usize> {
        self.state.borrow().answers.get(&question).copied()
    }

    pub fn answers(&self) -> BTreeMap<usize, usize> {
        self.state.borrow().answers.clone()
    }

    pub fn seconds_remaining(&self) -> Option<f64> {
        self.state.borrow().seconds_remaining
    }

    pub fn set_seconds_remaining(&self, secs: Option<f64>) {
        self.state.borrow_mut().seconds_remaining = secs;
    }

    pub fn is_submitted(&self) -> bool {
        self.state.borrow().submitted
    }

    pub fn mark_submitted(&self) {
        self.state.borrow_mut().submitted = true;
    }
}
