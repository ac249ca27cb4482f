use tracing::info;

use crate::detector::{FocusDetectionConfig, FocusDetector};
use crate::events::EventSource;
use crate::quiz::{Question, Quiz, QuizResult};
use crate::store::QuizStore;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub focus_detection: bool,
    pub max_focus_losses: Option<u32>,
    pub time_limit_secs: Option<f64>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            focus_detection: true,
            max_focus_losses: None,
            time_limit_secs: None,
        }
    }
}

/// One attempt at a quiz: navigation, answers, countdown and focus monitoring
#[derive(Debug)]
pub struct QuizSession<S: EventSource> {
    quiz: Quiz,
    settings: SessionSettings,
    store: QuizStore,
    detector: FocusDetector<S>,
    result: Option<QuizResult>,
}

impl<S: EventSource> QuizSession<S> {
    pub fn new(quiz: Quiz, source: S, settings: SessionSettings) -> Self {
        let store = QuizStore::new();
        store.set_seconds_remaining(settings.time_limit_secs);
        let detector = FocusDetector::new(
            source,
            store.clone(),
            FocusDetectionConfig {
                enabled: settings.focus_detection,
                on_focus_loss: None,
            },
        );

        Self {
            quiz,
            settings,
            store,
            detector,
            result: None,
        }
    }

    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn store(&self) -> &QuizStore {
        &self.store
    }

    pub fn detector(&self) -> &FocusDetector<S> {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut FocusDetector<S> {
        &mut self.detector
    }

    pub fn current_index(&self) -> usize {
        self.store.current_question()
    }

    pub fn current_question(&self) -> &Question {
        &self.quiz.questions[self.current_index()]
    }

    pub fn selected(&self) -> Option<usize> {
        self.store.answer_for(self.current_index())
    }

    pub fn next(&self) {
        let idx = self.current_index();
        if idx + 1 < self.quiz.len() {
            self.store.set_current_question(idx + 1);
        }
    }

    pub fn previous(&self) {
        let idx = self.current_index();
        if idx > 0 {
            self.store.set_current_question(idx - 1);
        }
    }

    pub fn select(&self, choice: usize) {
        if self.is_finished() || choice >= self.current_question().choices.len() {
            return;
        }
        self.store.select_answer(self.current_index(), choice);
    }

    pub fn answered_count(&self) -> usize {
        self.store.answers().len()
    }

    /// Advance the countdown by `elapsed_secs`; submits when time runs out
    pub fn on_tick(&mut self, elapsed_secs: f64) {
        if self.is_finished() {
            return;
        }
        if let Some(remaining) = self.store.seconds_remaining() {
            let remaining = (remaining - elapsed_secs).max(0.0);
            self.store.set_seconds_remaining(Some(remaining));
            if remaining <= 0.0 {
                info!("time limit reached");
                self.submit();
            }
        }
    }

    /// Submit once the focus-loss limit is reached. Returns true if it did.
    pub fn enforce_focus_limit(&mut self) -> bool {
        match self.settings.max_focus_losses {
            Some(max) if !self.is_finished() && self.store.focus_loss_count() >= max => {
                info!(max, "focus loss limit reached, submitting");
                self.submit();
                true
            }
            _ => false,
        }
    }

    /// Finish the attempt. Later calls return the first result.
    pub fn submit(&mut self) -> &QuizResult {
        let result = match self.result.take() {
            Some(result) => result,
            None => {
                self.store.mark_submitted();
                self.detector.set_enabled(false);
                let result = self
                    .quiz
                    .score(&self.store.answers(), self.store.focus_loss_count());
                info!(
                    title = %result.title,
                    correct = result.correct,
                    total = result.total,
                    focus_losses = result.focus_loss_count,
                    "quiz submitted"
                );
                result
            }
        };
        self.result.insert(result)
    }

    pub fn result(&self) -> Option<&QuizResult> {
        self.result.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.result.is_some()
    }

    /// Start a fresh attempt at the same quiz
    pub fn restart(&mut self, quiz: Option<Quiz>) {
        if let Some(quiz) = quiz {
            self.quiz = quiz;
        }
        self.store.reset();
        self.store.set_seconds_remaining(self.settings.time_limit_secs);
        self.result = None;
        self.detector.close_warning();
        self.detector.set_enabled(self.settings.focus_detection);
    }
}
