//! Anti-cheat focus monitoring for a quiz attempt.
//!
//! A [`FocusDetector`] holds exactly two listeners while enabled: one for
//! visibility changes and one for window blur. Each qualifying event bumps the
//! shared [`QuizStore`] counter, opens the warning, then runs the caller's
//! callback. Listeners are [`Subscription`] guards, so disabling the detector
//! or dropping it always releases them.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, info};

use crate::events::{EventKind, EventSource, HostEvent, Subscription, Visibility};
use crate::store::QuizStore;

pub type FocusLossCallback = Rc<dyn Fn()>;

#[derive(Clone, Default)]
pub struct FocusDetectionConfig {
    pub enabled: bool,
    pub on_focus_loss: Option<FocusLossCallback>,
}

impl FocusDetectionConfig {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            on_focus_loss: None,
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_callback(mut self, callback: impl Fn() + 'static) -> Self {
        self.on_focus_loss = Some(Rc::new(callback));
        self
    }
}

impl fmt::Debug for FocusDetectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FocusDetectionConfig")
            .field("enabled", &self.enabled)
            .field("on_focus_loss", &self.on_focus_loss.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum DetectorState {
    /// No listeners attached
    Inactive,
    /// Listening, warning closed
    ActiveClear,
    /// Listening, warning open
    ActiveWarning,
}

struct Shared {
    store: QuizStore,
    warning_open: Cell<bool>,
    on_focus_loss: RefCell<Option<FocusLossCallback>>,
}

impl Shared {
    fn focus_lost(&self, trigger: EventKind) {
        let count = self.store.record_focus_loss();
        self.warning_open.set(true);
        info!(%trigger, count, "focus loss detected");

        // cloned out so the callback may replace itself
        let callback = self.on_focus_loss.borrow().clone();
        if let Some(callback) = callback {
            callback();
        }
    }
}

/// The two registrations held while enabled. Dropping the pair releases both.
struct ListenerPair {
    _visibility: Subscription,
    _blur: Subscription,
}

pub struct FocusDetector<S: EventSource> {
    source: S,
    shared: Rc<Shared>,
    listeners: Option<ListenerPair>,
}

impl<S: EventSource> FocusDetector<S> {
    pub fn new(source: S, store: QuizStore, config: FocusDetectionConfig) -> Self {
        let mut detector = Self {
            source,
            shared: Rc::new(Shared {
                store,
                warning_open: Cell::new(false),
                on_focus_loss: RefCell::new(config.on_focus_loss),
            }),
            listeners: None,
        };
        detector.set_enabled(config.enabled);
        detector
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled {
            self.attach();
        } else {
            self.detach();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.listeners.is_some()
    }

    pub fn set_on_focus_loss(&self, callback: Option<FocusLossCallback>) {
        *self.shared.on_focus_loss.borrow_mut() = callback;
    }

    pub fn focus_loss_count(&self) -> u32 {
        self.shared.store.focus_loss_count()
    }

    pub fn is_warning_open(&self) -> bool {
        self.shared.warning_open.get()
    }

    /// Dismiss the warning. The counter is left alone.
    pub fn close_warning(&self) {
        self.shared.warning_open.set(false);
    }

    pub fn state(&self) -> DetectorState {
        match (self.is_enabled(), self.is_warning_open()) {
            (false, _) => DetectorState::Inactive,
            (true, false) => DetectorState::ActiveClear,
            (true, true) => DetectorState::ActiveWarning,
        }
    }

    pub fn store(&self) -> &QuizStore {
        &self.shared.store
    }

    fn attach(&mut self) {
        if self.listeners.is_some() {
            return;
        }

        let shared = Rc::clone(&self.shared);
        let visibility = self.source.subscribe(
            EventKind::VisibilityChange,
            Rc::new(move |event: &HostEvent| {
                if let HostEvent::VisibilityChange(Visibility::Hidden) = event {
                    shared.focus_lost(EventKind::VisibilityChange);
                }
            }),
        );

        let shared = Rc::clone(&self.shared);
        let blur = self.source.subscribe(
            EventKind::Blur,
            Rc::new(move |_: &HostEvent| shared.focus_lost(EventKind::Blur)),
        );

        self.listeners = Some(ListenerPair {
            _visibility: visibility,
            _blur: blur,
        });
        debug!("focus detection listeners attached");
    }

    /// Drops both listeners and the warning with them
    fn detach(&mut self) {
        self.shared.warning_open.set(false);
        if self.listeners.take().is_some() {
            debug!("focus detection listeners detached");
        }
    }
}

impl<S: EventSource> Drop for FocusDetector<S> {
    fn drop(&mut self) {
        self.detach();
    }
}

impl<S: EventSource> fmt::Debug for FocusDetector<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FocusDetector")
            .field("state", &self.state())
            .field("focus_loss_count", &self.focus_loss_count())
            .finish()
    }
}
