//! Host signal plumbing.
//!
//! The focus detector never talks to a terminal or a windowing system directly.
//! It subscribes to an [`EventSource`] and gets back a [`Subscription`] that
//! releases the registration when cancelled or dropped. [`HostEvents`] is the
//! in-process implementation: whoever owns the real signal (the terminal event
//! loop, an embedder, a test) calls [`HostEvents::dispatch`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

/// Kinds of host signal a listener can register for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    VisibilityChange,
    Blur,
    Focus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// Document visibility changed; carries the state after the change
    VisibilityChange(Visibility),
    /// Window lost input focus
    Blur,
    /// Window regained input focus
    Focus,
}

impl HostEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            HostEvent::VisibilityChange(_) => EventKind::VisibilityChange,
            HostEvent::Blur => EventKind::Blur,
            HostEvent::Focus => EventKind::Focus,
        }
    }
}

pub type Handler = Rc<dyn Fn(&HostEvent)>;

/// Anything that can deliver host signals to registered handlers
pub trait EventSource {
    fn subscribe(&self, kind: EventKind, handler: Handler) -> Subscription;
}

/// Unsubscribe token. The registration is released exactly once, either by
/// [`Subscription::cancel`] or when the token is dropped.
#[must_use = "dropping a Subscription immediately unsubscribes the handler"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A token with nothing to release
    pub fn empty() -> Self {
        Self { release: None }
    }

    pub fn cancel(mut self) {
        self.release();
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    fn release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, EventKind, Handler)>,
}

/// In-process dispatcher standing in for the host document and window
#[derive(Clone, Default)]
pub struct HostEvents {
    registry: Rc<RefCell<Registry>>,
    visibility: Rc<Cell<Visibility>>,
}

impl HostEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current document visibility as of the last dispatched change
    pub fn visibility(&self) -> Visibility {
        self.visibility.get()
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.registry
            .borrow()
            .listeners
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .count()
    }

    pub fn total_listeners(&self) -> usize {
        self.registry.borrow().listeners.len()
    }

    /// Deliver `event` to every handler registered for its kind, in
    /// registration order. Returns how many handlers ran.
    ///
    /// Handlers are collected before any of them runs, so a handler may
    /// cancel subscriptions (its own included) while being dispatched.
    pub fn dispatch(&self, event: HostEvent) -> usize {
        if let HostEvent::VisibilityChange(v) = event {
            self.visibility.set(v);
        }

        let kind = event.kind();
        let handlers: Vec<Handler> = self
            .registry
            .borrow()
            .listeners
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, h)| Rc::clone(h))
            .collect();

        for handler in &handlers {
            handler(&event);
        }
        handlers.len()
    }
}

impl EventSource for HostEvents {
    fn subscribe(&self, kind: EventKind, handler: Handler) -> Subscription {
        let id = {
            let mut registry = self.registry.borrow_mut();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.listeners.push((id, kind, handler));
            id
        };

        let registry: Weak<RefCell<Registry>> = Rc::downgrade(&self.registry);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry
                    .borrow_mut()
                    .listeners
                    .retain(|(listener_id, _, _)| *listener_id != id);
            }
        })
    }
}

impl fmt::Debug for HostEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostEvents")
            .field("listeners", &self.total_listeners())
            .field("visibility", &self.visibility())
            .finish()
    }
}
