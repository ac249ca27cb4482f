use std::cell::Cell;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent};

use crate::events::HostEvent;

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum QuizEvent {
    Key(KeyEvent),
    Resize,
    Tick,
    /// terminal window lost input focus
    FocusLost,
    FocusGained,
}

impl QuizEvent {
    /// The host signal this terminal event stands for, if any
    pub fn as_host_event(&self) -> Option<HostEvent> {
        match self {
            QuizEvent::FocusLost => Some(HostEvent::Blur),
            QuizEvent::FocusGained => Some(HostEvent::Focus),
            _ => None,
        }
    }
}

/// Source of terminal events (keyboard, resize, focus)
pub trait TerminalEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<QuizEvent, RecvTimeoutError>;
}

/// Production event source using crossterm.
///
/// Focus events only arrive when the terminal has focus reporting enabled
/// (`crossterm::event::EnableFocusChange`); the caller turns that on.
pub struct CrosstermEventSource {
    rx: Receiver<QuizEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let ev = match event::read() {
                Ok(CtEvent::Key(key)) => QuizEvent::Key(key),
                Ok(CtEvent::Resize(_, _)) => QuizEvent::Resize,
                Ok(CtEvent::FocusLost) => QuizEvent::FocusLost,
                Ok(CtEvent::FocusGained) => QuizEvent::FocusGained,
                Ok(_) => continue,
                Err(_) => break,
            };
            if tx.send(ev).is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<QuizEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<QuizEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<QuizEvent>) -> Self {
        Self { rx }
    }
}

impl TerminalEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<QuizEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Runner that advances the application one event/tick at a time.
///
/// Ticks are scheduled against a deadline, so a steady stream of events
/// (key repeat, resizes, focus flapping) can delay a tick by at most the
/// time it takes to handle one event, never skip it.
pub struct Runner<E: TerminalEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
    next_tick: Cell<Instant>,
}

impl<E: TerminalEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        let next_tick = Cell::new(Instant::now() + ticker.interval());
        Self {
            event_source,
            ticker,
            next_tick,
        }
    }

    pub fn tick_secs(&self) -> f64 {
        self.ticker.interval().as_secs_f64()
    }

    /// Returns the next event, or Tick once the tick deadline has passed
    pub fn step(&self) -> QuizEvent {
        let deadline = self.next_tick.get();
        let now = Instant::now();
        if now >= deadline {
            return self.tick(deadline);
        }

        match self.event_source.recv_timeout(deadline - now) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) => self.tick(deadline),
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
                self.tick(deadline)
            }
        }
    }

    fn tick(&self, deadline: Instant) -> QuizEvent {
        self.next_tick.set(deadline + self.ticker.interval());
        QuizEvent::Tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn step_returns_tick_on_timeout() {
        let (_tx, rx) = mpsc::channel();
        let runner = Runner::new(
            TestEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(1)),
        );

        assert_matches!(runner.step(), QuizEvent::Tick);
    }

    #[test]
    fn step_passes_through_events() {
        let (tx, rx) = mpsc::channel();
        tx.send(QuizEvent::FocusLost).unwrap();
        let runner = Runner::new(
            TestEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(10)),
        );

        assert_matches!(runner.step(), QuizEvent::FocusLost);
    }

    #[test]
    fn disconnected_source_ticks() {
        let (tx, rx) = mpsc::channel::<QuizEvent>();
        drop(tx);
        let runner = Runner::new(
            TestEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(1)),
        );
        assert_matches!(runner.step(), QuizEvent::Tick);
    }

    #[test]
    fn focus_events_map_to_host_signals() {
        assert_eq!(QuizEvent::FocusLost.as_host_event(), Some(HostEvent::Blur));
        assert_eq!(QuizEvent::FocusGained.as_host_event(), Some(HostEvent::Focus));
        assert_eq!(QuizEvent::Resize.as_host_event(), None);
        assert_eq!(QuizEvent::Tick.as_host_event(), None);
    }

    #[test]
    fn ticks_keep_coming_under_a_steady_event_stream() {
        let (tx, rx) = mpsc::channel();
        let producer = std::thread::spawn(move || {
            let start = Instant::now();
            while start.elapsed() < Duration::from_millis(400) {
                if tx.send(QuizEvent::Resize).is_err() {
                    break;
                }
                std::thread::sleep(Duration::from_millis(5));
            }
        });
        let runner = Runner::new(
            TestEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(50)),
        );

        let start = Instant::now();
        let mut ticks = 0;
        while start.elapsed() < Duration::from_millis(300) {
            if let QuizEvent::Tick = runner.step() {
                ticks += 1;
            }
        }
        producer.join().unwrap();

        assert!(ticks >= 4, "expected ticks despite events, got {ticks}");
    }

    #[test]
    fn tick_secs_matches_interval() {
        let (_tx, rx) = mpsc::channel();
        let runner = Runner::new(
            TestEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(250)),
        );
        assert_eq!(runner.tick_secs(), 0.25);
    }
}
