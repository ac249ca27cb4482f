// Library surface for the binary and the headless integration tests.
// The terminal UI lives in main.rs and is not part of it.
pub mod app_dirs;
pub mod config;
pub mod detector;
pub mod error;
pub mod events;
pub mod history;
pub mod logging;
pub mod quiz;
pub mod runtime;
pub mod session;
pub mod store;

pub use detector::{DetectorState, FocusDetectionConfig, FocusDetector};
pub use error::{ProctorError, Result};
pub use events::{EventKind, EventSource, HostEvent, HostEvents, Subscription, Visibility};
pub use store::{QuizStore, QuizTakingState};
