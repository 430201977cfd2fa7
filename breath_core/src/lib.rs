#![forbid(unsafe_code)]

//! Core domain model and timing engine for the breathwork system.
//!
//! This crate provides:
//! - Domain types (phases, cycles, patterns, run states)
//! - The built-in pattern catalog and external pattern loading
//! - Clock abstraction for real and synthetic time
//! - The session engine state machine and its threaded runner
//! - Feedback (haptic) and progress interfaces

pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod clock;
pub mod feedback;
pub mod progress;
pub mod engine;
pub mod runner;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_catalog, get_default_catalog, load_patterns_from, PatternCatalog};
pub use config::Config;
pub use clock::{Clock, ManualClock, MonotonicClock, ScaledClock, Timestamp};
pub use feedback::{FeedbackSignal, FeedbackSink, HapticSink, Pulse, PulseDriver, RecordingSink};
pub use progress::{ProgressObserver, ProgressUpdate, RecordingObserver};
pub use engine::{SessionEngine, SessionEvent};
pub use runner::SessionRunner;
