//! Progress reporting for renderers.

use crate::{Phase, RunState};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// Snapshot of session progress sent to observers
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ProgressUpdate {
    /// Phase of the current cycle; `None` once the session is cleared
    pub phase: Option<Phase>,
    /// Fraction of the current cycle elapsed, always within [0.0, 1.0]
    pub progress: f64,
    pub cycle_index: usize,
    pub repetition: u32,
    pub run_state: RunState,
}

impl ProgressUpdate {
    pub fn idle() -> Self {
        Self {
            phase: None,
            progress: 0.0,
            cycle_index: 0,
            repetition: 0,
            run_state: RunState::Idle,
        }
    }
}

/// Receives a `ProgressUpdate` on every tick and every state transition.
///
/// Called synchronously from the tick path, so it must not block or panic.
pub trait ProgressObserver: Send {
    fn on_progress(&mut self, update: &ProgressUpdate);
}

impl<F> ProgressObserver for F
where
    F: FnMut(&ProgressUpdate) + Send,
{
    fn on_progress(&mut self, update: &ProgressUpdate) {
        self(update)
    }
}

/// Observer that ignores every update
#[derive(Clone, Copy, Debug, Default)]
pub struct NullObserver;

impl ProgressObserver for NullObserver {
    fn on_progress(&mut self, _update: &ProgressUpdate) {}
}

/// Observer that keeps every update. Clones share the same log.
#[derive(Clone, Debug, Default)]
pub struct RecordingObserver {
    log: Arc<Mutex<Vec<ProgressUpdate>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<ProgressUpdate> {
        self.log.lock().ok().and_then(|log| log.last().copied())
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_progress(&mut self, update: &ProgressUpdate) {
        if let Ok(mut log) = self.log.lock() {
            log.push(*update);
        }
    }
}
