//! Haptic feedback for phase transitions and session lifecycle.
//!
//! The engine talks to a `FeedbackSink`. `HapticSink` turns signals into
//! discrete `Pulse`s for a `PulseDriver`, which is the hardware boundary.

use crate::{Error, Phase, Result};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// Signal delivered to a feedback sink
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedbackSignal {
    /// A new cycle has begun
    PhaseEntered { phase: Phase, intensity: f64 },
    SessionStarted,
    SessionStopped,
    SessionCompleted,
}

impl FeedbackSignal {
    /// Pulse this signal should produce, if any
    pub fn pulse(&self) -> Option<Pulse> {
        match *self {
            FeedbackSignal::PhaseEntered { phase, intensity } => classify(phase, intensity),
            FeedbackSignal::SessionStarted => Some(Pulse::Start),
            FeedbackSignal::SessionStopped => Some(Pulse::Stop),
            FeedbackSignal::SessionCompleted => Some(Pulse::Success),
        }
    }
}

/// Discrete output pulse understood by a driver
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pulse {
    StrongRise,
    MediumRise,
    StrongFall,
    MediumFall,
    Notification,
    Tick,
    Start,
    Stop,
    Success,
}

/// Map a phase transition to a pulse.
///
/// Inhales rise and exhales fall, with strength picked by intensity.
/// Holds get a notification above 0.3. Pauses are nearly silent: a tick
/// above 0.15 and nothing otherwise.
pub fn classify(phase: Phase, intensity: f64) -> Option<Pulse> {
    match phase {
        Phase::Inhale => Some(if intensity > 0.7 {
            Pulse::StrongRise
        } else if intensity > 0.4 {
            Pulse::MediumRise
        } else {
            Pulse::Tick
        }),
        Phase::Exhale => Some(if intensity > 0.7 {
            Pulse::StrongFall
        } else if intensity > 0.4 {
            Pulse::MediumFall
        } else {
            Pulse::Tick
        }),
        Phase::Hold | Phase::HoldExhale => Some(if intensity > 0.3 {
            Pulse::Notification
        } else {
            Pulse::Tick
        }),
        Phase::Pause => (intensity > 0.15).then_some(Pulse::Tick),
    }
}

/// Consumer of feedback signals, called synchronously from the tick path.
///
/// Implementations must return quickly and must not panic. Errors are
/// logged by the engine and never affect session state, but a panic unwinds
/// through `tick` and ends the runner's worker thread.
pub trait FeedbackSink: Send {
    fn signal(&mut self, signal: &FeedbackSignal) -> Result<()>;
}

/// Hardware boundary: plays one pulse
pub trait PulseDriver: Send {
    fn play(&mut self, pulse: Pulse) -> Result<()>;
}

/// Feedback sink that classifies signals into pulses for a driver
pub struct HapticSink<D: PulseDriver> {
    driver: D,
    min_intensity: f64,
}

impl<D: PulseDriver> HapticSink<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            min_intensity: 0.0,
        }
    }

    /// Suppress phase pulses whose intensity is below `min_intensity`
    pub fn with_min_intensity(mut self, min_intensity: f64) -> Self {
        self.min_intensity = min_intensity;
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }
}

impl<D: PulseDriver> FeedbackSink for HapticSink<D> {
    fn signal(&mut self, signal: &FeedbackSignal) -> Result<()> {
        if let FeedbackSignal::PhaseEntered { intensity, .. } = signal {
            if *intensity < self.min_intensity {
                return Ok(());
            }
        }
        match signal.pulse() {
            Some(pulse) => self.driver.play(pulse),
            None => Ok(()),
        }
    }
}

/// Sink that drops every signal
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl FeedbackSink for NullSink {
    fn signal(&mut self, _signal: &FeedbackSignal) -> Result<()> {
        Ok(())
    }
}

/// Sink that keeps every signal it receives. Clones share the same log.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    log: Arc<Mutex<Vec<FeedbackSignal>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the signals received so far
    pub fn signals(&self) -> Vec<FeedbackSignal> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Number of `PhaseEntered` signals received
    pub fn phase_count(&self) -> usize {
        self.signals()
            .iter()
            .filter(|s| matches!(s, FeedbackSignal::PhaseEntered { .. }))
            .count()
    }

    pub fn clear(&self) {
        if let Ok(mut log) = self.log.lock() {
            log.clear();
        }
    }
}

impl FeedbackSink for RecordingSink {
    fn signal(&mut self, signal: &FeedbackSignal) -> Result<()> {
        self.log
            .lock()
            .map_err(|_| Error::Feedback("recording sink lock poisoned".into()))?
            .push(*signal);
        Ok(())
    }
}
