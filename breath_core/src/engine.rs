//! Session engine: the state machine that walks a pattern's cycles.
//!
//! The engine is driven by `tick(now)` from a periodic scheduler. Each tick
//! recomputes in-cycle progress and, when cycle boundaries have been crossed,
//! advances through every crossed cycle one at a time so no transition is
//! ever skipped.
//!
//! ## States
//!
//! - `Idle` → `Running` on `start`
//! - `Running` → `Paused` on `pause`, back on `resume`
//! - `Running` → `Completed` when a finite pattern runs out of repetitions
//! - any → `Idle` on `stop`
//!
//! Cycle boundaries are anchored to the previous boundary rather than to the
//! tick that observed them, so coarse or jittery tick cadence never
//! accumulates drift.

use crate::clock::{Clock, Timestamp};
use crate::feedback::{FeedbackSignal, FeedbackSink, NullSink};
use crate::progress::{NullObserver, ProgressObserver, ProgressUpdate};
use crate::{Cycle, Error, Pattern, Phase, Result, RunState};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Discrete transition produced by an engine operation
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    SessionStarted {
        session_id: Uuid,
    },
    PhaseEntered {
        cycle_index: usize,
        repetition: u32,
        phase: Phase,
        intensity: f64,
    },
    SessionCompleted,
    SessionStopped,
}

impl SessionEvent {
    fn feedback(&self) -> FeedbackSignal {
        match *self {
            SessionEvent::SessionStarted { .. } => FeedbackSignal::SessionStarted,
            SessionEvent::PhaseEntered {
                phase, intensity, ..
            } => FeedbackSignal::PhaseEntered { phase, intensity },
            SessionEvent::SessionCompleted => FeedbackSignal::SessionCompleted,
            SessionEvent::SessionStopped => FeedbackSignal::SessionStopped,
        }
    }
}

/// Mutable state of the active session
#[derive(Clone, Debug)]
struct ActiveSession {
    id: Uuid,
    pattern: Arc<Pattern>,
    cycle_index: usize,
    repetition: u32,
    phase_start: Timestamp,
    progress: f64,
    /// Latest time the engine has observed; earlier input is clamped to it
    last_seen: Timestamp,
    /// Time already spent in the current cycle when paused
    paused_elapsed: Option<Duration>,
}

impl ActiveSession {
    fn current_cycle(&self) -> &Cycle {
        &self.pattern.cycles[self.cycle_index]
    }

    /// Clamp `now` so time never runs backwards for this session
    fn observe(&mut self, now: Timestamp) -> Timestamp {
        if now < self.last_seen {
            tracing::warn!(
                session_id = %self.id,
                "Non-monotonic clock input: {:?} < {:?}, clamping",
                now,
                self.last_seen
            );
            self.last_seen
        } else {
            self.last_seen = now;
            now
        }
    }
}

/// Drives one breathing session at a time.
///
/// All operations take `&mut self`; hosts that share an engine across
/// threads must serialize access (see `SessionRunner`).
pub struct SessionEngine {
    clock: Arc<dyn Clock>,
    feedback: Box<dyn FeedbackSink>,
    observer: Box<dyn ProgressObserver>,
    run_state: RunState,
    session: Option<ActiveSession>,
}

impl SessionEngine {
    /// Engine with no feedback sink or progress observer attached
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            feedback: Box::new(NullSink),
            observer: Box::new(NullObserver),
            run_state: RunState::Idle,
            session: None,
        }
    }

    pub fn with_feedback(mut self, sink: impl FeedbackSink + 'static) -> Self {
        self.feedback = Box::new(sink);
        self
    }

    pub fn with_observer(mut self, observer: impl ProgressObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // ------------------------------------------------------------------
    // Control surface
    // ------------------------------------------------------------------

    /// Begin `pattern` from its first cycle.
    ///
    /// An invalid pattern is rejected before anything changes. Any previous
    /// session is stopped first, which emits `SessionStopped` for it.
    pub fn start(&mut self, pattern: Arc<Pattern>) -> Result<Vec<SessionEvent>> {
        pattern.validate()?;

        let mut events = self.stop();

        let now = self.clock.now();
        let session = ActiveSession {
            id: Uuid::new_v4(),
            pattern,
            cycle_index: 0,
            repetition: 0,
            phase_start: now,
            progress: 0.0,
            last_seen: now,
            paused_elapsed: None,
        };

        tracing::info!(
            session_id = %session.id,
            pattern = %session.pattern.id,
            cycles = session.pattern.cycles.len(),
            repetitions = ?session.pattern.repetitions,
            "Session started"
        );

        let first = session.current_cycle();
        let started = vec![
            SessionEvent::SessionStarted {
                session_id: session.id,
            },
            SessionEvent::PhaseEntered {
                cycle_index: 0,
                repetition: 0,
                phase: first.phase,
                intensity: first.intensity,
            },
        ];

        self.session = Some(session);
        self.run_state = RunState::Running;
        self.publish(&started);
        events.extend(started);
        Ok(events)
    }

    /// Advance the session to `now`.
    ///
    /// A no-op outside `Running`. Emits one `PhaseEntered` per crossed cycle
    /// and `SessionCompleted` when a finite pattern finishes.
    pub fn tick(&mut self, now: Timestamp) -> Vec<SessionEvent> {
        if self.run_state != RunState::Running {
            tracing::trace!("Ignoring tick while {}", self.run_state);
            return Vec::new();
        }
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };

        let now = session.observe(now);
        let mut events = Vec::new();
        let mut completed = false;

        loop {
            let length = session.current_cycle().length();
            let elapsed = now.saturating_sub(session.phase_start);

            if elapsed < length {
                session.progress = fraction(elapsed, length);
                break;
            }

            // Boundary crossed: the next cycle starts exactly where this one ended
            let boundary = session.phase_start + length;
            session.cycle_index += 1;
            if session.cycle_index == session.pattern.cycles.len() {
                session.cycle_index = 0;
                session.repetition += 1;
            }

            if let Some(limit) = session.pattern.repetitions {
                if session.repetition >= limit {
                    session.progress = 1.0;
                    completed = true;
                    events.push(SessionEvent::SessionCompleted);
                    break;
                }
            }

            session.phase_start = boundary;
            session.progress = 0.0;
            let cycle = session.current_cycle();
            tracing::debug!(
                session_id = %session.id,
                cycle_index = session.cycle_index,
                repetition = session.repetition,
                "Entering {}",
                cycle.phase
            );
            events.push(SessionEvent::PhaseEntered {
                cycle_index: session.cycle_index,
                repetition: session.repetition,
                phase: cycle.phase,
                intensity: cycle.intensity,
            });
        }

        if completed {
            tracing::info!(
                session_id = %session.id,
                repetitions = session.repetition,
                "Session completed"
            );
            self.run_state = RunState::Completed;
        }

        self.publish(&events);
        if !completed {
            let update = self.snapshot();
            self.observer.on_progress(&update);
        }
        events
    }

    /// Tick using the engine's own clock
    pub fn tick_now(&mut self) -> Vec<SessionEvent> {
        let now = self.clock.now();
        self.tick(now)
    }

    /// Freeze the current cycle, keeping the time already spent in it.
    ///
    /// Brings the session up to date first, so any boundaries crossed since
    /// the last tick are still reported. If that finishes the session, the
    /// pause does not happen.
    pub fn pause(&mut self) -> Vec<SessionEvent> {
        if self.run_state != RunState::Running {
            tracing::debug!("Ignoring pause while {}", self.run_state);
            return Vec::new();
        }

        let events = self.tick_now();
        if self.run_state != RunState::Running {
            return events;
        }

        if let Some(session) = self.session.as_mut() {
            let elapsed = session.last_seen.saturating_sub(session.phase_start);
            session.paused_elapsed = Some(elapsed);
            tracing::info!(
                session_id = %session.id,
                "Session paused {:?} into cycle {}",
                elapsed,
                session.cycle_index
            );
        }
        self.run_state = RunState::Paused;
        let update = self.snapshot();
        self.observer.on_progress(&update);
        events
    }

    /// Continue a paused session from where it stopped
    pub fn resume(&mut self) -> Vec<SessionEvent> {
        if self.run_state != RunState::Paused {
            tracing::debug!("Ignoring resume while {}", self.run_state);
            return Vec::new();
        }

        let now = self.clock.now();
        if let Some(session) = self.session.as_mut() {
            let now = session.observe(now);
            let elapsed = session.paused_elapsed.take().unwrap_or_default();
            session.phase_start = now.saturating_sub(elapsed);
            tracing::info!(session_id = %session.id, "Session resumed");
        }
        self.run_state = RunState::Running;
        let update = self.snapshot();
        self.observer.on_progress(&update);
        Vec::new()
    }

    /// Clear the session and return to `Idle`. Stopping an idle engine does nothing.
    pub fn stop(&mut self) -> Vec<SessionEvent> {
        if self.run_state == RunState::Idle {
            return Vec::new();
        }

        if let Some(session) = self.session.take() {
            tracing::info!(
                session_id = %session.id,
                from = %self.run_state,
                "Session stopped"
            );
        }
        self.run_state = RunState::Idle;

        let events = vec![SessionEvent::SessionStopped];
        self.publish(&events);
        events
    }

    /// Error unless the engine is in `expected`, for hosts that want strict control checks
    pub fn ensure_state(&self, expected: RunState) -> Result<()> {
        if self.run_state == expected {
            Ok(())
        } else {
            Err(Error::InvalidOperation(format!(
                "engine is {}, expected {}",
                self.run_state, expected
            )))
        }
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    /// True while the scheduler should keep calling `tick`
    pub fn wants_ticks(&self) -> bool {
        self.run_state == RunState::Running
    }

    pub fn progress(&self) -> f64 {
        self.session.as_ref().map(|s| s.progress).unwrap_or(0.0)
    }

    pub fn cycle_index(&self) -> usize {
        self.session.as_ref().map(|s| s.cycle_index).unwrap_or(0)
    }

    pub fn repetition(&self) -> u32 {
        self.session.as_ref().map(|s| s.repetition).unwrap_or(0)
    }

    pub fn current_phase(&self) -> Option<Phase> {
        self.current_cycle().map(|c| c.phase)
    }

    pub fn current_cycle(&self) -> Option<&Cycle> {
        self.session.as_ref().map(|s| s.current_cycle())
    }

    pub fn pattern(&self) -> Option<&Arc<Pattern>> {
        self.session.as_ref().map(|s| &s.pattern)
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.id)
    }

    pub fn snapshot(&self) -> ProgressUpdate {
        match &self.session {
            Some(session) => ProgressUpdate {
                phase: Some(session.current_cycle().phase),
                progress: session.progress,
                cycle_index: session.cycle_index,
                repetition: session.repetition,
                run_state: self.run_state,
            },
            None => ProgressUpdate::idle(),
        }
    }

    // ------------------------------------------------------------------
    // Notification
    // ------------------------------------------------------------------

    /// Deliver events to the sink and observer. State is final by the time
    /// this runs, so a failing sink cannot disturb it.
    fn publish(&mut self, events: &[SessionEvent]) {
        for event in events {
            let signal = event.feedback();
            if let Err(e) = self.feedback.signal(&signal) {
                tracing::warn!(
                    session_id = ?self.session_id(),
                    "Feedback sink failed on {:?}: {}",
                    signal,
                    e
                );
            }

            let update = match *event {
                SessionEvent::PhaseEntered {
                    cycle_index,
                    repetition,
                    phase,
                    ..
                } => ProgressUpdate {
                    phase: Some(phase),
                    progress: 0.0,
                    cycle_index,
                    repetition,
                    run_state: RunState::Running,
                },
                SessionEvent::SessionCompleted | SessionEvent::SessionStopped => self.snapshot(),
                SessionEvent::SessionStarted { .. } => continue,
            };
            self.observer.on_progress(&update);
        }
    }
}

fn fraction(elapsed: Duration, length: Duration) -> f64 {
    (elapsed.as_secs_f64() / length.as_secs_f64()).clamp(0.0, 1.0)
}
