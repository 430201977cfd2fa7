//! Threaded scheduler for a `SessionEngine`.
//!
//! The engine is moved onto a single worker thread and never touched from
//! anywhere else. Control calls travel over a channel and are applied in
//! order between ticks, and each call blocks until the worker has applied
//! it. Once `pause` or `stop` returns, no further tick will run for that
//! session.

use crate::engine::SessionEngine;
use crate::progress::ProgressUpdate;
use crate::{Error, Pattern, Result, RunState};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

enum Op {
    Start(Arc<Pattern>),
    Pause,
    Resume,
    Stop,
    Shutdown,
}

struct Command {
    op: Op,
    reply: Sender<Result<()>>,
}

/// Latest engine snapshot, published by the worker after every step
#[derive(Default)]
struct Shared {
    snapshot: Mutex<Option<ProgressUpdate>>,
    changed: Condvar,
}

impl Shared {
    fn publish(&self, update: ProgressUpdate) {
        let mut guard = self.snapshot.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(update);
        self.changed.notify_all();
    }

    fn current(&self) -> ProgressUpdate {
        let guard = self.snapshot.lock().unwrap_or_else(|e| e.into_inner());
        (*guard).unwrap_or_else(ProgressUpdate::idle)
    }
}

/// Owns the worker thread that ticks a session engine at a fixed cadence
pub struct SessionRunner {
    tx: Sender<Command>,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl SessionRunner {
    /// Move `engine` onto a new worker thread ticking every `tick_interval`
    pub fn spawn(engine: SessionEngine, tick_interval: Duration) -> Result<Self> {
        if tick_interval.is_zero() {
            return Err(Error::Config("tick interval must be greater than zero".into()));
        }

        let (tx, rx) = mpsc::channel();
        let shared = Arc::new(Shared::default());
        shared.publish(engine.snapshot());

        let worker_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("breath-session".into())
            .spawn(move || worker(engine, rx, worker_shared, tick_interval))?;

        tracing::debug!("Session runner started with {:?} cadence", tick_interval);
        Ok(Self {
            tx,
            shared,
            handle: Some(handle),
        })
    }

    pub fn start(&self, pattern: Arc<Pattern>) -> Result<()> {
        self.send(Op::Start(pattern))
    }

    pub fn pause(&self) -> Result<()> {
        self.send(Op::Pause)
    }

    pub fn resume(&self) -> Result<()> {
        self.send(Op::Resume)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(Op::Stop)
    }

    pub fn run_state(&self) -> RunState {
        self.shared.current().run_state
    }

    /// Latest progress published by the worker
    pub fn snapshot(&self) -> ProgressUpdate {
        self.shared.current()
    }

    /// Block until the session is no longer running or paused, or until
    /// `timeout` passes. Returns the state at that point.
    pub fn wait_until_settled(&self, timeout: Duration) -> RunState {
        let guard = self.shared.snapshot.lock().unwrap_or_else(|e| e.into_inner());
        let (guard, _) = self
            .shared
            .changed
            .wait_timeout_while(guard, timeout, |snapshot| {
                matches!(
                    (*snapshot).map(|s| s.run_state),
                    Some(RunState::Running) | Some(RunState::Paused)
                )
            })
            .unwrap_or_else(|e| e.into_inner());
        (*guard).map(|s| s.run_state).unwrap_or_default()
    }

    /// Stop any session and join the worker thread
    pub fn shutdown(mut self) -> Result<()> {
        self.shutdown_inner()
    }

    fn shutdown_inner(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        // The worker may already be gone; joining still reports a panic
        let _ = self.send(Op::Shutdown);
        handle
            .join()
            .map_err(|_| Error::Runner("session worker panicked".into()))
    }

    fn send(&self, op: Op) -> Result<()> {
        let (reply, response) = mpsc::channel();
        self.tx
            .send(Command { op, reply })
            .map_err(|_| Error::Runner("session worker has exited".into()))?;
        response
            .recv()
            .map_err(|_| Error::Runner("session worker dropped the request".into()))?
    }
}

impl Drop for SessionRunner {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown_inner() {
            tracing::warn!("Session runner shutdown failed: {}", e);
        }
    }
}

fn worker(
    mut engine: SessionEngine,
    rx: Receiver<Command>,
    shared: Arc<Shared>,
    tick_interval: Duration,
) {
    let mut next_tick = Instant::now() + tick_interval;

    loop {
        // Only wait with a deadline while the engine wants ticks; otherwise
        // nothing is scheduled until the next command arrives.
        let command = if engine.wants_ticks() {
            let wait = next_tick.saturating_duration_since(Instant::now());
            match rx.recv_timeout(wait) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        } else {
            match rx.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            }
        };

        let Some(Command { op, reply }) = command else {
            engine.tick_now();
            next_tick += tick_interval;
            let now = Instant::now();
            if next_tick <= now {
                // Fell behind; the engine catches up on elapsed cycles itself
                next_tick = now + tick_interval;
            }
            shared.publish(engine.snapshot());
            continue;
        };

        let was_ticking = engine.wants_ticks();
        let (result, shutting_down) = match op {
            Op::Start(pattern) => (engine.start(pattern).map(|_| ()), false),
            Op::Pause => {
                engine.pause();
                (Ok(()), false)
            }
            Op::Resume => {
                engine.resume();
                (Ok(()), false)
            }
            Op::Stop => {
                engine.stop();
                (Ok(()), false)
            }
            Op::Shutdown => {
                engine.stop();
                (Ok(()), true)
            }
        };

        if engine.wants_ticks() && !was_ticking {
            next_tick = Instant::now() + tick_interval;
        }
        shared.publish(engine.snapshot());
        let _ = reply.send(result);

        if shutting_down {
            break;
        }
    }

    // Anything still active is retired with the worker
    engine.stop();
    shared.publish(engine.snapshot());
    tracing::debug!("Session runner stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{seconds, ManualClock};
    use crate::feedback::{FeedbackSignal, RecordingSink};
    use crate::{build_default_catalog, Cycle, Phase};

    fn runner_with(clock: &ManualClock, sink: &RecordingSink) -> SessionRunner {
        let engine = SessionEngine::new(Arc::new(clock.clone())).with_feedback(sink.clone());
        SessionRunner::spawn(engine, Duration::from_millis(1)).unwrap()
    }

    #[test]
    fn test_zero_interval_rejected() {
        let engine = SessionEngine::new(Arc::new(ManualClock::new()));
        assert!(matches!(
            SessionRunner::spawn(engine, Duration::ZERO),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_runs_finite_pattern_to_completion() {
        let clock = ManualClock::new();
        let sink = RecordingSink::new();
        let runner = runner_with(&clock, &sink);
        let fire = build_default_catalog().require("breath_of_fire").unwrap();

        runner.start(fire).unwrap();
        assert_eq!(runner.run_state(), RunState::Running);

        clock.set(seconds(61.0));
        let state = runner.wait_until_settled(Duration::from_secs(5));

        assert_eq!(state, RunState::Completed);
        assert_eq!(sink.phase_count(), 120);
        assert_eq!(sink.signals().last(), Some(&FeedbackSignal::SessionCompleted));
        runner.shutdown().unwrap();
    }

    #[test]
    fn test_pause_cancels_ticks() {
        let clock = ManualClock::new();
        let sink = RecordingSink::new();
        let runner = runner_with(&clock, &sink);
        let boxed = build_default_catalog().require("box_breathing").unwrap();

        runner.start(boxed).unwrap();
        runner.pause().unwrap();
        assert_eq!(runner.run_state(), RunState::Paused);

        // Time moves on but nothing may be ticked while paused
        clock.set(seconds(100.0));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(sink.phase_count(), 1);
        assert_eq!(runner.snapshot().progress, 0.0);

        runner.resume().unwrap();
        assert_eq!(runner.run_state(), RunState::Running);
        runner.stop().unwrap();
        assert_eq!(runner.run_state(), RunState::Idle);
        assert_eq!(sink.signals().last(), Some(&FeedbackSignal::SessionStopped));
    }

    #[test]
    fn test_stop_leaves_no_stale_ticks() {
        let clock = ManualClock::new();
        let sink = RecordingSink::new();
        let runner = runner_with(&clock, &sink);
        let boxed = build_default_catalog().require("box_breathing").unwrap();

        runner.start(boxed).unwrap();
        runner.stop().unwrap();
        let after_stop = sink.signals().len();

        clock.set(seconds(50.0));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(sink.signals().len(), after_stop);
        assert_eq!(runner.wait_until_settled(Duration::from_millis(10)), RunState::Idle);
    }

    #[test]
    fn test_restart_replaces_session() {
        let clock = ManualClock::new();
        let sink = RecordingSink::new();
        let runner = runner_with(&clock, &sink);
        let catalog = build_default_catalog();

        runner.start(catalog.require("box_breathing").unwrap()).unwrap();
        clock.set(seconds(5.0));
        runner.start(catalog.require("whistle_breath").unwrap()).unwrap();

        let snapshot = runner.snapshot();
        assert_eq!(snapshot.run_state, RunState::Running);
        assert_eq!(snapshot.cycle_index, 0);
        assert_eq!(snapshot.phase, Some(Phase::Inhale));
        assert!(sink.signals().contains(&FeedbackSignal::SessionStopped));
    }

    #[test]
    fn test_invalid_pattern_reported_to_caller() {
        let clock = ManualClock::new();
        let sink = RecordingSink::new();
        let runner = runner_with(&clock, &sink);

        let mut pattern = (*build_default_catalog().require("box_breathing").unwrap()).clone();
        pattern.cycles = vec![Cycle {
            phase: Phase::Inhale,
            duration: -1.0,
            intensity: 0.5,
        }];

        let result = runner.start(Arc::new(pattern));
        assert!(matches!(result, Err(Error::InvalidPatternDefinition(_))));
        assert_eq!(runner.run_state(), RunState::Idle);
        assert!(sink.signals().is_empty());
    }
}
