//! Clock sources for the session engine.
//!
//! The engine only ever sees `Timestamp` values, so tests and simulations can
//! drive it with synthetic time instead of waiting for real time to pass.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time since the clock's origin
pub type Timestamp = Duration;

/// Source of monotonic timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time backed by `std::time::Instant`
#[derive(Clone, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        self.origin.elapsed()
    }
}

/// Monotonic time running `scale` times faster than real time
#[derive(Clone, Debug)]
pub struct ScaledClock {
    inner: MonotonicClock,
    scale: f64,
}

impl ScaledClock {
    /// `scale` must be positive and finite; anything else falls back to 1.0
    pub fn new(scale: f64) -> Self {
        let scale = if scale > 0.0 && scale.is_finite() {
            scale
        } else {
            tracing::warn!("Ignoring invalid time scale {}, using real time", scale);
            1.0
        };
        Self {
            inner: MonotonicClock::new(),
            scale,
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }
}

impl Clock for ScaledClock {
    fn now(&self) -> Timestamp {
        scale_elapsed(self.inner.now(), self.scale)
    }
}

/// `elapsed * scale`, saturating at `Duration::MAX`
fn scale_elapsed(elapsed: Duration, scale: f64) -> Timestamp {
    Duration::try_from_secs_f64(elapsed.as_secs_f64() * scale).unwrap_or(Duration::MAX)
}

/// Manually driven clock. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(at: Timestamp) -> Self {
        let clock = Self::new();
        clock.set(at);
        clock
    }

    /// Jump to `at`. Going backwards is allowed so callers can exercise
    /// non-monotonic input.
    pub fn set(&self, at: Timestamp) {
        self.nanos.store(to_nanos(at), Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(to_nanos(by), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

fn to_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Timestamp from fractional seconds; negative or NaN input maps to zero
pub fn seconds(secs: f64) -> Timestamp {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        assert_eq!(clock.now(), Duration::ZERO);

        handle.advance(Duration::from_millis(1500));
        assert_eq!(clock.now(), seconds(1.5));

        handle.set(seconds(0.25));
        assert_eq!(clock.now(), seconds(0.25));
    }

    #[test]
    fn test_monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn test_scaled_clock_rejects_bad_scale() {
        assert_eq!(ScaledClock::new(0.0).scale(), 1.0);
        assert_eq!(ScaledClock::new(f64::NAN).scale(), 1.0);
        assert_eq!(ScaledClock::new(10.0).scale(), 10.0);
    }

    #[test]
    fn test_huge_scale_saturates() {
        assert_eq!(scale_elapsed(Duration::from_secs(1), 1e300), Duration::MAX);
        assert_eq!(scale_elapsed(Duration::from_secs(2), 0.5), Duration::from_secs(1));
        assert_eq!(scale_elapsed(Duration::ZERO, 1e300), Duration::ZERO);

        let clock = ScaledClock::new(1e300);
        assert_eq!(clock.scale(), 1e300);
        let _ = clock.now();
    }

    #[test]
    fn test_seconds_helper() {
        assert_eq!(seconds(4.0), Duration::from_secs(4));
        assert_eq!(seconds(-1.0), Duration::ZERO);
    }
}
