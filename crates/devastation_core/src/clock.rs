//! # Clocks
//!
//! Two notions of time: monotonic real time (throttles ward polling) and
//! simulated seconds (regeneration delays, spawn and repair cooldowns).

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Time source consulted by the simulation.
pub trait Clock: Send + Sync {
    /// Real time elapsed since the clock started.
    fn real_elapsed(&self) -> Duration;

    /// Simulated seconds. May move backward; consumers see that as no time
    /// elapsed.
    fn sim_seconds(&self) -> f64;
}

/// Wall-clock time: both notions advance with [`Instant`].
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    started: Instant,
}

impl SystemClock {
    /// Starts a clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn real_elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn sim_seconds(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

#[derive(Debug, Default)]
struct ManualState {
    real: Duration,
    sim: f64,
}

/// Hand-driven clock for tests and replay. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    /// Creates a clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves both real and simulated time forward.
    pub fn advance(&self, by: Duration) {
        let mut state = self.state.lock();
        state.real += by;
        state.sim += by.as_secs_f64();
    }

    /// Sets simulated time directly (may go backward).
    pub fn set_sim_seconds(&self, seconds: f64) {
        self.state.lock().sim = seconds;
    }
}

impl Clock for ManualClock {
    fn real_elapsed(&self) -> Duration {
        self.state.lock().real
    }

    fn sim_seconds(&self) -> f64 {
        self.state.lock().sim
    }
}

/// Monotonic view of a simulated clock that may jump backward.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SimTime {
    latest: f64,
}

impl SimTime {
    /// Folds in a raw reading and returns the monotonic time.
    pub fn observe(&mut self, raw: f64) -> f64 {
        if raw.is_finite() && raw > self.latest {
            self.latest = raw;
        }
        self.latest
    }

    /// Latest monotonic time.
    #[inline]
    #[must_use]
    pub fn now(&self) -> f64 {
        self.latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        handle.advance(Duration::from_millis(1500));
        assert_eq!(clock.real_elapsed(), Duration::from_millis(1500));
        assert!((clock.sim_seconds() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_backward_sim_time_is_no_elapsed_time() {
        let mut time = SimTime::default();
        assert!((time.observe(10.0) - 10.0).abs() < 1e-9);
        assert!((time.observe(4.0) - 10.0).abs() < 1e-9);
        assert!((time.observe(f64::NAN) - 10.0).abs() < 1e-9);
        assert!((time.observe(12.0) - 12.0).abs() < 1e-9);
    }
}
