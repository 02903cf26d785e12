//! Master clock seen by the wait primitive.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Cycle counter driving the emulated PIO blocks.
pub trait MasterClock: Send + Sync {
    /// Current cycle count; wraps on overflow.
    fn cycle(&self) -> u64;

    /// Blocks until the cycle count differs from `seen` or `timeout` elapses.
    ///
    /// Returns immediately when the count already moved on. Spurious wakeups
    /// are allowed; callers re-check their condition.
    fn await_phase_change(&self, seen: u64, timeout: Option<Duration>);
}

/// Clock advanced explicitly by its owner.
#[derive(Debug, Default)]
pub struct SteppedClock {
    cycle: Mutex<u64>,
    changed: Condvar,
}

impl SteppedClock {
    /// Creates a clock at cycle 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clock at `cycle`.
    #[must_use]
    pub fn starting_at(cycle: u64) -> Self {
        Self {
            cycle: Mutex::new(cycle),
            changed: Condvar::new(),
        }
    }

    /// Advances the clock by `cycles` and wakes every waiter.
    pub fn advance(&self, cycles: u64) {
        let mut cycle = self.cycle.lock().unwrap_or_else(PoisonError::into_inner);
        *cycle = cycle.wrapping_add(cycles);
        drop(cycle);
        self.changed.notify_all();
    }
}

impl MasterClock for SteppedClock {
    fn cycle(&self) -> u64 {
        *self.cycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn await_phase_change(&self, seen: u64, timeout: Option<Duration>) {
        let cycle = self.cycle.lock().unwrap_or_else(PoisonError::into_inner);
        if *cycle != seen {
            return;
        }
        match timeout {
            Some(timeout) => {
                drop(
                    self.changed
                        .wait_timeout_while(cycle, timeout, |cycle| *cycle == seen)
                        .unwrap_or_else(PoisonError::into_inner),
                );
            }
            None => {
                drop(
                    self.changed
                        .wait_while(cycle, |cycle| *cycle == seen)
                        .unwrap_or_else(PoisonError::into_inner),
                );
            }
        }
    }
}

/// Whether `now` lies outside the half-open cycle window `[start, stop)`.
///
/// Both ends may have wrapped independently.
#[must_use]
pub const fn timed_out(start: u64, stop: u64, now: u64) -> bool {
    if start < stop {
        now < start || now >= stop
    } else {
        now < start && now >= stop
    }
}

#[cfg(test)]
mod tests {
    use super::{timed_out, MasterClock, SteppedClock};
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn window_without_wrap() {
        assert!(!timed_out(10, 20, 10));
        assert!(!timed_out(10, 20, 19));
        assert!(timed_out(10, 20, 20));
        assert!(timed_out(10, 20, 9));
    }

    #[test]
    fn window_with_wrap() {
        let start = u64::MAX - 5;
        let stop = 4;
        assert!(!timed_out(start, stop, u64::MAX));
        assert!(!timed_out(start, stop, 3));
        assert!(timed_out(start, stop, 4));
        assert!(timed_out(start, stop, 100));
    }

    #[test]
    fn advance_wakes_waiter() {
        let clock = Arc::new(SteppedClock::starting_at(7));
        let waiter = {
            let clock = Arc::clone(&clock);
            thread::spawn(move || clock.await_phase_change(7, None))
        };
        thread::sleep(Duration::from_millis(10));
        clock.advance(1);
        waiter.join().unwrap();
        assert_eq!(clock.cycle(), 8);
    }

    #[test]
    fn stale_observation_returns_immediately() {
        let clock = SteppedClock::new();
        clock.advance(3);
        let started = Instant::now();
        clock.await_phase_change(0, None);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn timeout_bounds_the_wait() {
        let clock = SteppedClock::new();
        let started = Instant::now();
        clock.await_phase_change(0, Some(Duration::from_millis(20)));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    proptest! {
        #[test]
        fn every_cycle_inside_the_window_is_live(start in any::<u64>(), length in 1_u64..1_000, step in 0_u64..1_000) {
            let stop = start.wrapping_add(length);
            let now = start.wrapping_add(step);
            prop_assert_eq!(timed_out(start, stop, now), step >= length);
        }
    }
}
