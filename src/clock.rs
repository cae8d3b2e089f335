//! The `_current_time_seconds` mocking seam (spec §9).
//!
//! The planner and driver never call `SystemTime::now()` directly — they go
//! through a `Clock` so tests can freeze and advance time deterministically,
//! the same role the original Python suite's `_current_time_seconds` mock
//! played.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current time, in UTC epoch seconds.
pub trait Clock: Send + Sync {
    fn now_seconds(&self) -> f64;
}

/// Real wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_seconds(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }
}

/// A clock that returns a fixed, externally-advanced value. Stores
/// microseconds internally so fractional seconds survive exactly instead of
/// drifting through repeated float round-trips.
#[derive(Debug)]
pub struct FixedClock {
    micros: AtomicU64,
}

impl FixedClock {
    pub fn new(now_seconds: f64) -> Self {
        Self {
            micros: AtomicU64::new((now_seconds * 1_000_000.0).round() as u64),
        }
    }

    pub fn set(&self, now_seconds: f64) {
        self.micros
            .store((now_seconds * 1_000_000.0).round() as u64, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_seconds: f64) {
        let delta_micros = (delta_seconds * 1_000_000.0).round() as i64;
        self.micros
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |m| {
                Some((m as i64 + delta_micros).max(0) as u64)
            })
            .ok();
    }
}

impl Clock for FixedClock {
    fn now_seconds(&self) -> f64 {
        self.micros.load(Ordering::SeqCst) as f64 / 1_000_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_reports_set_value() {
        let clock = FixedClock::new(1488974400.0);
        assert_eq!(clock.now_seconds(), 1488974400.0);
    }

    #[test]
    fn fixed_clock_advances() {
        let clock = FixedClock::new(1.0);
        clock.advance(61.0);
        assert_eq!(clock.now_seconds(), 62.0);
    }
}
