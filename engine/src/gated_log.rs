//! Rate limiter for diagnostics that would otherwise repeat on every pass.

use chrono::Duration;
use pricenode_common::{constants, Timestamp};
use std::sync::atomic::{AtomicI64, Ordering};

const NEVER: i64 = i64::MIN;

/// Lets a diagnostic through at most once per interval.
///
/// Shared by reference across concurrent aggregations; only the first caller
/// to win the compare-exchange in a window gets `true`.
#[derive(Debug)]
pub struct GatedLog {
    interval_secs: i64,
    last_logged_secs: AtomicI64,
}

impl GatedLog {
    /// Create a gate with the given interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_secs: interval.num_seconds().max(0),
            last_logged_secs: AtomicI64::new(NEVER),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::seconds(self.interval_secs)
    }

    /// Returns true if a message may be written at `now`.
    pub fn should_log(&self, now: Timestamp) -> bool {
        let now_secs = now.timestamp();
        let mut last = self.last_logged_secs.load(Ordering::Acquire);

        loop {
            if last != NEVER && now_secs.saturating_sub(last) < self.interval_secs {
                return false;
            }
            match self.last_logged_secs.compare_exchange(
                last,
                now_secs,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(current) => last = current,
            }
        }
    }
}

impl Default for GatedLog {
    fn default() -> Self {
        Self::new(constants::default_log_gate_interval())
    }
}
