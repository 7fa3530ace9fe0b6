//! Time utilities and constants for the price node.

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Timing defaults.
pub mod constants {
    use super::Duration;

    /// Default interval between polls of one source (1 minute).
    pub fn default_poll_interval() -> Duration {
        Duration::minutes(1)
    }

    /// Default age after which a cached observation is evicted (1 hour).
    pub fn default_staleness_window() -> Duration {
        Duration::hours(1)
    }

    /// Default upper bound on a single fetch (30 seconds).
    pub fn default_fetch_timeout() -> Duration {
        Duration::seconds(30)
    }

    /// Default interval of the gated diagnostic log (60 seconds).
    pub fn default_log_gate_interval() -> Duration {
        Duration::seconds(60)
    }

    /// Default refresh interval of the blue market gap (1 hour).
    pub fn default_gap_refresh_interval() -> Duration {
        Duration::hours(1)
    }
}

/// A timestamp, always UTC.
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Build a timestamp from epoch milliseconds, clamping invalid values to the epoch.
pub fn from_epoch_millis(millis: i64) -> Timestamp {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_default()
}

/// Age of a timestamp relative to `now`; future timestamps have zero age.
pub fn age(timestamp: Timestamp, now: Timestamp) -> Duration {
    let age = now - timestamp;
    if age < Duration::zero() {
        Duration::zero()
    } else {
        age
    }
}

/// Duration extensions for convenient conversion.
pub trait DurationExt {
    fn as_std(&self) -> std::time::Duration;
}

impl DurationExt for Duration {
    fn as_std(&self) -> std::time::Duration {
        self.to_std().unwrap_or(std::time::Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_millis() {
        let ts = from_epoch_millis(10_000);
        assert_eq!(ts.timestamp_millis(), 10_000);
    }

    #[test]
    fn test_age_never_negative() {
        let t = now();
        assert_eq!(age(t + Duration::seconds(5), t), Duration::zero());
        assert_eq!(age(t - Duration::seconds(5), t), Duration::seconds(5));
    }

    #[test]
    fn test_negative_duration_as_std() {
        assert_eq!(Duration::seconds(-1).as_std(), std::time::Duration::ZERO);
        assert_eq!(
            Duration::seconds(2).as_std(),
            std::time::Duration::from_secs(2)
        );
    }
}
