//! Time utilities.
//!
//! Two clocks are in play. Envelope creation and stage stamps use the
//! monotonic [`Instant`] clock and are only ever compared locally.
//! Transaction headers carry wall-clock milliseconds issued by the leader,
//! which may run ahead of or behind the local wall clock.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_wall_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Monotonic time elapsed between two instants, zero if `now` precedes `since`.
pub fn elapsed(since: Instant, now: Instant) -> Duration {
    now.saturating_duration_since(since)
}

/// Latency between a leader-issued wall-clock stamp and a local wall-clock
/// reading.
///
/// Returns `None` when the local clock is behind the stamp. Clock drift
/// between replicas makes this possible and the sample is meaningless.
pub fn wall_latency(issued_ms: i64, now_ms: i64) -> Option<Duration> {
    let delta = now_ms.checked_sub(issued_ms)?;
    u64::try_from(delta).ok().map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_latency_drops_negative_samples() {
        assert_eq!(wall_latency(1_000, 1_250), Some(Duration::from_millis(250)));
        assert_eq!(wall_latency(1_000, 1_000), Some(Duration::ZERO));
        assert_eq!(wall_latency(1_000, 999), None);
        assert_eq!(wall_latency(i64::MIN, i64::MAX), None);
    }

    #[test]
    fn elapsed_saturates() {
        let earlier = Instant::now();
        let later = earlier + Duration::from_millis(5);
        assert_eq!(elapsed(earlier, later), Duration::from_millis(5));
        assert_eq!(elapsed(later, earlier), Duration::ZERO);
    }

    #[test]
    fn wall_clock_is_after_epoch() {
        assert!(now_wall_ms() > 0);
    }
}
