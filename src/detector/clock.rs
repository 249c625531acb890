//! Wall-clock timestamps driven by the monotonic runtime clock

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;

/// Produces UTC timestamps that advance with `tokio::time::Instant`
///
/// Anchored to the wall clock once at creation, so intervals between
/// timestamps are immune to wall-clock adjustments.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    anchor_wall: DateTime<Utc>,
    anchor: Instant,
}

impl MonotonicClock {
    #[must_use]
    pub fn new() -> Self {
        Self::anchored_at(Utc::now())
    }

    /// Clock whose current time is `wall`
    #[must_use]
    pub fn anchored_at(wall: DateTime<Utc>) -> Self {
        Self {
            anchor_wall: wall,
            anchor: Instant::now(),
        }
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.anchor.elapsed()).unwrap_or(TimeDelta::MAX);
        self.anchor_wall
            .checked_add_signed(elapsed)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_advances_with_runtime_clock() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let clock = MonotonicClock::anchored_at(start);

        tokio::time::advance(Duration::from_millis(4_250)).await;

        assert_eq!(clock.now() - start, TimeDelta::milliseconds(4_250));
    }
}
