//! Silence state machine
//!
//! `Active → Silent` as soon as a reading drops below the threshold;
//! `Silent → Active` once a reading reaches it again. Only silences lasting
//! at least the minimum duration produce an event.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::event::{SilenceEvent, seconds_between};

/// Current classification of the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SilenceState {
    /// Sound present
    #[default]
    Active,
    /// Below threshold since `started_at`
    Silent { started_at: DateTime<Utc> },
}

/// Result of feeding one reading to the tracker
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// No state change
    Unchanged,
    /// Silence began
    SilenceStarted { at: DateTime<Utc> },
    /// A reportable silence ended
    SilenceEnded(SilenceEvent),
    /// Silence ended before reaching the minimum duration
    SilenceDiscarded {
        started_at: DateTime<Utc>,
        duration_seconds: f64,
    },
}

/// Hysteresis state machine over amplitude readings
#[derive(Debug, Clone)]
pub struct SilenceTracker {
    state: SilenceState,
    min_silence: Duration,
}

impl SilenceTracker {
    #[must_use]
    pub fn new(min_silence: Duration) -> Self {
        Self {
            state: SilenceState::default(),
            min_silence,
        }
    }

    /// Classify one reading against `threshold` at time `now`
    pub fn observe(&mut self, level: f64, threshold: f64, now: DateTime<Utc>) -> Transition {
        let below = level < threshold;

        match (self.state, below) {
            (SilenceState::Active, true) => {
                self.state = SilenceState::Silent { started_at: now };
                Transition::SilenceStarted { at: now }
            }
            (SilenceState::Silent { started_at }, false) => {
                self.state = SilenceState::Active;
                let duration_seconds = seconds_between(started_at, now);
                if duration_seconds >= self.min_silence.as_secs_f64() {
                    Transition::SilenceEnded(SilenceEvent::end(started_at, now))
                } else {
                    Transition::SilenceDiscarded {
                        started_at,
                        duration_seconds,
                    }
                }
            }
            _ => Transition::Unchanged,
        }
    }

    #[must_use]
    pub const fn state(&self) -> SilenceState {
        self.state
    }

    #[must_use]
    pub const fn is_silent(&self) -> bool {
        matches!(self.state, SilenceState::Silent { .. })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone};

    use super::*;
    use crate::event::EventKind;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + TimeDelta::seconds(secs)
    }

    /// Feed one reading per second starting at t=0
    fn feed(tracker: &mut SilenceTracker, threshold: f64, levels: &[f64]) -> Vec<Transition> {
        levels
            .iter()
            .zip(0..)
            .map(|(&level, secs)| tracker.observe(level, threshold, t(secs)))
            .collect()
    }

    #[test]
    fn test_starts_active() {
        let tracker = SilenceTracker::new(Duration::from_secs(3));
        assert_eq!(tracker.state(), SilenceState::Active);
    }

    #[test]
    fn test_long_silence_emits_one_end_event() {
        let mut tracker = SilenceTracker::new(Duration::from_secs(3));
        let transitions = feed(&mut tracker, 60.0, &[40.0, 40.0, 40.0, 40.0, 70.0]);

        assert_eq!(transitions[0], Transition::SilenceStarted { at: t(0) });
        assert!(transitions[1..4].iter().all(|tr| *tr == Transition::Unchanged));

        let Transition::SilenceEnded(event) = &transitions[4] else {
            panic!("expected end event, got {:?}", transitions[4]);
        };
        assert_eq!(event.kind(), EventKind::End);
        assert_eq!(event.start_time(), t(0));
        assert_eq!(event.end_time(), Some(t(4)));
        assert_eq!(event.duration_seconds(), Some(4.0));
        assert_eq!(tracker.state(), SilenceState::Active);
    }

    #[test]
    fn test_short_silence_is_discarded() {
        let mut tracker = SilenceTracker::new(Duration::from_secs(3));
        let transitions = feed(&mut tracker, 60.0, &[40.0, 40.0, 70.0]);

        assert!(
            !transitions
                .iter()
                .any(|tr| matches!(tr, Transition::SilenceEnded(_)))
        );
        assert_eq!(
            transitions[2],
            Transition::SilenceDiscarded {
                started_at: t(0),
                duration_seconds: 2.0,
            }
        );
    }

    #[test]
    fn test_exact_minimum_is_reported() {
        let mut tracker = SilenceTracker::new(Duration::from_secs(3));
        let transitions = feed(&mut tracker, 60.0, &[40.0, 40.0, 40.0, 70.0]);

        assert!(matches!(
            &transitions[3],
            Transition::SilenceEnded(e) if e.duration_seconds() == Some(3.0)
        ));
    }

    #[test]
    fn test_level_equal_to_threshold_is_sound() {
        let mut tracker = SilenceTracker::new(Duration::from_secs(3));
        assert_eq!(tracker.observe(60.0, 60.0, t(0)), Transition::Unchanged);
        assert!(!tracker.is_silent());
    }

    #[test]
    fn test_silent_tracks_latest_reading_only() {
        let mut tracker = SilenceTracker::new(Duration::from_secs(3));

        tracker.observe(10.0, 60.0, t(0));
        assert!(tracker.is_silent());
        tracker.observe(90.0, 60.0, t(1));
        assert!(!tracker.is_silent());
        // Same reading, different threshold
        tracker.observe(50.0, 40.0, t(2));
        assert!(!tracker.is_silent());
        tracker.observe(50.0, 60.0, t(3));
        assert!(tracker.is_silent());
    }

    #[test]
    fn test_zero_threshold_never_silent() {
        let mut tracker = SilenceTracker::new(Duration::from_secs(3));
        let transitions = feed(&mut tracker, 0.0, &[0.0, 0.0, 5.0]);

        assert!(transitions.iter().all(|tr| *tr == Transition::Unchanged));
    }
}
