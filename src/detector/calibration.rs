//! Threshold calibration and ambient drift detection

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::clock::MonotonicClock;
use crate::audio::{Acquisition, AudioSource};

/// Samples required before a drift check is meaningful
pub const MIN_WINDOW_SAMPLES: usize = 20;

/// Amplitude cutoff below which audio counts as silence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdState {
    /// Current cutoff, never negative
    pub value: f64,
    /// Multiplier applied to the ambient level
    pub sensitivity_factor: f64,
    /// When the calibration that produced this threshold finished
    pub last_calibrated_at: DateTime<Utc>,
}

impl ThresholdState {
    /// Derive a threshold from ambient amplitude readings
    ///
    /// With no readings the ambient level is taken as zero.
    #[must_use]
    pub fn from_levels(levels: &[f64], sensitivity_factor: f64, at: DateTime<Utc>) -> Self {
        let ambient = mean(levels.iter().copied()).unwrap_or(0.0);
        Self {
            value: (ambient * sensitivity_factor).max(0.0),
            sensitivity_factor,
            last_calibrated_at: at,
        }
    }

    /// Ambient level this threshold was derived from
    #[must_use]
    pub fn ambient_level(&self) -> f64 {
        if self.sensitivity_factor > 0.0 {
            self.value / self.sensitivity_factor
        } else {
            0.0
        }
    }
}

/// Sample the environment for `duration` and derive a threshold
///
/// Takes one reading per `poll_interval`. A reading still pending at the
/// deadline (device recovering) is abandoned. If nothing was read the
/// threshold degenerates to zero and a warning is logged.
pub async fn calibrate<S: AudioSource>(
    acquisition: &mut Acquisition<S>,
    clock: &MonotonicClock,
    duration: Duration,
    poll_interval: Duration,
    sensitivity_factor: f64,
) -> ThresholdState {
    tracing::info!(
        duration = ?duration,
        "calibrating silence threshold, please remain quiet if possible"
    );

    let deadline = tokio::time::Instant::now() + duration;
    let mut levels = Vec::new();

    while tokio::time::Instant::now() < deadline {
        match tokio::time::timeout_at(deadline, acquisition.acquire()).await {
            Ok(level) => levels.push(level),
            Err(_) => break,
        }
        tokio::time::sleep(poll_interval).await;
    }

    let threshold = ThresholdState::from_levels(&levels, sensitivity_factor, clock.now());

    if levels.is_empty() {
        tracing::warn!(
            "no audio captured during calibration, threshold is zero and silence cannot be detected"
        );
    } else {
        tracing::info!(
            samples = levels.len(),
            ambient = format!("{:.2}", threshold.ambient_level()),
            threshold = format!("{:.2}", threshold.value),
            "calibration complete"
        );
    }

    threshold
}

/// Recent amplitude readings collected between drift checks
#[derive(Debug, Clone)]
pub struct RecentVolumeWindow {
    levels: VecDeque<f64>,
    capacity: usize,
}

impl RecentVolumeWindow {
    /// Create a window holding at most `capacity` readings (at least [`MIN_WINDOW_SAMPLES`])
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_WINDOW_SAMPLES);
        Self {
            levels: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    /// Size a window for one drift check interval of readings
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    #[must_use]
    pub fn for_interval(check_interval: Duration, poll_interval: Duration) -> Self {
        let per_check = if poll_interval.is_zero() {
            MIN_WINDOW_SAMPLES
        } else {
            (check_interval.as_secs_f64() / poll_interval.as_secs_f64()).ceil() as usize + 1
        };
        Self::new(per_check)
    }

    /// Add a reading, dropping the oldest when full
    pub fn push(&mut self, level: f64) {
        if self.levels.len() == self.capacity {
            self.levels.pop_front();
        }
        self.levels.push_back(level);
    }

    /// Mean of the held readings
    #[must_use]
    pub fn mean(&self) -> Option<f64> {
        mean(self.levels.iter().copied())
    }

    /// Number of readings held
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Check whether no readings are held
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Maximum readings held before the oldest is dropped
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Discard all held readings
    pub fn clear(&mut self) {
        self.levels.clear();
    }
}

/// Direction the ambient level moved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drift {
    Quieter,
    Louder,
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quieter => f.write_str("quieter"),
            Self::Louder => f.write_str("louder"),
        }
    }
}

/// Outcome of a drift check
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriftCheck {
    /// Too few readings, nothing evaluated
    Pending { samples: usize },
    /// Ambient level still matches the threshold
    Stable { current_avg: f64 },
    /// Ambient level moved past the drift factor
    Drifted { direction: Drift, current_avg: f64 },
}

impl DriftCheck {
    #[must_use]
    pub const fn should_recalibrate(&self) -> bool {
        matches!(self, Self::Drifted { .. })
    }
}

/// Compare the recent ambient level against the current threshold
///
/// Evaluates only once the window holds [`MIN_WINDOW_SAMPLES`] readings, and
/// clears the window after every evaluation whatever the outcome.
pub fn check_drift(
    window: &mut RecentVolumeWindow,
    threshold: &ThresholdState,
    drift_factor: f64,
) -> DriftCheck {
    if window.len() < MIN_WINDOW_SAMPLES {
        return DriftCheck::Pending {
            samples: window.len(),
        };
    }

    let current_avg = window.mean().unwrap_or(0.0);
    window.clear();

    let expected = current_avg * threshold.sensitivity_factor;
    if expected * drift_factor < threshold.value {
        DriftCheck::Drifted {
            direction: Drift::Quieter,
            current_avg,
        }
    } else if expected > threshold.value * drift_factor {
        DriftCheck::Drifted {
            direction: Drift::Louder,
            current_avg,
        }
    } else {
        DriftCheck::Stable { current_avg }
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}
