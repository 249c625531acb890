//! Adaptive silence detection
//!
//! Polls the microphone at a fixed interval, compares each amplitude with a
//! threshold calibrated from the ambient noise, and reports silence intervals
//! through the [`EventEmitter`]. The threshold is recalibrated whenever the
//! ambient level drifts too far from the one it was derived from.

mod calibration;
mod clock;
mod state;

pub use calibration::{
    Drift, DriftCheck, MIN_WINDOW_SAMPLES, RecentVolumeWindow, ThresholdState, calibrate,
    check_drift,
};
pub use clock::MonotonicClock;
pub use state::{SilenceState, SilenceTracker, Transition};

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::audio::{Acquisition, AudioSource};
use crate::config::DetectorConfig;
use crate::emitter::EventEmitter;
use crate::event::{SilenceEvent, format_timestamp};

/// Owns the polling loop and all detection state
pub struct SilenceDetector<S> {
    config: DetectorConfig,
    acquisition: Acquisition<S>,
    threshold: ThresholdState,
    tracker: SilenceTracker,
    window: RecentVolumeWindow,
    emitter: EventEmitter,
    clock: MonotonicClock,
    next_drift_check: Instant,
    polls: u64,
}

impl<S: AudioSource> SilenceDetector<S> {
    /// Open the device and run the initial calibration
    ///
    /// Does not return until the device is available and the calibration
    /// window has elapsed.
    pub async fn new(
        mut acquisition: Acquisition<S>,
        config: DetectorConfig,
        emitter: EventEmitter,
    ) -> Self {
        let clock = MonotonicClock::new();

        acquisition.open().await;
        let threshold = calibrate(
            &mut acquisition,
            &clock,
            config.initial_calibration,
            config.poll_interval,
            config.sensitivity_factor,
        )
        .await;

        let window = RecentVolumeWindow::for_interval(
            config.recalibration_interval,
            config.poll_interval,
        );

        Self {
            next_drift_check: Instant::now() + config.recalibration_interval,
            tracker: SilenceTracker::new(config.min_silence),
            config,
            acquisition,
            threshold,
            window,
            emitter,
            clock,
            polls: 0,
        }
    }

    /// Run one acquire, drift check, classify and emit cycle
    ///
    /// Returns the event handed to the emitter, if any.
    pub async fn poll_once(&mut self) -> Option<SilenceEvent> {
        let level = self.acquisition.acquire().await;
        self.polls += 1;
        self.window.push(level);

        if Instant::now() >= self.next_drift_check {
            self.maybe_recalibrate().await;
            self.next_drift_check = Instant::now() + self.config.recalibration_interval;
        }

        let now = self.clock.now();
        let transition = self.tracker.observe(level, self.threshold.value, now);

        tracing::debug!(
            amplitude = format!("{level:.2}"),
            threshold = format!("{:.2}", self.threshold.value),
            silent = self.tracker.is_silent(),
            "poll"
        );

        let event = match transition {
            Transition::Unchanged => None,
            Transition::SilenceStarted { at } => {
                tracing::info!(at = %format_timestamp(at), "silence started");
                self.config
                    .announce_start
                    .then_some(SilenceEvent::Start { start_time: at })
            }
            Transition::SilenceEnded(event) => {
                tracing::info!(
                    duration = format!("{:.2}", event.duration_seconds().unwrap_or_default()),
                    "silence ended"
                );
                Some(event)
            }
            Transition::SilenceDiscarded {
                duration_seconds, ..
            } => {
                tracing::info!(
                    duration = format!("{duration_seconds:.2}"),
                    min = ?self.config.min_silence,
                    "silence too short, not reporting"
                );
                None
            }
        };

        if let Some(event) = &event {
            self.emitter.emit(event);
        }

        event
    }

    /// Poll until a shutdown signal arrives
    pub async fn run(&mut self, shutdown: &mut mpsc::Receiver<()>) {
        tracing::info!(
            poll_interval = ?self.config.poll_interval,
            threshold = format!("{:.2}", self.threshold.value),
            "silence detection running"
        );

        // A poll can wait indefinitely on a missing device, so both waits race shutdown
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("shutdown requested");
                    break;
                }
                _ = self.poll_once() => {}
            }

            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("shutdown requested");
                    break;
                }
                () = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }

    /// Release the device and flush pending events
    pub async fn shutdown(mut self) {
        self.acquisition.close();
        self.emitter.shutdown().await;
        tracing::info!(polls = self.polls, "silence detector stopped");
    }

    /// Current threshold
    #[must_use]
    pub const fn threshold(&self) -> &ThresholdState {
        &self.threshold
    }

    /// Current silence state
    #[must_use]
    pub const fn state(&self) -> SilenceState {
        self.tracker.state()
    }

    /// Completed polls since startup
    #[must_use]
    pub const fn polls(&self) -> u64 {
        self.polls
    }

    /// Device faults recovered from since startup
    #[must_use]
    pub const fn faults(&self) -> u64 {
        self.acquisition.faults()
    }

    /// Borrow the wrapped audio source
    #[must_use]
    pub const fn source(&self) -> &S {
        self.acquisition.source()
    }

    async fn maybe_recalibrate(&mut self) {
        match check_drift(&mut self.window, &self.threshold, self.config.drift_factor) {
            DriftCheck::Pending { samples } => {
                tracing::debug!(samples, "not enough samples for drift check");
            }
            DriftCheck::Stable { current_avg } => {
                tracing::debug!(
                    current_avg = format!("{current_avg:.2}"),
                    "ambient level stable"
                );
            }
            DriftCheck::Drifted {
                direction,
                current_avg,
            } => {
                tracing::info!(
                    %direction,
                    current_avg = format!("{current_avg:.2}"),
                    threshold = format!("{:.2}", self.threshold.value),
                    "environment changed, recalibrating"
                );
                self.threshold = calibrate(
                    &mut self.acquisition,
                    &self.clock,
                    self.config.recalibration_duration,
                    self.config.poll_interval,
                    self.config.sensitivity_factor,
                )
                .await;
            }
        }
    }
}
