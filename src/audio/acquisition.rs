//! Fault-tolerant frame acquisition
//!
//! Wraps an [`AudioSource`] so that readers only ever see amplitudes.
//! Any device fault closes the handle, waits, reopens it, and tries again.

use std::time::Duration;

use super::{AudioSource, frame_amplitude};

/// Reads amplitudes from a source, reinitializing the device on faults
pub struct Acquisition<S> {
    source: S,
    backoff: Duration,
    open: bool,
    faults: u64,
}

impl<S: AudioSource> Acquisition<S> {
    /// Wrap a source; the device is opened lazily on first use
    pub const fn new(source: S, backoff: Duration) -> Self {
        Self {
            source,
            backoff,
            open: false,
            faults: 0,
        }
    }

    /// Open the device, retrying until it succeeds
    pub async fn open(&mut self) {
        loop {
            self.source.close();
            match self.source.open().await {
                Ok(()) => {
                    self.open = true;
                    tracing::info!("microphone stream started");
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        retry_in = ?self.backoff,
                        "could not access microphone, retrying"
                    );
                    tokio::time::sleep(self.backoff).await;
                }
            }
        }
    }

    /// Wait for one frame and return its amplitude
    ///
    /// Never fails: read errors are logged as warnings and the device is
    /// reinitialized until a frame arrives.
    pub async fn acquire(&mut self) -> f64 {
        loop {
            if !self.open {
                self.open().await;
            }

            match self.source.read_frame().await {
                Ok(frame) => return frame_amplitude(&frame),
                Err(e) => {
                    self.faults += 1;
                    tracing::warn!(
                        error = %e,
                        faults = self.faults,
                        "microphone read failed, restarting stream"
                    );
                    self.close();
                    tokio::time::sleep(self.backoff).await;
                }
            }
        }
    }

    /// Release the device handle
    pub fn close(&mut self) {
        self.source.close();
        self.open = false;
    }

    /// Number of read faults recovered from so far
    #[must_use]
    pub const fn faults(&self) -> u64 {
        self.faults
    }

    /// Check whether a device handle is currently held
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open
    }

    /// Borrow the wrapped source
    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;

    use super::*;
    use crate::{Error, Result};

    /// Source whose open and read outcomes are scripted in order
    #[derive(Default)]
    struct FlakySource {
        open_results: VecDeque<bool>,
        frames: VecDeque<Result<Vec<i16>>>,
        opens: usize,
        closes: usize,
    }

    #[async_trait(?Send)]
    impl AudioSource for FlakySource {
        async fn open(&mut self) -> Result<()> {
            self.opens += 1;
            if self.open_results.pop_front().unwrap_or(true) {
                Ok(())
            } else {
                Err(Error::Audio("device busy".to_string()))
            }
        }

        async fn read_frame(&mut self) -> Result<Vec<i16>> {
            self.frames.pop_front().unwrap_or_else(|| Ok(vec![0; 4]))
        }

        fn close(&mut self) {
            self.closes += 1;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_retries_until_device_available() {
        let source = FlakySource {
            open_results: VecDeque::from([false, false, true]),
            ..Default::default()
        };
        let mut acquisition = Acquisition::new(source, Duration::from_secs(2));

        let started = tokio::time::Instant::now();
        acquisition.open().await;

        assert!(acquisition.is_open());
        assert_eq!(acquisition.source().opens, 3);
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_fault_reopens_and_retries() {
        let source = FlakySource {
            frames: VecDeque::from([
                Err(Error::Audio("overrun".to_string())),
                Ok(vec![10, -10, 10, -10]),
            ]),
            ..Default::default()
        };
        let mut acquisition = Acquisition::new(source, Duration::from_secs(2));

        let level = acquisition.acquire().await;

        assert!((level - 10.0).abs() < f64::EPSILON);
        assert_eq!(acquisition.faults(), 1);
        assert_eq!(acquisition.source().opens, 2);
        assert!(acquisition.is_open());
    }

    #[tokio::test]
    async fn test_close_releases_handle() {
        let mut acquisition = Acquisition::new(FlakySource::default(), Duration::ZERO);
        let _ = acquisition.acquire().await;
        acquisition.close();

        assert!(!acquisition.is_open());
        assert!(acquisition.source().closes >= 2);
    }
}
