//! Audio source abstraction

use async_trait::async_trait;

use crate::Result;

/// A device that yields frames of signed 16-bit mono samples
///
/// Implementations hold at most one open device handle. Not `Send`: cpal
/// streams must stay on the thread that created them.
#[async_trait(?Send)]
pub trait AudioSource {
    /// Open the device, replacing any handle that is still held
    async fn open(&mut self) -> Result<()>;

    /// Wait for the next complete frame
    async fn read_frame(&mut self) -> Result<Vec<i16>>;

    /// Release the device handle (no-op when closed)
    fn close(&mut self);
}

/// Mean absolute value of a frame
///
/// Returns 0.0 for an empty frame.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn frame_amplitude(frame: &[i16]) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }

    let sum: u64 = frame.iter().map(|&s| u64::from(s.unsigned_abs())).sum();
    sum as f64 / frame.len() as f64
}
