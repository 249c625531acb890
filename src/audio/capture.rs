//! Audio capture from microphone

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig};

use super::AudioSource;
use crate::{Error, Result};

/// How often `read_frame` checks for a completed frame
const FRAME_POLL: Duration = Duration::from_millis(5);

/// No fresh frame within this window means the device stalled
const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// State shared with the cpal callback
#[derive(Default)]
struct FrameBuffer {
    /// Most recent samples, at most one frame
    samples: VecDeque<i16>,
    /// Samples received since the last frame was taken
    fresh: usize,
    /// Error reported by the stream callback
    fault: Option<String>,
}

/// Captures audio from the default input device
pub struct MicrophoneSource {
    sample_rate: u32,
    frame_size: usize,
    buffer: Arc<Mutex<FrameBuffer>>,
    stream: Option<Stream>,
}

impl MicrophoneSource {
    /// Create a capture source; the device is opened by [`AudioSource::open`]
    #[must_use]
    pub fn new(sample_rate: u32, frame_size: usize) -> Self {
        Self {
            sample_rate,
            frame_size,
            buffer: Arc::new(Mutex::new(FrameBuffer::default())),
            stream: None,
        }
    }

    /// Check if a device handle is held
    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    /// Get the requested sample rate
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Pick a stream config supporting the requested rate, preferring mono
    fn select_config(&self, device: &Device) -> Result<(StreamConfig, SampleFormat)> {
        let rate = SampleRate(self.sample_rate);
        let supports_rate =
            |c: &cpal::SupportedStreamConfigRange| c.min_sample_rate() <= rate && c.max_sample_rate() >= rate;

        let ranges: Vec<_> = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .filter(|c| supports_rate(c))
            .collect();

        let chosen = ranges
            .iter()
            .find(|c| c.channels() == 1)
            .or_else(|| ranges.first())
            .cloned();

        if let Some(range) = chosen {
            let supported = range.with_sample_rate(rate);
            return Ok((supported.config(), supported.sample_format()));
        }

        // Fall back to whatever the device prefers
        let supported = device
            .default_input_config()
            .map_err(|e| Error::Audio(format!("no suitable audio config found: {e}")))?;
        tracing::warn!(
            requested = self.sample_rate,
            actual = supported.sample_rate().0,
            "input device does not support requested sample rate"
        );
        Ok((supported.config(), supported.sample_format()))
    }

    fn build_stream<T, F>(&self, device: &Device, config: &StreamConfig, convert: F) -> Result<Stream>
    where
        T: SizedSample,
        F: Fn(T) -> i16 + Send + 'static,
    {
        let channels = usize::from(config.channels.max(1));
        let frame_size = self.frame_size;
        let data_buffer = Arc::clone(&self.buffer);
        let error_buffer = Arc::clone(&self.buffer);

        device
            .build_input_stream(
                config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = data_buffer.lock() {
                        // Keep only the first channel
                        for &sample in data.iter().step_by(channels) {
                            buf.samples.push_back(convert(sample));
                            buf.fresh += 1;
                        }
                        let excess = buf.samples.len().saturating_sub(frame_size);
                        buf.samples.drain(..excess);
                    }
                },
                move |err| {
                    tracing::error!(error = %err, "audio capture error");
                    if let Ok(mut buf) = error_buffer.lock() {
                        buf.fault = Some(err.to_string());
                    }
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))
    }

    fn reset_buffer(&self) {
        if let Ok(mut buf) = self.buffer.lock() {
            *buf = FrameBuffer::default();
        }
    }

    /// Take a frame if one has filled since the last read
    fn try_take_frame(&self) -> Result<Option<Vec<i16>>> {
        let mut buf = self
            .buffer
            .lock()
            .map_err(|_| Error::Audio("audio buffer lock poisoned".to_string()))?;

        if let Some(fault) = buf.fault.take() {
            return Err(Error::Audio(fault));
        }

        if buf.fresh < self.frame_size || buf.samples.len() < self.frame_size {
            return Ok(None);
        }

        buf.fresh = 0;
        Ok(Some(buf.samples.iter().copied().collect()))
    }
}

#[async_trait(?Send)]
impl AudioSource for MicrophoneSource {
    async fn open(&mut self) -> Result<()> {
        self.close();

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let (config, format) = self.select_config(&device)?;

        let stream = match format {
            SampleFormat::I16 => self.build_stream::<i16, _>(&device, &config, |s| s)?,
            SampleFormat::U16 => self.build_stream::<u16, _>(&device, &config, u16_to_i16)?,
            SampleFormat::F32 => self.build_stream::<f32, _>(&device, &config, f32_to_i16)?,
            other => {
                return Err(Error::Audio(format!("unsupported sample format: {other:?}")));
            }
        };

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            frame_size = self.frame_size,
            "audio capture started"
        );
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Vec<i16>> {
        if self.stream.is_none() {
            return Err(Error::Audio("audio stream not open".to_string()));
        }

        let deadline = tokio::time::Instant::now() + READ_TIMEOUT;
        loop {
            if let Some(frame) = self.try_take_frame()? {
                return Ok(frame);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::Audio(format!(
                    "no audio received for {}s",
                    READ_TIMEOUT.as_secs()
                )));
            }
            tokio::time::sleep(FRAME_POLL).await;
        }
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
        self.reset_buffer();
    }
}

/// Re-center an unsigned sample around zero
#[allow(clippy::cast_possible_truncation)]
fn u16_to_i16(sample: u16) -> i16 {
    (i32::from(sample) - 32_768) as i16
}

/// Convert f32 [-1.0, 1.0] to i16
#[allow(clippy::cast_possible_truncation)]
fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        self.close();
    }
}
