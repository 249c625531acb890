//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use silence_monitor::config::DetectorConfig;
use silence_monitor::{AudioSource, Error, EventSink, Result, SilencePing};

/// One scripted device read
#[derive(Debug, Clone, Copy)]
pub enum Step {
    /// A frame whose amplitude is the given level
    Level(i16),
    /// A read fault
    Fault,
}

/// `count` reads at `level`
pub fn levels(level: i16, count: usize) -> impl Iterator<Item = Step> {
    std::iter::repeat_n(Step::Level(level), count)
}

/// Audio source replaying a fixed script, then a constant idle level
#[derive(Debug, Default)]
pub struct ScriptedSource {
    steps: VecDeque<Step>,
    idle: i16,
    /// Once the script runs out the device is gone: opens and reads fail
    unplugged_after_script: bool,
    pub opens: usize,
    pub closes: usize,
    pub reads: usize,
}

impl ScriptedSource {
    pub fn new(steps: impl IntoIterator<Item = Step>, idle: i16) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            idle,
            ..Default::default()
        }
    }

    /// Replay `steps`, then behave like an unplugged device forever
    pub fn unplugged_after(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            unplugged_after_script: true,
            ..Default::default()
        }
    }

    fn unplugged(&self) -> bool {
        self.unplugged_after_script && self.steps.is_empty()
    }
}

#[async_trait(?Send)]
impl AudioSource for ScriptedSource {
    async fn open(&mut self) -> Result<()> {
        self.opens += 1;
        if self.unplugged() {
            return Err(Error::Audio("no input device available".to_string()));
        }
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Vec<i16>> {
        self.reads += 1;
        if self.unplugged() {
            return Err(Error::Audio("device disconnected".to_string()));
        }
        match self.steps.pop_front().unwrap_or(Step::Level(self.idle)) {
            Step::Level(level) => Ok(vec![level; 8]),
            Step::Fault => Err(Error::Audio("input overflowed".to_string())),
        }
    }

    fn close(&mut self) {
        self.closes += 1;
    }
}

/// Sink that keeps every ping it is given
#[derive(Default)]
pub struct RecordingSink {
    pings: Mutex<Vec<SilencePing>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn pings(&self) -> Vec<SilencePing> {
        self.pings.lock().await.clone()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn deliver(&self, ping: &SilencePing) -> Result<()> {
        self.pings.lock().await.push(ping.clone());
        Ok(())
    }
}

/// Detector settings with a short calibration and one-second polls
pub fn fast_detector_config() -> DetectorConfig {
    DetectorConfig {
        initial_calibration: Duration::from_secs(5),
        recalibration_duration: Duration::from_secs(5),
        poll_interval: Duration::from_secs(1),
        ..DetectorConfig::default()
    }
}
