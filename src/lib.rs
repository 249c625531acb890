//! Silence Monitor - adaptive microphone silence detection
//!
//! This library provides the two halves of the silence monitor:
//! - A detector that calibrates against ambient noise and reports
//!   sustained silences
//! - A collector that receives those reports over HTTP
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Microphone                        │
//! │          cpal stream  →  frame buffer                │
//! └────────────────────┬────────────────────────────────┘
//!                      │ amplitude per poll
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Silence Detector                     │
//! │  Acquisition │ Calibration │ Drift │ State machine   │
//! └────────────────────┬────────────────────────────────┘
//!                      │ bounded queue
//! ┌────────────────────▼────────────────────────────────┐
//! │              Event Emitter  →  HTTP POST             │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                    Collector                         │
//! │   /silence  │  text views  │  freeze  │  JSON        │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod collector;
pub mod config;
pub mod detector;
pub mod emitter;
pub mod error;
pub mod event;

pub use audio::{Acquisition, AudioSource, MicrophoneSource};
pub use collector::{CollectorServer, EventLog};
pub use config::Config;
pub use detector::{SilenceDetector, SilenceState, ThresholdState};
pub use emitter::{EventEmitter, EventSink, HttpSink};
pub use error::{Error, Result};
pub use event::{PingStatus, SilenceEvent, SilencePing};
