//! Audio acquisition
//!
//! Reads fixed-size frames from the microphone and reduces each one to an
//! amplitude reading. Device faults are absorbed here and never reach the
//! detector.

mod acquisition;
mod capture;
mod source;

pub use acquisition::Acquisition;
pub use capture::MicrophoneSource;
pub use source::{AudioSource, frame_amplitude};
