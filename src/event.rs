//! Silence events and their wire representation
//!
//! The detector produces [`SilenceEvent`]s; the emitter and the collector
//! exchange them as [`SilencePing`] JSON payloads.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp format used on the wire (local wall-clock time)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Kind of silence event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Silence began
    Start,
    /// A reportable silence interval ended
    End,
}

/// An immutable record emitted on a state transition
#[derive(Debug, Clone, PartialEq)]
pub enum SilenceEvent {
    /// Silence began at `start_time`
    Start { start_time: DateTime<Utc> },
    /// Silence lasted from `start_time` to `end_time`
    End {
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        duration_seconds: f64,
    },
}

impl SilenceEvent {
    /// Build an end event, deriving the duration from the two timestamps
    #[must_use]
    pub fn end(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self::End {
            start_time,
            end_time,
            duration_seconds: seconds_between(start_time, end_time),
        }
    }

    /// Event kind
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Start { .. } => EventKind::Start,
            Self::End { .. } => EventKind::End,
        }
    }

    /// When the silence began
    #[must_use]
    pub const fn start_time(&self) -> DateTime<Utc> {
        match self {
            Self::Start { start_time } | Self::End { start_time, .. } => *start_time,
        }
    }

    /// When the silence ended, for end events
    #[must_use]
    pub const fn end_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Start { .. } => None,
            Self::End { end_time, .. } => Some(*end_time),
        }
    }

    /// Length of the interval in seconds, for end events
    #[must_use]
    pub const fn duration_seconds(&self) -> Option<f64> {
        match self {
            Self::Start { .. } => None,
            Self::End {
                duration_seconds, ..
            } => Some(*duration_seconds),
        }
    }
}

/// Elapsed seconds between two instants, clamped at zero
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let elapsed = end.signed_duration_since(start);
    let micros = elapsed.num_microseconds().unwrap_or(i64::MAX);
    (micros as f64 / 1_000_000.0).max(0.0)
}

/// `status` field of a ping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PingStatus {
    SilenceStart,
    SilenceEnd,
}

impl From<EventKind> for PingStatus {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Start => Self::SilenceStart,
            EventKind::End => Self::SilenceEnd,
        }
    }
}

/// JSON payload accepted by the collector's ingestion endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SilencePing {
    pub status: PingStatus,
    pub start_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl SilencePing {
    /// Check the field presence rules of the ingestion contract
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated rule
    pub fn validate(&self) -> std::result::Result<(), &'static str> {
        if self.start_time.trim().is_empty() {
            return Err("start_time is required");
        }

        match self.status {
            PingStatus::SilenceStart => {
                if self.end_time.is_some() || self.duration.is_some() {
                    return Err("silence_start must not carry end_time or duration");
                }
            }
            PingStatus::SilenceEnd => {
                if self.end_time.as_deref().is_none_or(|t| t.trim().is_empty()) {
                    return Err("silence_end requires end_time");
                }
                match self.duration {
                    None => return Err("silence_end requires duration"),
                    Some(d) if !d.is_finite() || d < 0.0 => {
                        return Err("duration must be a non-negative number");
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(())
    }
}

impl From<&SilenceEvent> for SilencePing {
    fn from(event: &SilenceEvent) -> Self {
        Self {
            status: event.kind().into(),
            start_time: format_timestamp(event.start_time()),
            end_time: event.end_time().map(format_timestamp),
            duration: event.duration_seconds().map(round_centis),
        }
    }
}

/// Render a timestamp in local time using [`TIMESTAMP_FORMAT`]
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string()
}

/// Round to two decimal places
#[must_use]
pub fn round_centis(seconds: f64) -> f64 {
    (seconds * 100.0).round() / 100.0
}
