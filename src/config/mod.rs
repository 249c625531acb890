//! Configuration management for the silence monitor and collector

pub mod file;

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

use file::MonitorConfigFile;

/// Silence monitor configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Where events are delivered
    pub sink: SinkConfig,

    /// Threshold and state machine tuning
    pub detector: DetectorConfig,

    /// Audio capture settings
    pub audio: AudioConfig,

    /// Collector server settings
    pub collector: CollectorConfig,
}

/// Event sink configuration
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Ingestion endpoint of the collector
    pub url: String,

    /// Upper bound on a single delivery request
    pub timeout: Duration,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:5000/silence".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Detector configuration
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Multiplier applied to measured ambient noise to derive the threshold
    pub sensitivity_factor: f64,

    /// Shortest silence that is reported
    pub min_silence: Duration,

    /// Time between audio readings
    pub poll_interval: Duration,

    /// Time between ambient drift checks
    pub recalibration_interval: Duration,

    /// How far the ambient level may drift before recalibrating
    pub drift_factor: f64,

    /// Calibration window at startup
    pub initial_calibration: Duration,

    /// Calibration window after drift is detected
    pub recalibration_duration: Duration,

    /// Emit `silence_start` as soon as silence begins
    pub announce_start: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sensitivity_factor: 1.2,
            min_silence: Duration::from_secs(3),
            poll_interval: Duration::from_secs(1),
            recalibration_interval: Duration::from_secs(60),
            drift_factor: 1.5,
            initial_calibration: Duration::from_secs(10),
            recalibration_duration: Duration::from_secs(5),
            announce_start: false,
        }
    }
}

/// Audio capture configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Requested input sample rate in Hz
    pub sample_rate: u32,

    /// Samples per amplitude reading
    pub frame_size: usize,

    /// Wait between attempts to reopen a failed device
    pub retry_backoff: Duration,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            frame_size: 1024,
            retry_backoff: Duration::from_secs(2),
        }
    }
}

/// Collector HTTP server configuration
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Address to bind
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Config {
    /// Load configuration from the environment and the TOML config file
    ///
    /// An explicit `path` must exist and parse; the default path is optional.
    ///
    /// # Errors
    ///
    /// Returns error if an explicit config file cannot be loaded or a value is invalid
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let fc = match path {
            Some(path) => {
                let fc = file::read_config_file(path)?;
                tracing::info!(path = %path.display(), "loaded config file");
                fc
            }
            None => file::load_config_file(),
        };

        Self::resolve(fc, |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with environment overrides (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if any resulting value fails validation
    pub fn resolve<F>(fc: MonitorConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();

        let sink = SinkConfig {
            url: env("SILENCE_SINK_URL")
                .or(fc.sink.url)
                .unwrap_or(default.sink.url),
            timeout: seconds(
                "sink timeout",
                env_parse(&env, "SILENCE_REQUEST_TIMEOUT_SECS").or(fc.sink.timeout_secs),
                default.sink.timeout,
            )?,
        };

        let dm = &fc.monitor;
        let dd = default.detector;
        let detector = DetectorConfig {
            sensitivity_factor: env_parse(&env, "SILENCE_SENSITIVITY_FACTOR")
                .or(dm.sensitivity_factor)
                .unwrap_or(dd.sensitivity_factor),
            min_silence: seconds(
                "minimum silence",
                env_parse(&env, "SILENCE_MIN_DURATION_SECS").or(dm.min_silence_secs),
                dd.min_silence,
            )?,
            poll_interval: seconds(
                "poll interval",
                env_parse(&env, "SILENCE_POLL_INTERVAL_SECS").or(dm.poll_interval_secs),
                dd.poll_interval,
            )?,
            recalibration_interval: seconds(
                "recalibration interval",
                env_parse(&env, "SILENCE_RECALIBRATION_INTERVAL_SECS")
                    .or(dm.recalibration_interval_secs),
                dd.recalibration_interval,
            )?,
            drift_factor: env_parse(&env, "SILENCE_DRIFT_FACTOR")
                .or(dm.drift_factor)
                .unwrap_or(dd.drift_factor),
            initial_calibration: seconds(
                "initial calibration",
                env_parse(&env, "SILENCE_INITIAL_CALIBRATION_SECS")
                    .or(dm.initial_calibration_secs),
                dd.initial_calibration,
            )?,
            recalibration_duration: seconds(
                "recalibration",
                env_parse(&env, "SILENCE_RECALIBRATION_SECS").or(dm.recalibration_secs),
                dd.recalibration_duration,
            )?,
            announce_start: env("SILENCE_ANNOUNCE_START")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .or(dm.announce_start)
                .unwrap_or(dd.announce_start),
        };

        let audio = AudioConfig {
            sample_rate: env_parse(&env, "SILENCE_SAMPLE_RATE")
                .or(fc.audio.sample_rate)
                .unwrap_or(default.audio.sample_rate),
            frame_size: env_parse(&env, "SILENCE_FRAME_SIZE")
                .or(fc.audio.frame_size)
                .unwrap_or(default.audio.frame_size),
            retry_backoff: seconds(
                "device retry backoff",
                env_parse(&env, "SILENCE_DEVICE_RETRY_SECS").or(fc.audio.retry_backoff_secs),
                default.audio.retry_backoff,
            )?,
        };

        let collector = CollectorConfig {
            host: env("SILENCE_COLLECTOR_HOST")
                .or(fc.collector.host)
                .unwrap_or(default.collector.host),
            port: env_parse(&env, "SILENCE_COLLECTOR_PORT")
                .or_else(|| env_parse(&env, "PORT"))
                .or(fc.collector.port)
                .unwrap_or(default.collector.port),
        };

        let config = Self {
            sink,
            detector,
            audio,
            collector,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges the detector relies on
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        let d = &self.detector;

        if !(d.sensitivity_factor.is_finite() && d.sensitivity_factor > 0.0) {
            return Err(Error::Config(format!(
                "sensitivity factor must be positive, got {}",
                d.sensitivity_factor
            )));
        }
        if !(d.drift_factor.is_finite() && d.drift_factor >= 1.0) {
            return Err(Error::Config(format!(
                "drift factor must be at least 1.0, got {}",
                d.drift_factor
            )));
        }
        if d.poll_interval.is_zero() {
            return Err(Error::Config("poll interval must be non-zero".to_string()));
        }
        if self.audio.frame_size == 0 {
            return Err(Error::Config("frame size must be non-zero".to_string()));
        }
        if self.audio.sample_rate == 0 {
            return Err(Error::Config("sample rate must be non-zero".to_string()));
        }

        let url = reqwest::Url::parse(&self.sink.url)
            .map_err(|e| Error::Config(format!("invalid sink url {}: {e}", self.sink.url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "sink url must be http or https, got {}",
                self.sink.url
            )));
        }

        Ok(())
    }
}

/// Parse an environment variable, warning on malformed values
fn env_parse<T, F>(env: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = env(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring malformed environment value");
            None
        }
    }
}

/// Convert an optional seconds value into a `Duration`
fn seconds(name: &str, secs: Option<f64>, default: Duration) -> Result<Duration> {
    secs.map_or(Ok(default), |s| {
        Duration::try_from_secs_f64(s)
            .map_err(|_| Error::Config(format!("{name} must be a non-negative number of seconds, got {s}")))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use file::{DetectorFileConfig, SinkFileConfig};

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::resolve(MonitorConfigFile::default(), env_from(&[])).unwrap();

        assert_eq!(config.sink.url, "http://localhost:5000/silence");
        assert!((config.detector.sensitivity_factor - 1.2).abs() < f64::EPSILON);
        assert!((config.detector.drift_factor - 1.5).abs() < f64::EPSILON);
        assert_eq!(config.detector.min_silence, Duration::from_secs(3));
        assert_eq!(config.detector.poll_interval, Duration::from_secs(1));
        assert_eq!(config.detector.recalibration_interval, Duration::from_secs(60));
        assert_eq!(config.detector.initial_calibration, Duration::from_secs(10));
        assert_eq!(config.detector.recalibration_duration, Duration::from_secs(5));
        assert!(!config.detector.announce_start);
        assert_eq!(config.audio.frame_size, 1024);
        assert_eq!(config.audio.sample_rate, 44_100);
        assert_eq!(config.audio.retry_backoff, Duration::from_secs(2));
        assert_eq!(config.collector.port, 5000);
    }

    #[test]
    fn test_env_overrides_file() {
        let fc = MonitorConfigFile {
            sink: SinkFileConfig {
                url: Some("http://file.example/silence".to_string()),
                timeout_secs: Some(2.0),
            },
            monitor: DetectorFileConfig {
                sensitivity_factor: Some(1.1),
                min_silence_secs: Some(4.0),
                ..Default::default()
            },
            ..Default::default()
        };
        let env = env_from(&[
            ("SILENCE_SINK_URL", "https://env.example/silence"),
            ("SILENCE_SENSITIVITY_FACTOR", "1.3"),
            ("SILENCE_ANNOUNCE_START", "true"),
            ("PORT", "8080"),
        ]);

        let config = Config::resolve(fc, env).unwrap();

        assert_eq!(config.sink.url, "https://env.example/silence");
        assert_eq!(config.sink.timeout, Duration::from_secs(2));
        assert!((config.detector.sensitivity_factor - 1.3).abs() < f64::EPSILON);
        assert_eq!(config.detector.min_silence, Duration::from_secs(4));
        assert!(config.detector.announce_start);
        assert_eq!(config.collector.port, 8080);
    }

    #[test]
    fn test_malformed_env_falls_back() {
        let env = env_from(&[("SILENCE_DRIFT_FACTOR", "lots")]);
        let config = Config::resolve(MonitorConfigFile::default(), env).unwrap();
        assert!((config.detector.drift_factor - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fractional_seconds() {
        let env = env_from(&[("SILENCE_POLL_INTERVAL_SECS", "0.25")]);
        let config = Config::resolve(MonitorConfigFile::default(), env).unwrap();
        assert_eq!(config.detector.poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_rejects_invalid_values() {
        let cases: &[(&str, &str)] = &[
            ("SILENCE_SENSITIVITY_FACTOR", "0"),
            ("SILENCE_DRIFT_FACTOR", "0.5"),
            ("SILENCE_POLL_INTERVAL_SECS", "0"),
            ("SILENCE_MIN_DURATION_SECS", "-1"),
            ("SILENCE_FRAME_SIZE", "0"),
            ("SILENCE_SINK_URL", "ftp://example.com/silence"),
            ("SILENCE_SINK_URL", "not a url"),
        ];

        for (key, value) in cases {
            let result = Config::resolve(MonitorConfigFile::default(), env_from(&[(*key, *value)]));
            assert!(
                matches!(result, Err(Error::Config(_))),
                "{key}={value} should be rejected"
            );
        }
    }
}
