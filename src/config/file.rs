//! TOML configuration file loading
//!
//! Supports `~/.config/silence-monitor/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct MonitorConfigFile {
    /// Event sink (collector) configuration
    #[serde(default)]
    pub sink: SinkFileConfig,

    /// Detector tuning
    #[serde(default)]
    pub monitor: DetectorFileConfig,

    /// Audio device configuration
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// Collector server configuration
    #[serde(default)]
    pub collector: CollectorFileConfig,
}

/// Where silence events are delivered
#[derive(Debug, Default, Deserialize)]
pub struct SinkFileConfig {
    /// Ingestion endpoint (e.g. "http://localhost:5000/silence")
    pub url: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: Option<f64>,
}

/// Silence detection tuning
#[derive(Debug, Default, Deserialize)]
pub struct DetectorFileConfig {
    pub sensitivity_factor: Option<f64>,
    pub min_silence_secs: Option<f64>,
    pub poll_interval_secs: Option<f64>,
    pub recalibration_interval_secs: Option<f64>,
    pub drift_factor: Option<f64>,
    pub initial_calibration_secs: Option<f64>,
    pub recalibration_secs: Option<f64>,

    /// Also report the moment silence begins, not only completed intervals
    pub announce_start: Option<bool>,
}

/// Audio capture configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    pub sample_rate: Option<u32>,
    pub frame_size: Option<usize>,

    /// Wait between attempts to reopen a failed input device
    pub retry_backoff_secs: Option<f64>,
}

/// Collector server configuration
#[derive(Debug, Default, Deserialize)]
pub struct CollectorFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Load the TOML config file from the standard path
///
/// Returns `MonitorConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> MonitorConfigFile {
    let Some(path) = config_file_path() else {
        return MonitorConfigFile::default();
    };

    if !path.exists() {
        return MonitorConfigFile::default();
    }

    match read_config_file(&path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            MonitorConfigFile::default()
        }
    }
}

/// Read and parse a config file at an explicit path
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn read_config_file(path: &Path) -> Result<MonitorConfigFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Return the config file path: `~/.config/silence-monitor/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("silence-monitor").join("config.toml"))
}
