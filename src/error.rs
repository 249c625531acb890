//! Error types for the silence monitor

use thiserror::Error;

/// Result type alias for silence monitor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the monitor or the collector
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Event delivery error (sink rejected or unreachable)
    #[error("delivery error: {0}")]
    Delivery(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
