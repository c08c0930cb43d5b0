//! Error types for configuration loading and validation.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading or validating `ledwatch.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid duration for {field}: {value:?}")]
    Duration { field: &'static str, value: String },

    #[error("monitor interval must be greater than zero")]
    ZeroInterval,

    #[error("service at position {0} has an empty name")]
    EmptyName(usize),

    #[error("duplicate service name: {0}")]
    DuplicateName(String),

    #[error("{services} services configured but the strip only has {leds} LEDs")]
    TooManyServices { services: usize, leds: usize },

    #[error("led_count {0} exceeds the 256 addressable positions")]
    LedCountTooLarge(usize),
}
