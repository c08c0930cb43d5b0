//! ledwatch-core: shared vocabulary for the ledwatch workspace.
//!
//! Holds the service list model, check results, LED colors, and the
//! `ledwatch.toml` configuration parser used by the daemon.

pub mod config;
pub mod duration;
pub mod error;
pub mod types;

pub use config::LedwatchConfig;
pub use duration::parse_duration;
pub use error::{ConfigError, ConfigResult};
pub use types::*;
