//! ledwatch.toml configuration parser.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration::parse_duration;
use crate::error::{ConfigError, ConfigResult};
use crate::types::ServiceSpec;

/// Largest strip the command protocol can address (index is a single byte).
pub const MAX_LEDS: usize = 256;

/// Attached controllers reset on open and need this long before commands stick.
pub const MIN_SETTLE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedwatchConfig {
    pub device: DeviceConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    pub remote_monitor: Option<RemoteMonitorConfig>,
    #[serde(default)]
    pub services: Vec<ServiceSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Serial port, e.g. `/dev/ttyUSB0` or `COM3`.
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Initial strip brightness; clamped to [0, 255] when sent.
    #[serde(default = "default_brightness")]
    pub brightness: i64,
    /// Physical LED count. Defaults to the number of services.
    pub led_count: Option<usize>,
    /// Quiet period after opening the port.
    #[serde(default = "default_settle")]
    pub settle: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Pause between rounds.
    #[serde(default = "default_interval")]
    pub interval: String,
    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrent_checks: usize,
    /// Length of the rainbow shown at startup; "0s" disables it.
    #[serde(default = "default_startup_effect")]
    pub startup_effect: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            max_concurrent_checks: default_max_concurrent_checks(),
            startup_effect: default_startup_effect(),
        }
    }
}

/// Credentials for the remote uptime monitor. Empty values are allowed and
/// make every remote-monitor check report a failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteMonitorConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub token: String,
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_brightness() -> i64 {
    18
}

fn default_settle() -> String {
    "2s".to_string()
}

fn default_interval() -> String {
    "3m".to_string()
}

fn default_max_concurrent_checks() -> usize {
    4
}

fn default_startup_effect() -> String {
    "3s".to_string()
}

impl LedwatchConfig {
    /// Read, parse and validate a config file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse and validate config text.
    pub fn parse(content: &str) -> ConfigResult<Self> {
        let config: LedwatchConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every cross-field invariant of the config.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.interval()?.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        self.settle()?;
        self.startup_effect()?;

        let leds = self.led_count();
        if leds > MAX_LEDS {
            return Err(ConfigError::LedCountTooLarge(leds));
        }
        if self.services.len() > leds {
            return Err(ConfigError::TooManyServices {
                services: self.services.len(),
                leds,
            });
        }

        let mut seen = HashSet::new();
        for (i, service) in self.services.iter().enumerate() {
            if service.name.trim().is_empty() {
                return Err(ConfigError::EmptyName(i));
            }
            if !seen.insert(service.name.as_str()) {
                return Err(ConfigError::DuplicateName(service.name.clone()));
            }
        }
        Ok(())
    }

    /// Number of LEDs on the strip.
    pub fn led_count(&self) -> usize {
        self.device.led_count.unwrap_or(self.services.len())
    }

    pub fn interval(&self) -> ConfigResult<Duration> {
        duration_field("monitor.interval", &self.monitor.interval)
    }

    /// Settle delay after open, never shorter than [`MIN_SETTLE`].
    pub fn settle(&self) -> ConfigResult<Duration> {
        duration_field("device.settle", &self.device.settle).map(|d| d.max(MIN_SETTLE))
    }

    pub fn startup_effect(&self) -> ConfigResult<Duration> {
        duration_field("monitor.startup_effect", &self.monitor.startup_effect)
    }

    /// At least one check runs at a time.
    pub fn max_concurrent_checks(&self) -> usize {
        self.monitor.max_concurrent_checks.max(1)
    }
}

fn duration_field(field: &'static str, value: &str) -> ConfigResult<Duration> {
    parse_duration(value).ok_or_else(|| ConfigError::Duration {
        field,
        value: value.to_string(),
    })
}
