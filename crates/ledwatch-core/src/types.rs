//! Domain types shared by the device, health, and daemon crates.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Color ──────────────────────────────────────────────────────────

/// An RGB triple as sent to the strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const OFF: Color = Color::new(0, 0, 0);
    /// Healthy.
    pub const CYAN: Color = Color::new(0, 255, 255);
    /// First failure, or pending on the remote monitor.
    pub const YELLOW: Color = Color::new(255, 200, 0);
    /// Sustained failure, or down on the remote monitor.
    pub const RED: Color = Color::new(255, 0, 0);
    /// Remote monitor in maintenance.
    pub const BLUE: Color = Color::new(0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build a color from arbitrary integers, clamping each channel to [0, 255].
    pub fn clamped(r: i64, g: i64, b: i64) -> Self {
        Self::new(clamp_u8(r), clamp_u8(g), clamp_u8(b))
    }
}

impl From<(u8, u8, u8)> for Color {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self::new(r, g, b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.r, self.g, self.b)
    }
}

/// Clamp an integer into the byte range used by every device command field.
pub fn clamp_u8(value: i64) -> u8 {
    value.clamp(0, 255) as u8
}

// ── Check results ──────────────────────────────────────────────────

/// Normalized outcome of a single check. Carries no history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckResult {
    Ok,
    Fail,
    Pending,
    Maintenance,
    /// Deliberately blank LED position.
    Placeholder,
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CheckResult::Ok => "OK",
            CheckResult::Fail => "FAIL",
            CheckResult::Pending => "PENDING",
            CheckResult::Maintenance => "MAINTENANCE",
            CheckResult::Placeholder => "PLACEHOLDER",
        };
        f.write_str(s)
    }
}

// ── Services ───────────────────────────────────────────────────────

/// One monitored service. Its position in the configured list is its LED index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    #[serde(flatten)]
    pub check: CheckSpec,
}

impl ServiceSpec {
    pub fn new(name: impl Into<String>, check: CheckSpec) -> Self {
        Self {
            name: name.into(),
            check,
        }
    }

    pub fn family(&self) -> MethodFamily {
        self.check.family()
    }
}

/// Check method together with its method-specific argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "kebab-case")]
pub enum CheckSpec {
    /// ICMP echo through the system `ping` binary.
    Ping { host: String },
    /// HTTP GET; any status below 500 counts as up.
    Http { url: String },
    /// HTTP GET routed through a forward proxy.
    HttpProxy { url: String, proxy: String },
    /// Status of a monitor tracked by the remote uptime monitor.
    RemoteMonitor { monitor_id: u64 },
    /// Blank LED, never checked.
    Placeholder,
}

impl CheckSpec {
    /// Short method name as written in the config file.
    pub fn method(&self) -> &'static str {
        match self {
            CheckSpec::Ping { .. } => "ping",
            CheckSpec::Http { .. } => "http",
            CheckSpec::HttpProxy { .. } => "http-proxy",
            CheckSpec::RemoteMonitor { .. } => "remote-monitor",
            CheckSpec::Placeholder => "placeholder",
        }
    }

    pub fn family(&self) -> MethodFamily {
        match self {
            CheckSpec::Ping { .. } | CheckSpec::Http { .. } | CheckSpec::HttpProxy { .. } => {
                MethodFamily::Probe
            }
            CheckSpec::RemoteMonitor { .. } => MethodFamily::RemoteMonitor,
            CheckSpec::Placeholder => MethodFamily::Placeholder,
        }
    }
}

/// Methods grouped by how their results are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodFamily {
    /// ping / http / http-proxy: escalates yellow then red.
    Probe,
    /// Remote status vocabulary maps directly to a color.
    RemoteMonitor,
    Placeholder,
}
