//! ledwatch-health: health checking and status rendering for ledwatch.
//!
//! Runs every configured check once per round, folds the results through
//! per-service escalation state, and pushes the resulting colors to the
//! strip as a single frame.
//!
//! # Architecture
//!
//! ```text
//! Monitor
//!   ├── Probe (Checker)
//!   │   ├── ping / http / http-proxy probes → CheckResult
//!   │   └── SessionPool<KumaClient>         → remote monitor status
//!   ├── StatusBoard (EscalationTracker per service) → Color
//!   └── DeviceChannel: stage every pixel, then one show
//! ```
//!
//! # Escalation
//!
//! Probe-based checks go yellow on the first failure and red once a
//! failure repeats. Remote-monitor checks map the remote status straight
//! to a color, since the remote service already debounces.

pub mod checker;
pub mod escalation;
pub mod monitor;
pub mod remote;

pub use checker::{Checker, Probe, ProbeSettings};
pub use escalation::{EscalationTracker, StatusBoard, color_for};
pub use monitor::{Monitor, MonitorState, RoundReport};
pub use remote::{KumaClient, RemoteError, RemoteMonitorClient, RemoteStatus, SessionPool};
