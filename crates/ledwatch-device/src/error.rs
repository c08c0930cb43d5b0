//! Error types for the device channel.

use thiserror::Error;

/// Errors surfaced by the device channel. Only opening can fail; every
/// other operation degrades to a no-op instead.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to open serial port {port} at {baud_rate} baud: {source}")]
    Open {
        port: String,
        baud_rate: u32,
        #[source]
        source: tokio_serial::Error,
    },
}
