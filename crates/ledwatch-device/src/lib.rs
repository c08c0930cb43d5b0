//! ledwatch-device: the serial link to the LED strip controller.
//!
//! The controller speaks a newline-terminated text protocol. Every
//! command except `S` only stages state; `S` pushes the staged frame to
//! the strip in one go.
//!
//! ```text
//! DeviceChannel (Open | Closed)
//!   ├── set_pixel / set_all / set_brightness / clear  → staged
//!   ├── show                                         → "S", applies frame
//!   └── close                                        → idempotent
//! ```
//!
//! A channel that failed to open, or whose link broke mid-write, turns
//! every operation into a no-op that reports [`Delivery::Skipped`].

pub mod channel;
pub mod effects;
pub mod error;
pub mod link;
pub mod protocol;

pub use channel::{ChannelState, Delivery, DeviceChannel};
pub use error::DeviceError;
pub use link::MemoryLink;
pub use protocol::Command;
