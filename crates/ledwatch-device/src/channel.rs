//! Device channel: owns the link to the strip controller.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, trace, warn};

use ledwatch_core::config::{MAX_LEDS, MIN_SETTLE};
use ledwatch_core::{Color, clamp_u8};

use crate::error::DeviceError;
use crate::protocol::Command;

/// Byte sink the channel writes commands into.
type Link = Box<dyn AsyncWrite + Send + Unpin>;

/// Whether the channel currently has a usable link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Open,
    Closed,
}

/// Outcome of a single channel operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The command was written to the link.
    Sent,
    /// The channel is closed; nothing was written.
    Skipped,
}

/// Connection to the LED controller.
///
/// Commands are fire-and-forget. A write error closes the channel, after
/// which every operation reports [`Delivery::Skipped`] instead of failing.
pub struct DeviceChannel {
    link: Option<Link>,
    led_count: usize,
    name: String,
}

impl DeviceChannel {
    /// Open the serial port and wait for the controller to come out of reset.
    ///
    /// `settle` is raised to [`MIN_SETTLE`] if shorter.
    pub async fn open(
        port: &str,
        baud_rate: u32,
        led_count: usize,
        settle: Duration,
    ) -> Result<Self, DeviceError> {
        let stream = tokio_serial::new(port, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(Duration::from_secs(1))
            .open_native_async()
            .map_err(|source| DeviceError::Open {
                port: port.to_string(),
                baud_rate,
                source,
            })?;

        let settle = settle.max(MIN_SETTLE);
        debug!(%port, settle_ms = settle.as_millis() as u64, "waiting for controller reset");
        tokio::time::sleep(settle).await;

        info!(%port, baud_rate, led_count, "device channel open");
        Ok(Self {
            link: Some(Box::new(stream)),
            led_count,
            name: port.to_string(),
        })
    }

    /// Wrap an already-open byte sink. No settle delay is applied.
    pub fn from_link<W>(link: W, led_count: usize) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            link: Some(Box::new(link)),
            led_count,
            name: "link".to_string(),
        }
    }

    /// A channel that was never opened. Every operation is a no-op.
    pub fn closed(led_count: usize) -> Self {
        Self {
            link: None,
            led_count,
            name: "closed".to_string(),
        }
    }

    pub fn state(&self) -> ChannelState {
        if self.link.is_some() {
            ChannelState::Open
        } else {
            ChannelState::Closed
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == ChannelState::Open
    }

    pub fn led_count(&self) -> usize {
        self.led_count
    }

    /// Stage a color at `index`. Indices past the strip end hit the last LED.
    pub async fn set_pixel(&mut self, index: usize, color: Color) -> Delivery {
        let last = self.led_count.clamp(1, MAX_LEDS) - 1;
        let index = index.min(last) as u8;
        self.send(Command::SetPixel { index, color }).await
    }

    /// Stage the same color on every LED.
    pub async fn set_all(&mut self, color: Color) -> Delivery {
        self.send(Command::SetAll(color)).await
    }

    /// Stage the global brightness, clamped to [0, 255].
    pub async fn set_brightness(&mut self, level: i64) -> Delivery {
        self.send(Command::SetBrightness(clamp_u8(level))).await
    }

    /// Stage all LEDs off.
    pub async fn clear(&mut self) -> Delivery {
        self.send(Command::Clear).await
    }

    /// Apply everything staged so far to the physical strip.
    pub async fn show(&mut self) -> Delivery {
        self.send(Command::Show).await
    }

    /// Write one command. A failed write drops the link.
    pub async fn send(&mut self, command: Command) -> Delivery {
        let Some(link) = self.link.as_mut() else {
            return Delivery::Skipped;
        };

        match write_line(link, &command.to_line()).await {
            Ok(()) => {
                trace!(%command, "device command sent");
                Delivery::Sent
            }
            Err(e) => {
                warn!(device = %self.name, %command, error = %e, "device write failed, closing channel");
                self.link = None;
                Delivery::Skipped
            }
        }
    }

    /// Release the link. Safe to call any number of times.
    pub async fn close(&mut self) {
        if let Some(mut link) = self.link.take() {
            if let Err(e) = link.shutdown().await {
                debug!(device = %self.name, error = %e, "device link shutdown error");
            }
            info!(device = %self.name, "device channel closed");
        }
    }
}

async fn write_line(link: &mut Link, line: &str) -> io::Result<()> {
    link.write_all(line.as_bytes()).await?;
    link.flush().await
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use super::*;
    use crate::link::MemoryLink;

    /// Link that rejects every write, like an unplugged adapter.
    struct BrokenLink;

    impl AsyncWrite for BrokenLink {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn set_pixel_clamps_color() {
        let link = MemoryLink::new();
        let mut channel = DeviceChannel::from_link(link.clone(), 10);

        let delivery = channel.set_pixel(2, Color::clamped(-10, 300, 128)).await;
        assert_eq!(delivery, Delivery::Sent);
        assert_eq!(link.contents(), "C,2,0,255,128\n");
    }

    #[tokio::test]
    async fn set_pixel_clamps_index_to_strip() {
        let link = MemoryLink::new();
        let mut channel = DeviceChannel::from_link(link.clone(), 5);

        channel.set_pixel(99, Color::CYAN).await;
        assert_eq!(link.contents(), "C,4,0,255,255\n");
    }

    #[tokio::test]
    async fn brightness_is_clamped() {
        let link = MemoryLink::new();
        let mut channel = DeviceChannel::from_link(link.clone(), 5);

        channel.set_brightness(300).await;
        channel.set_brightness(-1).await;
        assert_eq!(
            link.commands(),
            vec![Command::SetBrightness(255), Command::SetBrightness(0)]
        );
    }

    #[tokio::test]
    async fn staging_commands_then_show() {
        let link = MemoryLink::new();
        let mut channel = DeviceChannel::from_link(link.clone(), 3);

        channel.set_all(Color::BLUE).await;
        channel.clear().await;
        channel.show().await;
        assert_eq!(link.contents(), "A,0,0,255\nO\nS\n");
    }

    #[tokio::test]
    async fn never_opened_channel_is_noop() {
        let mut channel = DeviceChannel::closed(5);
        assert_eq!(channel.state(), ChannelState::Closed);
        assert_eq!(channel.set_pixel(0, Color::RED).await, Delivery::Skipped);
        assert_eq!(channel.show().await, Delivery::Skipped);
        channel.close().await;
        channel.close().await;
        assert!(!channel.is_open());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let link = MemoryLink::new();
        let mut channel = DeviceChannel::from_link(link.clone(), 3);
        assert!(channel.is_open());

        channel.close().await;
        channel.close().await;
        assert_eq!(channel.state(), ChannelState::Closed);
        assert_eq!(channel.clear().await, Delivery::Skipped);
        assert!(link.contents().is_empty());
    }

    #[tokio::test]
    async fn write_failure_closes_channel() {
        let mut channel = DeviceChannel::from_link(BrokenLink, 3);

        assert_eq!(channel.set_pixel(0, Color::RED).await, Delivery::Skipped);
        assert_eq!(channel.state(), ChannelState::Closed);
        assert_eq!(channel.show().await, Delivery::Skipped);
    }

    #[tokio::test]
    async fn open_missing_port_fails() {
        let result = DeviceChannel::open(
            "/dev/ledwatch-does-not-exist",
            9600,
            5,
            Duration::from_millis(0),
        )
        .await;
        assert!(matches!(result, Err(DeviceError::Open { baud_rate: 9600, .. })));
    }
}
