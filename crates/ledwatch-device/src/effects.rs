//! Startup light show. Purely cosmetic: it confirms the strip is wired up
//! before monitoring begins.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use ledwatch_core::Color;

use crate::channel::DeviceChannel;

const FRAME_DELAY: Duration = Duration::from_millis(10);

/// Map a position on a 256-step color wheel to a color.
pub fn color_wheel(pos: u8) -> Color {
    let pos = pos as u16;
    if pos < 85 {
        Color::new((pos * 3) as u8, (255 - pos * 3) as u8, 0)
    } else if pos < 170 {
        let pos = pos - 85;
        Color::new((255 - pos * 3) as u8, 0, (pos * 3) as u8)
    } else {
        let pos = pos - 170;
        Color::new(0, (pos * 3) as u8, (255 - pos * 3) as u8)
    }
}

/// Scroll a rainbow along the strip for roughly `duration`.
///
/// Returns the number of frames shown. Stops early if the channel closes.
pub async fn rainbow_scroll(channel: &mut DeviceChannel, duration: Duration) -> usize {
    if !channel.is_open() {
        warn!("skipping startup effect, device channel is closed");
        return 0;
    }

    let leds = channel.led_count().max(1);
    let start = Instant::now();
    let mut offset: usize = 0;
    let mut frames = 0;

    while start.elapsed() < duration && channel.is_open() {
        for i in 0..leds {
            let hue = (i * 256 / leds + offset) & 0xff;
            channel.set_pixel(i, color_wheel(hue as u8)).await;
        }
        channel.show().await;
        frames += 1;

        tokio::time::sleep(FRAME_DELAY).await;
        offset = (offset + 1) % 256;
    }

    debug!(frames, "startup effect finished");
    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::MemoryLink;
    use crate::protocol::Command;

    #[test]
    fn color_wheel_segments() {
        assert_eq!(color_wheel(0), Color::new(0, 255, 0));
        assert_eq!(color_wheel(85), Color::new(255, 0, 0));
        assert_eq!(color_wheel(170), Color::new(0, 0, 255));
        assert_eq!(color_wheel(255), Color::new(0, 255, 0));
    }

    #[tokio::test]
    async fn rainbow_frames_end_with_show() {
        let link = MemoryLink::new();
        let mut channel = DeviceChannel::from_link(link.clone(), 4);

        let frames = rainbow_scroll(&mut channel, Duration::from_millis(30)).await;
        assert!(frames >= 1);

        let commands = link.commands();
        let shows = commands.iter().filter(|c| c.is_show()).count();
        assert_eq!(shows, frames);
        assert_eq!(commands.len(), frames * 5);
        assert_eq!(commands.last(), Some(&Command::Show));
    }

    #[tokio::test]
    async fn rainbow_on_closed_channel_does_nothing() {
        let mut channel = DeviceChannel::closed(4);
        assert_eq!(rainbow_scroll(&mut channel, Duration::from_millis(30)).await, 0);
    }

    #[tokio::test]
    async fn zero_duration_shows_nothing() {
        let link = MemoryLink::new();
        let mut channel = DeviceChannel::from_link(link.clone(), 4);
        assert_eq!(rainbow_scroll(&mut channel, Duration::ZERO).await, 0);
        assert!(link.contents().is_empty());
    }
}
