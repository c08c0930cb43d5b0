//! In-memory link that records everything written to it.
//!
//! Stands in for the serial port when there is no controller attached,
//! and lets callers inspect the exact command stream a channel produced.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use tokio::io::AsyncWrite;

use crate::protocol::Command;

/// Cloneable byte recorder. All clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryLink {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl MemoryLink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        // A poisoned buffer still holds valid bytes.
        self.buf.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Everything written so far, as text.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    /// Written lines decoded back into commands. Unparseable lines are skipped.
    pub fn commands(&self) -> Vec<Command> {
        self.contents()
            .lines()
            .filter_map(|line| line.parse().ok())
            .collect()
    }

    /// Drop everything recorded so far.
    pub fn reset(&self) {
        self.lock().clear();
    }
}

impl AsyncWrite for MemoryLink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.lock().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
