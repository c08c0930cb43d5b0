//! Monitoring loop: check every service, render the round as one frame,
//! sleep, repeat until shutdown.

use std::time::{Duration, Instant};

use futures_util::stream::{self, StreamExt};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use ledwatch_core::{CheckResult, CheckSpec, Color, ServiceSpec};
use ledwatch_device::{Delivery, DeviceChannel};

use crate::checker::Probe;
use crate::escalation::StatusBoard;

const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Where the loop is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Running { round: u64 },
    Sleeping { round: u64 },
    ShuttingDown,
    Stopped,
}

/// What a single round produced.
#[derive(Debug, Clone)]
pub struct RoundReport {
    pub round: u64,
    /// Results in configured order.
    pub results: Vec<CheckResult>,
    /// Colors staged for each LED, same order.
    pub colors: Vec<Color>,
    pub elapsed: Duration,
    /// Outcome of the closing `show`.
    pub shown: Delivery,
}

/// Drives the check rounds and owns the device channel for their duration.
pub struct Monitor<P: Probe> {
    services: Vec<ServiceSpec>,
    probe: P,
    device: DeviceChannel,
    board: StatusBoard,
    interval: Duration,
    max_concurrent: usize,
    rounds: u64,
    state: MonitorState,
}

impl<P: Probe> Monitor<P> {
    pub fn new(
        services: Vec<ServiceSpec>,
        probe: P,
        device: DeviceChannel,
        interval: Duration,
    ) -> Self {
        let board = StatusBoard::new(&services);
        Self {
            services,
            probe,
            device,
            board,
            interval,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            rounds: 0,
            state: MonitorState::Idle,
        }
    }

    /// Cap on checks in flight within one round. Zero is treated as one.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn board(&self) -> &StatusBoard {
        &self.board
    }

    pub fn device(&self) -> &DeviceChannel {
        &self.device
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Run one round.
    ///
    /// Returns `None` without checking anything if the device channel is
    /// closed. Otherwise every pixel is staged before a single `show`, so
    /// the strip never displays a half-updated round.
    pub async fn run_round(&mut self) -> Option<RoundReport> {
        if !self.device.is_open() {
            warn!("device channel closed, monitoring paused");
            return None;
        }

        self.rounds += 1;
        let round = self.rounds;
        self.state = MonitorState::Running { round };
        info!(round, "round starting");
        let started = Instant::now();

        let probe = &self.probe;
        let checks = self.services.iter().map(|service| async move {
            match service.check {
                CheckSpec::Placeholder => CheckResult::Placeholder,
                _ => probe.check(service).await,
            }
        });
        let results: Vec<CheckResult> = stream::iter(checks)
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let colors: Vec<Color> = self
            .services
            .iter()
            .zip(&results)
            .map(|(service, result)| self.board.record(service, *result))
            .collect();

        for (index, color) in colors.iter().enumerate() {
            self.device.set_pixel(index, *color).await;
        }
        let shown = self.device.show().await;

        let elapsed = started.elapsed();
        let failing = results.iter().filter(|r| **r == CheckResult::Fail).count();
        info!(
            round,
            services = results.len(),
            failing,
            elapsed_ms = elapsed.as_millis() as u64,
            "round complete"
        );

        Some(RoundReport {
            round,
            results,
            colors,
            elapsed,
            shown,
        })
    }

    /// Loop until `shutdown` flips to `true` (or its sender goes away),
    /// then blank the strip and release everything.
    ///
    /// A signal that arrives mid-round lets the round finish first.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            services = self.services.len(),
            interval_secs = self.interval.as_secs(),
            max_concurrent = self.max_concurrent,
            "monitor loop starting"
        );

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            self.run_round().await;
            self.state = MonitorState::Sleeping { round: self.rounds };

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("shutdown sender dropped");
                        break;
                    }
                }
            }
        }

        self.shutdown().await;
    }

    /// Blank the strip, close the channel, release probe resources.
    pub async fn shutdown(&mut self) {
        if self.state == MonitorState::Stopped {
            return;
        }
        self.state = MonitorState::ShuttingDown;
        info!(rounds = self.rounds, "monitor shutting down");

        self.device.clear().await;
        self.device.show().await;
        self.device.close().await;
        self.probe.release().await;

        self.state = MonitorState::Stopped;
        info!("monitor stopped");
    }
}
