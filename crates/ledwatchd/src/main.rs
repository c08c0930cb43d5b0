//! ledwatchd: the ledwatch daemon.
//!
//! Checks a list of services on a fixed interval and shows each one's
//! health as a color on a serial-attached LED strip.
//!
//! # Usage
//!
//! ```text
//! ledwatchd run --config /etc/ledwatch.toml
//! ledwatchd check-config --config /etc/ledwatch.toml
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info, warn};

use ledwatch_core::LedwatchConfig;
use ledwatch_device::{DeviceChannel, effects};
use ledwatch_health::{Checker, KumaClient, Monitor, ProbeSettings, SessionPool};

#[derive(Parser)]
#[command(name = "ledwatchd", version, about = "Service health on an LED strip")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Open the strip and monitor until interrupted.
    Run {
        #[arg(short, long, env = "LEDWATCH_CONFIG", default_value = "ledwatch.toml")]
        config: PathBuf,
    },
    /// Validate the config and print the LED layout.
    CheckConfig {
        #[arg(short, long, env = "LEDWATCH_CONFIG", default_value = "ledwatch.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Run { config } => run(&config).await,
        Command::CheckConfig { config } => check_config(&config),
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(
            "info,ledwatchd=debug,ledwatch_health=debug,ledwatch_device=debug",
        )
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: &Path) -> anyhow::Result<LedwatchConfig> {
    LedwatchConfig::from_file(path)
        .with_context(|| format!("invalid config {}", path.display()))
}

async fn run(config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    info!(
        config = %config_path.display(),
        services = config.services.len(),
        leds = config.led_count(),
        "ledwatch starting"
    );

    // ── Shutdown signal ────────────────────────────────────────

    // Installed before the device opens so ctrl-c during the settle delay
    // or the startup effect still blanks the strip and exits cleanly.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    // ── Device ─────────────────────────────────────────────────

    let mut device = match DeviceChannel::open(
        &config.device.port,
        config.device.baud_rate,
        config.led_count(),
        config.settle()?,
    )
    .await
    {
        Ok(device) => device,
        Err(e) => {
            error!(
                port = %config.device.port,
                error = %e,
                "could not open device; check the port name and that this user may access it (e.g. the dialout group)"
            );
            return Err(e).context("device open failed");
        }
    };

    device.set_brightness(config.device.brightness).await;

    let effect = config.startup_effect()?;
    if !effect.is_zero() && !*shutdown_rx.borrow() {
        effects::rainbow_scroll(&mut device, effect).await;
    }
    device.clear().await;
    device.show().await;

    // ── Checks ─────────────────────────────────────────────────

    let settings = ProbeSettings::default();
    let kuma = KumaClient::new(settings.http_timeout).context("building remote monitor client")?;
    let sessions = Arc::new(SessionPool::new(kuma));
    let checker = Checker::new(settings, sessions, config.remote_monitor.clone())
        .context("building http client")?;

    if config.services.is_empty() {
        warn!("no services configured; the strip will stay dark");
    }

    let mut monitor = Monitor::new(
        config.services.clone(),
        checker,
        device,
        config.interval()?,
    )
    .with_max_concurrent(config.max_concurrent_checks());

    // A signal caught during startup makes `run` skip straight to shutdown.
    if *shutdown_rx.borrow() {
        info!("stop requested during startup");
    }
    monitor.run(shutdown_rx).await;

    info!("ledwatch stopped");
    Ok(())
}

fn check_config(config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    println!(
        "{}: {} services on {} LEDs, every {}",
        config_path.display(),
        config.services.len(),
        config.led_count(),
        config.monitor.interval,
    );
    println!("device: {} @ {} baud", config.device.port, config.device.baud_rate);
    for (index, service) in config.services.iter().enumerate() {
        println!("  [{index:>3}] {:<20} {}", service.name, service.check.method());
    }
    let unused = config.led_count() - config.services.len();
    if unused > 0 {
        println!("  ({unused} LEDs unused)");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
