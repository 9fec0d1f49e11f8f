//! Weather station sync service.
//!
//! Replays the producer's daily observation CSV files into InfluxDB with:
//! - Per-file resumable cursors that survive restarts
//! - Batched line-protocol writes
//! - Staleness alerts through ntfy when a source stops reporting
//! - HTTP status API for monitoring

mod config;
mod runner;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use station_common::SystemClock;
use station_sync::{InfluxWriter, NtfyNotifier, ProgressStore, ReplicationSync, StalenessMonitor};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use config::ServiceConfig;
use runner::Runner;
use server::ServerState;

#[derive(Parser, Debug)]
#[command(name = "station-sync")]
#[command(about = "Replicates weather observation CSV files into InfluxDB")]
struct Args {
    /// Run one sync and staleness check, then exit
    #[arg(long)]
    once: bool,

    /// Send a test alert and exit
    #[arg(long)]
    test_alert: bool,

    /// YAML configuration file (default: environment variables)
    #[arg(long, env = "SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Port for status HTTP server
    #[arg(long, env = "STATUS_PORT", default_value = "8082")]
    status_port: u16,

    /// Disable status HTTP server
    #[arg(long)]
    no_status_server: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = ServiceConfig::load(args.config.as_deref())?;
    let notifier = Arc::new(
        NtfyNotifier::new(config.alerts.clone()).context("Failed to create notifier")?,
    );

    if args.test_alert {
        if !config.alerts.is_active() {
            anyhow::bail!("Alerts are disabled or no ntfy topic is configured");
        }
        if !notifier.send_test().await {
            anyhow::bail!("Test alert was not delivered");
        }
        info!("Test alert sent");
        return Ok(());
    }

    info!(
        data_dir = %config.sync.data_dir.display(),
        bucket = %config.influxdb.bucket,
        "Starting weather station sync"
    );
    if !config.alerts.is_active() {
        warn!("Staleness alerts disabled (no ntfy topic configured)");
    }

    tokio::fs::create_dir_all(&config.sync.data_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.sync.data_dir.display()))?;

    let progress_path = config.sync.progress_path();
    let writer = InfluxWriter::new(&config.influxdb).context("Failed to create InfluxDB client")?;
    let sync = ReplicationSync::new(
        writer,
        ProgressStore::open(&progress_path),
        config.sync.data_dir.clone(),
        config.sync.observations_prefix.clone(),
    )
    .with_batch_size(config.influxdb.batch_size)
    .with_measurement(config.influxdb.measurement.clone());

    let monitor = Arc::new(Mutex::new(StalenessMonitor::new(
        notifier,
        config.alerts.clone(),
    )));
    let last_run = Arc::new(RwLock::new(None));
    let mut runner = Runner::new(sync, monitor.clone(), last_run.clone(), Arc::new(SystemClock));

    let cancel = CancellationToken::new();

    // Start status server (unless disabled or in --once mode)
    if !args.no_status_server && !args.once {
        let server_state = Arc::new(ServerState {
            monitor,
            last_run,
            progress_path,
        });
        let status_port = args.status_port;
        tokio::spawn(async move {
            if let Err(e) = server::run_server(server_state, status_port).await {
                tracing::error!(error = %e, "Status server failed");
            }
        });
    }

    if args.once {
        info!("Running single sync");
        runner.run_once(&cancel).await;
        return Ok(());
    }

    // Handle Ctrl+C
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        cancel_on_signal.cancel();
    });

    let interval = config.sync.interval();
    info!(interval_secs = interval.as_secs(), "Starting continuous sync");
    loop {
        runner.run_once(&cancel).await;

        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Shutting down sync loop");
                break;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }

    Ok(())
}
