//! Weather station producer service.
//!
//! Polls the configured upstream sources on their own intervals and writes
//! every observation and station record to the enabled outputs:
//! - Rotating daily CSV files (replayed later by `station-sync`)
//! - Redis Streams message bus
//!
//! One loop runs per selected source; Ctrl+C or SIGTERM stops them all and
//! the outputs are flushed and closed before exit.

mod config;
mod orchestrator;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use station_common::DataSource;
use station_outputs::OutputFanout;
use station_sources::{
    IsdClient, LocationSource, NdbcClient, NwsClient, OpenMeteoClient, OscarClient, SourceClient,
};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use config::ProducerConfig;
use orchestrator::Orchestrator;

#[derive(Parser, Debug)]
#[command(name = "station-producer")]
#[command(about = "Weather station observation producer")]
struct Args {
    /// Sources to run (default: every enabled source)
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    producers: Vec<DataSource>,

    /// Run a single cycle per source and exit
    #[arg(long)]
    once: bool,

    /// YAML configuration file (default: environment variables)
    #[arg(long, env = "PRODUCER_CONFIG")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Port for the Prometheus metrics endpoint
    #[arg(long, env = "METRICS_PORT")]
    metrics_port: Option<u16>,
}

fn parse_level(raw: &str) -> Level {
    match raw.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Which sources to start: the requested ones that are enabled, or every
/// enabled one when none were requested.
fn selected_sources(requested: &[DataSource], config: &ProducerConfig) -> Vec<DataSource> {
    let enabled = |source: &DataSource| match source {
        DataSource::Ndbc => config.ndbc.enabled,
        DataSource::Isd => config.isd.enabled,
        DataSource::Oscar => config.oscar.enabled,
        DataSource::Nws => config.nws.enabled,
        DataSource::OpenMeteo => config.openmeteo.enabled,
    };
    let candidates: Vec<DataSource> = if requested.is_empty() {
        DataSource::ALL.to_vec()
    } else {
        requested.to_vec()
    };
    let mut selected = Vec::new();
    for source in candidates {
        if !enabled(&source) {
            if !requested.is_empty() {
                warn!(source = %source, "Requested source is disabled in config, skipping");
            }
            continue;
        }
        if !selected.contains(&source) {
            selected.push(source);
        }
    }
    selected
}

fn spawn_loop<C>(
    tasks: &mut JoinSet<()>,
    client: Arc<C>,
    fanout: Arc<Mutex<OutputFanout>>,
    interval_secs: u64,
    cancel: CancellationToken,
    once: bool,
) where
    C: SourceClient + 'static,
{
    let orchestrator = Orchestrator::new(client, fanout, Duration::from_secs(interval_secs));
    tasks.spawn(orchestrator.run(cancel, once));
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
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

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(&args.log_level))
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting weather station producer");

    if let Some(port) = args.metrics_port {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!(port, "Prometheus metrics exporter initialized");
    }

    let config = ProducerConfig::load(args.config.as_deref())?;
    let sources = selected_sources(&args.producers, &config);
    if sources.is_empty() {
        anyhow::bail!("No enabled sources selected");
    }

    let fanout = OutputFanout::from_config(&config.output)
        .await
        .context("Failed to initialize outputs")?;
    if fanout.is_empty() {
        warn!("No outputs enabled; records will be fetched and dropped");
    }
    let fanout = Arc::new(Mutex::new(fanout));

    // Open-Meteo can borrow its locations from the registry clients.
    let wants = |source| sources.contains(&source);
    let meteo_from = config.openmeteo.station_source;
    let oscar = if wants(DataSource::Oscar)
        || (wants(DataSource::OpenMeteo) && meteo_from == LocationSource::Oscar)
    {
        Some(Arc::new(OscarClient::new(config.oscar.clone()).context("OSCAR client")?))
    } else {
        None
    };
    let isd = if wants(DataSource::Isd)
        || (wants(DataSource::OpenMeteo) && meteo_from == LocationSource::Isd)
    {
        Some(Arc::new(IsdClient::new(config.isd.clone()).context("ISD client")?))
    } else {
        None
    };

    let cancel = CancellationToken::new();
    let mut tasks = JoinSet::new();

    for source in &sources {
        match source {
            DataSource::Ndbc => {
                let client = Arc::new(NdbcClient::new(config.ndbc.clone()).context("NDBC client")?);
                spawn_loop(
                    &mut tasks,
                    client,
                    fanout.clone(),
                    config.ndbc.fetch_interval_secs,
                    cancel.clone(),
                    args.once,
                );
            }
            DataSource::Isd => {
                if let Some(client) = &isd {
                    spawn_loop(
                        &mut tasks,
                        client.clone(),
                        fanout.clone(),
                        config.isd.fetch_interval_secs,
                        cancel.clone(),
                        args.once,
                    );
                }
            }
            DataSource::Oscar => {
                if let Some(client) = &oscar {
                    spawn_loop(
                        &mut tasks,
                        client.clone(),
                        fanout.clone(),
                        config.oscar.fetch_interval_secs,
                        cancel.clone(),
                        args.once,
                    );
                }
            }
            DataSource::Nws => {
                let client = Arc::new(NwsClient::new(config.nws.clone()).context("NWS client")?);
                spawn_loop(
                    &mut tasks,
                    client,
                    fanout.clone(),
                    config.nws.fetch_interval_secs,
                    cancel.clone(),
                    args.once,
                );
            }
            DataSource::OpenMeteo => {
                let mut client =
                    OpenMeteoClient::new(config.openmeteo.clone()).context("Open-Meteo client")?;
                if let Some(oscar) = &oscar {
                    client = client.with_oscar(oscar.clone());
                }
                if let Some(isd) = &isd {
                    client = client.with_isd(isd.clone());
                }
                spawn_loop(
                    &mut tasks,
                    Arc::new(client),
                    fanout.clone(),
                    config.openmeteo.fetch_interval_secs,
                    cancel.clone(),
                    args.once,
                );
            }
        }
        info!(source = %source, "Producer started");
    }

    if !args.once {
        let cancel_on_signal = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("Received shutdown signal");
            cancel_on_signal.cancel();
        });
    }

    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            error!(error = %e, "Producer task panicked");
        }
    }

    fanout.lock().await.close().await;
    info!("Producer shut down");

    Ok(())
}
