//! Per-source fetch loop.
//!
//! Each enabled source gets one [`Orchestrator`] task. A cycle resolves the
//! stations, fetches and publishes observations, then metadata, and flushes
//! the sinks. Cycle failures are logged and counted; only cancellation
//! ends the loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::counter;
use station_common::DataSource;
use station_outputs::OutputFanout;
use station_sources::{Result, SourceClient};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Resolving,
    Fetching,
    Publishing,
    Sleeping,
    ShuttingDown,
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub stations: usize,
    pub observations: usize,
    pub metadata: usize,
    /// Set when cancellation cut the cycle short.
    pub interrupted: bool,
}

pub struct Orchestrator<C: SourceClient> {
    client: Arc<C>,
    fanout: Arc<Mutex<OutputFanout>>,
    interval: Duration,
    phase: Phase,
}

impl<C: SourceClient> Orchestrator<C> {
    pub fn new(client: Arc<C>, fanout: Arc<Mutex<OutputFanout>>, interval: Duration) -> Self {
        Self {
            client,
            fanout,
            interval,
            phase: Phase::Idle,
        }
    }

    pub fn source(&self) -> DataSource {
        self.client.source()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn enter(&mut self, phase: Phase) {
        debug!(source = %self.source(), from = ?self.phase, to = ?phase, "Phase change");
        self.phase = phase;
    }

    /// One resolve, fetch, publish and flush pass.
    pub async fn run_cycle(&mut self, cancel: &CancellationToken) -> Result<CycleReport> {
        let source = self.source();
        let mut report = CycleReport::default();

        self.enter(Phase::Resolving);
        let stations = self.client.resolve_stations().await?;
        report.stations = stations.len();
        info!(source = %source, stations = stations.len(), "Resolved stations");
        if cancel.is_cancelled() {
            report.interrupted = true;
            return Ok(report);
        }

        self.enter(Phase::Fetching);
        let observations = self.client.fetch_observations(&stations).await;

        // Whatever was fetched is published even when shutdown arrived meanwhile.
        self.enter(Phase::Publishing);
        {
            let mut fanout = self.fanout.lock().await;
            for observation in &observations {
                if fanout.write_observation(observation).await > 0 {
                    report.observations += 1;
                }
            }
            if cancel.is_cancelled() {
                fanout.flush().await;
            }
        }
        counter!("station_observations_published_total", "source" => source.to_string())
            .increment(report.observations as u64);
        if cancel.is_cancelled() {
            report.interrupted = true;
            return Ok(report);
        }

        self.enter(Phase::Fetching);
        let metadata = self.client.fetch_metadata_batch(&stations).await;

        self.enter(Phase::Publishing);
        let mut fanout = self.fanout.lock().await;
        for station in &metadata {
            if fanout.write_metadata(station).await > 0 {
                report.metadata += 1;
            }
        }
        fanout.flush().await;
        counter!("station_metadata_published_total", "source" => source.to_string())
            .increment(report.metadata as u64);

        report.interrupted = cancel.is_cancelled();
        Ok(report)
    }

    /// Run cycles until cancelled. With `once`, run a single cycle and
    /// return without sleeping.
    pub async fn run(mut self, cancel: CancellationToken, once: bool) {
        let source = self.source();
        info!(
            source = %source,
            interval_secs = self.interval.as_secs(),
            once,
            "Starting producer loop"
        );

        loop {
            let started = Instant::now();
            match self.run_cycle(&cancel).await {
                Ok(report) => info!(
                    source = %source,
                    stations = report.stations,
                    observations = report.observations,
                    metadata = report.metadata,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Cycle complete"
                ),
                Err(e) => {
                    error!(source = %source, error = %e, "Cycle failed");
                    counter!("station_cycle_failures_total", "source" => source.to_string())
                        .increment(1);
                }
            }

            if once || cancel.is_cancelled() {
                break;
            }

            self.enter(Phase::Sleeping);
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        self.enter(Phase::ShuttingDown);
        self.fanout.lock().await.flush().await;
        info!(source = %source, "Producer loop stopped");
    }
}
