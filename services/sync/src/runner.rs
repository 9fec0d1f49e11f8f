//! One replication pass followed by a staleness check.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use station_common::{format_utc, Clock};
use station_sync::{ReplicationSync, StalenessMonitor, TimeSeriesWriter};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Result of the most recent pass, served on `/status`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub finished_at: String,
    pub files: usize,
    pub failed_files: usize,
    pub points_written: u64,
    pub alerts_fired: Vec<String>,
}

pub struct Runner<W> {
    sync: ReplicationSync<W>,
    monitor: Arc<Mutex<StalenessMonitor>>,
    last_run: Arc<RwLock<Option<RunSummary>>>,
    clock: Arc<dyn Clock>,
}

impl<W: TimeSeriesWriter> Runner<W> {
    pub fn new(
        sync: ReplicationSync<W>,
        monitor: Arc<Mutex<StalenessMonitor>>,
        last_run: Arc<RwLock<Option<RunSummary>>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sync,
            monitor,
            last_run,
            clock,
        }
    }

    pub async fn run_once(&mut self, cancel: &CancellationToken) -> RunSummary {
        let started = Instant::now();
        let report = self.sync.sync_all(cancel).await;

        let fired = {
            let mut monitor = self.monitor.lock().await;
            for (source, at) in &report.latest_by_source {
                monitor.update_observation_time(*source, *at);
            }
            monitor.check_and_alert().await
        };

        let summary = RunSummary {
            finished_at: format_utc(&self.clock.now()),
            files: report.files.len(),
            failed_files: report.failed.len(),
            points_written: report.points_written(),
            alerts_fired: fired.iter().map(|s| s.to_string()).collect(),
        };
        info!(
            files = summary.files,
            failed_files = summary.failed_files,
            points = summary.points_written,
            alerts = summary.alerts_fired.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Sync pass complete"
        );
        *self.last_run.write().await = Some(summary.clone());
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use station_common::ManualClock;
    use station_sync::{Alert, AlertConfig, Notifier, Point, ProgressStore, Result};

    struct AcceptAll(StdMutex<usize>);

    #[async_trait]
    impl TimeSeriesWriter for AcceptAll {
        async fn write_points(&self, points: &[Point]) -> Result<()> {
            *self.0.lock().unwrap() += points.len();
            Ok(())
        }
    }

    struct CountingNotifier(StdMutex<usize>);

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn send(&self, _alert: &Alert) -> bool {
            *self.0.lock().unwrap() += 1;
            true
        }
    }

    const CSV: &str = "\
source,source_station_id,observed_at,ingested_at,air_temp_c
ndbc,41001,2024-01-15T10:00:00Z,2024-01-15T10:05:00Z,15.2
ndbc,41002,2024-01-15T11:00:00Z,2024-01-15T11:05:00Z,14.8
";

    #[tokio::test]
    async fn test_pass_feeds_monitor_and_records_summary() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("observations-2024-01-15.csv"), CSV).unwrap();

        let now = Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(now));
        let notifier = Arc::new(CountingNotifier(StdMutex::new(0)));
        let monitor = Arc::new(Mutex::new(StalenessMonitor::with_clock(
            notifier.clone(),
            AlertConfig::default(),
            clock.clone(),
        )));
        let last_run = Arc::new(RwLock::new(None));
        let sync = ReplicationSync::new(
            AcceptAll(StdMutex::new(0)),
            ProgressStore::open(dir.path().join(".sync_state.json")),
            dir.path(),
            "observations",
        );
        let mut runner = Runner::new(sync, monitor.clone(), last_run.clone(), clock.clone());

        let summary = runner.run_once(&CancellationToken::new()).await;

        // Newest NDBC row is 3h old against a 60 minute threshold.
        assert_eq!(summary.points_written, 2);
        assert_eq!(summary.alerts_fired, vec!["ndbc"]);
        assert_eq!(*notifier.0.lock().unwrap(), 1);
        assert_eq!(summary.finished_at, "2024-01-15T14:00:00Z");
        assert!(last_run.read().await.is_some());

        clock.advance(Duration::minutes(10));
        let again = runner.run_once(&CancellationToken::new()).await;
        assert_eq!(again.points_written, 0);
        assert!(again.alerts_fired.is_empty());
        assert_eq!(*notifier.0.lock().unwrap(), 1);
    }
}
