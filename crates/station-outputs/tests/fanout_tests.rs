//! Fan-out and rotation behaviour across sinks.

use std::fs;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use station_common::{DataSource, ManualClock, Observation, Readings, StationMetadata};
use station_outputs::{daily_path, CsvConfig, CsvSink, OutputFanout, Result, Sink, SinkError};

fn observation(station: &str) -> Observation {
    let at = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
    Observation::new(DataSource::Ndbc, station, at, Readings::default()).unwrap()
}

/// Fails every observation write.
struct BrokenSink;

#[async_trait]
impl Sink for BrokenSink {
    fn name(&self) -> &str {
        "broken"
    }

    async fn write_observation(&mut self, _observation: &Observation) -> Result<()> {
        Err(SinkError::Closed("broken".to_string()))
    }

    async fn write_metadata(&mut self, _metadata: &StationMetadata) -> Result<()> {
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        Err(SinkError::Closed("broken".to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Keeps the station ids it was given.
#[derive(Clone, Default)]
struct MemorySink {
    seen: Arc<Mutex<Vec<String>>>,
    flushes: Arc<Mutex<usize>>,
}

#[async_trait]
impl Sink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn write_observation(&mut self, observation: &Observation) -> Result<()> {
        self.seen.lock().unwrap().push(observation.source_station_id().to_string());
        Ok(())
    }

    async fn write_metadata(&mut self, _metadata: &StationMetadata) -> Result<()> {
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        *self.flushes.lock().unwrap() += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_failing_sink_does_not_block_healthy_sink() {
    let memory = MemorySink::default();
    let mut fanout = OutputFanout::new();
    fanout.push(Box::new(BrokenSink));
    fanout.push(Box::new(memory.clone()));

    let accepted = fanout.write_observation(&observation("41001")).await;
    fanout.flush().await;

    assert_eq!(accepted, 1);
    assert_eq!(*memory.seen.lock().unwrap(), vec!["41001".to_string()]);
    assert_eq!(*memory.flushes.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_empty_fanout_accepts_nothing() {
    let mut fanout = OutputFanout::new();
    assert!(fanout.is_empty());
    assert_eq!(fanout.write_observation(&observation("41001")).await, 0);
}

#[tokio::test]
async fn test_day_rollover_produces_two_files_with_one_header_each() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 15, 23, 58, 0).unwrap()));
    let config = CsvConfig {
        output_dir: dir.path().to_path_buf(),
        buffer_size: 100,
        ..Default::default()
    };
    let mut fanout = OutputFanout::new();
    fanout.push(Box::new(CsvSink::with_clock(&config, clock.clone()).unwrap()));

    for station in ["a1", "a2", "a3"] {
        fanout.write_observation(&observation(station)).await;
    }
    clock.advance(Duration::minutes(5));
    for station in ["b1", "b2"] {
        fanout.write_observation(&observation(station)).await;
    }
    fanout.close().await;

    let day = |d: u32| Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap().date_naive();
    let day_one = daily_path(dir.path(), "observations", day(15));
    let day_two = daily_path(dir.path(), "observations", day(16));
    let files = test_utils::list_files(dir.path(), "observations-");
    assert_eq!(files, vec![day_one.clone(), day_two.clone()]);

    let first = fs::read_to_string(day_one).unwrap();
    let second = fs::read_to_string(day_two).unwrap();
    for content in [&first, &second] {
        assert_eq!(content.lines().filter(|l| l.starts_with("source,")).count(), 1);
    }
    assert_eq!(first.lines().count(), 4);
    assert_eq!(second.lines().count(), 3);
    assert!(second.lines().nth(1).unwrap().starts_with("ndbc,b1,"));
}
