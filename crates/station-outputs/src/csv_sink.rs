//! Append-only CSV logs, one file per record kind per UTC day.
//!
//! Files are named `{prefix}-{YYYY-MM-DD}.csv`. A file gets its header row
//! only when it is created; reopening an existing file appends to it. The
//! date is taken from the injected clock before every write.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use station_common::{
    Clock, Observation, StationMetadata, SystemClock, METADATA_COLUMNS, OBSERVATION_COLUMNS,
};
use tracing::{debug, info};

use crate::config::CsvConfig;
use crate::error::{Result, SinkError};
use crate::sink::Sink;

/// Path of the file for `prefix` on `day`.
pub fn daily_path(dir: &Path, prefix: &str, day: NaiveDate) -> PathBuf {
    dir.join(format!("{}-{}.csv", prefix, day.format("%Y-%m-%d")))
}

/// One rotating file.
struct DailyFile {
    dir: PathBuf,
    prefix: String,
    header: &'static [&'static str],
    day: Option<NaiveDate>,
    writer: Option<csv::Writer<File>>,
    pending: usize,
}

impl DailyFile {
    fn new(dir: &Path, prefix: &str, header: &'static [&'static str]) -> Self {
        Self {
            dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
            header,
            day: None,
            writer: None,
            pending: 0,
        }
    }

    /// Writer for `today`, rotating if the day changed.
    fn writer_for(&mut self, today: NaiveDate) -> Result<&mut csv::Writer<File>> {
        if self.day != Some(today) {
            self.close()?;
        }
        if self.writer.is_none() {
            let path = daily_path(&self.dir, &self.prefix, today);
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            let is_new = file.metadata()?.len() == 0;

            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(file);
            if is_new {
                writer.write_record(self.header)?;
                info!(path = %path.display(), "Created CSV file");
            } else {
                debug!(path = %path.display(), "Appending to existing CSV file");
            }
            self.writer = Some(writer);
            self.day = Some(today);
        }
        self.writer
            .as_mut()
            .ok_or_else(|| SinkError::Closed(self.prefix.clone()))
    }

    fn write(&mut self, today: NaiveDate, record: &[String], buffer_size: usize) -> Result<()> {
        self.writer_for(today)?.write_record(record)?;
        self.pending += 1;
        if self.pending >= buffer_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        self.pending = 0;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.flush()?;
        self.writer = None;
        self.day = None;
        Ok(())
    }
}

/// Rotating CSV sink.
pub struct CsvSink {
    observations: DailyFile,
    metadata: DailyFile,
    buffer_size: usize,
    clock: Arc<dyn Clock>,
    closed: bool,
}

impl CsvSink {
    pub fn new(config: &CsvConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &CsvConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        fs::create_dir_all(&config.output_dir)?;
        Ok(Self {
            observations: DailyFile::new(
                &config.output_dir,
                &config.observations_prefix,
                &OBSERVATION_COLUMNS,
            ),
            metadata: DailyFile::new(
                &config.output_dir,
                &config.metadata_prefix,
                &METADATA_COLUMNS,
            ),
            buffer_size: config.buffer_size.max(1),
            clock,
            closed: false,
        })
    }

    fn today(&self) -> Result<NaiveDate> {
        if self.closed {
            return Err(SinkError::Closed("csv".to_string()));
        }
        Ok(self.clock.now().date_naive())
    }
}

#[async_trait]
impl Sink for CsvSink {
    fn name(&self) -> &str {
        "csv"
    }

    async fn write_observation(&mut self, observation: &Observation) -> Result<()> {
        let today = self.today()?;
        self.observations
            .write(today, &observation.csv_record(), self.buffer_size)
    }

    async fn write_metadata(&mut self, metadata: &StationMetadata) -> Result<()> {
        let today = self.today()?;
        self.metadata
            .write(today, &metadata.csv_record(), self.buffer_size)
    }

    async fn flush(&mut self) -> Result<()> {
        self.observations.flush()?;
        self.metadata.flush()
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.observations.close()?;
        self.metadata.close()?;
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use station_common::{DataSource, ManualClock, Readings, StationDetails};

    fn observation(station: &str) -> Observation {
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        Observation::new(DataSource::Ndbc, station, at, Readings::default()).unwrap()
    }

    fn config(dir: &Path) -> CsvConfig {
        CsvConfig {
            output_dir: dir.to_path_buf(),
            buffer_size: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_daily_path() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(
            daily_path(Path::new("/data"), "observations", day),
            PathBuf::from("/data/observations-2024-01-05.csv")
        );
    }

    #[tokio::test]
    async fn test_existing_file_is_not_reheadered() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap()));

        let mut first = CsvSink::with_clock(&config(dir.path()), clock.clone()).unwrap();
        first.write_observation(&observation("41001")).await.unwrap();
        first.close().await.unwrap();

        let mut second = CsvSink::with_clock(&config(dir.path()), clock).unwrap();
        second.write_observation(&observation("41002")).await.unwrap();
        second.close().await.unwrap();

        let content = fs::read_to_string(dir.path().join("observations-2024-01-15.csv")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("source,source_station_id,observed_at"));
        assert_eq!(lines.iter().filter(|l| l.starts_with("source,")).count(), 1);
    }

    #[tokio::test]
    async fn test_metadata_written_to_own_file() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap()));
        let mut sink = CsvSink::with_clock(&config(dir.path()), clock).unwrap();

        let meta =
            StationMetadata::new(DataSource::Ndbc, "41001", 34.7, -72.3, StationDetails::default())
                .unwrap();
        sink.write_metadata(&meta).await.unwrap();
        sink.flush().await.unwrap();

        let content = fs::read_to_string(dir.path().join("metadata-2024-01-15.csv")).unwrap();
        assert!(content.starts_with("source,source_station_id,wmo_id,name,latitude"));
        assert!(content.lines().nth(1).unwrap().starts_with("ndbc,41001,,,34.7,-72.3"));
    }

    #[tokio::test]
    async fn test_write_after_close_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvSink::new(&config(dir.path())).unwrap();
        sink.close().await.unwrap();

        let result = sink.write_observation(&observation("41001")).await;

        assert!(matches!(result, Err(SinkError::Closed(_))));
    }

    #[tokio::test]
    async fn test_buffer_flushes_after_n_records() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap()));
        let mut sink = CsvSink::with_clock(&config(dir.path()), clock.clone()).unwrap();

        sink.write_observation(&observation("a")).await.unwrap();
        sink.write_observation(&observation("b")).await.unwrap();
        clock.advance(Duration::minutes(1));

        let content = fs::read_to_string(dir.path().join("observations-2024-01-15.csv")).unwrap();
        assert_eq!(content.lines().count(), 3);
    }
}
