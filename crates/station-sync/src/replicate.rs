//! Incremental replay of observation CSV logs into the time-series store.
//!
//! For every discovered file the cursor in the [`ProgressStore`] says how
//! many data rows are already in the store. Rows after it are converted,
//! batched and written; the cursor moves only after the store accepted a
//! batch. A crash between write and checkpoint re-sends that batch, which
//! overwrites the identical points. A last row without its newline is
//! still being appended and is left for the next run.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use metrics::counter;
use station_common::DataSource;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::error::Result;
use crate::point::{from_row, Columns, Point};
use crate::progress::ProgressStore;
use crate::writer::TimeSeriesWriter;

/// Latest `observed_at` per source.
pub type LatestBySource = HashMap<DataSource, DateTime<Utc>>;

/// Outcome of syncing one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileSync {
    pub points_written: u64,
    pub latest_by_source: LatestBySource,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Points written per file; failed files map to 0.
    pub files: BTreeMap<PathBuf, u64>,
    pub failed: Vec<PathBuf>,
    pub latest_by_source: LatestBySource,
}

impl SyncReport {
    pub fn points_written(&self) -> u64 {
        self.files.values().sum()
    }
}

fn merge_latest(into: &mut LatestBySource, source: DataSource, at: DateTime<Utc>) {
    into.entry(source)
        .and_modify(|current| {
            if at > *current {
                *current = at;
            }
        })
        .or_insert(at);
}

/// `{prefix}-*.csv` and `{prefix}-*.csv.gz` directly under `dir`, sorted by name.
pub fn discover_files(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    let stem = format!("{prefix}-");
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy();
            name.starts_with(&stem) && (name.ends_with(".csv") || name.ends_with(".csv.gz"))
        })
        .map(|entry| entry.into_path())
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    files
}

/// Opens `path` for reading. For plain files the reader is bounded to the
/// current length, and the flag says whether that snapshot ends on a
/// newline. Without one, the last record is still being written.
fn open_csv(path: &Path) -> Result<(csv::Reader<Box<dyn Read>>, bool)> {
    let mut file = File::open(path)?;
    let is_gzip = path.extension().is_some_and(|ext| ext == "gz");
    let (reader, complete): (Box<dyn Read>, bool) = if is_gzip {
        (Box::new(GzDecoder::new(BufReader::new(file))), true)
    } else {
        let len = file.metadata()?.len();
        let complete = if len == 0 {
            true
        } else {
            file.seek(SeekFrom::End(-1))?;
            let mut last = [0u8; 1];
            file.read_exact(&mut last)?;
            file.seek(SeekFrom::Start(0))?;
            last[0] == b'\n'
        };
        (Box::new(BufReader::new(file.take(len))), complete)
    };
    let reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    Ok((reader, complete))
}

/// Replicates observation logs through a [`TimeSeriesWriter`].
pub struct ReplicationSync<W> {
    writer: W,
    progress: ProgressStore,
    data_dir: PathBuf,
    prefix: String,
    measurement: String,
    batch_size: usize,
}

impl<W: TimeSeriesWriter> ReplicationSync<W> {
    pub fn new(
        writer: W,
        progress: ProgressStore,
        data_dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            writer,
            progress,
            data_dir: data_dir.into(),
            prefix: prefix.into(),
            measurement: "observation".to_string(),
            batch_size: 5000,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_measurement(mut self, measurement: impl Into<String>) -> Self {
        self.measurement = measurement.into();
        self
    }

    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    pub fn progress_mut(&mut self) -> &mut ProgressStore {
        &mut self.progress
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    async fn flush_batch(&mut self, key: &str, batch: &mut Vec<Point>, line: u64) -> Result<u64> {
        self.writer.write_points(batch).await?;
        let written = batch.len() as u64;
        batch.clear();
        self.progress.update_progress(key, line)?;
        counter!("station_sync_points_written_total").increment(written);
        Ok(written)
    }

    /// Sync the rows of one file that are past its cursor.
    pub async fn sync_file(&mut self, path: &Path) -> Result<FileSync> {
        let key = path.display().to_string();
        let last_line = self.progress.get_last_line(&key);
        let (mut reader, complete) = open_csv(path)?;
        let columns = Columns::new(reader.headers()?);

        let mut outcome = FileSync::default();
        let mut batch: Vec<Point> = Vec::with_capacity(self.batch_size.min(1024));
        let mut current_line = last_line;

        let mut records = reader.records().enumerate().peekable();
        while let Some((index, record)) = records.next() {
            let line = index as u64 + 1;
            if !complete && records.peek().is_none() {
                debug!(file = %key, line, "Last row is incomplete; leaving it for the next run");
                break;
            }
            if line <= last_line {
                continue;
            }
            current_line = line;

            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    warn!(file = %key, line, error = %e, "Unreadable row skipped");
                    continue;
                }
            };
            let point = match from_row(&self.measurement, &columns, &record) {
                Ok(point) => point,
                Err(e) => {
                    warn!(file = %key, line, error = %e, "Row conversion failed");
                    continue;
                }
            };
            merge_latest(&mut outcome.latest_by_source, point.source, point.time);
            if !point.has_fields() {
                debug!(file = %key, line, "Row has no quantities");
                continue;
            }

            batch.push(point);
            if batch.len() >= self.batch_size {
                outcome.points_written += self.flush_batch(&key, &mut batch, line).await?;
            }
        }

        if !batch.is_empty() {
            outcome.points_written += self.flush_batch(&key, &mut batch, current_line).await?;
        } else if current_line > self.progress.get_last_line(&key) {
            // Trailing rows produced no points; don't re-read them next run.
            self.progress.update_progress(&key, current_line)?;
        }
        Ok(outcome)
    }

    /// Sync every discovered file in name order. A failing file is logged
    /// and left at its last checkpoint; the others still run.
    pub async fn sync_all(&mut self, cancel: &CancellationToken) -> SyncReport {
        let mut report = SyncReport::default();
        let files = discover_files(&self.data_dir, &self.prefix);
        if files.is_empty() {
            info!(dir = %self.data_dir.display(), "No observation files found");
            return report;
        }
        info!(count = files.len(), "Found observation files to sync");

        for path in files {
            if cancel.is_cancelled() {
                info!("Sync cancelled");
                break;
            }
            match self.sync_file(&path).await {
                Ok(outcome) => {
                    if outcome.points_written > 0 {
                        info!(
                            file = %path.display(),
                            points = outcome.points_written,
                            "Synced file"
                        );
                    }
                    for (source, at) in outcome.latest_by_source {
                        merge_latest(&mut report.latest_by_source, source, at);
                    }
                    report.files.insert(path, outcome.points_written);
                }
                Err(e) => {
                    error!(file = %path.display(), error = %e, "Failed to sync file");
                    report.files.insert(path.clone(), 0);
                    report.failed.push(path);
                }
            }
        }
        report
    }
}
