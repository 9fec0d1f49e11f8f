//! Durable per-file replication cursors.
//!
//! State is one JSON object mapping file path to [`SyncProgress`]. Every
//! update rewrites the whole file: the new state goes to a sibling temp
//! file which is then renamed over the old one, so a crash leaves either
//! the previous or the new state on disk, never a torn one.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use station_common::{format_utc, Clock, SystemClock};
use tracing::{debug, warn};

use crate::error::Result;

/// Checkpoint for one file. `last_line_synced` counts data rows (the
/// header is not a line), starting at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    pub file_path: String,
    pub last_line_synced: u64,
    pub last_sync_timestamp: String,
}

pub struct ProgressStore {
    path: PathBuf,
    entries: BTreeMap<String, SyncProgress>,
    clock: Arc<dyn Clock>,
}

impl ProgressStore {
    /// Load `path` if it exists. An unreadable state file is logged and
    /// treated as empty, which only causes re-uploads.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, Arc::new(SystemClock))
    }

    pub fn with_clock(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        let path = path.into();
        let entries = match load(&path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to load sync state, starting empty"
                );
                BTreeMap::new()
            }
        };
        debug!(path = %path.display(), files = entries.len(), "Loaded sync state");
        Self {
            path,
            entries,
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last synced row for `file_path`, 0 if untracked.
    pub fn get_last_line(&self, file_path: &str) -> u64 {
        self.entries
            .get(file_path)
            .map_or(0, |progress| progress.last_line_synced)
    }

    /// Record `line` as synced and persist the full state.
    pub fn update_progress(&mut self, file_path: &str, line: u64) -> Result<()> {
        self.entries.insert(
            file_path.to_string(),
            SyncProgress {
                file_path: file_path.to_string(),
                last_line_synced: line,
                last_sync_timestamp: format_utc(&self.clock.now()),
            },
        );
        self.save()
    }

    pub fn get_all_progress(&self) -> &BTreeMap<String, SyncProgress> {
        &self.entries
    }

    /// Forget `file_path`; its next sync starts from the first row.
    pub fn clear_progress(&mut self, file_path: &str) -> Result<()> {
        if self.entries.remove(file_path).is_some() {
            self.save()?;
        }
        Ok(())
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(&self.entries)?;
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn load(path: &Path) -> Result<BTreeMap<String, SyncProgress>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let data = fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}
