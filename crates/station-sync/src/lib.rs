//! Replication of the observation CSV logs into InfluxDB, plus staleness
//! alerting on the per-source observation times seen along the way.

pub mod config;
pub mod error;
pub mod monitor;
pub mod notify;
pub mod point;
pub mod progress;
pub mod replicate;
pub mod writer;

pub use config::{AlertConfig, InfluxConfig, SyncConfig};
pub use error::{Result, SyncError};
pub use monitor::{SourceStatus, StalenessMonitor};
pub use notify::{stale_alert, test_alert, Alert, Notifier, NtfyNotifier, Priority};
pub use point::{FieldValue, Point};
pub use progress::{ProgressStore, SyncProgress};
pub use replicate::{discover_files, FileSync, LatestBySource, ReplicationSync, SyncReport};
pub use writer::{InfluxWriter, TimeSeriesWriter};
