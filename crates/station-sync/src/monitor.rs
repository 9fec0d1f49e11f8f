//! Per-source data freshness tracking.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use station_common::{format_utc, Clock, DataSource, SystemClock};
use tracing::{info, warn};

use crate::config::AlertConfig;
use crate::notify::{stale_alert, Notifier};

#[derive(Debug, Clone, Copy)]
struct SourceState {
    last_observation: DateTime<Utc>,
    alerted: bool,
}

/// Status of one source as served by the status API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStatus {
    pub last_observation: String,
    pub minutes_ago: f64,
    pub is_stale: bool,
    pub alerted: bool,
}

/// Fires one alert per stale episode of a source. A newer observation ends
/// the episode; repeat suppression across episodes is the notifier's job.
pub struct StalenessMonitor {
    notifier: Arc<dyn Notifier>,
    config: AlertConfig,
    clock: Arc<dyn Clock>,
    sources: BTreeMap<DataSource, SourceState>,
}

impl StalenessMonitor {
    pub fn new(notifier: Arc<dyn Notifier>, config: AlertConfig) -> Self {
        Self::with_clock(notifier, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        notifier: Arc<dyn Notifier>,
        config: AlertConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            notifier,
            config,
            clock,
            sources: BTreeMap::new(),
        }
    }

    /// Keep the newest instant per source; a newer one clears `alerted`.
    pub fn update_observation_time(&mut self, source: DataSource, observed_at: DateTime<Utc>) {
        match self.sources.get_mut(&source) {
            Some(state) => {
                if observed_at > state.last_observation {
                    if state.alerted {
                        info!(source = %source, "Source recovered");
                    }
                    state.last_observation = observed_at;
                    state.alerted = false;
                }
            }
            None => {
                self.sources.insert(
                    source,
                    SourceState {
                        last_observation: observed_at,
                        alerted: false,
                    },
                );
            }
        }
    }

    fn minutes_since(&self, at: DateTime<Utc>) -> f64 {
        (self.clock.now() - at).num_milliseconds() as f64 / 60_000.0
    }

    /// Sources whose newest observation is older than the threshold, with
    /// the elapsed minutes.
    pub fn get_stale_sources(&self) -> Vec<(DataSource, f64)> {
        self.sources
            .iter()
            .map(|(source, state)| (*source, self.minutes_since(state.last_observation)))
            .filter(|(_, minutes)| *minutes > self.config.stale_threshold_minutes)
            .collect()
    }

    /// Alert every newly stale source. Returns the sources alerted this call.
    pub async fn check_and_alert(&mut self) -> Vec<DataSource> {
        if !self.config.enabled {
            return Vec::new();
        }

        let mut fired = Vec::new();
        for (source, minutes_ago) in self.get_stale_sources() {
            let Some(state) = self.sources.get(&source) else {
                continue;
            };
            if state.alerted {
                continue;
            }
            warn!(source = %source, minutes_ago, "Source is stale");
            let sent = self.notifier.send(&stale_alert(source, minutes_ago)).await;
            if !sent {
                warn!(source = %source, "Stale alert was not delivered");
            }
            // Marked either way so a failing transport can't cause an alert storm.
            if let Some(state) = self.sources.get_mut(&source) {
                state.alerted = true;
            }
            fired.push(source);
        }
        fired
    }

    pub fn get_status(&self) -> BTreeMap<DataSource, SourceStatus> {
        self.sources
            .iter()
            .map(|(source, state)| {
                let minutes = self.minutes_since(state.last_observation);
                let status = SourceStatus {
                    last_observation: format_utc(&state.last_observation),
                    minutes_ago: (minutes * 10.0).round() / 10.0,
                    is_stale: minutes > self.config.stale_threshold_minutes,
                    alerted: state.alerted,
                };
                (*source, status)
            })
            .collect()
    }
}
