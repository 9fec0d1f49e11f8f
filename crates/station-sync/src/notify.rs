//! Alert delivery.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use station_common::{Clock, DataSource, SystemClock};
use tracing::{debug, error, info};

use crate::config::AlertConfig;
use crate::error::{Result, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Min,
    Low,
    Default,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Min => "min",
            Priority::Low => "low",
            Priority::Default => "default",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub tags: Vec<String>,
    /// Repeats of the same key are rate limited by the transport.
    pub key: Option<String>,
}

/// `"{h}h {m}m"` from one hour up, `"{m} minutes"` below.
pub fn format_elapsed(minutes: f64) -> String {
    let total = minutes.max(0.0) as i64;
    let (hours, mins) = (total / 60, total % 60);
    if hours > 0 {
        format!("{hours}h {mins}m")
    } else {
        format!("{mins} minutes")
    }
}

pub fn stale_alert(source: DataSource, minutes_ago: f64) -> Alert {
    let name = source.as_str().to_uppercase();
    Alert {
        title: format!("Weather Data Stale: {name}"),
        message: format!(
            "No new observations from {name} for {}.",
            format_elapsed(minutes_ago)
        ),
        priority: Priority::High,
        tags: vec!["warning".into(), "clock".into()],
        key: Some(format!("stale_{}", source.as_str())),
    }
}

pub fn test_alert() -> Alert {
    Alert {
        title: "Weather Station Alert Test".into(),
        message: "This is a test alert from the weather station pipeline.".into(),
        priority: Priority::Low,
        tags: vec!["white_check_mark".into(), "test".into()],
        key: None,
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// True only if the alert went out.
    async fn send(&self, alert: &Alert) -> bool;
}

/// ntfy topic publisher with a per-key minimum repeat interval.
pub struct NtfyNotifier {
    client: Client,
    config: AlertConfig,
    last_sent: Mutex<HashMap<String, DateTime<Utc>>>,
    clock: Arc<dyn Clock>,
}

impl NtfyNotifier {
    pub fn new(config: AlertConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: AlertConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            config,
            last_sent: Mutex::new(HashMap::new()),
            clock,
        })
    }

    fn topic_url(&self) -> String {
        format!(
            "{}/{}",
            self.config.ntfy_server.trim_end_matches('/'),
            self.config.ntfy_topic.trim()
        )
    }

    fn is_rate_limited(&self, key: &str) -> bool {
        let Ok(last_sent) = self.last_sent.lock() else {
            return false;
        };
        let min_interval = chrono::Duration::minutes(self.config.min_alert_interval_minutes);
        last_sent
            .get(key)
            .is_some_and(|at| self.clock.now() - *at < min_interval)
    }

    fn record_sent(&self, key: &str) {
        if let Ok(mut last_sent) = self.last_sent.lock() {
            last_sent.insert(key.to_string(), self.clock.now());
        }
    }

    async fn post(&self, alert: &Alert) -> Result<()> {
        let response = self
            .client
            .post(self.topic_url())
            .header("Title", alert.title.as_str())
            .header("Priority", alert.priority.as_str())
            .header("Tags", alert.tags.join(","))
            .body(alert.message.clone())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Notify(format!("ntfy returned {status}")));
        }
        Ok(())
    }

    pub async fn send_test(&self) -> bool {
        self.send(&test_alert()).await
    }
}

#[async_trait]
impl Notifier for NtfyNotifier {
    async fn send(&self, alert: &Alert) -> bool {
        if !self.config.is_active() {
            debug!(title = %alert.title, "Alerts disabled, not sending");
            return false;
        }
        if let Some(key) = &alert.key {
            if self.is_rate_limited(key) {
                debug!(key = %key, "Alert rate limited");
                return false;
            }
        }

        match self.post(alert).await {
            Ok(()) => {
                if let Some(key) = &alert.key {
                    self.record_sent(key);
                }
                info!(title = %alert.title, "Alert sent");
                true
            }
            Err(e) => {
                error!(title = %alert.title, error = %e, "Failed to send alert");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use station_common::ManualClock;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(45.7), "45 minutes");
        assert_eq!(format_elapsed(60.0), "1h 0m");
        assert_eq!(format_elapsed(135.2), "2h 15m");
    }

    #[test]
    fn test_stale_alert_text() {
        let alert = stale_alert(DataSource::Ndbc, 95.0);
        assert_eq!(alert.title, "Weather Data Stale: NDBC");
        assert_eq!(alert.message, "No new observations from NDBC for 1h 35m.");
        assert_eq!(alert.priority, Priority::High);
        assert_eq!(alert.tags, vec!["warning", "clock"]);
        assert_eq!(alert.key.as_deref(), Some("stale_ndbc"));
    }

    #[tokio::test]
    async fn test_disabled_notifier_does_not_send() {
        let notifier = NtfyNotifier::new(AlertConfig::default()).unwrap();
        assert!(!notifier.send(&test_alert()).await);
    }

    #[test]
    fn test_rate_limit_window() {
        let noon = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(noon));
        let config = AlertConfig {
            ntfy_topic: "weather".into(),
            min_alert_interval_minutes: 60,
            ..Default::default()
        };
        let notifier = NtfyNotifier::with_clock(config, clock.clone()).unwrap();

        assert!(!notifier.is_rate_limited("stale_isd"));
        notifier.record_sent("stale_isd");
        clock.advance(chrono::Duration::minutes(59));
        assert!(notifier.is_rate_limited("stale_isd"));
        assert!(!notifier.is_rate_limited("stale_nws"));
        clock.advance(chrono::Duration::minutes(1));
        assert!(!notifier.is_rate_limited("stale_isd"));
    }

    #[test]
    fn test_topic_url() {
        let config = AlertConfig {
            ntfy_server: "https://ntfy.example.org/".into(),
            ntfy_topic: "buoys".into(),
            ..Default::default()
        };
        let notifier = NtfyNotifier::new(config).unwrap();
        assert_eq!(notifier.topic_url(), "https://ntfy.example.org/buoys");
    }
}
