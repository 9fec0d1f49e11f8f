//! Time-series store client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use tracing::{debug, instrument};

use crate::config::InfluxConfig;
use crate::error::{Result, SyncError};
use crate::point::Point;

/// Destination of replicated points. Identical (tags, timestamp) points
/// overwrite each other, so re-sending a batch is harmless.
#[async_trait]
pub trait TimeSeriesWriter: Send + Sync {
    /// Write a whole batch; `Ok` means the store acknowledged all of it.
    async fn write_points(&self, points: &[Point]) -> Result<()>;
}

/// InfluxDB v2 `/api/v2/write` over HTTP.
pub struct InfluxWriter {
    client: Client,
    write_url: String,
    token: String,
    org: String,
    bucket: String,
}

impl InfluxWriter {
    pub fn new(config: &InfluxConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            write_url: format!("{}/api/v2/write", config.url.trim_end_matches('/')),
            token: config.token.clone(),
            org: config.org.clone(),
            bucket: config.bucket.clone(),
        })
    }
}

/// Newline-joined line protocol body.
pub fn encode_batch(points: &[Point]) -> String {
    points
        .iter()
        .map(Point::to_line_protocol)
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl TimeSeriesWriter for InfluxWriter {
    #[instrument(skip(self, points), fields(count = points.len()))]
    async fn write_points(&self, points: &[Point]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let response = self
            .client
            .post(&self.write_url)
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "s"),
            ])
            .header(AUTHORIZATION, format!("Token {}", self.token))
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(encode_batch(points))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SyncError::Write {
                status: status.as_u16(),
                message,
            });
        }
        debug!("Batch written");
        Ok(())
    }
}
