//! Message-bus sink on Redis Streams.
//!
//! Each record becomes one `XADD` entry with two fields: `key`
//! (`{source}.{source_station_id}`) and `data` (the record as a flat JSON
//! object, absent values as explicit nulls). Delivery is asynchronous: a
//! write only enqueues the send, failures are logged when they complete,
//! and `flush` waits a bounded time for everything in flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Client;
use serde::Serialize;
use station_common::{Observation, StationMetadata};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::BusConfig;
use crate::error::{Result, SinkError};
use crate::sink::Sink;

/// Transport for a single stream entry.
#[async_trait]
pub trait StreamPublisher: Send + Sync + 'static {
    /// Append one entry and return its stream id.
    async fn publish(&self, stream: &str, key: &str, payload: &str) -> Result<String>;
}

/// `XADD` over a multiplexed Redis connection.
pub struct RedisPublisher {
    conn: MultiplexedConnection,
}

impl RedisPublisher {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        info!(url = %url, "Connected to Redis");
        Ok(Self { conn })
    }
}

#[async_trait]
impl StreamPublisher for RedisPublisher {
    async fn publish(&self, stream: &str, key: &str, payload: &str) -> Result<String> {
        let mut conn = self.conn.clone();
        let entry_id: String = redis::cmd("XADD")
            .arg(stream)
            .arg("*")
            .arg("key")
            .arg(key)
            .arg("data")
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        Ok(entry_id)
    }
}

#[derive(Debug, Default)]
struct Delivery {
    delivered: AtomicU64,
    failed: AtomicU64,
}

/// Asynchronous-delivery stream sink.
pub struct StreamSink {
    publisher: Arc<dyn StreamPublisher>,
    observations_stream: String,
    metadata_stream: String,
    flush_timeout: Duration,
    in_flight: JoinSet<()>,
    delivery: Arc<Delivery>,
    closed: bool,
}

impl StreamSink {
    /// Connect to Redis using `config`.
    pub async fn connect(config: &BusConfig) -> Result<Self> {
        let publisher = RedisPublisher::connect(&config.url).await?;
        Ok(Self::with_publisher(config, Arc::new(publisher)))
    }

    pub fn with_publisher(config: &BusConfig, publisher: Arc<dyn StreamPublisher>) -> Self {
        Self {
            publisher,
            observations_stream: config.observations_stream.clone(),
            metadata_stream: config.metadata_stream.clone(),
            flush_timeout: config.flush_timeout(),
            in_flight: JoinSet::new(),
            delivery: Arc::new(Delivery::default()),
            closed: false,
        }
    }

    /// Entries acknowledged so far.
    pub fn delivered(&self) -> u64 {
        self.delivery.delivered.load(Ordering::Relaxed)
    }

    /// Entries whose delivery failed so far.
    pub fn failed(&self) -> u64 {
        self.delivery.failed.load(Ordering::Relaxed)
    }

    fn send<T: Serialize>(&mut self, stream: String, key: String, record: &T) -> Result<()> {
        if self.closed {
            return Err(SinkError::Closed("stream".to_string()));
        }
        let payload = serde_json::to_string(record)?;
        let publisher = self.publisher.clone();
        let delivery = self.delivery.clone();

        self.in_flight.spawn(async move {
            match publisher.publish(&stream, &key, &payload).await {
                Ok(entry_id) => {
                    debug!(stream = %stream, key = %key, entry_id = %entry_id, "Delivered");
                    delivery.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    warn!(stream = %stream, key = %key, error = %e, "Delivery failed");
                    delivery.failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        });
        Ok(())
    }
}

async fn drain(in_flight: &mut JoinSet<()>) {
    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "Delivery task aborted");
        }
    }
}

#[async_trait]
impl Sink for StreamSink {
    fn name(&self) -> &str {
        "stream"
    }

    async fn write_observation(&mut self, observation: &Observation) -> Result<()> {
        let stream = self.observations_stream.clone();
        self.send(stream, observation.key(), observation)
    }

    async fn write_metadata(&mut self, metadata: &StationMetadata) -> Result<()> {
        let stream = self.metadata_stream.clone();
        self.send(stream, metadata.key(), metadata)
    }

    async fn flush(&mut self) -> Result<()> {
        if tokio::time::timeout(self.flush_timeout, drain(&mut self.in_flight))
            .await
            .is_err()
        {
            let pending = self.in_flight.len();
            warn!(pending, "Stream flush timed out");
            return Err(SinkError::FlushTimeout { pending });
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let flushed = self.flush().await;
        self.closed = true;
        info!(
            delivered = self.delivered(),
            failed = self.failed(),
            "Stream sink closed"
        );
        flushed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use station_common::{DataSource, Readings};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        entries: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl StreamPublisher for Recorder {
        async fn publish(&self, stream: &str, key: &str, payload: &str) -> Result<String> {
            let mut entries = self.entries.lock().await;
            entries.push((stream.to_string(), key.to_string(), payload.to_string()));
            Ok(format!("{}-0", entries.len()))
        }
    }

    struct Refusing;

    #[async_trait]
    impl StreamPublisher for Refusing {
        async fn publish(&self, _stream: &str, _key: &str, _payload: &str) -> Result<String> {
            Err(SinkError::Closed("broker".to_string()))
        }
    }

    struct Stalled;

    #[async_trait]
    impl StreamPublisher for Stalled {
        async fn publish(&self, _stream: &str, _key: &str, _payload: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("never".to_string())
        }
    }

    fn observation() -> Observation {
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let readings = Readings {
            air_temp_c: Some(15.2),
            ..Default::default()
        };
        Observation::new(DataSource::Isd, "725030-14732", at, readings).unwrap()
    }

    #[tokio::test]
    async fn test_payload_keeps_nulls_and_key() {
        let recorder = Arc::new(Recorder::default());
        let mut sink = StreamSink::with_publisher(&BusConfig::default(), recorder.clone());

        sink.write_observation(&observation()).await.unwrap();
        sink.flush().await.unwrap();

        let entries = recorder.entries.lock().await;
        assert_eq!(entries.len(), 1);
        let (stream, key, payload) = &entries[0];
        assert_eq!(stream, "weather.observation.raw");
        assert_eq!(key, "isd.725030-14732");
        let json: serde_json::Value = serde_json::from_str(payload).unwrap();
        assert_eq!(json["air_temp_c"], 15.2);
        assert!(json.get("dewpoint_c").unwrap().is_null());
        assert_eq!(sink.delivered(), 1);
    }

    #[tokio::test]
    async fn test_delivery_failure_is_not_fatal() {
        let mut sink = StreamSink::with_publisher(&BusConfig::default(), Arc::new(Refusing));

        sink.write_observation(&observation()).await.unwrap();
        sink.flush().await.unwrap();

        assert_eq!(sink.failed(), 1);
        assert_eq!(sink.delivered(), 0);
    }

    #[tokio::test]
    async fn test_flush_wait_is_bounded() {
        let config = BusConfig {
            flush_timeout_secs: 0,
            ..Default::default()
        };
        let mut sink = StreamSink::with_publisher(&config, Arc::new(Stalled));

        sink.write_observation(&observation()).await.unwrap();
        let result = sink.flush().await;

        assert!(matches!(result, Err(SinkError::FlushTimeout { pending: 1 })));
    }

    #[tokio::test]
    async fn test_write_after_close_fails() {
        let recorder = Arc::new(Recorder::default());
        let mut sink = StreamSink::with_publisher(&BusConfig::default(), recorder);
        sink.close().await.unwrap();
        assert!(matches!(
            sink.write_observation(&observation()).await,
            Err(SinkError::Closed(_))
        ));
    }
}
