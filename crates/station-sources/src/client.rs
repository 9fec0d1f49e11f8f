//! The common interface every upstream source implements.

use std::future::Future;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use station_common::{DataSource, Observation, StationMetadata};
use tracing::{debug, error, warn};

use crate::error::Result;

/// Anything a client can fetch per station.
pub trait StationRef: Clone + Send + Sync + 'static {
    fn station_id(&self) -> &str;
}

/// One upstream source.
///
/// Single-station fetches may fail; the batch variants never do. A batch
/// logs each failure and leaves that station out of the result.
#[async_trait]
pub trait SourceClient: Send + Sync {
    type Station: StationRef;

    fn source(&self) -> DataSource;

    /// Fan-out width used by the batch variants.
    fn concurrency(&self) -> usize;

    /// Full candidate list from upstream (may be cached).
    async fn list_candidates(&self) -> Result<Vec<Self::Station>>;

    /// Stations this cycle should cover, after configured filters.
    async fn resolve_stations(&self) -> Result<Vec<Self::Station>>;

    async fn fetch_observation(&self, station: &Self::Station) -> Result<Option<Observation>>;

    async fn fetch_metadata(&self, station: &Self::Station) -> Result<Option<StationMetadata>>;

    async fn fetch_observations(&self, stations: &[Self::Station]) -> Vec<Observation> {
        fetch_batch(self.source(), "observation", stations, self.concurrency(), |station| {
            self.fetch_observation(station)
        })
        .await
    }

    async fn fetch_metadata_batch(&self, stations: &[Self::Station]) -> Vec<StationMetadata> {
        fetch_batch(self.source(), "metadata", stations, self.concurrency(), |station| {
            self.fetch_metadata(station)
        })
        .await
    }
}

/// Run `fetch` for every station with at most `width` in flight, keeping
/// only the successes.
pub async fn fetch_batch<'a, S, T, F, Fut>(
    source: DataSource,
    kind: &'static str,
    stations: &'a [S],
    width: usize,
    fetch: F,
) -> Vec<T>
where
    S: StationRef,
    F: Fn(&'a S) -> Fut + Send + Sync + 'a,
    Fut: Future<Output = Result<Option<T>>> + Send + 'a,
    T: Send + 'a,
{
    stream::iter(stations)
        .map(|station| {
            let pending = fetch(station);
            async move { (station, pending.await) }
        })
        .buffer_unordered(width.max(1))
        .boxed()
        .filter_map(|(station, result)| async move {
            match result {
                Ok(Some(record)) => Some(record),
                Ok(None) => {
                    debug!(source = %source, station = %station.station_id(), kind, "No data");
                    None
                }
                Err(e) if e.is_validation() => {
                    error!(
                        source = %source,
                        station = %station.station_id(),
                        kind,
                        error = %e,
                        "Station record failed validation"
                    );
                    None
                }
                Err(e) => {
                    warn!(
                        source = %source,
                        station = %station.station_id(),
                        kind,
                        error = %e,
                        "Station fetch failed"
                    );
                    None
                }
            }
        })
        .collect()
        .await
}

impl StationRef for String {
    fn station_id(&self) -> &str {
        self
    }
}
