//! Shared HTTP plumbing for the source clients.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::error::{Result, SourceError};
use crate::gate::ConcurrencyGate;

/// Fixed-backoff retry for known transient statuses.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub statuses: Vec<StatusCode>,
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Retry 503/429 up to `max_attempts` total attempts.
    pub fn transient(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            statuses: vec![StatusCode::SERVICE_UNAVAILABLE, StatusCode::TOO_MANY_REQUESTS],
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }
}

/// Options for building an [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub accept: Option<String>,
    pub retry: Option<RetryPolicy>,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: None,
            accept: None,
            retry: None,
        }
    }
}

/// Gated GET client. Every request, including body download and any
/// retries, happens inside one gate permit.
pub struct HttpFetcher {
    client: Client,
    gate: ConcurrencyGate,
    retry: Option<RetryPolicy>,
}

impl HttpFetcher {
    pub fn new(gate: ConcurrencyGate, options: HttpOptions) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(agent) = &options.user_agent {
            insert_header(&mut headers, USER_AGENT, agent)?;
        }
        if let Some(accept) = &options.accept {
            insert_header(&mut headers, ACCEPT, accept)?;
        }

        let client = Client::builder()
            .timeout(options.timeout)
            .connect_timeout(Duration::from_secs(15))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            gate,
            retry: options.retry,
        })
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// GET a body as text. A 404 yields `None`.
    #[instrument(skip(self, query), fields(url = %url))]
    pub async fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<Option<String>> {
        self.gate.run(self.send(url, query)).await
    }

    /// GET and decode a JSON body. A 404 yields `None`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>> {
        match self.get_text(url, query).await? {
            Some(body) => serde_json::from_str(&body)
                .map(Some)
                .map_err(|e| SourceError::parse("JSON response", e)),
            None => Ok(None),
        }
    }

    async fn send(&self, url: &str, query: &[(&str, String)]) -> Result<Option<String>> {
        let mut attempt = 1;
        loop {
            let response = self
                .client
                .get(url)
                .query(query)
                .send()
                .await
                .map_err(|e| SourceError::transport(url, e))?;
            let status = response.status();

            if let Some(policy) = &self.retry {
                if policy.statuses.contains(&status) && attempt < policy.max_attempts {
                    warn!(
                        status = %status,
                        attempt,
                        backoff_secs = policy.backoff.as_secs_f64(),
                        "Transient upstream status, retrying"
                    );
                    tokio::time::sleep(policy.backoff).await;
                    attempt += 1;
                    continue;
                }
            }

            if status == StatusCode::NOT_FOUND {
                debug!("Not found");
                return Ok(None);
            }
            if !status.is_success() {
                return Err(SourceError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }

            let body = response
                .text()
                .await
                .map_err(|e| SourceError::transport(url, e))?;
            return Ok(Some(body));
        }
    }
}

fn insert_header(headers: &mut HeaderMap, name: HeaderName, value: &str) -> Result<()> {
    let value = HeaderValue::from_str(value)
        .map_err(|e| SourceError::InvalidConfig(format!("header {name}: {e}")))?;
    headers.insert(name, value);
    Ok(())
}

/// Join a base URL and a path without doubling slashes.
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://www.ndbc.noaa.gov/", "/data/realtime2/41001.txt"),
            "https://www.ndbc.noaa.gov/data/realtime2/41001.txt"
        );
        assert_eq!(
            join_url("https://api.weather.gov", "stations"),
            "https://api.weather.gov/stations"
        );
    }

    #[test]
    fn test_transient_policy_statuses() {
        let policy = RetryPolicy::transient(3, Duration::from_secs(5));
        assert!(policy.statuses.contains(&StatusCode::SERVICE_UNAVAILABLE));
        assert!(policy.statuses.contains(&StatusCode::TOO_MANY_REQUESTS));
        assert_eq!(policy.max_attempts, 3);
    }

    #[test]
    fn test_fetcher_rejects_bad_header() {
        let options = HttpOptions {
            user_agent: Some("bad\nagent".into()),
            ..Default::default()
        };
        let result = HttpFetcher::new(ConcurrencyGate::new(1, Duration::ZERO), options);
        assert!(matches!(result, Err(SourceError::InvalidConfig(_))));
    }
}
