use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use chrono::NaiveDate;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

use super::domain::{FxSource, RatesSnapshot};
use crate::telemetry::FX_UPSTREAM_REQUESTS;

/// An upstream publisher of daily TRY rates.
#[async_trait]
pub trait RateSource: Send + Sync {
    fn source(&self) -> FxSource;

    /// Rates published for `date`, or `Ok(None)` when the source published nothing for it.
    async fn fetch(&self, date: NaiveDate) -> Result<Option<RatesSnapshot>, SourceError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("upstream answered with status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("source is not configured")]
    Disabled,
}

/// Shared GET helper: per-request timeout from the client, exponential retry on transport
/// failures and 5xx answers, `None` on 404.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_retry_elapsed: Duration,
    source: FxSource,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client, max_retry_elapsed: Duration, source: FxSource) -> Self {
        Self {
            client,
            max_retry_elapsed,
            source,
        }
    }

    pub async fn get(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
    ) -> Result<Option<String>, SourceError> {
        let policy = ExponentialBackoff {
            initial_interval: Duration::from_millis(200),
            max_elapsed_time: Some(self.max_retry_elapsed),
            ..Default::default()
        };

        retry(policy, || async {
            metrics::counter!(FX_UPSTREAM_REQUESTS, "source" => self.source.label()).increment(1);
            let mut request = self.client.get(url);
            for (name, value) in headers {
                request = request.header(*name, value.as_str());
            }

            let response = request.send().await.map_err(|err| {
                debug!(%url, error = %err, "rate source request failed");
                backoff::Error::transient(SourceError::Transport(err.to_string()))
            })?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(SourceError::Status(
                    status.as_u16(),
                )));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(SourceError::Status(
                    status.as_u16(),
                )));
            }

            let body = response
                .text()
                .await
                .map_err(|err| backoff::Error::transient(SourceError::Transport(err.to_string())))?;
            Ok(Some(body))
        })
        .await
    }
}

/// HTTP client carrying the per-request timeout shared by both sources.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("liman/", env!("CARGO_PKG_VERSION")))
        .build()
}
