//! HTTP source fetching with reqwest.

use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use super::{BoxFuture, SourceFetcher};
use crate::error::LayerError;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Fetches sources over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a fetcher with the default timeout.
    pub fn new() -> Result<Self, LayerError> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a fetcher with a custom timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, LayerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| {
                LayerError::FetchFailure(format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<Bytes, LayerError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LayerError::FetchFailure(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(LayerError::FetchFailure(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| LayerError::FetchFailure(format!("Failed to read response: {}", e)))?;
        debug!(url, bytes = body.len(), "Fetched source over HTTP");
        Ok(body)
    }
}

impl SourceFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, LayerError>> {
        Box::pin(self.get(url))
    }
}
