//! HTTP Performance Source - Rate-limited REST Port Statistics
//!
//! Fetches `GET {base_url}/{PORT_CODE}` and expects a JSON body of the
//! form `{"performanceIndex": 7450}`. Requests are paced with a
//! `governor` direct rate limiter shared by all ports.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::domain::oracle::PortCode;
use crate::ports::performance_source::PerformanceSource;

/// Configuration for the HTTP performance source.
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    /// Base URL; the port code is appended as the last path segment.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Request budget across all ports.
    pub max_requests_per_second: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PerformanceResponse {
    performance_index: u32,
}

/// REST client for an external port-statistics provider.
pub struct HttpPerformanceSource {
    http: Client,
    base_url: String,
    limiter: DefaultDirectRateLimiter,
}

impl HttpPerformanceSource {
    /// Build the client and rate limiter.
    pub fn new(config: HttpSourceConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(2)
            .build()
            .context("Failed to build HTTP client")?;

        let rate = NonZeroU32::new(config.max_requests_per_second)
            .context("max_requests_per_second must be positive")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            limiter: RateLimiter::direct(Quota::per_second(rate)),
        })
    }

    fn url_for(&self, port: &PortCode) -> String {
        format!("{}/{}", self.base_url, port)
    }
}

#[async_trait]
impl PerformanceSource for HttpPerformanceSource {
    #[instrument(skip(self), fields(port = %port))]
    async fn fetch_index(&self, port: &PortCode) -> Result<u32> {
        self.limiter.until_ready().await;

        let url = self.url_for(port);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("Provider returned an error for {port}"))?;

        let body: PerformanceResponse = response
            .json()
            .await
            .with_context(|| format!("Invalid performance payload for {port}"))?;

        debug!(index = body.performance_index, "Performance fetched over HTTP");
        Ok(body.performance_index)
    }

    fn name(&self) -> &'static str {
        "http"
    }

    async fn is_healthy(&self) -> bool {
        match self.http.get(&self.base_url).send().await {
            Ok(response) => !response.status().is_server_error(),
            Err(e) => {
                warn!(error = %e, url = %self.base_url, "Performance provider unreachable");
                false
            }
        }
    }
}
