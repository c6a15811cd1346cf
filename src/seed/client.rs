//! HTTP client for the seed API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::Config;
use crate::error::SeedFetchError;
use crate::metrics;
use crate::orderbook::types::DepthSnapshot;

use super::types::{sort_klines, DepthResponse, Kline, LatestPrice, Trade, TradesResponse};

/// Source of initial market state for a mirror.
#[async_trait]
pub trait SeedSource: Send + Sync {
    /// Full depth snapshot.
    async fn depth(&self) -> Result<DepthSnapshot, SeedFetchError>;

    /// Last traded price.
    async fn latest_price(&self) -> Result<LatestPrice, SeedFetchError>;
}

/// Seed API client.
#[derive(Debug, Clone)]
pub struct SeedClient {
    http: reqwest::Client,
    base_url: Url,
}

impl SeedClient {
    /// Create a client for `base_url` (e.g. `http://localhost:8080/v1`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SeedFetchError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_millis(500))
            .tcp_nodelay(true)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        // Trailing slash so relative joins keep the version prefix.
        let mut base = base_url.trim_end_matches('/').to_string();
        base.push('/');

        Ok(Self {
            http,
            base_url: Url::parse(&base)?,
        })
    }

    /// Create a client from config.
    pub fn from_config(config: &Config) -> Result<Self, SeedFetchError> {
        Self::new(&config.mirror_http_url, config.http_timeout())
    }

    /// Base URL, always ending with `/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, SeedFetchError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, SeedFetchError> {
        let start = Instant::now();
        let result = self.fetch(path).await;
        metrics::record_seed_fetch_latency(start, path);
        if let Err(e) = &result {
            metrics::inc_seed_fetch_errors(path);
            warn!(endpoint = path, error = %e, "Seed fetch failed");
        }
        result
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T, SeedFetchError> {
        let url = self.endpoint(path)?;
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SeedFetchError::Status {
                endpoint: path.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| SeedFetchError::Parse {
            endpoint: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// Fetch the full depth snapshot.
    #[instrument(skip(self))]
    pub async fn depth(&self) -> Result<DepthSnapshot, SeedFetchError> {
        let response: DepthResponse = self.get_json("depth").await?;
        let snapshot: DepthSnapshot = response.payload.into();
        debug!(
            bids = snapshot.bids.len(),
            asks = snapshot.asks.len(),
            "Fetched seed depth"
        );
        Ok(snapshot)
    }

    /// Fetch the last traded price.
    #[instrument(skip(self))]
    pub async fn latest_price(&self) -> Result<LatestPrice, SeedFetchError> {
        self.get_json("latestprice").await
    }

    /// Fetch recent trades, most recent first.
    #[instrument(skip(self))]
    pub async fn trades(&self) -> Result<Vec<Trade>, SeedFetchError> {
        let response: TradesResponse = self.get_json("trades").await?;
        Ok(response.into_recent_first())
    }

    /// Fetch candles for `interval` (e.g. `1m`, `1h`, `1w`), oldest first.
    #[instrument(skip(self))]
    pub async fn klines(&self, interval: &str) -> Result<Vec<Kline>, SeedFetchError> {
        let path = format!("klines/{}", interval.trim_matches('/'));
        let klines: Vec<Kline> = self.get_json(&path).await?;
        Ok(sort_klines(klines))
    }
}

#[async_trait]
impl SeedSource for SeedClient {
    async fn depth(&self) -> Result<DepthSnapshot, SeedFetchError> {
        SeedClient::depth(self).await
    }

    async fn latest_price(&self) -> Result<LatestPrice, SeedFetchError> {
        SeedClient::latest_price(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_keep_version_prefix() {
        let client = SeedClient::new("http://localhost:8080/v1", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.endpoint("depth").unwrap().as_str(),
            "http://localhost:8080/v1/depth"
        );

        let client = SeedClient::new("http://localhost:8080/v1/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.endpoint("/latestprice").unwrap().as_str(),
            "http://localhost:8080/v1/latestprice"
        );
        assert_eq!(
            client.endpoint("klines/1m").unwrap().as_str(),
            "http://localhost:8080/v1/klines/1m"
        );
    }

    #[test]
    fn rejects_bad_base_url() {
        let err = SeedClient::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, SeedFetchError::Url(_)));
    }

    #[tokio::test]
    async fn unreachable_server_is_reported() {
        // Port 9 (discard) on loopback is not expected to serve HTTP.
        let client = SeedClient::new("http://127.0.0.1:9/v1", Duration::from_millis(500)).unwrap();
        let result = client.depth().await;
        assert!(result.is_err());
    }
}
