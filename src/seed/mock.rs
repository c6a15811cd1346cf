//! Mock seed source for unit testing.
//!
//! Serves canned snapshots without making network requests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::error::SeedFetchError;
use crate::orderbook::types::DepthSnapshot;

use super::client::SeedSource;
use super::types::LatestPrice;

/// Configuration for mock seed behavior.
#[derive(Debug, Clone, Default)]
pub struct MockSeedConfig {
    /// Whether depth requests fail.
    pub fail_depth: bool,
    /// Whether latest price requests fail.
    pub fail_latest_price: bool,
    /// Simulated latency.
    pub latency: Duration,
}

/// In-memory seed source.
#[derive(Debug, Clone, Default)]
pub struct MockSeedSource {
    config: Arc<Mutex<MockSeedConfig>>,
    depth: Arc<Mutex<DepthSnapshot>>,
    price: Arc<Mutex<Option<Decimal>>>,
    depth_requests: Arc<AtomicUsize>,
}

impl MockSeedSource {
    /// Create a source serving `depth`.
    pub fn new(depth: DepthSnapshot) -> Self {
        Self {
            depth: Arc::new(Mutex::new(depth)),
            ..Self::default()
        }
    }

    /// Replace the served depth.
    pub fn set_depth(&self, depth: DepthSnapshot) {
        *self.depth.lock() = depth;
    }

    /// Set the served last price.
    pub fn set_price(&self, price: Decimal) {
        *self.price.lock() = Some(price);
    }

    /// Replace the behavior config.
    pub fn set_config(&self, config: MockSeedConfig) {
        *self.config.lock() = config;
    }

    /// Number of depth requests served or failed.
    pub fn depth_requests(&self) -> usize {
        self.depth_requests.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        let latency = self.config.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl SeedSource for MockSeedSource {
    async fn depth(&self) -> Result<DepthSnapshot, SeedFetchError> {
        self.depth_requests.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.config.lock().fail_depth {
            return Err(SeedFetchError::Status {
                endpoint: "depth".to_string(),
                status: 503,
            });
        }
        Ok(self.depth.lock().clone())
    }

    async fn latest_price(&self) -> Result<LatestPrice, SeedFetchError> {
        self.simulate_latency().await;

        if self.config.lock().fail_latest_price {
            return Err(SeedFetchError::Status {
                endpoint: "latestprice".to_string(),
                status: 503,
            });
        }
        match *self.price.lock() {
            Some(price) => Ok(LatestPrice { price, time: None }),
            None => Err(SeedFetchError::Parse {
                endpoint: "latestprice".to_string(),
                reason: "no price configured".to_string(),
            }),
        }
    }
}
