//! Seed API module.
//!
//! One-shot HTTP fetches used to bootstrap local state: depth snapshot,
//! last price, recent trades and candles.

pub mod client;
pub mod mock;
pub mod types;

pub use client::{SeedClient, SeedSource};
pub use mock::{MockSeedConfig, MockSeedSource};
pub use types::{DepthPayload, DepthResponse, Kline, LatestPrice, Timestamp, Trade, TradesResponse};
