//! Response shapes of the seed/bootstrap HTTP API.

use std::cmp::Reverse;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::orderbook::types::{DepthSnapshot, PriceLevel};

/// A point in time as sent by the API: epoch milliseconds (number or
/// numeric string) or an RFC 3339 timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    /// Epoch milliseconds.
    Millis(i64),
    /// Textual timestamp.
    Text(String),
}

impl Timestamp {
    /// Epoch milliseconds, if the value can be interpreted.
    pub fn unix_millis(&self) -> Option<i128> {
        match self {
            Timestamp::Millis(ms) => Some(i128::from(*ms)),
            Timestamp::Text(text) => {
                let text = text.trim();
                if let Ok(ms) = text.parse::<i64>() {
                    return Some(i128::from(ms));
                }
                OffsetDateTime::parse(text, &Rfc3339)
                    .ok()
                    .map(|t| t.unix_timestamp_nanos() / 1_000_000)
            }
        }
    }
}

/// `GET /depth` body.
#[derive(Debug, Clone, Deserialize)]
pub struct DepthResponse {
    /// Wrapped snapshot.
    pub payload: DepthPayload,
}

/// Seed depth levels, in whatever order the server sent them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DepthPayload {
    /// Bid levels.
    #[serde(default)]
    pub bids: Vec<PriceLevel>,
    /// Ask levels.
    #[serde(default)]
    pub asks: Vec<PriceLevel>,
}

impl From<DepthPayload> for DepthSnapshot {
    fn from(payload: DepthPayload) -> Self {
        DepthSnapshot::new(payload.bids, payload.asks)
    }
}

/// `GET /latestprice` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestPrice {
    /// Last traded price.
    pub price: Decimal,
    /// Server time of the quote.
    #[serde(default)]
    pub time: Option<String>,
}

/// One historical trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Trade identifier.
    #[serde(default, alias = "tradeId")]
    pub id: Option<String>,
    /// Execution price.
    pub price: Decimal,
    /// Executed quantity.
    #[serde(default, alias = "volume", alias = "qty")]
    pub quantity: Option<Decimal>,
    /// Execution time.
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
    /// Whether the buyer was the resting side.
    #[serde(default, alias = "isBuyerMaker")]
    pub is_buyer_maker: Option<bool>,
    /// Market symbol.
    #[serde(default, alias = "symbol")]
    pub market: Option<String>,
}

impl Trade {
    /// Execution time in epoch milliseconds.
    pub fn timestamp_millis(&self) -> Option<i128> {
        self.timestamp.as_ref().and_then(Timestamp::unix_millis)
    }
}

/// `GET /trades` body: a bare array or `{ "trades": [...], "count": n }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TradesResponse {
    /// Wrapped list.
    Wrapped {
        /// Trades.
        trades: Vec<Trade>,
    },
    /// Bare list.
    Bare(Vec<Trade>),
}

impl TradesResponse {
    /// Trades, most recent first.
    pub fn into_recent_first(self) -> Vec<Trade> {
        let mut trades = match self {
            TradesResponse::Wrapped { trades } => trades,
            TradesResponse::Bare(trades) => trades,
        };
        // Stable: trades without a timestamp keep server order, after the rest.
        trades.sort_by_key(|t| Reverse(t.timestamp_millis()));
        trades
    }
}

/// One candle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kline {
    /// Opening price.
    pub open: Decimal,
    /// Highest price.
    pub high: Decimal,
    /// Lowest price.
    pub low: Decimal,
    /// Closing price.
    pub close: Decimal,
    /// Base volume.
    #[serde(default)]
    pub volume: Option<Decimal>,
    /// Quote volume.
    #[serde(default)]
    pub quote_volume: Option<Decimal>,
    /// Interval start.
    #[serde(default)]
    pub start: Option<Timestamp>,
    /// Interval end (the bucket time when only one is sent).
    #[serde(default, alias = "bucket")]
    pub end: Option<Timestamp>,
}

impl Kline {
    /// Interval end in epoch milliseconds.
    pub fn end_millis(&self) -> Option<i128> {
        self.end.as_ref().and_then(Timestamp::unix_millis)
    }
}

/// Order candles ascending by interval end.
pub fn sort_klines(mut klines: Vec<Kline>) -> Vec<Kline> {
    klines.sort_by_key(Kline::end_millis);
    klines
}
