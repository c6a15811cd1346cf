//! Order book types and data structures.

use std::cmp::Ordering;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Single price level in an order book.
///
/// On the wire a level is a `[price, quantity]` pair of decimal strings.
/// A quantity of zero in a diff means "remove this price".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "(String, String)", into = "(String, String)")]
pub struct PriceLevel {
    /// Price at this level; the dedup key.
    pub price: Decimal,
    /// Quantity resting at this price.
    pub quantity: Decimal,
}

impl PriceLevel {
    /// Create a new price level.
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }

    /// Whether this level is a removal marker rather than a real level.
    pub fn is_removal(&self) -> bool {
        self.quantity.is_zero()
    }
}

impl TryFrom<(String, String)> for PriceLevel {
    type Error = rust_decimal::Error;

    fn try_from((price, quantity): (String, String)) -> Result<Self, Self::Error> {
        Ok(Self {
            price: price.trim().parse()?,
            quantity: quantity.trim().parse()?,
        })
    }
}

impl From<PriceLevel> for (String, String) {
    fn from(level: PriceLevel) -> Self {
        (level.price.to_string(), level.quantity.to_string())
    }
}

/// Which side of the book a set of levels belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum BookSide {
    /// Buy side, best (highest) price first.
    Bid,
    /// Sell side, best (lowest) price first.
    Ask,
}

impl BookSide {
    /// Ordering of two prices on this side: best price sorts first.
    pub fn compare(&self, a: &Decimal, b: &Decimal) -> Ordering {
        match self {
            BookSide::Bid => b.cmp(a),
            BookSide::Ask => a.cmp(b),
        }
    }
}

/// Bid and ask levels of one market.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthSnapshot {
    /// Bid levels sorted by price descending.
    pub bids: Vec<PriceLevel>,
    /// Ask levels sorted by price ascending.
    pub asks: Vec<PriceLevel>,
}

impl DepthSnapshot {
    /// Create a snapshot from already-ordered sides.
    pub fn new(bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) -> Self {
        Self { bids, asks }
    }

    /// Get the best bid price.
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    /// Get the best ask price.
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    /// Get the spread between best bid and ask.
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Midpoint between best bid and ask.
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }

    /// Check if the book is crossed (best_ask < best_bid).
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => ask < bid,
            _ => false,
        }
    }

    /// Get total quantity on the bid side.
    pub fn total_bid_liquidity(&self) -> Decimal {
        self.bids.iter().map(|l| l.quantity).sum()
    }

    /// Get total quantity on the ask side.
    pub fn total_ask_liquidity(&self) -> Decimal {
        self.asks.iter().map(|l| l.quantity).sum()
    }

    /// Whether both sides are empty.
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

/// Latest summary statistics for a market.
///
/// Every field is optional on the wire; the short single-letter keys are
/// accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker {
    /// Last traded price.
    #[serde(default, alias = "c")]
    pub last_price: Option<Decimal>,
    /// Session high.
    #[serde(default, alias = "h")]
    pub high: Option<Decimal>,
    /// Session low.
    #[serde(default, alias = "l")]
    pub low: Option<Decimal>,
    /// Base volume.
    #[serde(default, alias = "v")]
    pub volume: Option<Decimal>,
    /// Quote volume.
    #[serde(default, alias = "V")]
    pub quote_volume: Option<Decimal>,
    /// Market symbol.
    #[serde(default, alias = "s")]
    pub symbol: Option<String>,
}

/// A public trade pushed on a trade stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeUpdate {
    /// Trade identifier.
    #[serde(default)]
    pub trade_id: Option<String>,
    /// Market symbol.
    #[serde(default)]
    pub symbol: Option<String>,
    /// Aggressor side ("buy" or "sell").
    #[serde(default)]
    pub side: Option<String>,
    /// Execution price.
    #[serde(default)]
    pub price: Option<Decimal>,
    /// Executed quantity.
    #[serde(default)]
    pub quantity: Option<Decimal>,
    /// Execution time in milliseconds.
    #[serde(default)]
    pub timestamp: Option<i64>,
}
