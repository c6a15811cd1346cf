//! Wire envelope for the streaming protocol.
//!
//! Outbound: `{"method":"SUBSCRIBE","params":["depth@SOL_USD"],"id":1}`.
//! Inbound: `{"stream":"depth@SOL_USD","data":{"e":"depth","b":[..],"a":[..],"id":7}}`,
//! `{"stream":"ticker@SOL_USD","tickerdata":{..}}` or
//! `{"stream":"trade@SOL_USD","tradedata":{..}}`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::DecodeError;
use crate::orderbook::types::{PriceLevel, Ticker, TradeUpdate};

/// Depth channel name.
pub const CHANNEL_DEPTH: &str = "depth";
/// Ticker channel name.
pub const CHANNEL_TICKER: &str = "ticker";
/// Trade channel name.
pub const CHANNEL_TRADE: &str = "trade";

/// Request verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Method {
    /// Start receiving a stream.
    Subscribe,
    /// Stop receiving a stream.
    Unsubscribe,
}

/// Outbound request.
///
/// `id` is left empty by callers; the connection manager stamps it when the
/// request is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Request verb.
    pub method: Method,
    /// Stream names the verb applies to.
    pub params: Vec<String>,
    /// Request identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

impl Request {
    /// SUBSCRIBE to one stream.
    pub fn subscribe(stream: impl Into<String>) -> Self {
        Self {
            method: Method::Subscribe,
            params: vec![stream.into()],
            id: None,
        }
    }

    /// UNSUBSCRIBE from one stream.
    pub fn unsubscribe(stream: impl Into<String>) -> Self {
        Self {
            method: Method::Unsubscribe,
            params: vec![stream.into()],
            id: None,
        }
    }

    /// Copy of this request carrying the given id.
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }
}

/// Serialize a request for the wire.
pub fn encode(request: &Request) -> Result<String, serde_json::Error> {
    serde_json::to_string(request)
}

/// `<channel>@<market>` stream name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamName {
    /// Channel, e.g. "depth".
    pub channel: String,
    /// Market, e.g. "BTC_USDC".
    pub market: String,
}

impl StreamName {
    /// Build a stream name from its parts.
    pub fn new(channel: impl Into<String>, market: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            market: market.into(),
        }
    }

    /// Depth stream for a market.
    pub fn depth(market: impl Into<String>) -> Self {
        Self::new(CHANNEL_DEPTH, market)
    }

    /// Ticker stream for a market.
    pub fn ticker(market: impl Into<String>) -> Self {
        Self::new(CHANNEL_TICKER, market)
    }

    /// Trade stream for a market.
    pub fn trade(market: impl Into<String>) -> Self {
        Self::new(CHANNEL_TRADE, market)
    }
}

impl fmt::Display for StreamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.channel, self.market)
    }
}

impl FromStr for StreamName {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('@') {
            Some((channel, market)) if !channel.is_empty() && !market.is_empty() => {
                Ok(Self::new(channel, market))
            }
            _ => Err(DecodeError::InvalidStreamName(s.to_string())),
        }
    }
}

/// Incremental depth diff.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepthUpdate {
    /// Bid changes; zero quantity removes the level.
    pub bids: Vec<PriceLevel>,
    /// Ask changes; zero quantity removes the level.
    pub asks: Vec<PriceLevel>,
    /// Server-side event id, informational only.
    pub id: Option<u64>,
}

/// Decoded payload of an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Depth diff.
    Depth(DepthUpdate),
    /// Ticker statistics.
    Ticker(Ticker),
    /// Public trade.
    Trade(TradeUpdate),
}

impl StreamEvent {
    /// Short event name for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Depth(_) => CHANNEL_DEPTH,
            StreamEvent::Ticker(_) => CHANNEL_TICKER,
            StreamEvent::Trade(_) => CHANNEL_TRADE,
        }
    }
}

/// Inbound message addressed to a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    /// Stream name as sent by the server.
    pub stream: String,
    /// Decoded payload.
    pub event: StreamEvent,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    stream: String,
    #[serde(default)]
    data: Option<RawDepthData>,
    #[serde(default)]
    tickerdata: Option<Ticker>,
    #[serde(default)]
    tradedata: Option<TradeUpdate>,
}

#[derive(Debug, Deserialize)]
struct RawDepthData {
    #[serde(default)]
    e: Option<String>,
    #[serde(default)]
    b: Vec<PriceLevel>,
    #[serde(default)]
    a: Vec<PriceLevel>,
    #[serde(default)]
    id: Option<u64>,
}

/// Decode one inbound text frame.
///
/// `Ok(None)` means the frame is well formed but carries no payload this
/// client understands.
pub fn decode(text: &str) -> Result<Option<Inbound>, DecodeError> {
    let RawFrame {
        stream,
        data,
        tickerdata,
        tradedata,
    } = serde_json::from_str(text)?;

    let event = if let Some(data) = data.filter(|d| d.e.as_deref() == Some(CHANNEL_DEPTH)) {
        StreamEvent::Depth(DepthUpdate {
            bids: data.b,
            asks: data.a,
            id: data.id,
        })
    } else if let Some(ticker) = tickerdata {
        StreamEvent::Ticker(ticker)
    } else if let Some(trade) = tradedata {
        StreamEvent::Trade(trade)
    } else {
        return Ok(None);
    };

    Ok(Some(Inbound { stream, event }))
}
