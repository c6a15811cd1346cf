//! Client-side order book and ticker mirror for a streaming exchange API.
//!
//! A single WebSocket carries many logical streams (`depth@SOL_USDC`,
//! `ticker@SOL_USDC`, ...). This library keeps that transport alive, routes
//! each inbound message to the callbacks registered for its stream, and
//! folds depth diffs into a sorted local book seeded from an HTTP snapshot.
//!
//! ```text
//!  seed HTTP ──► DepthBook ◄── depth diffs ──┐
//!                   │                        │
//!                   ▼                 SubscriptionRegistry ◄── ConnectionManager ◄── WebSocket
//!            MirrorSnapshot (watch)          │
//!                   ▲                        │
//!                 Ticker ◄──── ticker ───────┘
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`stream`]: Wire codec, registry, connection lifecycle, subscriptions
//! - [`orderbook`]: Depth reconciliation and the per-market mirror
//! - [`seed`]: HTTP bootstrap client
//! - [`metrics`]: Counters and histograms

pub mod config;
pub mod error;
pub mod metrics;
pub mod orderbook;
pub mod seed;
pub mod stream;

pub use config::Config;
pub use error::{MirrorError, Result};
