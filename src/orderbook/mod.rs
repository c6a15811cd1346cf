//! Order book module for the mirrored market state.
//!
//! This module handles:
//! - Order book types and data structures
//! - Folding depth diffs into sorted, deduplicated sides
//! - The per-market local book and its observable mirror

pub mod book;
pub mod mirror;
pub mod reconciler;
pub mod types;

pub use book::{ApplyOutcome, DepthBook};
pub use mirror::{MarketMirror, MirrorSnapshot};
pub use reconciler::{apply_depth, merge_side, normalize};
pub use types::{BookSide, DepthSnapshot, PriceLevel, Ticker, TradeUpdate};
