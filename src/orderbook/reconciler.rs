//! Folding incremental depth diffs into a local book side.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::instrument;

use super::types::{BookSide, DepthSnapshot, PriceLevel};

/// Merge an incoming diff batch into the previous state of one book side.
///
/// Levels not mentioned by the batch are kept as they were. A non-zero
/// incoming quantity overwrites (or inserts) the level at that price; a zero
/// quantity removes it, and is a no-op for prices not currently held. When a
/// batch names the same price twice the later entry wins.
///
/// The result is unique by numeric price, contains no zero quantities, and is
/// ordered best-first (bids descending, asks ascending). `previous` is not
/// required to be ordered or deduplicated, so a raw seed snapshot can be
/// normalized by merging it into an empty side.
#[instrument(level = "trace", skip_all, fields(side = %side, previous = previous.len(), incoming = incoming.len()))]
pub fn merge_side(
    previous: &[PriceLevel],
    incoming: &[PriceLevel],
    side: BookSide,
) -> Vec<PriceLevel> {
    // Decimal's Ord is numeric, so "100" and "100.0" share a key. The first
    // spelling inserted is the one that is kept.
    let mut levels: BTreeMap<Decimal, PriceLevel> = BTreeMap::new();

    for level in previous.iter().filter(|l| !l.is_removal()) {
        levels
            .entry(level.price)
            .and_modify(|held| held.quantity = level.quantity)
            .or_insert(*level);
    }

    for update in incoming {
        if update.is_removal() {
            levels.remove(&update.price);
        } else {
            levels
                .entry(update.price)
                .and_modify(|held| held.quantity = update.quantity)
                .or_insert(*update);
        }
    }

    match side {
        BookSide::Bid => levels.into_values().rev().collect(),
        BookSide::Ask => levels.into_values().collect(),
    }
}

/// Apply one depth diff (both sides) to a snapshot, returning the new snapshot.
pub fn apply_depth(
    previous: &DepthSnapshot,
    bids: &[PriceLevel],
    asks: &[PriceLevel],
) -> DepthSnapshot {
    DepthSnapshot {
        bids: merge_side(&previous.bids, bids, BookSide::Bid),
        asks: merge_side(&previous.asks, asks, BookSide::Ask),
    }
}

/// Normalize an externally supplied snapshot (e.g., a REST seed) into the
/// ordered, deduplicated, zero-free form.
pub fn normalize(snapshot: &DepthSnapshot) -> DepthSnapshot {
    apply_depth(&DepthSnapshot::default(), &snapshot.bids, &snapshot.asks)
}
