//! Per-market local depth state.

use std::collections::VecDeque;

use time::OffsetDateTime;
use tracing::{debug, warn};

use super::reconciler::{apply_depth, normalize};
use super::types::DepthSnapshot;
use crate::stream::codec::DepthUpdate;

/// Result of handing a diff to a [`DepthBook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The diff was folded into the book.
    Applied,
    /// The book has no seed yet; the diff was held back.
    Buffered,
}

/// Local order book for one market.
///
/// Diffs that arrive before the seed snapshot are queued and replayed, in
/// arrival order, on top of the seed once it lands.
#[derive(Debug, Clone)]
pub struct DepthBook {
    depth: DepthSnapshot,
    seeded: bool,
    pending: VecDeque<DepthUpdate>,
    buffer_limit: usize,
    updated_at: OffsetDateTime,
}

impl DepthBook {
    /// Create an unseeded book holding at most `buffer_limit` early diffs.
    pub fn new(buffer_limit: usize) -> Self {
        Self {
            depth: DepthSnapshot::default(),
            seeded: false,
            pending: VecDeque::new(),
            buffer_limit: buffer_limit.max(1),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    /// Whether the seed snapshot has been applied.
    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    /// Number of diffs waiting for the seed.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Current depth.
    pub fn depth(&self) -> &DepthSnapshot {
        &self.depth
    }

    /// When the book last changed.
    pub fn updated_at(&self) -> OffsetDateTime {
        self.updated_at
    }

    /// Install the seed snapshot and replay any buffered diffs over it.
    ///
    /// Seeding again (e.g., after a failed or stale first fetch) replaces the
    /// current state; buffered diffs are only replayed once.
    pub fn seed(&mut self, snapshot: &DepthSnapshot) {
        let mut depth = normalize(snapshot);
        let replayed = self.pending.len();
        for update in self.pending.drain(..) {
            depth = apply_depth(&depth, &update.bids, &update.asks);
        }

        debug!(
            bids = depth.bids.len(),
            asks = depth.asks.len(),
            replayed,
            "Depth book seeded"
        );

        self.depth = depth;
        self.seeded = true;
        self.updated_at = OffsetDateTime::now_utc();
    }

    /// Fold a diff into the book, or buffer it while unseeded.
    pub fn apply(&mut self, update: DepthUpdate) -> ApplyOutcome {
        if !self.seeded {
            if self.pending.len() >= self.buffer_limit {
                warn!(
                    limit = self.buffer_limit,
                    "Seed buffer full, dropping oldest depth diff"
                );
                self.pending.pop_front();
            }
            self.pending.push_back(update);
            return ApplyOutcome::Buffered;
        }

        self.depth = apply_depth(&self.depth, &update.bids, &update.asks);
        self.updated_at = OffsetDateTime::now_utc();
        ApplyOutcome::Applied
    }
}
