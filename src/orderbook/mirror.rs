//! Live mirror of one market: depth book and ticker fed by stream callbacks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::book::{ApplyOutcome, DepthBook};
use super::types::{DepthSnapshot, PriceLevel, Ticker};
use crate::error::SeedFetchError;
use crate::seed::SeedSource;
use crate::stream::codec::{StreamEvent, StreamName};
use crate::stream::connection::ConnectionManager;
use crate::stream::registry::Callback;
use crate::stream::subscription::StreamSubscription;

static NEXT_MIRROR: AtomicU64 = AtomicU64::new(1);

/// Point-in-time view of a mirrored market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorSnapshot {
    /// Market symbol.
    pub market: String,
    /// Bid levels, best (highest) first.
    pub bids: Vec<PriceLevel>,
    /// Ask levels, best (lowest) first.
    pub asks: Vec<PriceLevel>,
    /// Latest ticker statistics, merged field by field.
    pub ticker: Ticker,
    /// Last traded price from the seed or the ticker stream.
    pub last_price: Option<Decimal>,
    /// Whether a seed snapshot has been applied.
    pub seeded: bool,
    /// When the depth book last changed.
    pub updated_at: OffsetDateTime,
}

impl MirrorSnapshot {
    fn empty(market: &str) -> Self {
        Self {
            market: market.to_string(),
            bids: Vec::new(),
            asks: Vec::new(),
            ticker: Ticker::default(),
            last_price: None,
            seeded: false,
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    /// Depth portion as a [`DepthSnapshot`].
    pub fn depth(&self) -> DepthSnapshot {
        DepthSnapshot::new(self.bids.clone(), self.asks.clone())
    }

    /// Highest bid price.
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    /// Lowest ask price.
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }
}

#[derive(Debug)]
struct MirrorState {
    book: DepthBook,
    ticker: Ticker,
    last_price: Option<Decimal>,
}

impl MirrorState {
    fn merge_ticker(&mut self, update: &Ticker) {
        let ticker = &mut self.ticker;
        if update.last_price.is_some() {
            ticker.last_price = update.last_price;
            self.last_price = update.last_price;
        }
        if update.high.is_some() {
            ticker.high = update.high;
        }
        if update.low.is_some() {
            ticker.low = update.low;
        }
        if update.volume.is_some() {
            ticker.volume = update.volume;
        }
        if update.quote_volume.is_some() {
            ticker.quote_volume = update.quote_volume;
        }
        if update.symbol.is_some() {
            ticker.symbol.clone_from(&update.symbol);
        }
    }

    fn snapshot(&self, market: &str) -> MirrorSnapshot {
        let depth = self.book.depth();
        MirrorSnapshot {
            market: market.to_string(),
            bids: depth.bids.clone(),
            asks: depth.asks.clone(),
            ticker: self.ticker.clone(),
            last_price: self.last_price,
            seeded: self.book.is_seeded(),
            updated_at: self.book.updated_at(),
        }
    }
}

#[derive(Debug)]
struct Shared {
    market: String,
    state: Mutex<MirrorState>,
    updates: watch::Sender<MirrorSnapshot>,
}

impl Shared {
    /// Runs on the dispatch path; reconciliation completes before return.
    fn on_event(&self, event: &StreamEvent) {
        let mut state = self.state.lock();
        match event {
            StreamEvent::Depth(update) => {
                if state.book.apply(update.clone()) == ApplyOutcome::Buffered {
                    debug!(
                        market = %self.market,
                        pending = state.book.pending_len(),
                        "Depth diff buffered until seed"
                    );
                    return;
                }
            }
            StreamEvent::Ticker(ticker) => state.merge_ticker(ticker),
            StreamEvent::Trade(_) => return,
        }
        self.updates.send_replace(state.snapshot(&self.market));
    }
}

/// Mirrors the depth and ticker streams of one market.
///
/// Holding the mirror keeps both stream subscriptions alive; dropping it (or
/// calling [`close`](Self::close)) unsubscribes. Observers follow changes
/// through [`watch`](Self::watch).
#[derive(Debug)]
pub struct MarketMirror {
    shared: Arc<Shared>,
    subscriptions: Vec<StreamSubscription>,
}

impl MarketMirror {
    /// Subscribe to `depth@<market>` and `ticker@<market>`.
    ///
    /// The book starts unseeded: depth diffs are held back (at most
    /// `buffer_limit` of them) until [`reseed`](Self::reseed) succeeds.
    pub fn open(manager: &Arc<ConnectionManager>, market: &str, buffer_limit: usize) -> Self {
        let (updates, _) = watch::channel(MirrorSnapshot::empty(market));
        let shared = Arc::new(Shared {
            market: market.to_string(),
            state: Mutex::new(MirrorState {
                book: DepthBook::new(buffer_limit),
                ticker: Ticker::default(),
                last_price: None,
            }),
            updates,
        });

        let instance = NEXT_MIRROR.fetch_add(1, Ordering::Relaxed);
        let subscriptions = [
            (StreamName::depth(market), "DEPTH"),
            (StreamName::ticker(market), "TICKER"),
        ]
        .into_iter()
        .map(|(stream, kind)| {
            let handler = Arc::clone(&shared);
            let callback: Callback = Arc::new(move |event: &StreamEvent| handler.on_event(event));
            manager.subscribe(
                stream.to_string(),
                format!("{kind}-{market}-{instance}"),
                callback,
            )
        })
        .collect();

        info!(market, "Market mirror opened");

        Self {
            shared,
            subscriptions,
        }
    }

    /// Market symbol.
    pub fn market(&self) -> &str {
        &self.shared.market
    }

    /// Fetch the seed depth and last price and install them.
    ///
    /// Diffs buffered while unseeded are replayed over the new snapshot.
    /// Calling this on a seeded mirror replaces the book with the fetched
    /// snapshot, so diffs applied while the fetch was in flight are lost if
    /// the server produced the snapshot before them; they come back with the
    /// next diff touching those prices or the next reseed. A failed depth
    /// fetch leaves the book as it was. A failed price fetch is logged and
    /// otherwise ignored since the ticker stream also carries it.
    pub async fn reseed<S: SeedSource + ?Sized>(&self, source: &S) -> Result<(), SeedFetchError> {
        let (depth, price) = tokio::join!(source.depth(), source.latest_price());

        let depth = depth?;
        let mut state = self.shared.state.lock();
        state.book.seed(&depth);
        match price {
            Ok(latest) => state.last_price = Some(latest.price),
            Err(e) => warn!(market = %self.shared.market, error = %e, "Latest price unavailable"),
        }

        info!(
            market = %self.shared.market,
            bids = state.book.depth().bids.len(),
            asks = state.book.depth().asks.len(),
            "Market mirror seeded"
        );
        self.shared
            .updates
            .send_replace(state.snapshot(&self.shared.market));
        Ok(())
    }

    /// Current state.
    pub fn snapshot(&self) -> MirrorSnapshot {
        self.shared.updates.borrow().clone()
    }

    /// Follow state changes.
    pub fn watch(&self) -> watch::Receiver<MirrorSnapshot> {
        self.shared.updates.subscribe()
    }

    /// Whether the seed snapshot has been applied.
    pub fn is_seeded(&self) -> bool {
        self.shared.state.lock().book.is_seeded()
    }

    /// Unsubscribe both streams now.
    pub fn close(self) {
        for subscription in self.subscriptions {
            subscription.unsubscribe();
        }
        info!(market = %self.shared.market, "Market mirror closed");
    }
}
