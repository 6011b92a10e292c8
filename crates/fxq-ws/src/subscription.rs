//! Requested-ticker tracking.
//!
//! The upstream forgets subscriptions when the socket drops, so the client
//! keeps the union of every ticker it has asked for and re-issues it after
//! each reconnect.

use fxq_core::Ticker;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use tracing::debug;

/// Set of tickers requested from the upstream.
#[derive(Debug, Default)]
pub struct TickerSet {
    tickers: RwLock<BTreeSet<Ticker>>,
}

impl TickerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set seeded with the configured tickers.
    pub fn with_tickers(tickers: impl IntoIterator<Item = Ticker>) -> Self {
        Self {
            tickers: RwLock::new(tickers.into_iter().collect()),
        }
    }

    /// Remember tickers. Returns how many were not already tracked.
    pub fn extend(&self, tickers: impl IntoIterator<Item = Ticker>) -> usize {
        let mut guard = self.tickers.write();
        let added = tickers
            .into_iter()
            .filter(|t| guard.insert(t.clone()))
            .count();
        if added > 0 {
            debug!(added, total = guard.len(), "Tracking new upstream tickers");
        }
        added
    }

    pub fn contains(&self, ticker: &Ticker) -> bool {
        self.tickers.read().contains(ticker)
    }

    /// Copy of the current set, in sorted order.
    pub fn snapshot(&self) -> Vec<Ticker> {
        self.tickers.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tickers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.read().is_empty()
    }
}
