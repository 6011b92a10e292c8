//! Latest-quote cache.
//!
//! Process-wide map `ticker -> latest Quote`. Entries are created on the
//! first quote for a ticker, overwritten afterwards, and never removed.

use dashmap::DashMap;
use fxq_core::{Quote, Ticker};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::trace;

/// Thread-safe latest-value store keyed by ticker.
///
/// Values are stored behind `Arc` and replaced whole, so a reader never
/// observes a partially written quote. Lookups only lock the shard that
/// owns the key.
pub struct QuoteCache {
    quotes: DashMap<Ticker, Arc<Quote>>,
}

impl QuoteCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            quotes: DashMap::new(),
        }
    }

    /// Insert or overwrite the entry for `quote.ticker` (last write wins).
    pub fn put(&self, quote: Quote) {
        trace!(ticker = %quote.ticker, "Caching quote");
        self.quotes.insert(quote.ticker.clone(), Arc::new(quote));
    }

    /// Latest quote for a ticker, if one has been observed.
    pub fn get(&self, ticker: &Ticker) -> Option<Arc<Quote>> {
        self.quotes.get(ticker).map(|entry| Arc::clone(entry.value()))
    }

    /// Snapshot of every ticker that currently has data.
    pub fn list_tickers(&self) -> BTreeSet<Ticker> {
        self.quotes.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of tickers with data.
    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

impl Default for QuoteCache {
    fn default() -> Self {
        Self::new()
    }
}
