//! Material-change detection.
//!
//! Tracks the last mid price actually broadcast per ticker and suppresses
//! updates that would repeat it.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use fxq_core::{Quote, Ticker};
use rust_decimal::Decimal;
use tracing::trace;

/// Decides whether a quote differs from the last broadcast value.
///
/// Check-and-update happens under the shard write lock of the ticker's
/// entry, so two identical quotes racing for the same ticker cannot both
/// be approved.
pub struct ChangeFilter {
    last_broadcast: DashMap<Ticker, Decimal>,
}

impl ChangeFilter {
    pub fn new() -> Self {
        Self {
            last_broadcast: DashMap::new(),
        }
    }

    /// Returns `true` when the quote should be fanned out.
    ///
    /// - absent mid price: `false`, state untouched
    /// - first quote for the ticker: `true`, mid price recorded
    /// - mid price equal to the last broadcast one: `false`, state untouched
    /// - mid price changed: `true`, mid price recorded
    pub fn should_broadcast(&self, quote: &Quote) -> bool {
        let Some(mid) = quote.mid_price else {
            return false;
        };

        match self.last_broadcast.entry(quote.ticker.clone()) {
            Entry::Occupied(mut entry) => {
                if *entry.get() == mid {
                    trace!(ticker = %quote.ticker, %mid, "Mid price unchanged");
                    false
                } else {
                    entry.insert(mid);
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(mid);
                true
            }
        }
    }

    /// Last mid price broadcast for a ticker.
    pub fn last_broadcast(&self, ticker: &Ticker) -> Option<Decimal> {
        self.last_broadcast.get(ticker).map(|entry| *entry.value())
    }
}

impl Default for ChangeFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn quote(mid: Option<Decimal>) -> Quote {
        let mut q = Quote::new(Ticker::new("eurusd").unwrap());
        q.mid_price = mid;
        q
    }

    #[test]
    fn test_absent_mid_never_broadcast() {
        let filter = ChangeFilter::new();
        assert!(!filter.should_broadcast(&quote(None)));
        assert!(filter
            .last_broadcast(&Ticker::new("eurusd").unwrap())
            .is_none());
    }

    #[test]
    fn test_first_quote_broadcast() {
        let filter = ChangeFilter::new();
        assert!(filter.should_broadcast(&quote(Some(dec!(1.0850)))));
    }

    #[test]
    fn test_equal_mid_suppressed() {
        let filter = ChangeFilter::new();
        assert!(filter.should_broadcast(&quote(Some(dec!(1.0850)))));
        assert!(!filter.should_broadcast(&quote(Some(dec!(1.0850)))));
        // Decimal equality ignores scale.
        assert!(!filter.should_broadcast(&quote(Some(dec!(1.08500)))));
    }

    #[test]
    fn test_changed_mid_broadcast_and_recorded() {
        let filter = ChangeFilter::new();
        assert!(filter.should_broadcast(&quote(Some(dec!(1.0850)))));
        assert!(filter.should_broadcast(&quote(Some(dec!(1.0851)))));
        assert!(filter.should_broadcast(&quote(Some(dec!(1.0850)))));
        assert_eq!(
            filter.last_broadcast(&Ticker::new("eurusd").unwrap()),
            Some(dec!(1.0850))
        );
    }

    #[test]
    fn test_absent_mid_does_not_reset_state() {
        let filter = ChangeFilter::new();
        assert!(filter.should_broadcast(&quote(Some(dec!(1.0850)))));
        assert!(!filter.should_broadcast(&quote(None)));
        assert!(!filter.should_broadcast(&quote(Some(dec!(1.0850)))));
    }

    #[test]
    fn test_tickers_are_independent() {
        let filter = ChangeFilter::new();
        let eur = Quote::new(Ticker::new("eurusd").unwrap()).with_mid_price(dec!(1));
        let jpy = Quote::new(Ticker::new("usdjpy").unwrap()).with_mid_price(dec!(1));
        assert!(filter.should_broadcast(&eur));
        assert!(filter.should_broadcast(&jpy));
    }

    #[test]
    fn test_concurrent_identical_quotes_approved_once() {
        let filter = Arc::new(ChangeFilter::new());
        let approved = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let filter = Arc::clone(&filter);
                let approved = Arc::clone(&approved);
                thread::spawn(move || {
                    if filter.should_broadcast(&quote(Some(dec!(1.2345)))) {
                        approved.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(approved.load(Ordering::SeqCst), 1);
    }
}
