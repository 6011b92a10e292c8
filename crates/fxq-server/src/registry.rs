//! Per-ticker subscriber sets.
//!
//! Maps `ticker -> {connection ids}`. All mutation goes through DashMap
//! entry guards, and readers get a copy of the set, so a fan-out never
//! iterates a set that another connection is changing.

use crate::connection::ConnectionId;
use dashmap::DashMap;
use fxq_core::Ticker;
use std::collections::HashSet;
use tracing::debug;

/// Registry of which downstream connections want which tickers.
pub struct SubscriptionRegistry {
    by_ticker: DashMap<Ticker, HashSet<ConnectionId>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            by_ticker: DashMap::new(),
        }
    }

    /// Add `conn` to the ticker's set, creating the set if needed.
    ///
    /// Idempotent; returns `true` if the connection was not yet subscribed.
    pub fn subscribe(&self, conn: ConnectionId, ticker: Ticker) -> bool {
        self.by_ticker.entry(ticker).or_default().insert(conn)
    }

    /// Remove `conn` from every ticker's set.
    ///
    /// Safe for connections that never subscribed. Emptied sets are kept.
    /// Returns the number of sets the connection was removed from.
    pub fn unsubscribe_all(&self, conn: ConnectionId) -> usize {
        let removed = self
            .by_ticker
            .iter_mut()
            .filter_map(|mut entry| entry.value_mut().remove(&conn).then_some(()))
            .count();
        if removed > 0 {
            debug!(conn_id = %conn, removed, "Connection unsubscribed from all tickers");
        }
        removed
    }

    /// Copy of the current subscriber set for a ticker (possibly empty).
    pub fn subscribers_of(&self, ticker: &Ticker) -> Vec<ConnectionId> {
        self.by_ticker
            .get(ticker)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Tickers a connection is currently subscribed to.
    pub fn tickers_of(&self, conn: ConnectionId) -> Vec<Ticker> {
        let mut tickers: Vec<Ticker> = self
            .by_ticker
            .iter()
            .filter(|entry| entry.value().contains(&conn))
            .map(|entry| entry.key().clone())
            .collect();
        tickers.sort();
        tickers
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn t(name: &str) -> Ticker {
        Ticker::new(name).unwrap()
    }

    #[test]
    fn test_subscribers_of_unknown_ticker_is_empty() {
        let registry = SubscriptionRegistry::new();
        assert!(registry.subscribers_of(&t("eurusd")).is_empty());
    }

    #[test]
    fn test_subscribe_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        let conn = ConnectionId::new();

        assert!(registry.subscribe(conn, t("eurusd")));
        assert!(!registry.subscribe(conn, t("EURUSD")));

        assert_eq!(registry.subscribers_of(&t("eurusd")), vec![conn]);
    }

    #[test]
    fn test_multiple_connections_per_ticker() {
        let registry = SubscriptionRegistry::new();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        registry.subscribe(a, t("eurusd"));
        registry.subscribe(b, t("eurusd"));
        registry.subscribe(a, t("usdjpy"));

        let mut subs = registry.subscribers_of(&t("eurusd"));
        subs.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(subs, expected);
        assert_eq!(registry.tickers_of(a), vec![t("eurusd"), t("usdjpy")]);
    }

    #[test]
    fn test_unsubscribe_all_removes_everywhere() {
        let registry = SubscriptionRegistry::new();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        registry.subscribe(a, t("eurusd"));
        registry.subscribe(a, t("usdjpy"));
        registry.subscribe(b, t("usdjpy"));

        assert_eq!(registry.unsubscribe_all(a), 2);

        assert!(registry.subscribers_of(&t("eurusd")).is_empty());
        assert_eq!(registry.subscribers_of(&t("usdjpy")), vec![b]);
        assert!(registry.tickers_of(a).is_empty());
    }

    #[test]
    fn test_unsubscribe_all_without_subscriptions() {
        let registry = SubscriptionRegistry::new();
        let a = ConnectionId::new();
        registry.subscribe(ConnectionId::new(), t("eurusd"));

        assert_eq!(registry.unsubscribe_all(a), 0);
        assert!(!registry.subscribers_of(&t("audusd")).contains(&a));
    }

    #[test]
    fn test_concurrent_subscribe_and_teardown() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let survivor = ConnectionId::new();
        registry.subscribe(survivor, t("eurusd"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..100 {
                        let conn = ConnectionId::new();
                        registry.subscribe(conn, t("eurusd"));
                        registry.subscribe(conn, t("usdjpy"));
                        let _ = registry.subscribers_of(&t("eurusd"));
                        registry.unsubscribe_all(conn);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.subscribers_of(&t("eurusd")), vec![survivor]);
        assert!(registry.subscribers_of(&t("usdjpy")).is_empty());
    }
}
