//! Quote data types.
//!
//! A `Quote` is an immutable snapshot of one instrument as the upstream feed
//! reported it. Every price and size field is optional because the feed may
//! omit any of them.

use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// Instrument identifier (e.g. "eurusd").
///
/// Identity is case-insensitive: the value is trimmed and lowercased on
/// construction, so "EURUSD" and "eurusd" are the same ticker. An empty or
/// whitespace-only name is rejected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    pub fn new(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(CoreError::InvalidTicker(raw.to_string()));
        }
        Ok(Self(normalized))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Ticker {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Ticker {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<Ticker> for String {
    fn from(ticker: Ticker) -> Self {
        ticker.0
    }
}

impl Borrow<str> for Ticker {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Latest quote for an instrument.
///
/// Serialized in camelCase; absent fields are written as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Instrument identifier.
    pub ticker: Ticker,
    /// Time the upstream assigned to this quote.
    pub timestamp: Option<DateTime<Utc>>,
    pub bid_size: Option<Decimal>,
    pub bid_price: Option<Decimal>,
    /// Mid price. Drives change detection; a quote without one is cached
    /// but never broadcast.
    pub mid_price: Option<Decimal>,
    pub ask_size: Option<Decimal>,
    pub ask_price: Option<Decimal>,
}

impl Quote {
    /// Create a quote with only a ticker; every other field is absent.
    pub fn new(ticker: Ticker) -> Self {
        Self {
            ticker,
            timestamp: None,
            bid_size: None,
            bid_price: None,
            mid_price: None,
            ask_size: None,
            ask_price: None,
        }
    }

    /// Builder-style setter for the mid price.
    pub fn with_mid_price(mut self, mid_price: Decimal) -> Self {
        self.mid_price = Some(mid_price);
        self
    }

    /// Builder-style setter for bid and ask prices.
    pub fn with_bid_ask(mut self, bid_price: Decimal, ask_price: Decimal) -> Self {
        self.bid_price = Some(bid_price);
        self.ask_price = Some(ask_price);
        self
    }

    /// Serialize to the JSON pushed to downstream subscribers.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
