//! Quote state for the FX quote relay.
//!
//! Holds the latest quote per ticker and decides which updates are
//! material enough to fan out to downstream subscribers.

pub mod cache;
pub mod change_filter;

pub use cache::QuoteCache;
pub use change_filter::ChangeFilter;
