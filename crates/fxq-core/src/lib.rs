//! Core domain types for the FX quote relay.
//!
//! This crate provides the value types shared by every other crate:
//! - `Ticker`: case-insensitive instrument identifier (e.g. "eurusd")
//! - `Quote`: one priced snapshot of an instrument as received upstream

pub mod error;
pub mod types;

pub use error::{CoreError, Result};
pub use types::{Quote, Ticker};
