//! Integration tests for fxq-relay.
//!
//! These tests verify the interaction between components:
//! - Upstream connection lifecycle (subscribe, reconnect, resubscribe)
//! - Quote flow from the upstream to downstream subscribers

pub mod common;
