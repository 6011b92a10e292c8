//! Upstream WebSocket feed client for the FX quote relay.
//!
//! Provides one long-lived logical connection to the quote source with:
//! - Automatic reconnection (fixed first delay, then capped exponential backoff)
//! - Re-issue of every requested ticker after each reconnect
//! - Strict positional parsing of inbound quote frames
//! - Channel-based quote forwarding to a single consumer

pub mod connection;
pub mod error;
pub mod handle;
pub mod message;
pub mod subscription;

pub use connection::{ConnectionState, FeedClient, FeedConfig};
pub use error::{WsError, WsResult};
pub use handle::{FeedHandle, FeedOutbound};
pub use message::{parse_frame, FeedFrame, SubscribeRequest};
pub use subscription::TickerSet;

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
