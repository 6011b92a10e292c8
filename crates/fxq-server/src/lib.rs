//! fxq-server - Downstream quote server for the FX quote relay.
//!
//! Clients connect over WebSocket, send `SUBSCRIBE` / `UNSUBSCRIBE` control
//! messages, and receive every approved quote for the tickers they asked for.
//! A thin REST facade exposes the quote cache.
//!
//! # Architecture
//!
//! ```text
//!   QuotePipeline ──broadcast(&Quote)──▶ BroadcastHub
//!                                          │  SubscriptionRegistry (ticker -> ids)
//!                                          │  ConnectionTable      (id -> queue)
//!                                          ▼
//!  ┌───────────────────────────────────────────────────────────┐
//!  │  axum HTTP server (port 5001)                             │
//!  │  GET /, /ws                   → WebSocket upgrade         │
//!  │  GET /api/forex/pairs         → cached tickers            │
//!  │  GET /api/forex/{pair}/price  → latest quote              │
//!  └───────────────────────────────────────────────────────────┘
//! ```

mod api;
pub mod broadcast;
pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod registry;
mod server;

pub use broadcast::{BroadcastHub, BroadcastReport, ClientSession};
pub use config::ServerConfig;
pub use connection::{ConnectionId, ConnectionLimiter};
pub use error::{ProtocolError, SendError, ServerError, ServerResult};
pub use protocol::{parse_request, ControlRequest, ControlResponse};
pub use registry::SubscriptionRegistry;
pub use server::{create_router, run_server, serve, AppState};
