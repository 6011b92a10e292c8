//! FX quote relay.
//!
//! Wires the components together:
//! - Upstream feed client (`fxq-ws`)
//! - Latest-quote cache and change filter (`fxq-feed`)
//! - Downstream WebSocket server and REST facade (`fxq-server`)

pub mod app;
pub mod config;
pub mod error;
pub mod pipeline;

pub use app::Application;
pub use config::{AppConfig, FeedSection};
pub use error::{AppError, AppResult};
pub use pipeline::QuotePipeline;
