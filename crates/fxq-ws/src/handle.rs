//! Cloneable handle for issuing upstream subscriptions.
//!
//! The handle only queues messages; the connection's message loop owns the
//! socket and writes them. This keeps the API reconnect-safe and lets any
//! task (REST facade, application start-up) subscribe without touching the
//! transport.

use crate::connection::ConnectionState;
use crate::error::{WsError, WsResult};
use crate::message::SubscribeRequest;
use crate::subscription::TickerSet;
use fxq_core::Ticker;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Subscribe request queued for the message loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedOutbound {
    /// Tickers covered by the payload (for logging).
    pub tickers: Vec<Ticker>,
    /// Serialized subscribe message.
    pub payload: String,
}

/// Credential and quality-of-service level attached to each subscribe.
#[derive(Debug)]
pub(crate) struct SubscribeAuth {
    pub(crate) api_key: String,
    pub(crate) threshold_level: u8,
}

impl SubscribeAuth {
    pub(crate) fn request<'a>(
        &self,
        tickers: impl IntoIterator<Item = &'a Ticker>,
    ) -> SubscribeRequest {
        SubscribeRequest::new(&self.api_key, self.threshold_level, tickers)
    }
}

/// Handle for subscribing to upstream tickers.
#[derive(Clone)]
pub struct FeedHandle {
    tx: mpsc::Sender<FeedOutbound>,
    state: Arc<RwLock<ConnectionState>>,
    tickers: Arc<TickerSet>,
    auth: Arc<SubscribeAuth>,
}

impl FeedHandle {
    pub(crate) fn new(
        tx: mpsc::Sender<FeedOutbound>,
        state: Arc<RwLock<ConnectionState>>,
        tickers: Arc<TickerSet>,
        auth: Arc<SubscribeAuth>,
    ) -> Self {
        Self {
            tx,
            state,
            tickers,
            auth,
        }
    }

    /// Ask the upstream to stream the given tickers.
    ///
    /// Re-subscribing to a ticker that is already streamed is harmless; the
    /// upstream treats it as a no-op. The tickers are remembered and sent
    /// again after every reconnect.
    ///
    /// # Errors
    ///
    /// - `WsError::NotConnected`: the link is not `Connected`/`Receiving`
    /// - `WsError::SendFailed`: the message loop is gone
    pub async fn subscribe(&self, tickers: impl IntoIterator<Item = Ticker>) -> WsResult<()> {
        if !self.is_connected() {
            return Err(WsError::NotConnected);
        }

        let tickers: Vec<Ticker> = tickers.into_iter().collect();
        if tickers.is_empty() {
            return Ok(());
        }

        let payload = self.auth.request(&tickers).to_json()?;
        self.tx
            .send(FeedOutbound {
                tickers: tickers.clone(),
                payload,
            })
            .await
            .map_err(|_| WsError::SendFailed("feed message loop stopped".to_string()))?;

        self.tickers.extend(tickers);
        debug!(tracked = self.tickers.len(), "Subscribe request queued");
        Ok(())
    }

    /// True while the transport is up (`Connected` or `Receiving`).
    pub fn is_connected(&self) -> bool {
        self.state().is_connected() && !self.tx.is_closed()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Tickers that will be re-issued after a reconnect.
    pub fn tracked_tickers(&self) -> Vec<Ticker> {
        self.tickers.snapshot()
    }

    pub fn is_tracked(&self, ticker: &Ticker) -> bool {
        self.tickers.contains(ticker)
    }
}
