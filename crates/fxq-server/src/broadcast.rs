//! Subscription-filtered fan-out.
//!
//! `BroadcastHub` owns the connection table and the subscription registry.
//! The ingestion pipeline calls `broadcast` for every approved quote; each
//! downstream connection handler holds a `ClientSession` and routes its
//! control messages through `handle_control`.

use crate::connection::{ClientConnection, ConnectionId, ConnectionTable};
use crate::error::SendError;
use crate::protocol::{parse_request, ControlRequest, ControlResponse};
use crate::registry::SubscriptionRegistry;
use fxq_core::{Quote, Ticker};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Queued for delivery.
    pub delivered: usize,
    /// Subscribed but no longer live.
    pub skipped: usize,
    /// Queue full or closed.
    pub failed: usize,
}

/// Shared fan-out state.
#[derive(Default)]
pub struct BroadcastHub {
    connections: ConnectionTable,
    registry: SubscriptionRegistry,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new downstream connection.
    ///
    /// Returns the session guard and the receiving end of the client's
    /// outbound queue, which the caller's writer task drains.
    pub fn open(self: &Arc<Self>, buffer: usize) -> (ClientSession, mpsc::Receiver<String>) {
        let (conn, rx) = self.connections.register(buffer);
        info!(
            conn_id = %conn.id(),
            clients = self.connections.len(),
            "Downstream client connected"
        );
        (
            ClientSession {
                conn,
                hub: Arc::clone(self),
            },
            rx,
        )
    }

    /// Apply one control message from `conn` and return the reply.
    pub fn handle_control(&self, conn: ConnectionId, text: &str) -> ControlResponse {
        match parse_request(text) {
            Ok(ControlRequest::Subscribe { tickers, id }) => {
                for ticker in tickers {
                    if self.registry.subscribe(conn, ticker.clone()) {
                        info!(conn_id = %conn, %ticker, "Client subscribed");
                    }
                }
                ControlResponse::Subscribed { id }
            }
            Ok(ControlRequest::Unsubscribe) => {
                let removed = self.registry.unsubscribe_all(conn);
                info!(conn_id = %conn, removed, "Client unsubscribed");
                ControlResponse::Unsubscribed
            }
            Err(err) => {
                warn!(conn_id = %conn, error = ?err, "Rejected control message");
                ControlResponse::Rejected(err)
            }
        }
    }

    /// Push a quote to every live subscriber of its ticker.
    ///
    /// Never waits on a client: a full queue drops the message for that
    /// client only, a closed queue marks the client dead.
    pub fn broadcast(&self, quote: &Quote) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        let subscribers = self.registry.subscribers_of(&quote.ticker);
        if subscribers.is_empty() {
            trace!(ticker = %quote.ticker, "No subscribers");
            return report;
        }

        let payload = match quote.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(ticker = %quote.ticker, error = %e, "Failed to serialize quote");
                return report;
            }
        };

        for id in subscribers {
            let Some(conn) = self.connections.get(&id).filter(|c| c.is_live()) else {
                report.skipped += 1;
                continue;
            };
            match conn.try_push(payload.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    match e {
                        SendError::Full => {
                            warn!(
                                conn_id = %id,
                                ticker = %quote.ticker,
                                "Client queue full, dropping quote"
                            )
                        }
                        SendError::Closed => {
                            debug!(conn_id = %id, "Client gone during broadcast")
                        }
                    }
                }
            }
        }

        trace!(ticker = %quote.ticker, ?report, "Quote broadcast");
        report
    }

    pub fn client_count(&self) -> usize {
        self.connections.len()
    }

    pub fn subscribers_of(&self, ticker: &Ticker) -> Vec<ConnectionId> {
        self.registry.subscribers_of(ticker)
    }

    pub fn tickers_of(&self, conn: ConnectionId) -> Vec<Ticker> {
        self.registry.tickers_of(conn)
    }

    fn teardown(&self, conn: &ClientConnection) {
        conn.mark_dead();
        self.registry.unsubscribe_all(conn.id());
        self.connections.remove(&conn.id());
        info!(
            conn_id = %conn.id(),
            clients = self.connections.len(),
            "Downstream client disconnected"
        );
    }
}

/// Registration of one downstream connection.
///
/// Dropping the session tears the connection down exactly once: it is
/// marked dead, removed from every ticker set, and removed from the table.
pub struct ClientSession {
    conn: Arc<ClientConnection>,
    hub: Arc<BroadcastHub>,
}

impl ClientSession {
    pub fn id(&self) -> ConnectionId {
        self.conn.id()
    }

    /// Handle a control message and queue the reply on this connection.
    pub async fn handle_control(&self, text: &str) -> Result<(), SendError> {
        let response = self.hub.handle_control(self.conn.id(), text);
        self.conn.send(response.to_text()).await
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.hub.teardown(&self.conn);
    }
}
