//! Downstream connections.
//!
//! Each client gets an id, a bounded outbound queue drained by its writer
//! task, and a liveness flag. The table maps ids to live connections so the
//! broadcaster can resolve the ids it gets from the subscription registry.

use crate::error::SendError;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

/// Opaque downstream connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport handle for one downstream client.
#[derive(Debug)]
pub struct ClientConnection {
    id: ConnectionId,
    tx: mpsc::Sender<String>,
    live: AtomicBool,
}

impl ClientConnection {
    fn new(id: ConnectionId, tx: mpsc::Sender<String>) -> Self {
        Self {
            id,
            tx,
            live: AtomicBool::new(true),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    pub fn mark_dead(&self) {
        self.live.store(false, Ordering::Release);
    }

    /// Queue a message without waiting. Used for fan-out.
    pub fn try_push(&self, msg: String) -> Result<(), SendError> {
        match self.tx.try_send(msg) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(SendError::Full),
            Err(TrySendError::Closed(_)) => {
                self.mark_dead();
                Err(SendError::Closed)
            }
        }
    }

    /// Queue a message, waiting for room. Used for control responses.
    pub async fn send(&self, msg: String) -> Result<(), SendError> {
        self.tx.send(msg).await.map_err(|_| {
            self.mark_dead();
            SendError::Closed
        })
    }
}

/// Live downstream connections by id.
#[derive(Default)]
pub struct ConnectionTable {
    connections: DashMap<ConnectionId, Arc<ClientConnection>>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a connection with a queue of `buffer` messages.
    pub fn register(&self, buffer: usize) -> (Arc<ClientConnection>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let conn = Arc::new(ClientConnection::new(ConnectionId::new(), tx));
        self.connections.insert(conn.id(), Arc::clone(&conn));
        (conn, rx)
    }

    pub fn get(&self, id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.connections.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.connections.remove(id).map(|(_, conn)| conn)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

/// Connection limiter to prevent too many concurrent WebSocket connections.
pub struct ConnectionLimiter {
    current: AtomicUsize,
    max: usize,
}

impl ConnectionLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            max,
        }
    }

    /// Reserve a slot; released when the returned guard drops.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ConnectionSlot> {
        loop {
            let current = self.current.load(Ordering::Acquire);
            if current >= self.max {
                return None;
            }
            if self
                .current
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(ConnectionSlot {
                    limiter: Arc::clone(self),
                });
            }
        }
    }

    pub fn current_count(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

/// Reserved connection slot.
pub struct ConnectionSlot {
    limiter: Arc<ConnectionLimiter>,
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.limiter.current.fetch_sub(1, Ordering::Release);
    }
}
