//! HTTP server implementation using axum.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::stream::StreamExt;
use futures_util::SinkExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fxq_feed::QuoteCache;
use fxq_ws::FeedHandle;

use crate::api;
use crate::broadcast::BroadcastHub;
use crate::config::ServerConfig;
use crate::connection::{ConnectionLimiter, ConnectionSlot};
use crate::error::{ServerError, ServerResult};

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub(crate) hub: Arc<BroadcastHub>,
    pub(crate) cache: Arc<QuoteCache>,
    pub(crate) feed: FeedHandle,
    connection_limiter: Arc<ConnectionLimiter>,
    config: ServerConfig,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        hub: Arc<BroadcastHub>,
        cache: Arc<QuoteCache>,
        feed: FeedHandle,
        config: ServerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            hub,
            cache,
            feed,
            connection_limiter: Arc::new(ConnectionLimiter::new(config.max_connections)),
            config,
            shutdown,
        }
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn cache(&self) -> &Arc<QuoteCache> {
        &self.cache
    }
}

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .route("/api/forex/pairs", get(api::list_pairs))
        .route("/api/forex/{pair}/price", get(api::get_price))
        .with_state(state)
}

/// WebSocket upgrade handler.
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let Some(slot) = state.connection_limiter.try_acquire() else {
        warn!(
            current = state.connection_limiter.current_count(),
            max = state.connection_limiter.max(),
            "WebSocket connection limit reached"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
    };

    ws.on_upgrade(move |socket| handle_ws_connection(socket, state, slot))
}

/// Handle one downstream WebSocket connection.
///
/// A writer task drains the client's queue into the socket; this task reads
/// control messages. Dropping the session on exit unregisters the client.
async fn handle_ws_connection(socket: WebSocket, state: AppState, _slot: ConnectionSlot) {
    let (session, mut outbound_rx) = state.hub.open(state.config.client_buffer);
    let conn_id = session.id();
    let (mut sender, mut receiver) = socket.split();

    let mut writer_task = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                debug!(%conn_id, "Failed to send message, client disconnected");
                break;
            }
        }
        let _ = sender.close().await;
    });

    loop {
        tokio::select! {
            biased;

            _ = state.shutdown.cancelled() => {
                debug!(%conn_id, "Server shutting down, closing connection");
                break;
            }
            _ = &mut writer_task => {
                debug!(%conn_id, "Writer task completed, closing connection");
                break;
            }
            frame = receiver.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if session.handle_control(text.as_str()).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(%conn_id, "Client closed connection");
                        break;
                    }
                    Some(Err(e)) => {
                        debug!(%conn_id, error = %e, "WebSocket receive error");
                        break;
                    }
                    // Pings are answered by axum; binary frames are ignored.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    drop(session);
    writer_task.abort();
}

/// Serve on an already-bound listener until the shutdown token fires.
pub async fn serve(listener: TcpListener, state: AppState) -> ServerResult<()> {
    let shutdown = state.shutdown.clone();
    let app = create_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    info!("Quote server stopped");
    Ok(())
}

/// Bind the configured address and serve.
pub async fn run_server(state: AppState) -> ServerResult<()> {
    let listen_addr = state.config.listen_addr();
    let addr: SocketAddr = listen_addr
        .parse()
        .map_err(|_| ServerError::InvalidAddress(listen_addr.clone()))?;

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Starting quote server");
    serve(listener, state).await
}
