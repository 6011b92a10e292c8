//! Upstream feed connection.
//!
//! Owns the single logical connection to the quote source for the life of
//! the process:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Receiving -> (close|error) -> Disconnected -> ...
//! ```
//!
//! Every session ends in `Disconnected`; `connect()` then waits out the
//! backoff delay and starts a new session. After each handshake the full set
//! of requested tickers is subscribed again.

use crate::error::{WsError, WsResult};
use crate::handle::{FeedHandle, FeedOutbound, SubscribeAuth};
use crate::message::{parse_frame, FeedFrame};
use crate::subscription::TickerSet;
use fxq_core::{Quote, Ticker};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Feed client configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// WebSocket URL of the quote source.
    pub url: String,
    /// Authorization credential sent with every subscribe.
    pub api_key: String,
    /// Quality-of-service threshold sent with every subscribe.
    pub threshold_level: u8,
    /// Tickers subscribed on every connect.
    pub tickers: Vec<Ticker>,
    /// Delay before the first reconnect attempt.
    pub reconnect_base_delay_ms: u64,
    /// Upper bound for the exponential backoff.
    pub reconnect_max_delay_ms: u64,
    /// Random jitter added from the second attempt on (exclusive bound).
    pub reconnect_jitter_ms: u64,
    /// Consecutive failed sessions before giving up (0 = never).
    pub max_reconnect_attempts: u32,
    /// Capacity of the outbound subscribe queue.
    pub outbound_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            threshold_level: 5,
            tickers: Vec::new(),
            reconnect_base_delay_ms: 5000,
            reconnect_max_delay_ms: 60000,
            reconnect_jitter_ms: 1000,
            max_reconnect_attempts: 0, // Infinite
            outbound_capacity: 64,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// Handshake done, initial subscriptions being sent.
    Connected,
    /// Receive loop running.
    Receiving,
}

impl ConnectionState {
    /// Whether subscribe requests may be issued.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected | Self::Receiving)
    }
}

/// Upstream feed client.
pub struct FeedClient {
    config: FeedConfig,
    state: Arc<RwLock<ConnectionState>>,
    tickers: Arc<TickerSet>,
    auth: Arc<SubscribeAuth>,
    quote_tx: mpsc::Sender<Quote>,
    /// Consecutive failed sessions.
    reconnect_count: Arc<RwLock<u32>>,
    outbound_tx: mpsc::Sender<FeedOutbound>,
    /// Consumed by whichever session is live.
    outbound_rx: Arc<TokioMutex<mpsc::Receiver<FeedOutbound>>>,
    /// Set while a connect loop or session owns the upstream link.
    running: AtomicBool,
    shutdown_token: CancellationToken,
}

/// Releases the running flag when the owning loop exits.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl FeedClient {
    /// Create a new client. Parsed quotes are forwarded to `quote_tx`.
    pub fn new(config: FeedConfig, quote_tx: mpsc::Sender<Quote>) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_capacity.max(1));
        Self {
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            tickers: Arc::new(TickerSet::with_tickers(config.tickers.iter().cloned())),
            auth: Arc::new(SubscribeAuth {
                api_key: config.api_key.clone(),
                threshold_level: config.threshold_level,
            }),
            config,
            quote_tx,
            reconnect_count: Arc::new(RwLock::new(0)),
            outbound_tx,
            outbound_rx: Arc::new(TokioMutex::new(outbound_rx)),
            running: AtomicBool::new(false),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token (process-wide shutdown).
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown_token = token;
        self
    }

    /// Get a handle for issuing subscriptions from other tasks.
    pub fn handle(&self) -> FeedHandle {
        FeedHandle::new(
            self.outbound_tx.clone(),
            self.state.clone(),
            self.tickers.clone(),
            self.auth.clone(),
        )
    }

    /// Subscribe to tickers on the live connection.
    ///
    /// Fails with `WsError::NotConnected` while disconnected.
    pub async fn subscribe(&self, tickers: impl IntoIterator<Item = Ticker>) -> WsResult<()> {
        self.handle().subscribe(tickers).await
    }

    /// Get current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Consecutive failed sessions since the last successful handshake.
    pub fn reconnect_attempts(&self) -> u32 {
        *self.reconnect_count.read()
    }

    /// Signal graceful shutdown.
    ///
    /// Both the receive loop and the backoff sleep observe the token.
    pub fn shutdown(&self) {
        info!("Feed client shutdown requested");
        self.shutdown_token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Whether a connect loop or single session is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Claim the upstream link. Only one loop may own it at a time.
    fn acquire_running(&self) -> WsResult<RunningGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| WsError::ConnectionFailed("already running".to_string()))?;
        Ok(RunningGuard(&self.running))
    }

    /// Keep the upstream link alive until shutdown.
    ///
    /// Runs sessions back to back, sleeping out the backoff delay between
    /// them. Returns `Ok(())` on shutdown and `WsError::ConnectionFailed` only
    /// when `max_reconnect_attempts` consecutive sessions have failed, or
    /// immediately if another loop already owns the link.
    pub async fn connect(&self) -> WsResult<()> {
        let _running = self.acquire_running()?;
        loop {
            if self.is_shutdown() {
                info!("Shutdown requested, exiting connect loop");
                return Ok(());
            }

            match self.session().await {
                Ok(()) => info!("Upstream session ended"),
                Err(e) => error!(error = %e, "Upstream session failed"),
            }

            if self.is_shutdown() {
                info!("Shutdown requested after disconnect, not reconnecting");
                return Ok(());
            }

            let attempt = {
                let mut count = self.reconnect_count.write();
                *count += 1;
                *count
            };

            if self.config.max_reconnect_attempts > 0
                && attempt >= self.config.max_reconnect_attempts
            {
                error!(attempt, "Max reconnection attempts reached");
                return Err(WsError::ConnectionFailed(
                    "Max reconnection attempts reached".to_string(),
                ));
            }

            let delay = self.backoff_delay(attempt);
            warn!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown requested during backoff, exiting");
                    return Ok(());
                }
            }
        }
    }

    /// Run exactly one session: handshake, resubscribe, receive until the
    /// link drops.
    ///
    /// Fails with `WsError::ConnectionFailed` if the handshake fails; the
    /// caller decides whether to retry. The socket is released and the
    /// state returns to `Disconnected` on every exit path.
    pub async fn connect_once(&self) -> WsResult<()> {
        let _running = self.acquire_running()?;
        self.session().await
    }

    async fn session(&self) -> WsResult<()> {
        let result = self.run_session().await;
        *self.state.write() = ConnectionState::Disconnected;
        result
    }

    async fn run_session(&self) -> WsResult<()> {
        *self.state.write() = ConnectionState::Connecting;
        info!(url = %self.config.url, "Connecting to upstream feed");

        let handshake = connect_async_tls_with_config(&self.config.url, None, true, None);
        let ws_stream = tokio::select! {
            result = handshake => {
                result.map_err(|e| WsError::ConnectionFailed(e.to_string()))?.0
            }
            () = self.shutdown_token.cancelled() => return Ok(()),
        };
        let (mut write, mut read) = ws_stream.split();

        *self.state.write() = ConnectionState::Connected;
        *self.reconnect_count.write() = 0;
        info!("Upstream feed connected");

        self.restore_subscriptions(&mut write).await?;

        *self.state.write() = ConnectionState::Receiving;
        self.receive_loop(&mut write, &mut read).await
    }

    async fn restore_subscriptions(&self, write: &mut WsSink) -> WsResult<()> {
        let tickers = self.tickers.snapshot();
        if tickers.is_empty() {
            info!("No tickers to subscribe yet");
            return Ok(());
        }

        let payload = self.auth.request(&tickers).to_json()?;
        write.send(Message::Text(payload)).await?;
        info!(count = tickers.len(), "Subscriptions restored");
        Ok(())
    }

    async fn receive_loop(&self, write: &mut WsSink, read: &mut WsSource) -> WsResult<()> {
        loop {
            let outbound_recv = async { self.outbound_rx.lock().await.recv().await };

            tokio::select! {
                biased;

                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received in receive loop");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(error = %e, "Failed to send Close frame during shutdown");
                    }
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text_message(&text).await;
                        }
                        Some(Ok(Message::Ping(_))) => {
                            // tungstenite queues the pong reply itself.
                            trace!("Received ping");
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "Upstream closed the connection");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "Upstream read error");
                            return Err(e.into());
                        }
                        None => {
                            warn!("Upstream stream ended");
                            return Ok(());
                        }
                        _ => {}
                    }
                }

                outbound = outbound_recv => {
                    if let Some(msg) = outbound {
                        write.send(Message::Text(msg.payload)).await?;
                        debug!(tickers = ?msg.tickers, "Subscribe request sent upstream");
                    }
                }
            }
        }
    }

    /// Parse and forward one text frame. Malformed frames are dropped.
    async fn handle_text_message(&self, text: &str) {
        match parse_frame(text) {
            Ok(FeedFrame::Quote(quote)) => {
                trace!(ticker = %quote.ticker, mid = ?quote.mid_price, "Quote received");
                if self.quote_tx.send(quote).await.is_err() {
                    warn!("Quote receiver dropped");
                }
            }
            Ok(FeedFrame::MissingTicker) => {}
            Ok(FeedFrame::Info(response)) => debug!(%response, "Upstream info message"),
            Ok(FeedFrame::Heartbeat) => trace!("Upstream heartbeat"),
            Ok(FeedFrame::Error(message)) => warn!(%message, "Upstream reported an error"),
            Ok(FeedFrame::Other(kind)) => debug!(%kind, "Ignoring upstream message"),
            Err(e) => warn!(error = %e, "Dropping malformed upstream frame"),
        }
    }

    /// First retry waits exactly the base delay; later ones double it up to
    /// the cap and add jitter.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.reconnect_base_delay_ms;
        let max = self.config.reconnect_max_delay_ms.max(base);

        if attempt <= 1 {
            return Duration::from_millis(base);
        }

        let exponent = (attempt - 1).min(16);
        let delay = base.saturating_mul(1u64 << exponent).min(max);
        Duration::from_millis(delay + rand_jitter(self.config.reconnect_jitter_ms))
    }
}

/// Random jitter in `[0, bound)` milliseconds.
fn rand_jitter(bound: u64) -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    if bound == 0 {
        return 0;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    u64::from(nanos) % bound
}
