//! Main application orchestration.
//!
//! Coordinates all components:
//! - Upstream feed client (one supervised connection)
//! - Quote pipeline (cache, change filter, fan-out)
//! - Downstream server (WebSocket control channel, REST facade)

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::pipeline::QuotePipeline;
use fxq_feed::QuoteCache;
use fxq_server::{AppState, BroadcastHub};
use fxq_ws::FeedClient;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Time allowed for tasks to wind down after shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Main application.
pub struct Application {
    config: AppConfig,
    cache: Arc<QuoteCache>,
    hub: Arc<BroadcastHub>,
    shutdown: CancellationToken,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cache: Arc::new(QuoteCache::new()),
            hub: Arc::new(BroadcastHub::new()),
            shutdown: CancellationToken::new(),
        })
    }

    /// Token that stops the application when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn cache(&self) -> Arc<QuoteCache> {
        Arc::clone(&self.cache)
    }

    pub fn hub(&self) -> Arc<BroadcastHub> {
        Arc::clone(&self.hub)
    }

    /// Bind the configured address and run until shutdown.
    pub async fn run(self) -> AppResult<()> {
        let listen_addr = self.config.server.listen_addr();
        let addr: SocketAddr = listen_addr
            .parse()
            .map_err(|_| AppError::Config(format!("Invalid listen address {listen_addr:?}")))?;
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "Quote server listening");
        self.run_with_listener(listener).await
    }

    /// Run on an already-bound listener until Ctrl-C, the shutdown token,
    /// or a fatal feed/server error.
    pub async fn run_with_listener(self, listener: TcpListener) -> AppResult<()> {
        let shutdown = self.shutdown.clone();

        let (quote_tx, quote_rx) = mpsc::channel(self.config.feed.channel_capacity);
        let client = Arc::new(
            FeedClient::new(self.config.feed_config(), quote_tx)
                .with_shutdown_token(shutdown.clone()),
        );

        info!(
            url = %self.config.feed.url,
            tickers = ?self.config.feed.tickers,
            "Starting quote relay"
        );

        let mut feed_task = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.connect().await }
        });

        let pipeline = QuotePipeline::new(Arc::clone(&self.cache), Arc::clone(&self.hub));
        let pipeline_task = tokio::spawn(pipeline.run(quote_rx, shutdown.clone()));

        let state = AppState::new(
            Arc::clone(&self.hub),
            Arc::clone(&self.cache),
            client.handle(),
            self.config.server.clone(),
            shutdown.clone(),
        );
        let mut server_task = tokio::spawn(fxq_server::serve(listener, state));

        let result = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                Ok(())
            }
            _ = shutdown.cancelled() => Ok(()),
            joined = &mut feed_task => match joined {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    error!(error = %e, "Upstream feed gave up");
                    Err(AppError::from(e))
                }
                Err(e) => Err(AppError::Task(format!("feed client: {e}"))),
            },
            joined = &mut server_task => match joined {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    error!(error = %e, "Quote server failed");
                    Err(AppError::from(e))
                }
                Err(e) => Err(AppError::Task(format!("server: {e}"))),
            },
        };

        info!("Shutting down");
        shutdown.cancel();

        if tokio::time::timeout(SHUTDOWN_GRACE, pipeline_task).await.is_err() {
            warn!("Pipeline did not stop in time");
        }
        // A handle already consumed by the select above must not be polled again.
        if !server_task.is_finished()
            && tokio::time::timeout(SHUTDOWN_GRACE, &mut server_task).await.is_err()
        {
            warn!("Server did not stop in time");
            server_task.abort();
        }
        if !feed_task.is_finished()
            && tokio::time::timeout(SHUTDOWN_GRACE, &mut feed_task).await.is_err()
        {
            warn!("Feed client did not stop in time");
            feed_task.abort();
        }

        result
    }
}
