//! Quote ingestion pipeline.
//!
//! Single consumer of the feed client's quote channel. Every quote updates
//! the cache; only quotes whose mid price changed reach subscribers.

use fxq_core::Quote;
use fxq_feed::{ChangeFilter, QuoteCache};
use fxq_server::{BroadcastHub, BroadcastReport};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

pub struct QuotePipeline {
    cache: Arc<QuoteCache>,
    filter: ChangeFilter,
    hub: Arc<BroadcastHub>,
}

impl QuotePipeline {
    pub fn new(cache: Arc<QuoteCache>, hub: Arc<BroadcastHub>) -> Self {
        Self {
            cache,
            filter: ChangeFilter::new(),
            hub,
        }
    }

    /// Cache the quote and fan it out if it is a material change.
    ///
    /// Returns `None` when the change filter suppressed the broadcast.
    pub fn process(&self, quote: Quote) -> Option<BroadcastReport> {
        self.cache.put(quote.clone());

        if !self.filter.should_broadcast(&quote) {
            trace!(ticker = %quote.ticker, "Quote cached, broadcast suppressed");
            return None;
        }

        let report = self.hub.broadcast(&quote);
        debug!(
            ticker = %quote.ticker,
            mid = ?quote.mid_price,
            delivered = report.delivered,
            failed = report.failed,
            "Quote broadcast"
        );
        Some(report)
    }

    /// Drain `quote_rx` until it closes or `shutdown` fires.
    ///
    /// Returns the number of quotes processed.
    pub async fn run(
        self,
        mut quote_rx: mpsc::Receiver<Quote>,
        shutdown: CancellationToken,
    ) -> u64 {
        let mut processed = 0u64;
        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Pipeline shutdown requested");
                    break;
                }
                quote = quote_rx.recv() => {
                    let Some(quote) = quote else {
                        info!("Quote channel closed");
                        break;
                    };
                    self.process(quote);
                    processed += 1;
                }
            }
        }
        info!(processed, "Pipeline stopped");
        processed
    }
}
