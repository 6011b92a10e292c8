//! Read-side REST endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use fxq_core::{Quote, Ticker};
use tracing::{debug, warn};

use crate::server::AppState;

/// Tickers that currently have a cached quote.
pub(crate) async fn list_pairs(State(state): State<AppState>) -> Json<Vec<Ticker>> {
    Json(state.cache.list_tickers().into_iter().collect())
}

/// Latest cached quote for one pair.
///
/// Untracked pairs are subscribed upstream first so that later requests
/// find data in the cache.
pub(crate) async fn get_price(
    State(state): State<AppState>,
    Path(pair): Path<String>,
) -> Response {
    let ticker = match Ticker::new(&pair) {
        Ok(ticker) => ticker,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    if !state.feed.is_tracked(&ticker) {
        if let Err(e) = state.feed.subscribe([ticker.clone()]).await {
            warn!(%ticker, error = %e, "On-demand subscribe failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to subscribe to {ticker}: {e}"),
            )
                .into_response();
        }
        debug!(%ticker, "Subscribed on demand");
    }

    match state.cache.get(&ticker) {
        Some(quote) => Json(Quote::clone(&quote)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            format!("No price data available for {ticker}"),
        )
            .into_response(),
    }
}
