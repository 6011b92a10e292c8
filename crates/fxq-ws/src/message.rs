//! Upstream wire messages.
//!
//! Outbound: the subscribe control message.
//! Inbound: an envelope `{"messageType": <kind>, "data": ...}` where kind
//! `"A"` carries a quote as a positional array:
//!
//! ```text
//! [updateType, ticker, timestamp, bidSize, bidPrice, midPrice, askSize, askPrice]
//! ```
//!
//! Every field except the ticker may be `null`. Frames that do not match
//! this shape are rejected with `WsError::InvalidQuote`.

use crate::error::{WsError, WsResult};
use chrono::{DateTime, Utc};
use fxq_core::{Quote, Ticker};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Message kind for quote updates.
pub const KIND_UPDATE: &str = "A";
/// Message kind for informational replies (e.g. subscription confirmations).
pub const KIND_INFO: &str = "I";
/// Message kind for heartbeats.
pub const KIND_HEARTBEAT: &str = "H";
/// Message kind for errors reported by the upstream.
pub const KIND_ERROR: &str = "E";

/// Number of positional fields in a quote array.
const QUOTE_FIELDS: usize = 8;

const IDX_TICKER: usize = 1;
const IDX_TIMESTAMP: usize = 2;
const IDX_BID_SIZE: usize = 3;
const IDX_BID_PRICE: usize = 4;
const IDX_MID_PRICE: usize = 5;
const IDX_ASK_SIZE: usize = 6;
const IDX_ASK_PRICE: usize = 7;

/// Subscribe control message sent to the upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub event_name: String,
    pub authorization: String,
    pub event_data: SubscribeEventData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeEventData {
    pub threshold_level: u8,
    pub tickers: Vec<String>,
}

impl SubscribeRequest {
    pub fn new<'a>(
        authorization: &str,
        threshold_level: u8,
        tickers: impl IntoIterator<Item = &'a Ticker>,
    ) -> Self {
        Self {
            event_name: "subscribe".to_string(),
            authorization: authorization.to_string(),
            event_data: SubscribeEventData {
                threshold_level,
                tickers: tickers
                    .into_iter()
                    .map(|t| t.as_str().to_string())
                    .collect(),
            },
        }
    }

    pub fn to_json(&self) -> WsResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Raw envelope of every inbound frame.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    message_type: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    response: Value,
}

/// Classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedFrame {
    /// Parsed quote update.
    Quote(Quote),
    /// Update frame without a ticker; dropped silently.
    MissingTicker,
    /// Informational reply.
    Info(Value),
    Heartbeat,
    /// Error reported by the upstream.
    Error(String),
    /// Any other message kind.
    Other(String),
}

/// Parse one inbound text frame.
pub fn parse_frame(text: &str) -> WsResult<FeedFrame> {
    let envelope: Envelope = serde_json::from_str(text)
        .map_err(|e| WsError::InvalidQuote(format!("unparseable frame: {e}")))?;

    match envelope.message_type.as_str() {
        KIND_UPDATE => parse_quote(&envelope.data),
        KIND_INFO => Ok(FeedFrame::Info(envelope.response)),
        KIND_HEARTBEAT => Ok(FeedFrame::Heartbeat),
        KIND_ERROR => Ok(FeedFrame::Error(
            envelope
                .response
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        )),
        other => Ok(FeedFrame::Other(other.to_string())),
    }
}

fn parse_quote(data: &Value) -> WsResult<FeedFrame> {
    let fields = data
        .as_array()
        .ok_or_else(|| WsError::InvalidQuote("data is not an array".to_string()))?;

    // An absent ticker is dropped before the shape is checked.
    let ticker = match fields.get(IDX_TICKER) {
        None | Some(Value::Null) => return Ok(FeedFrame::MissingTicker),
        Some(value) => value,
    };

    if fields.len() < QUOTE_FIELDS {
        return Err(WsError::InvalidQuote(format!(
            "expected {QUOTE_FIELDS} fields, got {}",
            fields.len()
        )));
    }

    let ticker = match ticker {
        Value::String(s) => {
            Ticker::new(s).map_err(|e| WsError::InvalidQuote(e.to_string()))?
        }
        other => return Err(WsError::InvalidQuote(format!("ticker is not a string: {other}"))),
    };

    Ok(FeedFrame::Quote(Quote {
        ticker,
        timestamp: timestamp_field(&fields[IDX_TIMESTAMP])?,
        bid_size: decimal_field(&fields[IDX_BID_SIZE], "bidSize")?,
        bid_price: decimal_field(&fields[IDX_BID_PRICE], "bidPrice")?,
        mid_price: decimal_field(&fields[IDX_MID_PRICE], "midPrice")?,
        ask_size: decimal_field(&fields[IDX_ASK_SIZE], "askSize")?,
        ask_price: decimal_field(&fields[IDX_ASK_PRICE], "askPrice")?,
    }))
}

fn timestamp_field(value: &Value) -> WsResult<Option<DateTime<Utc>>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| WsError::InvalidQuote(format!("timestamp {s:?}: {e}"))),
        other => Err(WsError::InvalidQuote(format!(
            "timestamp is not a string: {other}"
        ))),
    }
}

/// Numbers go through their textual form so `1.085` stays exactly `1.085`.
fn decimal_field(value: &Value, name: &str) -> WsResult<Option<Decimal>> {
    let text = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => {
            return Err(WsError::InvalidQuote(format!(
                "{name} is not numeric: {other}"
            )))
        }
    };

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map(Some)
        .map_err(|e| WsError::InvalidQuote(format!("{name} {text:?}: {e}")))
}
