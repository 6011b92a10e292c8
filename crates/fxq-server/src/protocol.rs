//! Downstream control protocol.
//!
//! Requests (client -> server):
//!
//! ```text
//! {"method": "SUBSCRIBE", "params": ["eurusd", "usdjpy"], "id": 1}
//! {"method": "UNSUBSCRIBE"}
//! ```
//!
//! Responses (server -> client): `{"result": "SUBSCRIBED", "id": 1}` or the
//! plain strings `UNSUBSCRIBED`, `Invalid params`, `Unknown method`,
//! `Invalid message format`.

use crate::error::ProtocolError;
use fxq_core::Ticker;
use serde::Serialize;
use serde_json::Value;

pub const METHOD_SUBSCRIBE: &str = "SUBSCRIBE";
pub const METHOD_UNSUBSCRIBE: &str = "UNSUBSCRIBE";

/// Parsed control request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    Subscribe { tickers: Vec<Ticker>, id: i64 },
    /// Drops every subscription of the connection.
    Unsubscribe,
}

/// Reply to a control request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlResponse {
    Subscribed { id: i64 },
    Unsubscribed,
    Rejected(ProtocolError),
}

#[derive(Serialize)]
struct SubscribedAck {
    result: &'static str,
    id: i64,
}

impl ControlResponse {
    /// Text frame sent back to the client.
    pub fn to_text(&self) -> String {
        match self {
            Self::Subscribed { id } => serde_json::to_string(&SubscribedAck {
                result: "SUBSCRIBED",
                id: *id,
            })
            .unwrap_or_else(|_| format!(r#"{{"result":"SUBSCRIBED","id":{id}}}"#)),
            Self::Unsubscribed => "UNSUBSCRIBED".to_string(),
            Self::Rejected(err) => err.to_string(),
        }
    }
}

/// Parse a client text frame.
///
/// A SUBSCRIBE request is validated as a whole before anything is
/// registered: one empty or null ticker rejects the entire request.
pub fn parse_request(text: &str) -> Result<ControlRequest, ProtocolError> {
    let root: Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::InvalidMessage(e.to_string()))?;

    let method = root
        .get("method")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtocolError::InvalidMessage("missing method".to_string()))?;

    match method {
        METHOD_SUBSCRIBE => parse_subscribe(&root),
        METHOD_UNSUBSCRIBE => Ok(ControlRequest::Unsubscribe),
        other => Err(ProtocolError::UnknownMethod(other.to_string())),
    }
}

fn parse_subscribe(root: &Value) -> Result<ControlRequest, ProtocolError> {
    let params = root
        .get("params")
        .and_then(Value::as_array)
        .ok_or_else(|| ProtocolError::InvalidMessage("params must be an array".to_string()))?;

    let names = params
        .iter()
        .map(|param| match param {
            Value::String(s) => Ok(Some(s.as_str())),
            Value::Null => Ok(None),
            other => Err(ProtocolError::InvalidMessage(format!(
                "param is not a string: {other}"
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let id = root
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| ProtocolError::InvalidMessage("missing integer id".to_string()))?;

    let tickers = names
        .into_iter()
        .map(|name| {
            name.and_then(|n| Ticker::new(n).ok())
                .ok_or(ProtocolError::InvalidParams)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ControlRequest::Subscribe { tickers, id })
}
