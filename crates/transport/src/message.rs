//! DevTools protocol message types.
//!
//! Outgoing traffic is always a method call envelope. Incoming traffic is
//! either a reply to one of those calls, correlated by `id`, or an
//! unsolicited notification identified by its `method`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CodecError;

/// Correlation identifier linking a call to its reply.
pub type CallId = u64;

/// A method call sent to the browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Identifier the browser echoes back in the reply.
    pub id: CallId,
    /// Fully qualified method name, e.g. `Page.navigate`.
    pub method: String,
    /// Method parameters.
    #[serde(default = "empty_params")]
    pub params: Value,
}

impl OutgoingMessage {
    /// Build a call envelope, substituting `{}` for absent parameters.
    pub fn new(id: CallId, method: impl Into<String>, params: Option<Value>) -> Self {
        let params = match params {
            None | Some(Value::Null) => empty_params(),
            Some(params) => params,
        };
        Self {
            id,
            method: method.into(),
            params,
        }
    }
}

fn empty_params() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Error object carried by a reply instead of a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteError {
    /// Protocol error code.
    pub code: i64,
    /// Human readable message.
    pub message: String,
    /// Optional extra detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A reply to a previously sent call.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// Identifier of the call this reply belongs to.
    pub id: CallId,
    /// Result payload, `null` when the reply carried none.
    pub result: Value,
    /// Error object, when the browser rejected the call.
    pub error: Option<RemoteError>,
}

/// An unsolicited notification pushed by the browser.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event name, e.g. `Page.loadEventFired`.
    pub method: String,
    /// Event payload, `null` when absent.
    pub params: Value,
}

/// An incoming message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// A reply to a call.
    Reply(Reply),
    /// A notification.
    Event(Event),
}

/// Superset of both inbound shapes, classified after parsing.
#[derive(Deserialize)]
struct RawInbound {
    id: Option<CallId>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RemoteError>,
}

impl InboundMessage {
    /// Decode one complete unit.
    ///
    /// A unit with a non-empty `method` is a notification, anything else
    /// must carry an `id` to count as a reply.
    pub fn from_slice(unit: &[u8]) -> Result<Self, CodecError> {
        let raw: RawInbound = serde_json::from_slice(unit).map_err(CodecError::JsonDeserialize)?;

        match (raw.method, raw.id) {
            (Some(method), _) if !method.is_empty() => Ok(InboundMessage::Event(Event {
                method,
                params: raw.params.unwrap_or(Value::Null),
            })),
            (_, Some(id)) => Ok(InboundMessage::Reply(Reply {
                id,
                result: raw.result.unwrap_or(Value::Null),
                error: raw.error,
            })),
            (_, None) => Err(CodecError::InvalidMessage(
                "message has neither a method nor an id",
            )),
        }
    }
}
