//! JSON-RPC message types.
//!
//! Outbound requests are plain serde structs. Inbound frames are classified
//! into the [`Inbound`] tagged variant so that routing is a single `match`.

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// JSON-RPC protocol version sent with every request.
pub const JSONRPC_VERSION: &str = "2.0";

/// Reserved key carrying the session identifier, both in outbound params
/// and in inbound results.
pub const SESSION_ID_KEY: &str = "sessionId";

/// Method name of server-initiated notifications.
pub const EVENT_METHOD: &str = "onEvent";

/// A request ready to be written to the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    /// Correlation id, unique per table.
    pub id: u64,
    /// Remote method name.
    pub method: String,
    /// Method parameters, including `sessionId` once the session is known.
    pub params: Value,
    /// Always [`JSONRPC_VERSION`].
    pub jsonrpc: &'static str,
}

impl OutboundMessage {
    /// Create a new JSON-RPC 2.0 request.
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            id,
            method: method.into(),
            params,
            jsonrpc: JSONRPC_VERSION,
        }
    }

    /// Session identifier merged into the params, if any.
    pub fn session_id(&self) -> Option<&str> {
        self.params.get(SESSION_ID_KEY).and_then(Value::as_str)
    }

    /// Convert into a JSON value for the transport queue.
    pub fn into_value(self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// `onEvent` notification (no `id`). Carries the full message.
    Event(Value),
    /// Response with a `result` payload.
    Success { id: u64, result: Value },
    /// Response with an `error` object.
    Failure { id: u64, code: i64, message: String },
    /// Anything else: missing-id frames with an unknown method, responses
    /// with neither `result` nor `error`, non-object frames.
    Unrecognized { id: Option<u64>, message: Value },
}

impl Inbound {
    /// Classify a decoded frame.
    ///
    /// Never fails: shapes we cannot route end up as `Unrecognized`.
    pub fn classify(message: Value) -> Self {
        let id = match message.get("id") {
            None | Some(Value::Null) => None,
            Some(raw) => match raw.as_u64() {
                Some(id) => Some(id),
                None => return Inbound::Unrecognized { id: None, message },
            },
        };

        let Some(id) = id else {
            let is_event =
                message.get("method").and_then(Value::as_str) == Some(EVENT_METHOD);
            return if is_event {
                Inbound::Event(message)
            } else {
                Inbound::Unrecognized { id: None, message }
            };
        };

        if let Some(error) = message.get("error").filter(|e| !e.is_null()) {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
            let text = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return Inbound::Failure {
                id,
                code,
                message: text,
            };
        }

        match message {
            Value::Object(mut object) if object.contains_key("result") => {
                let result = object.remove("result").unwrap_or(Value::Null);
                Inbound::Success { id, result }
            }
            message => Inbound::Unrecognized {
                id: Some(id),
                message,
            },
        }
    }

    /// Correlation id, if the frame carries one.
    pub fn id(&self) -> Option<u64> {
        match self {
            Inbound::Event(_) => None,
            Inbound::Success { id, .. } | Inbound::Failure { id, .. } => Some(*id),
            Inbound::Unrecognized { id, .. } => *id,
        }
    }
}
