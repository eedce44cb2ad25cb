//! Error types for mediagate.

use thiserror::Error;

/// Main error type for all gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// I/O error while accepting or dialing a socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket handshake or framing error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The remote server answered with a JSON-RPC error object.
    #[error("JSON-RPC error ({code}): {message}")]
    Rpc { code: i64, message: String },

    /// Message present but not in a shape we understand.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Connection closed (or queue gone) before the operation completed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A pending request was evicted before any response arrived.
    #[error("Request {id} ({method}) timed out")]
    RequestTimeout { id: u64, method: String },

    /// Element identifier does not belong to the parent pipeline.
    #[error("Element {element} does not belong to pipeline {expected}")]
    IdentifierMismatch { expected: String, element: String },

    /// Remote object used before `create()` succeeded.
    #[error("{0} has not been created")]
    NotCreated(&'static str),

    /// `create()` called on an object that already has an identifier.
    #[error("{0} already created")]
    AlreadyCreated(&'static str),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Remote error code, if this is a JSON-RPC error.
    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            GatewayError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result type alias using GatewayError.
pub type Result<T> = std::result::Result<T, GatewayError>;
