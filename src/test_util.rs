//! In-memory WebSocket pairs and a scripted media server for tests.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::config::GatewayConfig;
use crate::handler::ReaderTask;
use crate::session::Session;
use crate::transport::{Duplex, FrameMode};

pub(crate) type Peer = WebSocketStream<DuplexStream>;

/// Client and server ends of one in-memory WebSocket connection.
pub(crate) async fn socket_pair() -> (Peer, Peer) {
    let (a, b) = tokio::io::duplex(64 * 1024);
    tokio::join!(
        WebSocketStream::from_raw_socket(a, Role::Client, None),
        WebSocketStream::from_raw_socket(b, Role::Server, None)
    )
}

/// Next text frame from the peer, decoded as JSON.
pub(crate) async fn next_json(peer: &mut Peer) -> Value {
    match peer.next().await {
        Some(Ok(Message::Text(text))) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected text frame, got {:?}", other),
    }
}

/// Answer every request on `peer` with `respond(request)`; `None` stays silent.
///
/// Each request is also forwarded on the returned channel.
pub(crate) fn spawn_responder<F>(
    mut peer: Peer,
    respond: F,
) -> (JoinHandle<()>, mpsc::UnboundedReceiver<Value>)
where
    F: Fn(&Value) -> Option<Value> + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        while let Some(Ok(message)) = peer.next().await {
            let Message::Text(text) = message else {
                continue;
            };
            let request: Value = serde_json::from_str(&text).unwrap();
            let reply = respond(&request);
            let _ = tx.send(request);
            if let Some(reply) = reply {
                if peer.send(Message::Text(reply.to_string())).await.is_err() {
                    break;
                }
            }
        }
    });
    (task, rx)
}

/// A session wired to a scripted server over an in-memory connection.
pub(crate) struct Harness {
    pub session: Arc<Session>,
    pub requests: mpsc::UnboundedReceiver<Value>,
    _duplex: Duplex,
    _reader: ReaderTask,
    _server: JoinHandle<()>,
}

impl Harness {
    pub async fn start<F>(config: GatewayConfig, respond: F) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + 'static,
    {
        let (client, server) = socket_pair().await;
        let mut duplex = Duplex::start(client, FrameMode::Json);
        let session = Arc::new(Session::new(duplex.sender(), config));
        let reader = session.attach(duplex.incoming().unwrap());
        let (server, requests) = spawn_responder(server, respond);

        Self {
            session,
            requests,
            _duplex: duplex,
            _reader: reader,
            _server: server,
        }
    }

    /// Next request the server received.
    pub async fn request(&mut self) -> Value {
        self.requests.recv().await.unwrap()
    }
}

/// Success response for `request` carrying `result`.
pub(crate) fn result_for(request: &Value, result: Value) -> Value {
    serde_json::json!({"id": request["id"], "result": result})
}

/// Error response for `request`.
pub(crate) fn error_for(request: &Value, code: i64, message: &str) -> Value {
    serde_json::json!({"id": request["id"], "error": {"code": code, "message": message}})
}
