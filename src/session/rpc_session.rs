//! Request/await front end over a duplex.

use std::sync::{Arc, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;

use super::SessionId;
use crate::config::GatewayConfig;
use crate::error::Result;
use crate::handler::{BoxFuture, FrameHandler, ReaderTask};
use crate::rpc::{CorrelationTable, DispatchOutcome, EventHandler, PendingResponse};
use crate::transport::{Frame, FrameSender, Incoming};

/// Single point of access for issuing requests to the media server.
///
/// Attaches the session identifier to every request once the server has
/// issued one.
pub struct Session {
    table: Arc<CorrelationTable>,
    sender: FrameSender,
    config: GatewayConfig,
}

impl Session {
    /// Create a session writing to `sender`.
    pub fn new(sender: FrameSender, config: GatewayConfig) -> Self {
        Self {
            table: Arc::new(CorrelationTable::new(SessionId::new())),
            sender,
            config,
        }
    }

    /// Server-issued session identifier.
    pub fn session_id(&self) -> &SessionId {
        self.table.session_id()
    }

    /// The correlation table backing this session.
    pub fn table(&self) -> &CorrelationTable {
        &self.table
    }

    /// Configuration this session was built with.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Issue a request and return the handle to await its result.
    ///
    /// Returns once the request is enqueued. If the outbound queue is gone
    /// the pending entry is removed and `ConnectionClosed` is returned.
    pub fn send_request(&self, method: &str, params: Value) -> Result<PendingResponse> {
        let session_id = self.session_id().get();
        let (request, pending) = self.table.create_request(method, params, session_id);
        let id = request.id;

        tracing::debug!("Sending request {} ({})", id, method);
        let sent = request
            .into_value()
            .and_then(|value| self.sender.send(value));
        if let Err(e) = sent {
            self.table.remove(id);
            return Err(e);
        }
        Ok(pending)
    }

    /// Issue a request and wait for its result.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.send_request(method, params)?.await
    }

    /// Register the `onEvent` handler.
    pub fn set_event_handler<H: EventHandler>(&self, handler: H) {
        self.table.set_event_handler(handler);
    }

    /// Route one inbound JSON message.
    pub fn dispatch(&self, message: Value) -> DispatchOutcome {
        self.table.dispatch(message)
    }

    /// Feed `incoming` into this session from a background task.
    pub fn attach(self: &Arc<Self>, incoming: Incoming) -> ReaderTask {
        ReaderTask::spawn(incoming, Arc::clone(self))
    }

    /// Start the periodic eviction of expired requests.
    ///
    /// Returns `None` when no request timeout is configured. The task stops
    /// on its own once the session is dropped.
    pub fn spawn_sweeper(&self) -> Option<JoinHandle<()>> {
        let max_age = self.config.request_timeout?;
        let table: Weak<CorrelationTable> = Arc::downgrade(&self.table);
        let period = self.config.sweep_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);

        Some(tokio::spawn(async move {
            loop {
                ticker.tick().await;
                let Some(table) = table.upgrade() else {
                    break;
                };
                let evicted = table.evict_expired(max_age);
                if evicted > 0 {
                    tracing::debug!("Evicted {} expired request(s)", evicted);
                }
            }
            tracing::debug!("Sweeper stopped");
        }))
    }
}

impl FrameHandler for Session {
    fn on_frame(&self, frame: Frame) -> BoxFuture<'static, ()> {
        match frame {
            Frame::Json(message) => {
                self.dispatch(message);
            }
            Frame::Raw(text) => tracing::warn!("Dropping undecoded frame: {}", text),
        }
        Box::pin(async {})
    }

    fn on_closed(&self) {
        if !self.config.abandon_on_close {
            return;
        }
        let abandoned = self.table.abandon_all();
        if abandoned > 0 {
            tracing::warn!("Connection closed with {} request(s) pending", abandoned);
        }
    }
}
