//! Awaitable handle for one in-flight request.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{GatewayError, Result};

/// Resolves once the correlated response is dispatched.
///
/// Yields the `result` payload, `GatewayError::Rpc` for a remote error,
/// `RequestTimeout` if the entry was evicted, or `ConnectionClosed` if the
/// table dropped the entry without a verdict.
#[derive(Debug)]
pub struct PendingResponse {
    id: u64,
    rx: oneshot::Receiver<Result<Value>>,
}

impl PendingResponse {
    pub(crate) fn new(id: u64, rx: oneshot::Receiver<Result<Value>>) -> Self {
        Self { id, rx }
    }

    /// Request id this handle is waiting on.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Future for PendingResponse {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(GatewayError::ConnectionClosed)),
            Poll::Pending => Poll::Pending,
        }
    }
}
