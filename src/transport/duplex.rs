//! Queued WebSocket duplex.
//!
//! A [`Duplex`] owns one WebSocket connection and two dedicated tasks:
//!
//! ```text
//! FrameSender ─► outbound queue ─► Send Task ─► socket
//! socket ─► Receive Task ─► inbound queue ─► Incoming
//! ```
//!
//! Producers and consumers never touch the socket directly. Both queues are
//! unbounded: `send` returns once the frame is enqueued, not once it is
//! written.
//!
//! # Example
//!
//! ```ignore
//! use mediagate::transport::Duplex;
//!
//! let mut duplex = Duplex::connect("ws://127.0.0.1:8888/kurento").await?;
//! let mut incoming = duplex.incoming().unwrap();
//! duplex.send(serde_json::json!({"id": 1, "method": "ping"}))?;
//! let reply = incoming.recv().await;
//! duplex.shutdown().await;
//! ```

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use super::registry::RunRegistry;
use crate::error::{GatewayError, Result};

/// One complete message exchanged over the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Decoded JSON object.
    Json(Value),
    /// Undecoded text, as received (raw mode) or to be sent verbatim.
    Raw(String),
}

impl Frame {
    /// The JSON payload, if this is a decoded frame.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Frame::Json(value) => Some(value),
            Frame::Raw(_) => None,
        }
    }

    /// Consume into the JSON payload, if this is a decoded frame.
    pub fn into_json(self) -> Option<Value> {
        match self {
            Frame::Json(value) => Some(value),
            Frame::Raw(_) => None,
        }
    }

    fn into_message(self) -> Result<Message> {
        let text = match self {
            Frame::Json(value) => serde_json::to_string(&value)?,
            Frame::Raw(text) => text,
        };
        Ok(Message::Text(text))
    }
}

impl From<Value> for Frame {
    fn from(value: Value) -> Self {
        Frame::Json(value)
    }
}

/// How the receive task turns text frames into [`Frame`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameMode {
    /// Parse as JSON; malformed frames are logged and skipped.
    #[default]
    Json,
    /// Deliver the text unchanged.
    Raw,
}

/// Outcome of [`Duplex::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The send or receive loop terminated.
    Finished,
    /// The timeout elapsed first. Both loops are still running.
    TimedOut,
    /// A registry-wide cancellation was requested.
    Cancelled,
}

enum Outbound {
    Frame(Frame),
    Close,
}

/// Handle for enqueueing outbound frames.
///
/// Cheap to clone and shareable across tasks.
#[derive(Clone)]
pub struct FrameSender {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl FrameSender {
    /// Enqueue a frame. Never waits.
    ///
    /// Fails with `ConnectionClosed` once the send task has stopped.
    pub fn send(&self, frame: impl Into<Frame>) -> Result<()> {
        self.tx
            .send(Outbound::Frame(frame.into()))
            .map_err(|_| GatewayError::ConnectionClosed)
    }

    /// Enqueue the close sentinel. Frames queued before it are still sent.
    pub fn close(&self) -> Result<()> {
        self.tx
            .send(Outbound::Close)
            .map_err(|_| GatewayError::ConnectionClosed)
    }

    /// Whether the send task is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Inbound frame sequence. Ends when the connection closes.
pub struct Incoming {
    rx: mpsc::UnboundedReceiver<Frame>,
}

impl Incoming {
    /// Wait for the next frame.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }
}

impl Stream for Incoming {
    type Item = Frame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Frame>> {
        self.rx.poll_recv(cx)
    }
}

/// Marks the duplex finished when either task exits, including on abort.
struct FinishGuard(Arc<watch::Sender<bool>>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.0.send_replace(true);
    }
}

/// Paired send/receive tasks over one WebSocket connection.
///
/// Inbound frames queue without bound until [`incoming`](Self::incoming) is
/// taken and drained. A caller with no use for them should take the sequence
/// and drop it, which stops the receive task; otherwise frames accumulate for
/// the life of the connection.
pub struct Duplex {
    sender: FrameSender,
    incoming: Option<Incoming>,
    finished: watch::Receiver<bool>,
    send_task: Option<JoinHandle<Result<()>>>,
    receive_task: Option<JoinHandle<Result<()>>>,
    registry: RunRegistry,
}

impl Duplex {
    /// Accept role: upgrade a socket handed over by an external listener.
    pub async fn accept<S>(stream: S, mode: FrameMode) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let socket = tokio_tungstenite::accept_async(stream).await?;
        tracing::debug!("Accepted WebSocket connection");
        Ok(Self::start(socket, mode))
    }

    /// Connect role: dial the given WebSocket URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let (socket, _response) = tokio_tungstenite::connect_async(url).await?;
        tracing::debug!("Connected to {}", url);
        Ok(Self::start(socket, FrameMode::Json))
    }

    /// Start both tasks on an established WebSocket.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<S>(socket: S, mode: FrameMode) -> Self
    where
        S: Stream<Item = std::result::Result<Message, WsError>>
            + Sink<Message, Error = WsError>
            + Send
            + Unpin
            + 'static,
    {
        let (sink, stream) = socket.split();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (finished_tx, finished_rx) = watch::channel(false);
        let finished_tx = Arc::new(finished_tx);

        let guard = FinishGuard(finished_tx.clone());
        let send_task = tokio::spawn(async move {
            let _guard = guard;
            send_loop(outbound_rx, sink).await
        });

        let guard = FinishGuard(finished_tx);
        let receive_task = tokio::spawn(async move {
            let _guard = guard;
            receive_loop(stream, inbound_tx, mode).await
        });

        Self {
            sender: FrameSender { tx: outbound_tx },
            incoming: Some(Incoming { rx: inbound_rx }),
            finished: finished_rx,
            send_task: Some(send_task),
            receive_task: Some(receive_task),
            registry: RunRegistry::global().clone(),
        }
    }

    /// Register `run()` calls in the given registry instead of the global one.
    pub fn with_registry(mut self, registry: RunRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Enqueue a frame for transmission.
    pub fn send(&self, frame: impl Into<Frame>) -> Result<()> {
        self.sender.send(frame)
    }

    /// A clonable handle onto the outbound queue.
    pub fn sender(&self) -> FrameSender {
        self.sender.clone()
    }

    /// Take the inbound sequence. Only the first call returns `Some`.
    ///
    /// Until this is called every decoded frame is buffered. Dropping the
    /// returned [`Incoming`] ends the receive task at the next frame, and
    /// with it the duplex.
    pub fn incoming(&mut self) -> Option<Incoming> {
        self.incoming.take()
    }

    /// Whether either task has terminated.
    pub fn is_finished(&self) -> bool {
        *self.finished.borrow()
    }

    /// Wait until either task terminates, the timeout elapses, or the
    /// registry cancels this runner.
    ///
    /// A timeout leaves both tasks running.
    pub async fn run(&self, timeout: Option<Duration>) -> RunOutcome {
        let runner = self.registry.register();
        let mut finished = self.finished.clone();

        let deadline = async {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            // Err means both guards are gone, which also means finished.
            _ = finished.wait_for(|done| *done) => RunOutcome::Finished,
            _ = runner.cancelled() => {
                tracing::debug!("Runner cancelled");
                RunOutcome::Cancelled
            }
            _ = deadline => RunOutcome::TimedOut,
        }
    }

    /// Teardown: cancel unfinished tasks, wait for both, log their outcome.
    ///
    /// Safe to call more than once. Task errors are reported, never returned.
    pub async fn shutdown(&mut self) {
        let tasks = [
            ("send", self.send_task.take()),
            ("receive", self.receive_task.take()),
        ];

        for task in tasks.iter().filter_map(|(_, task)| task.as_ref()) {
            if !task.is_finished() {
                task.abort();
            }
        }

        for (name, task) in tasks {
            if let Some(task) = task {
                dispose(name, task.await);
            }
        }
    }
}

impl Drop for Duplex {
    fn drop(&mut self) {
        for task in [self.send_task.take(), self.receive_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
    }
}

fn dispose(name: &str, outcome: std::result::Result<Result<()>, JoinError>) {
    match outcome {
        Ok(Ok(())) => tracing::debug!("{} task finished", name),
        Ok(Err(e)) => tracing::error!("{} task failed: {}", name, e),
        Err(e) if e.is_cancelled() => tracing::debug!("{} task was cancelled", name),
        Err(e) => tracing::error!("{} task panicked: {}", name, e),
    }
}

/// Drain the outbound queue into the socket, in order.
async fn send_loop<W>(mut rx: mpsc::UnboundedReceiver<Outbound>, mut sink: W) -> Result<()>
where
    W: Sink<Message, Error = WsError> + Unpin,
{
    while let Some(item) = rx.recv().await {
        let frame = match item {
            Outbound::Frame(frame) => frame,
            Outbound::Close => {
                tracing::debug!("Send task received close");
                break;
            }
        };
        sink.send(frame.into_message()?).await?;
    }

    // Peer may already be gone.
    if let Err(e) = sink.close().await {
        tracing::debug!("Closing socket: {}", e);
    }
    Ok(())
}

/// Read socket messages into the inbound queue until the connection closes.
async fn receive_loop<R>(
    mut stream: R,
    tx: mpsc::UnboundedSender<Frame>,
    mode: FrameMode,
) -> Result<()>
where
    R: Stream<Item = std::result::Result<Message, WsError>> + Unpin,
{
    while let Some(message) = stream.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(data)) => match String::from_utf8(data) {
                Ok(text) => text,
                Err(_) => {
                    tracing::warn!("Dropping non UTF-8 binary frame");
                    continue;
                }
            },
            Ok(Message::Close(frame)) => {
                tracing::debug!("Peer closed connection: {:?}", frame);
                break;
            }
            Ok(_) => continue,
            Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => break,
            Err(e) => return Err(e.into()),
        };

        let Some(frame) = decode_frame(text, mode) else {
            continue;
        };

        if tx.send(frame).is_err() {
            tracing::debug!("Inbound queue dropped, stopping receive task");
            break;
        }
    }
    Ok(())
}

fn decode_frame(text: String, mode: FrameMode) -> Option<Frame> {
    match mode {
        FrameMode::Raw => Some(Frame::Raw(text)),
        FrameMode::Json => match serde_json::from_str(&text) {
            Ok(value) => Some(Frame::Json(value)),
            Err(e) => {
                tracing::warn!("Dropping malformed frame: {} ({})", text, e);
                None
            }
        },
    }
}
