//! Reader task dispatching inbound frames to a handler.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::transport::{Frame, Incoming};

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for consumers of inbound frames.
pub trait FrameHandler: Send + Sync + 'static {
    /// Handle one frame. The next frame is not delivered until this completes.
    fn on_frame(&self, frame: Frame) -> BoxFuture<'static, ()>;

    /// Called once after the inbound sequence has ended.
    fn on_closed(&self) {}
}

impl<H: FrameHandler> FrameHandler for Arc<H> {
    fn on_frame(&self, frame: Frame) -> BoxFuture<'static, ()> {
        (**self).on_frame(frame)
    }

    fn on_closed(&self) {
        (**self).on_closed()
    }
}

/// Background task draining an [`Incoming`] into a [`FrameHandler`].
///
/// Dropping the `ReaderTask` cancels it.
pub struct ReaderTask {
    task: Option<JoinHandle<()>>,
}

impl ReaderTask {
    /// Spawn the reader. Must be called from within a tokio runtime.
    pub fn spawn<H: FrameHandler>(mut incoming: Incoming, handler: H) -> Self {
        let task = tokio::spawn(async move {
            while let Some(frame) = incoming.recv().await {
                handler.on_frame(frame).await;
            }
            tracing::debug!("Inbound sequence ended");
            handler.on_closed();
        });

        Self { task: Some(task) }
    }

    /// Whether the inbound sequence has ended (or the task was cancelled).
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the inbound sequence to end.
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    tracing::error!("Reader task panicked: {}", e);
                }
            }
        }
    }
}

impl Drop for ReaderTask {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::socket_pair;
    use crate::transport::{Duplex, FrameMode};
    use futures::SinkExt;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio_tungstenite::tungstenite::Message;

    struct Collect {
        seen: Mutex<Vec<Frame>>,
        tx: mpsc::UnboundedSender<()>,
        closed: AtomicBool,
    }

    impl FrameHandler for Collect {
        fn on_frame(&self, frame: Frame) -> BoxFuture<'static, ()> {
            let tx = self.tx.clone();
            self.seen.lock().unwrap().push(frame);
            Box::pin(async move {
                let _ = tx.send(());
            })
        }

        fn on_closed(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_reader_delivers_in_order_and_reports_close() {
        let (local, mut peer) = socket_pair().await;
        let mut duplex = Duplex::start(local, FrameMode::Raw);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler = Arc::new(Collect {
            seen: Mutex::new(Vec::new()),
            tx,
            closed: AtomicBool::new(false),
        });
        let reader = ReaderTask::spawn(duplex.incoming().unwrap(), handler.clone());

        for text in ["one", "two", "three"] {
            peer.send(Message::Text(text.to_string())).await.unwrap();
        }
        for _ in 0..3 {
            rx.recv().await.unwrap();
        }

        peer.close(None).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), reader.join())
            .await
            .unwrap();

        let seen = handler.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                Frame::Raw("one".to_string()),
                Frame::Raw("two".to_string()),
                Frame::Raw("three".to_string()),
            ]
        );
        assert!(handler.closed.load(Ordering::SeqCst));
        duplex.shutdown().await;
    }

    #[tokio::test]
    async fn test_drop_cancels_reader() {
        let (local, _peer) = socket_pair().await;
        let mut duplex = Duplex::start(local, FrameMode::Json);

        let (tx, _rx) = mpsc::unbounded_channel();
        let handler = Arc::new(Collect {
            seen: Mutex::new(Vec::new()),
            tx,
            closed: AtomicBool::new(false),
        });
        let reader = ReaderTask::spawn(duplex.incoming().unwrap(), handler.clone());
        assert!(!reader.is_finished());
        drop(reader);

        tokio::task::yield_now().await;
        assert!(!handler.closed.load(Ordering::SeqCst));
    }
}
