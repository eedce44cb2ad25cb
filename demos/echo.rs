//! Echo server - accept client sockets and answer every frame.
//!
//! This example demonstrates:
//! - Accepting WebSocket connections handed over by a TCP listener
//! - Raw frame mode (inbound text is not parsed)
//! - A `FrameHandler` replying through the duplex's outbound queue
//!
//! # Running
//!
//! ```text
//! MEDIAGATE_LISTEN_ADDR=127.0.0.1:8080 cargo run --example echo
//! ```
//!
//! Every text frame sent to `ws://127.0.0.1:8080/ws` is answered with
//! `{"resp": 1}`.

use mediagate::handler::{BoxFuture, FrameHandler, ReaderTask};
use mediagate::transport::{Duplex, Frame, FrameMode, FrameSender};
use mediagate::GatewayConfig;
use serde_json::json;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

struct Echo {
    sender: FrameSender,
}

impl FrameHandler for Echo {
    fn on_frame(&self, frame: Frame) -> BoxFuture<'static, ()> {
        tracing::debug!("Received {:?}", frame);
        if let Err(e) = self.sender.send(json!({"resp": 1})) {
            tracing::warn!("Reply dropped: {}", e);
        }
        Box::pin(async {})
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mediagate=debug")),
        )
        .init();

    let config = GatewayConfig::from_env()?;
    let listener = TcpListener::bind(config.listen_addr).await?;
    tracing::info!("Listening on {}", config.listen_addr);

    loop {
        let (stream, peer) = listener.accept().await?;
        tokio::spawn(async move {
            let mut duplex = match Duplex::accept(stream, FrameMode::Raw).await {
                Ok(duplex) => duplex,
                Err(e) => {
                    tracing::warn!("Handshake with {} failed: {}", peer, e);
                    return;
                }
            };
            let Some(incoming) = duplex.incoming() else {
                return;
            };
            let reader = ReaderTask::spawn(
                incoming,
                Echo {
                    sender: duplex.sender(),
                },
            );

            duplex.run(None).await;
            drop(reader);
            duplex.shutdown().await;
            tracing::info!("Connection from {} closed", peer);
        });
    }
}
