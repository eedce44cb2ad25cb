//! # mediagate
//!
//! Signaling gateway between clients and a JSON-RPC media-control server.
//!
//! Translates a small object model (pipelines, endpoints) into JSON-RPC
//! calls and correlates the asynchronous responses with the calls that
//! triggered them, over a queued full-duplex WebSocket transport.
//!
//! ## Architecture
//!
//! - **Transport** ([`transport::Duplex`]): send and receive tasks moving
//!   frames between a WebSocket and two unbounded queues
//! - **Correlation** ([`rpc::CorrelationTable`]): request ids, pending result
//!   slots, routing of responses and `onEvent` notifications
//! - **Session** ([`session::Session`]): "send request, await result" with
//!   transparent `sessionId` propagation
//! - **Media** ([`media`]): `MediaPipeline`, `MediaElement`, `WebRtcEndpoint`
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mediagate::{GatewayConfig, Session};
//! use mediagate::media::{MediaPipeline, WebRtcEndpoint};
//! use mediagate::transport::Duplex;
//!
//! #[tokio::main]
//! async fn main() -> mediagate::Result<()> {
//!     let config = GatewayConfig::from_env()?;
//!     let mut duplex = Duplex::connect(&config.media_server_url).await?;
//!     let session = Arc::new(Session::new(duplex.sender(), config));
//!     let _reader = session.attach(duplex.incoming().unwrap());
//!
//!     let pipeline = Arc::new(MediaPipeline::new(session.clone()));
//!     pipeline.create().await?;
//!     let endpoint = WebRtcEndpoint::new(pipeline);
//!     endpoint.create().await?;
//!
//!     duplex.run(None).await;
//!     duplex.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod media;
pub mod protocol;
pub mod rpc;
pub mod session;
pub mod transport;

#[cfg(test)]
mod test_util;

pub use config::{CreateFailure, GatewayConfig};
pub use error::{GatewayError, Result};
pub use session::{Session, SessionId};
pub use transport::{cancel_runners, Duplex};
