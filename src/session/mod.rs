//! Session module - one media-server conversation.
//!
//! A [`Session`] owns a correlation table and the set-once [`SessionId`],
//! and writes requests onto a duplex's outbound queue:
//!
//! ```text
//! send_request ─► CorrelationTable ─► FrameSender ─► wire
//! wire ─► Incoming ─► ReaderTask ─► Session::dispatch ─► PendingResponse / EventHandler
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mediagate::session::Session;
//! use mediagate::transport::Duplex;
//!
//! let mut duplex = Duplex::connect(&config.media_server_url).await?;
//! let session = Arc::new(Session::new(duplex.sender(), config));
//! let _reader = session.attach(duplex.incoming().unwrap());
//!
//! let result = session.call("ping", serde_json::json!({})).await?;
//! ```

mod id;
mod rpc_session;

pub use id::SessionId;
pub use rpc_session::Session;
