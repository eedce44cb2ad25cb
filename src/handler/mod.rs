//! Handler module - consuming the inbound frame sequence.
//!
//! Provides:
//! - [`FrameHandler`] - receives every inbound frame, in arrival order
//! - [`ReaderTask`] - background task feeding an [`Incoming`](crate::transport::Incoming)
//!   into a handler; cancelled on drop
//!
//! # Example
//!
//! ```ignore
//! use mediagate::handler::{BoxFuture, FrameHandler, ReaderTask};
//! use mediagate::transport::{Frame, FrameSender};
//!
//! struct Echo(FrameSender);
//!
//! impl FrameHandler for Echo {
//!     fn on_frame(&self, _frame: Frame) -> BoxFuture<'static, ()> {
//!         let _ = self.0.send(serde_json::json!({"resp": 1}));
//!         Box::pin(async {})
//!     }
//! }
//!
//! let reader = ReaderTask::spawn(duplex.incoming().unwrap(), Echo(duplex.sender()));
//! ```

mod reader;

pub use reader::{BoxFuture, FrameHandler, ReaderTask};
