//! Transport module - queued WebSocket duplex.
//!
//! Provides:
//! - [`Duplex`] - send/receive tasks over one connection, in accept or
//!   connect role
//! - [`FrameSender`] / [`Incoming`] - the outbound and inbound queues
//! - [`RunRegistry`] / [`cancel_runners`] - process-wide shutdown of every
//!   in-progress `run()`

mod duplex;
mod registry;

pub use duplex::{Duplex, Frame, FrameMode, FrameSender, Incoming, RunOutcome};
pub use registry::{cancel_runners, RunRegistry, RunnerGuard};
