//! RPC module - request/response correlation.
//!
//! Provides:
//! - [`CorrelationTable`] - id allocation, pending slots, inbound routing
//! - [`PendingResponse`] - awaitable result of one request
//! - [`EventHandler`] - receiver of `onEvent` notifications

mod correlation;
mod pending;

pub use correlation::{CorrelationTable, DispatchOutcome, EventHandler};
pub use pending::PendingResponse;
