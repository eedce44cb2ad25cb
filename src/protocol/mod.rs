//! Protocol module - JSON-RPC wire types.
//!
//! One JSON object per frame:
//!
//! ```text
//! out:  {"id": 1, "method": "create", "params": {...}, "jsonrpc": "2.0"}
//! in:   {"id": 1, "result": {...}}
//!       {"id": 1, "error": {"code": 40101, "message": "..."}}
//!       {"method": "onEvent", "params": {...}}
//! ```

mod message;

pub use message::{Inbound, OutboundMessage, EVENT_METHOD, JSONRPC_VERSION, SESSION_ID_KEY};
