//! Media module - remote object model.
//!
//! Thin owners of server-assigned identifiers, created through a
//! [`Session`](crate::session::Session):
//!
//! - [`MediaPipeline`] - root object, no parent
//! - [`MediaElement`] - lives in a pipeline; identified as `"<pipeline>/<element>"`
//! - [`WebRtcEndpoint`] - element with offer and ICE candidate operations
//!
//! Each object goes `uninitialized → created` exactly once, through `create()`.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mediagate::media::{MediaPipeline, WebRtcEndpoint};
//!
//! let pipeline = Arc::new(MediaPipeline::new(session.clone()));
//! pipeline.create().await?;
//!
//! let endpoint = WebRtcEndpoint::new(pipeline.clone());
//! endpoint.create().await?;
//! endpoint.connect(&endpoint).await?;
//! let offer = endpoint.generate_offer().await?;
//! ```

mod element;
mod pipeline;
mod webrtc;

pub use element::MediaElement;
pub use pipeline::MediaPipeline;
pub use webrtc::WebRtcEndpoint;

use std::fmt;

use serde_json::{json, Value};

use crate::config::CreateFailure;
use crate::error::{GatewayError, Result};

/// Type tag of a pipeline constructor request.
pub const PIPELINE_TYPE: &str = "MediaPipeline";

/// Constructor parameter naming an element's parent pipeline.
pub const MEDIA_PIPELINE_PARAM: &str = "mediaPipeline";

/// Kinds of element the gateway knows how to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    WebRtcEndpoint,
    RtpEndpoint,
    PlayerEndpoint,
    RecorderEndpoint,
    PassThrough,
}

impl ElementType {
    /// Type tag sent in the `create` request.
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::WebRtcEndpoint => "WebRtcEndpoint",
            ElementType::RtpEndpoint => "RtpEndpoint",
            ElementType::PlayerEndpoint => "PlayerEndpoint",
            ElementType::RecorderEndpoint => "RecorderEndpoint",
            ElementType::PassThrough => "PassThrough",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Params of a `create` request.
fn constructor_request(type_tag: &str, constructor_params: Value) -> Value {
    json!({
        "type": type_tag,
        "constructorParams": constructor_params,
        "properties": {},
    })
}

/// The `value` string of a result.
fn result_value(result: &Value) -> Result<String> {
    result
        .get("value")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GatewayError::Protocol(format!("result without string value: {}", result)))
}

/// Apply the configured `create()` failure policy.
fn create_failed(mode: CreateFailure, kind: &'static str, err: GatewayError) -> Result<()> {
    match mode {
        CreateFailure::Raise => Err(err),
        CreateFailure::Log => {
            tracing::error!("{} create failed: {}", kind, err);
            Ok(())
        }
    }
}
