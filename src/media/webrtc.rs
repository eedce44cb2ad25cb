//! WebRTC endpoint.

use std::ops::Deref;
use std::sync::Arc;

use serde_json::json;

use super::{result_value, ElementType, MediaElement, MediaPipeline};
use crate::error::Result;

/// Event type emitted for every local ICE candidate.
pub const ICE_CANDIDATE_FOUND: &str = "IceCandidateFound";

/// Element terminating a WebRTC peer connection on the media server.
///
/// Dereferences to [`MediaElement`] for `create`, `connect` and `subscribe`.
pub struct WebRtcEndpoint {
    element: MediaElement,
}

impl WebRtcEndpoint {
    /// An uninitialized endpoint inside `pipeline`.
    pub fn new(pipeline: Arc<MediaPipeline>) -> Self {
        Self {
            element: MediaElement::new(pipeline, ElementType::WebRtcEndpoint),
        }
    }

    /// The underlying element.
    pub fn as_element(&self) -> &MediaElement {
        &self.element
    }

    /// Have the server produce an SDP offer.
    pub async fn generate_offer(&self) -> Result<String> {
        let result = self.element.invoke("generateOffer", json!({})).await?;
        result_value(&result)
    }

    /// Apply the remote peer's SDP answer.
    pub async fn process_answer(&self, answer: &str) -> Result<()> {
        self.element
            .invoke("processAnswer", json!({ "answer": answer }))
            .await?;
        Ok(())
    }

    /// Start ICE candidate gathering. Candidates arrive as
    /// [`ICE_CANDIDATE_FOUND`] events.
    pub async fn gather_candidates(&self) -> Result<()> {
        self.element.invoke("gatherCandidates", json!({})).await?;
        Ok(())
    }

    /// Subscribe to [`ICE_CANDIDATE_FOUND`] events.
    pub async fn subscribe_candidates(&self) -> Result<String> {
        self.element.subscribe(ICE_CANDIDATE_FOUND).await
    }
}

impl Deref for WebRtcEndpoint {
    type Target = MediaElement;

    fn deref(&self) -> &MediaElement {
        &self.element
    }
}

impl AsRef<MediaElement> for WebRtcEndpoint {
    fn as_ref(&self) -> &MediaElement {
        &self.element
    }
}
