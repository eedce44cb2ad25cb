//! Media element living inside a pipeline.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tokio::sync::OnceCell;

use super::{
    constructor_request, create_failed, result_value, ElementType, MediaPipeline,
    MEDIA_PIPELINE_PARAM,
};
use crate::error::{GatewayError, Result};
use crate::session::Session;

const KIND: &str = "MediaElement";

/// Remote element. The server identifies it as `"<pipeline>/<element>"`.
///
/// Holds its parent pipeline by reference count; it does not manage the
/// pipeline's lifetime on the server.
pub struct MediaElement {
    pipeline: Arc<MediaPipeline>,
    element_type: ElementType,
    constructor_params: Map<String, Value>,
    id: OnceCell<String>,
}

impl MediaElement {
    /// An uninitialized element of `element_type` inside `pipeline`.
    pub fn new(pipeline: Arc<MediaPipeline>, element_type: ElementType) -> Self {
        Self {
            pipeline,
            element_type,
            constructor_params: Map::new(),
            id: OnceCell::new(),
        }
    }

    /// Add an extra constructor parameter (e.g. `uri` for a player).
    pub fn with_constructor_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.constructor_params.insert(key.into(), value);
        self
    }

    /// Parent pipeline.
    pub fn pipeline(&self) -> &Arc<MediaPipeline> {
        &self.pipeline
    }

    /// Type tag sent when the element is created.
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    fn session(&self) -> &Arc<Session> {
        self.pipeline.session()
    }

    /// Element segment of the server identifier, once created.
    pub fn id(&self) -> Option<&str> {
        self.id.get().map(String::as_str)
    }

    /// Whether `create()` has stored a server identifier.
    pub fn is_created(&self) -> bool {
        self.id.get().is_some()
    }

    /// Compound `"<pipeline>/<element>"` reference used on the wire.
    pub fn object_ref(&self) -> Result<String> {
        let element = self.id().ok_or(GatewayError::NotCreated(KIND))?;
        let pipeline = self.pipeline.require_id()?;
        Ok(format!("{}/{}", pipeline, element))
    }

    /// Ask the server to construct the element inside its pipeline.
    ///
    /// Concurrent calls share one `create` request; the ones that joined it
    /// return `Ok(())` once it succeeds. Remote and transport failures follow
    /// the configured [`CreateFailure`](crate::config::CreateFailure) policy.
    /// An identifier that does not belong to the parent pipeline always fails
    /// with `IdentifierMismatch` and leaves the element uninitialized.
    pub async fn create(&self) -> Result<()> {
        if self.is_created() {
            return Err(GatewayError::AlreadyCreated(KIND));
        }
        let pipeline_id = self.pipeline.require_id()?;

        let mode = self.session().config().create_failure;
        match self.id.get_or_try_init(|| self.construct(pipeline_id)).await {
            Ok(id) => {
                tracing::info!("{} created: {}/{}", self.element_type, pipeline_id, id);
                Ok(())
            }
            Err(e @ GatewayError::IdentifierMismatch { .. }) => Err(e),
            Err(e) => create_failed(mode, KIND, e),
        }
    }

    async fn construct(&self, pipeline_id: &str) -> Result<String> {
        let mut constructor_params = self.constructor_params.clone();
        constructor_params.insert(MEDIA_PIPELINE_PARAM.to_string(), Value::from(pipeline_id));
        let params = constructor_request(
            self.element_type.as_str(),
            Value::Object(constructor_params),
        );

        let result = self.session().call("create", params).await?;
        let compound = result_value(&result)?;
        split_compound(pipeline_id, &compound).map(str::to_string)
    }

    /// Invoke a remote operation on this element. Returns the raw result.
    pub async fn invoke(&self, operation: &str, operation_params: Value) -> Result<Value> {
        let params = json!({
            "object": self.object_ref()?,
            "operation": operation,
            "operationParams": operation_params,
        });
        self.session().call("invoke", params).await
    }

    /// Route this element's media into `sink`.
    pub async fn connect(&self, sink: &MediaElement) -> Result<()> {
        self.invoke("connect", json!({ "sink": sink.object_ref()? }))
            .await?;
        tracing::debug!("Connected {} to {}", self.object_ref()?, sink.object_ref()?);
        Ok(())
    }

    /// Subscribe to `event_type` notifications from this element.
    ///
    /// Returns the server's subscription id. Events arrive through the
    /// session's event handler.
    pub async fn subscribe(&self, event_type: &str) -> Result<String> {
        let params = json!({
            "type": event_type,
            "object": self.object_ref()?,
        });
        let result = self.session().call("subscribe", params).await?;
        result_value(&result)
    }
}

/// Split `"<pipeline>/<element>"`, checking the pipeline segment.
fn split_compound<'a>(pipeline_id: &str, compound: &'a str) -> Result<&'a str> {
    match compound.split_once('/') {
        Some((pipeline, element)) if pipeline == pipeline_id && !element.is_empty() => {
            Ok(element)
        }
        _ => {
            tracing::error!(
                "Element {} does not belong to pipeline {}",
                compound,
                pipeline_id
            );
            Err(GatewayError::IdentifierMismatch {
                expected: pipeline_id.to_string(),
                element: compound.to_string(),
            })
        }
    }
}
