//! Media pipeline.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::OnceCell;

use super::{constructor_request, create_failed, result_value, PIPELINE_TYPE};
use crate::error::{GatewayError, Result};
use crate::session::Session;

const KIND: &str = "MediaPipeline";

/// Root remote object. Elements are created inside it.
pub struct MediaPipeline {
    session: Arc<Session>,
    id: OnceCell<String>,
}

impl MediaPipeline {
    /// An uninitialized pipeline bound to `session`.
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            id: OnceCell::new(),
        }
    }

    /// Session the pipeline issues its requests through.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Server-assigned identifier, once created.
    pub fn id(&self) -> Option<&str> {
        self.id.get().map(String::as_str)
    }

    /// Whether `create()` has stored a server identifier.
    pub fn is_created(&self) -> bool {
        self.id.get().is_some()
    }

    pub(crate) fn require_id(&self) -> Result<&str> {
        self.id().ok_or(GatewayError::NotCreated(KIND))
    }

    /// Ask the server to construct the pipeline and store its identifier.
    ///
    /// Concurrent calls share one `create` request; the ones that joined it
    /// return `Ok(())` once it succeeds. Calling again after that fails with
    /// `AlreadyCreated`. Remote and transport failures follow the configured
    /// [`CreateFailure`](crate::config::CreateFailure) policy.
    pub async fn create(&self) -> Result<()> {
        if self.is_created() {
            return Err(GatewayError::AlreadyCreated(KIND));
        }

        let mode = self.session.config().create_failure;
        match self.id.get_or_try_init(|| self.construct()).await {
            Ok(id) => {
                tracing::info!("MediaPipeline created: {}", id);
                Ok(())
            }
            Err(e) => create_failed(mode, KIND, e),
        }
    }

    async fn construct(&self) -> Result<String> {
        let params = constructor_request(PIPELINE_TYPE, json!({}));
        let result = self.session.call("create", params).await?;
        result_value(&result)
    }
}
