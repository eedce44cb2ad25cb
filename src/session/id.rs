//! Set-once session identifier.

use std::sync::{Arc, OnceLock};

/// Server-issued token scoping requests to one remote execution context.
///
/// Set at most once; clones share the same cell. A later attempt to set a
/// different value is logged and ignored.
#[derive(Debug, Clone, Default)]
pub struct SessionId(Arc<OnceLock<String>>);

impl SessionId {
    /// Create an empty identifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value, if set.
    pub fn get(&self) -> Option<&str> {
        self.0.get().map(String::as_str)
    }

    /// Whether a value has been set.
    pub fn is_set(&self) -> bool {
        self.0.get().is_some()
    }

    /// Set the identifier. Returns `true` only if this call stored it.
    ///
    /// Empty values are ignored.
    pub fn set(&self, value: impl Into<String>) -> bool {
        let value = value.into();
        if value.is_empty() {
            tracing::debug!("Ignoring empty session ID");
            return false;
        }

        match self.0.set(value) {
            Ok(()) => {
                tracing::debug!("Session ID set to {}", self.get().unwrap_or_default());
                true
            }
            Err(rejected) => {
                if self.get() != Some(rejected.as_str()) {
                    tracing::warn!(
                        "Trying to set different session ID {} (keeping {})",
                        rejected,
                        self.get().unwrap_or_default()
                    );
                }
                false
            }
        }
    }
}
