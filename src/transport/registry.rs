//! Process-wide registry of in-progress `run()` calls.
//!
//! Every [`Duplex::run`](super::Duplex::run) registers itself here for as
//! long as it is waiting. A shutdown hook calls [`cancel_runners`] to make
//! all of them return [`RunOutcome::Cancelled`](super::RunOutcome::Cancelled)
//! at once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tokio::sync::Notify;

#[derive(Default)]
struct Runners {
    next_id: u64,
    active: HashMap<u64, Arc<Notify>>,
}

/// Registry of active runners. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct RunRegistry {
    inner: Arc<Mutex<Runners>>,
}

impl RunRegistry {
    /// Create an empty registry, independent of the global one.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by the whole process.
    pub fn global() -> &'static RunRegistry {
        static GLOBAL: OnceLock<RunRegistry> = OnceLock::new();
        GLOBAL.get_or_init(RunRegistry::new)
    }

    fn lock(&self) -> MutexGuard<'_, Runners> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a new runner. It is removed when the guard drops.
    pub fn register(&self) -> RunnerGuard {
        let cancel = Arc::new(Notify::new());
        let mut runners = self.lock();
        runners.next_id += 1;
        let id = runners.next_id;
        runners.active.insert(id, cancel.clone());

        RunnerGuard {
            id,
            cancel,
            registry: self.clone(),
        }
    }

    /// Cancel every registered runner. Returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        let runners = self.lock();
        for cancel in runners.active.values() {
            // notify_one stores a permit, so a runner that has registered but
            // not yet started waiting still observes the cancellation.
            cancel.notify_one();
        }
        runners.active.len()
    }

    /// Number of runners currently registered.
    pub fn len(&self) -> usize {
        self.lock().active.len()
    }

    /// Whether no runner is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cancel every `run()` registered in the process-wide registry.
pub fn cancel_runners() -> usize {
    let cancelled = RunRegistry::global().cancel_all();
    tracing::debug!("Cancelled {} runner(s)", cancelled);
    cancelled
}

/// Registration handle held by a running `run()`.
pub struct RunnerGuard {
    id: u64,
    cancel: Arc<Notify>,
    registry: RunRegistry,
}

impl RunnerGuard {
    /// Completes once the registry cancels this runner.
    pub async fn cancelled(&self) {
        self.cancel.notified().await
    }
}

impl Drop for RunnerGuard {
    fn drop(&mut self) {
        self.registry.lock().active.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_register_and_drop() {
        let registry = RunRegistry::new();
        assert!(registry.is_empty());

        let first = registry.register();
        let second = registry.register();
        assert_eq!(registry.len(), 2);

        drop(first);
        assert_eq!(registry.len(), 1);
        drop(second);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_cancel_all_counts_active() {
        let registry = RunRegistry::new();
        let _a = registry.register();
        let _b = registry.register();
        assert_eq!(registry.cancel_all(), 2);
        // cancellation does not deregister; the runner does on exit
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_before_wait_is_observed() {
        let registry = RunRegistry::new();
        let guard = registry.register();
        registry.cancel_all();

        let result = tokio::time::timeout(Duration::from_secs(1), guard.cancelled()).await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_registries_are_independent() {
        let local = RunRegistry::new();
        let _guard = local.register();
        assert_eq!(local.len(), 1);
        assert!(!Arc::ptr_eq(&local.inner, &RunRegistry::global().inner));
    }
}
