//! Correlation table: request ids, pending result slots, inbound routing.
//!
//! Every outbound request reserves an id and a single-assignment slot. Every
//! inbound frame goes through [`CorrelationTable::dispatch`], which resolves
//! a slot, forwards a notification to the event handler, or logs and drops.
//!
//! # Example
//!
//! ```
//! use mediagate::rpc::{CorrelationTable, DispatchOutcome};
//! use mediagate::session::SessionId;
//! use serde_json::json;
//!
//! let table = CorrelationTable::new(SessionId::new());
//! let (request, _pending) = table.create_request("create", json!({"type": "MediaPipeline"}), None);
//! assert_eq!(request.id, 1);
//!
//! let outcome = table.dispatch(json!({"id": 1, "result": {"value": "PL1"}}));
//! assert_eq!(outcome, DispatchOutcome::Resolved(1));
//! assert!(table.is_empty());
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tokio::sync::oneshot;

use super::pending::PendingResponse;
use crate::error::{GatewayError, Result};
use crate::protocol::{Inbound, OutboundMessage, SESSION_ID_KEY};
use crate::session::SessionId;

/// Receiver of server-initiated notifications.
pub trait EventHandler: Send + Sync + 'static {
    /// Called with the full notification object.
    fn on_event(&self, event: Value);
}

impl<F> EventHandler for F
where
    F: Fn(Value) + Send + Sync + 'static,
{
    fn on_event(&self, event: Value) {
        self(event)
    }
}

/// What [`CorrelationTable::dispatch`] did with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Notification forwarded to the event handler.
    Event,
    /// Notification dropped: no event handler registered.
    EventDropped,
    /// Pending request resolved with its result.
    Resolved(u64),
    /// Pending request resolved with a remote error.
    Failed(u64),
    /// Response for an id not in the table (late, duplicate, never issued).
    Unknown(u64),
    /// Frame shape not understood; nothing resolved.
    Unrecognized,
}

struct PendingEntry {
    method: String,
    created: Instant,
    tx: oneshot::Sender<Result<Value>>,
}

/// Request id allocator and pending-result map.
pub struct CorrelationTable {
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, PendingEntry>>,
    session_id: SessionId,
    events: RwLock<Option<Arc<dyn EventHandler>>>,
}

impl CorrelationTable {
    /// Create an empty table that records session ids into `session_id`.
    pub fn new(session_id: SessionId) -> Self {
        Self {
            next_id: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
            session_id,
            events: RwLock::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, PendingEntry>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve the next request id. Strictly increasing, never reused.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Session identifier cell this table writes into.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Register the notification handler, replacing any previous one.
    pub fn set_event_handler<H: EventHandler>(&self, handler: H) {
        let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
        *events = Some(Arc::new(handler));
    }

    /// Build a request and park a result slot for it.
    ///
    /// `session_id`, when given, is merged into `params` under `sessionId`.
    /// Non-object params are sent unchanged.
    pub fn create_request(
        &self,
        method: &str,
        params: Value,
        session_id: Option<&str>,
    ) -> (OutboundMessage, PendingResponse) {
        let params = match (params, session_id) {
            (Value::Null, Some(sid)) => {
                let mut object = Map::with_capacity(1);
                object.insert(SESSION_ID_KEY.to_string(), Value::from(sid));
                Value::Object(object)
            }
            (Value::Object(mut object), Some(sid)) => {
                object.insert(SESSION_ID_KEY.to_string(), Value::from(sid));
                Value::Object(object)
            }
            (params, Some(_)) => {
                tracing::warn!("Cannot attach session ID to non-object params for {}", method);
                params
            }
            (params, None) => params,
        };

        let (tx, rx) = oneshot::channel();
        let id = self.next_id();
        let entry = PendingEntry {
            method: method.to_string(),
            created: Instant::now(),
            tx,
        };
        self.lock().insert(id, entry);

        (
            OutboundMessage::new(id, method, params),
            PendingResponse::new(id, rx),
        )
    }

    /// Route one inbound frame.
    ///
    /// Never fails: unknown ids and unrecognized shapes are logged and
    /// dropped without touching the table.
    pub fn dispatch(&self, message: Value) -> DispatchOutcome {
        match Inbound::classify(message) {
            Inbound::Event(event) => self.dispatch_event(event),
            Inbound::Unrecognized { id: None, message } => {
                tracing::error!("Unrecognized frame: {}", message);
                DispatchOutcome::Unrecognized
            }
            Inbound::Unrecognized {
                id: Some(id),
                message,
            } => {
                if self.contains(id) {
                    tracing::error!("Unhandled response shape: {}", message);
                    DispatchOutcome::Unrecognized
                } else {
                    tracing::warn!("Unknown response: {}", message);
                    DispatchOutcome::Unknown(id)
                }
            }
            Inbound::Failure { id, code, message } => {
                let Some(entry) = self.take(id) else {
                    tracing::warn!("Unknown error response {}: ({}) {}", id, code, message);
                    return DispatchOutcome::Unknown(id);
                };
                resolve(id, entry, Err(GatewayError::Rpc { code, message }));
                DispatchOutcome::Failed(id)
            }
            Inbound::Success { id, mut result } => {
                let Some(entry) = self.take(id) else {
                    tracing::warn!("Unknown response {}: {}", id, result);
                    return DispatchOutcome::Unknown(id);
                };
                self.extract_session_id(&mut result);
                resolve(id, entry, Ok(result));
                DispatchOutcome::Resolved(id)
            }
        }
    }

    fn dispatch_event(&self, event: Value) -> DispatchOutcome {
        let handler = self
            .events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match handler {
            Some(handler) => {
                handler.on_event(event);
                DispatchOutcome::Event
            }
            None => {
                tracing::warn!("Received event but no event handler is set: {}", event);
                DispatchOutcome::EventDropped
            }
        }
    }

    /// Strip `sessionId` out of a result and record it.
    fn extract_session_id(&self, result: &mut Value) {
        let Some(raw) = result.as_object_mut().and_then(|o| o.remove(SESSION_ID_KEY)) else {
            return;
        };
        match raw {
            Value::String(sid) => {
                self.session_id.set(sid);
            }
            other => tracing::warn!("Ignoring non-string session ID: {}", other),
        }
    }

    fn take(&self, id: u64) -> Option<PendingEntry> {
        self.lock().remove(&id)
    }

    /// Drop a pending entry without resolving it.
    pub fn remove(&self, id: u64) -> bool {
        self.take(id).is_some()
    }

    /// Fail entries older than `max_age` with `RequestTimeout`.
    ///
    /// Returns the number of evicted entries.
    pub fn evict_expired(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let expired: Vec<(u64, PendingEntry)> = {
            let mut pending = self.lock();
            let ids: Vec<u64> = pending
                .iter()
                .filter(|(_, entry)| now.duration_since(entry.created) >= max_age)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| pending.remove(&id).map(|entry| (id, entry)))
                .collect()
        };

        let count = expired.len();
        for (id, entry) in expired {
            tracing::warn!("Request {} ({}) expired without response", id, entry.method);
            let method = entry.method.clone();
            resolve(id, entry, Err(GatewayError::RequestTimeout { id, method }));
        }
        count
    }

    /// Fail every pending entry with `ConnectionClosed`.
    ///
    /// Returns the number of abandoned entries.
    pub fn abandon_all(&self) -> usize {
        let drained: Vec<(u64, PendingEntry)> = self.lock().drain().collect();
        let count = drained.len();
        for (id, entry) in drained {
            tracing::debug!("Abandoning request {} ({})", id, entry.method);
            resolve(id, entry, Err(GatewayError::ConnectionClosed));
        }
        count
    }

    /// Whether `id` is still pending.
    pub fn contains(&self, id: u64) -> bool {
        self.lock().contains_key(&id)
    }

    /// Number of pending requests.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no request is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn resolve(id: u64, entry: PendingEntry, result: Result<Value>) {
    if entry.tx.send(result).is_err() {
        tracing::debug!("Caller of request {} ({}) stopped waiting", id, entry.method);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;

    fn table() -> CorrelationTable {
        CorrelationTable::new(SessionId::new())
    }

    #[test]
    fn test_ids_strictly_increasing() {
        let table = table();
        let ids: Vec<u64> = (0..10)
            .map(|_| table.create_request("ping", json!({}), None).0.id)
            .collect();

        assert_eq!(ids[0], 1);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(table.len(), 10);
    }

    #[test]
    fn test_concurrent_ids_unique() {
        let table = table();
        let ids: Vec<u64> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        (0..100)
                            .map(|_| table.create_request("ping", json!({}), None).0.id)
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        let unique: HashSet<u64> = ids.iter().copied().collect();
        assert_eq!(unique.len(), 800);
        assert_eq!(table.len(), 800);
    }

    #[test]
    fn test_session_id_merged_into_params() {
        let table = table();
        let (request, _) = table.create_request("invoke", json!({"object": "E1"}), Some("S1"));
        assert_eq!(request.params, json!({"object": "E1", "sessionId": "S1"}));

        let (request, _) = table.create_request("ping", Value::Null, Some("S1"));
        assert_eq!(request.params, json!({"sessionId": "S1"}));

        let (request, _) = table.create_request("ping", json!({"object": "E1"}), None);
        assert_eq!(request.session_id(), None);
    }

    #[test]
    fn test_session_id_not_attached_to_non_object_params() {
        let table = table();
        let (request, _) = table.create_request("ping", json!(["a", 1]), Some("S1"));
        assert_eq!(request.params, json!(["a", 1]));
        assert_eq!(request.session_id(), None);
        assert!(table.contains(request.id));
    }

    #[tokio::test]
    async fn test_dispatch_success_resolves() {
        let table = table();
        let (request, pending) = table.create_request("get", json!({}), None);
        assert_eq!(pending.id(), request.id);

        let outcome = table.dispatch(json!({"id": request.id, "result": {"value": "X"}}));
        assert_eq!(outcome, DispatchOutcome::Resolved(request.id));
        assert_eq!(pending.await.unwrap(), json!({"value": "X"}));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_error_fails() {
        let table = table();
        let (request, pending) = table.create_request("get", json!({}), None);

        let outcome = table.dispatch(
            json!({"id": request.id, "error": {"code": 1, "message": "bad"}}),
        );
        assert_eq!(outcome, DispatchOutcome::Failed(request.id));

        match pending.await {
            Err(GatewayError::Rpc { code, message }) => {
                assert_eq!(code, 1);
                assert_eq!(message, "bad");
            }
            other => panic!("expected Rpc error, got {:?}", other),
        }
    }

    #[test]
    fn test_dispatch_unknown_id_is_noop() {
        let table = table();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        table.set_event_handler(move |_event: Value| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let (request, _pending) = table.create_request("get", json!({}), None);

        let outcome = table.dispatch(json!({"id": 999, "result": {"value": "X"}}));
        assert_eq!(outcome, DispatchOutcome::Unknown(999));

        let outcome = table.dispatch(json!({"id": 998, "error": {"code": 1, "message": "x"}}));
        assert_eq!(outcome, DispatchOutcome::Unknown(998));

        assert_eq!(table.len(), 1);
        assert!(table.contains(request.id));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!table.session_id().is_set());
    }

    #[test]
    fn test_dispatch_unrecognized_shape_keeps_entry() {
        let table = table();
        let (request, _pending) = table.create_request("get", json!({}), None);

        let outcome = table.dispatch(json!({"id": request.id, "jsonrpc": "2.0"}));
        assert_eq!(outcome, DispatchOutcome::Unrecognized);
        assert!(table.contains(request.id));

        let outcome = table.dispatch(json!({"method": "somethingElse"}));
        assert_eq!(outcome, DispatchOutcome::Unrecognized);
    }

    #[test]
    fn test_dispatch_event_forwards_full_message() {
        let table = table();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        table.set_event_handler(move |event: Value| {
            sink.lock().unwrap().push(event);
        });

        let event = json!({"method": "onEvent", "params": {"value": {"type": "IceCandidateFound"}}});
        assert_eq!(table.dispatch(event.clone()), DispatchOutcome::Event);
        assert_eq!(*seen.lock().unwrap(), vec![event]);
    }

    #[test]
    fn test_dispatch_event_without_handler() {
        let table = table();
        let outcome = table.dispatch(json!({"method": "onEvent", "params": {}}));
        assert_eq!(outcome, DispatchOutcome::EventDropped);
    }

    #[tokio::test]
    async fn test_session_id_extracted_and_set_once() {
        let table = table();

        let (first, pending) = table.create_request("create", json!({}), None);
        table.dispatch(json!({"id": first.id, "result": {"sessionId": "A", "value": "PL1"}}));
        assert_eq!(pending.await.unwrap(), json!({"value": "PL1"}));
        assert_eq!(table.session_id().get(), Some("A"));

        let (second, pending) = table.create_request("create", json!({}), Some("A"));
        table.dispatch(json!({"id": second.id, "result": {"sessionId": "B", "value": "PL2"}}));
        assert_eq!(pending.await.unwrap(), json!({"value": "PL2"}));
        assert_eq!(table.session_id().get(), Some("A"));
    }

    #[tokio::test]
    async fn test_out_of_order_resolution() {
        let table = table();
        let (a, pending_a) = table.create_request("a", json!({}), None);
        let (b, pending_b) = table.create_request("b", json!({}), None);

        table.dispatch(json!({"id": b.id, "result": {"value": "B"}}));
        table.dispatch(json!({"id": a.id, "result": {"value": "A"}}));

        assert_eq!(pending_b.await.unwrap()["value"], "B");
        assert_eq!(pending_a.await.unwrap()["value"], "A");
    }

    #[tokio::test]
    async fn test_evict_expired() {
        let table = table();
        let (request, pending) = table.create_request("slow", json!({}), None);

        assert_eq!(table.evict_expired(Duration::from_secs(60)), 0);
        assert!(table.contains(request.id));

        assert_eq!(table.evict_expired(Duration::ZERO), 1);
        assert!(table.is_empty());
        match pending.await {
            Err(GatewayError::RequestTimeout { id, method }) => {
                assert_eq!(id, request.id);
                assert_eq!(method, "slow");
            }
            other => panic!("expected RequestTimeout, got {:?}", other),
        }

        // a late response is now unknown
        let outcome = table.dispatch(json!({"id": request.id, "result": {}}));
        assert_eq!(outcome, DispatchOutcome::Unknown(request.id));
    }

    #[tokio::test]
    async fn test_abandon_all() {
        let table = table();
        let (_, first) = table.create_request("a", json!({}), None);
        let (_, second) = table.create_request("b", json!({}), None);

        assert_eq!(table.abandon_all(), 2);
        assert!(table.is_empty());
        assert!(matches!(first.await, Err(GatewayError::ConnectionClosed)));
        assert!(matches!(second.await, Err(GatewayError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_remove_drops_slot() {
        let table = table();
        let (request, pending) = table.create_request("a", json!({}), None);

        assert!(table.remove(request.id));
        assert!(!table.remove(request.id));
        assert!(matches!(pending.await, Err(GatewayError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_dropped_caller_does_not_break_dispatch() {
        let table = table();
        let (request, pending) = table.create_request("a", json!({}), None);
        drop(pending);

        let outcome = table.dispatch(json!({"id": request.id, "result": {}}));
        assert_eq!(outcome, DispatchOutcome::Resolved(request.id));
        assert!(table.is_empty());
    }
}
