//! Reference Tracker (C11): session-scoped pinning over the Large-Object
//! Store, so a session's out-of-line tool results are released exactly once
//! when the session goes away.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use agentflow_store::{CleanupHook, LargeObjectStore};
use agentflow_types::{ReferenceId, SessionId};
use async_trait::async_trait;

/// Maps `session_id -> set of pinned DataReference ids`.
///
/// Registered as a [`CleanupHook`] with the `SessionStore` so deleting a
/// session automatically releases every reference it pinned — mirrors the
/// hook-dispatch pattern `agentflow-store`'s other cleanup hooks use.
pub struct ReferenceTracker {
    store: Arc<LargeObjectStore>,
    pins: Mutex<std::collections::HashMap<SessionId, HashSet<ReferenceId>>>,
}

impl ReferenceTracker {
    /// Build a tracker over the given large-object store.
    pub fn new(store: Arc<LargeObjectStore>) -> Self {
        Self { store, pins: Mutex::new(std::collections::HashMap::new()) }
    }

    /// Retain a reference on behalf of a session and record the pin.
    pub fn pin(&self, session_id: &SessionId, id: ReferenceId) {
        self.store.retain(&id);
        self.pins.lock().unwrap().entry(session_id.clone()).or_default().insert(id);
    }

    /// Release every reference pinned by a session, returning how many were released.
    pub fn unpin_session(&self, session_id: &SessionId) -> usize {
        let ids = self.pins.lock().unwrap().remove(session_id).unwrap_or_default();
        for id in &ids {
            self.store.release(id);
        }
        ids.len()
    }

    /// Currently pinned reference count for a session, for diagnostics/tests.
    pub fn pinned_count(&self, session_id: &SessionId) -> usize {
        self.pins.lock().unwrap().get(session_id).map(HashSet::len).unwrap_or(0)
    }
}

#[async_trait]
impl CleanupHook for ReferenceTracker {
    async fn on_session_deleted(&self, session_id: &SessionId) {
        let released = self.unpin_session(session_id);
        tracing::debug!(%session_id, released, "released pinned references on session delete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentflow_store::ObjectStoreConfig;

    #[test]
    fn pin_and_unpin_round_trip() {
        let store = Arc::new(LargeObjectStore::new(ObjectStoreConfig::default()));
        let tracker = ReferenceTracker::new(Arc::clone(&store));
        let reference = store.store(b"payload".to_vec(), "text/plain", Default::default());
        let session_id = SessionId::new("s1");

        tracker.pin(&session_id, reference.id.clone());
        assert_eq!(tracker.pinned_count(&session_id), 1);
        assert_eq!(store.get_metadata(&reference.id).unwrap().refcount, 2);

        let released = tracker.unpin_session(&session_id);
        assert_eq!(released, 1);
        assert_eq!(store.get_metadata(&reference.id).unwrap().refcount, 1);
        assert_eq!(tracker.pinned_count(&session_id), 0);
    }

    #[tokio::test]
    async fn cleanup_hook_releases_pins() {
        let store = Arc::new(LargeObjectStore::new(ObjectStoreConfig::default()));
        let tracker = ReferenceTracker::new(Arc::clone(&store));
        let reference = store.store(b"payload".to_vec(), "text/plain", Default::default());
        let session_id = SessionId::new("s1");
        tracker.pin(&session_id, reference.id.clone());

        tracker.on_session_deleted(&session_id).await;
        assert_eq!(store.get_metadata(&reference.id).unwrap().refcount, 0);
    }
}
