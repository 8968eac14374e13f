//! Memory Manager (C6): per-session lifecycle over [`SegmentedMemory`],
//! dependency injection, and observer notification.

use std::collections::HashMap;
use std::sync::Arc;

use agentflow_store::SessionStore;
use agentflow_types::{AgentId, Message, MessageRecord, SessionId, SessionRecord};
use agentflow_token::TokenCounter;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::compressor::{Compressor, Reranker};
use crate::error::MemoryError;
use crate::profile::CompressionProfile;
use crate::segmented::{MemoryDeps, SegmentedMemory};
use crate::session::Session;

/// Notified after a message is durably written to a session, on a
/// newly spawned task so the writer is never blocked on an observer.
#[async_trait]
pub trait SessionObserver: Send + Sync {
    /// Called after `message` has been appended to `session_id`'s history.
    async fn on_message_added(&self, session_id: &SessionId, message: &Message);
}

/// Fixed configuration used to build every session's [`SegmentedMemory`].
pub struct ManagerConfig {
    /// ROM text supplying the head of every session's system prompt.
    pub rom: String,
    /// Maximum total context tokens for a session's budget.
    pub max_tokens: u64,
    /// Tokens reserved for model output.
    pub reserved_tokens: u64,
    /// Default compression profile for new sessions.
    pub profile: CompressionProfile,
    /// L2 token ceiling before overflow is snapshotted to swap.
    pub max_l2_tokens: u32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            rom: String::new(),
            max_tokens: 190_000,
            reserved_tokens: 8_000,
            profile: CompressionProfile::balanced(),
            max_l2_tokens: 4_000,
        }
    }
}

/// Optional collaborators injected into every session's segmented memory.
#[derive(Default)]
pub struct ManagerDeps {
    /// Enables swap (retrieve/promote/search) and L2-overflow durability.
    pub session_store: Option<Arc<dyn SessionStore>>,
    /// Folds evicted L1 batches into L2 text.
    pub compressor: Option<Arc<dyn Compressor>>,
    /// Re-ranks search candidates.
    pub reranker: Option<Arc<dyn Reranker>>,
}

/// Owns the `session_id -> Session` mapping and builds each session's
/// segmented memory and failure tracker on first reference.
pub struct MemoryManager {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    config: ManagerConfig,
    deps: ManagerDeps,
    counter: Arc<TokenCounter>,
    observers: RwLock<Vec<Arc<dyn SessionObserver>>>,
}

impl MemoryManager {
    /// Build a manager with fixed configuration and injected dependencies.
    pub fn new(config: ManagerConfig, deps: ManagerDeps, counter: Arc<TokenCounter>) -> Self {
        Self { sessions: RwLock::new(HashMap::new()), config, deps, counter, observers: RwLock::new(Vec::new()) }
    }

    /// Register an observer, notified in registration order after every
    /// `add_message`.
    pub async fn register_observer(&self, observer: Arc<dyn SessionObserver>) {
        self.observers.write().await.push(observer);
    }

    fn build_memory(&self, session_id: SessionId) -> SegmentedMemory {
        let budget = agentflow_token::TokenBudget::new(self.config.max_tokens, self.config.reserved_tokens);
        let deps = MemoryDeps {
            session_store: self.deps.session_store.clone(),
            compressor: self.deps.compressor.clone(),
            reranker: self.deps.reranker.clone(),
        };
        SegmentedMemory::new(
            session_id,
            self.config.rom.clone(),
            Arc::clone(&self.counter),
            budget,
            self.config.profile.clone(),
            self.config.max_l2_tokens,
            deps,
        )
    }

    /// Return the cached session, or load it from the session store, or
    /// create and persist a fresh one. Updates `agent_id`/`parent_session_id`
    /// on a cached session if they were previously empty.
    pub async fn get_or_create(
        &self,
        session_id: SessionId,
        agent_id: Option<AgentId>,
        parent_session_id: Option<SessionId>,
    ) -> Result<Arc<Session>, MemoryError> {
        if let Some(session) = self.sessions.read().await.get(&session_id).cloned() {
            let mut changed = false;
            if let Some(agent_id) = agent_id.clone() {
                changed |= session.set_agent_id_if_empty(agent_id);
            }
            if let Some(parent) = parent_session_id.clone() {
                changed |= session.set_parent_session_id_if_empty(parent);
            }
            if changed {
                self.persist(&session).await?;
            }
            return Ok(session);
        }

        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get(&session_id).cloned() {
            return Ok(session);
        }

        let session = if let Some(store) = &self.deps.session_store {
            match store.load_session(&session_id).await? {
                Some(record) => {
                    let memory = self.build_memory(session_id.clone());
                    let session = Arc::new(Session::new(
                        session_id.clone(),
                        record.agent_id.or(agent_id),
                        record.parent_session_id.or(parent_session_id),
                        memory,
                    ));
                    session
                }
                None => self.create_fresh(session_id.clone(), agent_id, parent_session_id).await?,
            }
        } else {
            self.create_fresh(session_id.clone(), agent_id, parent_session_id).await?
        };

        sessions.insert(session_id, Arc::clone(&session));
        Ok(session)
    }

    async fn create_fresh(
        &self,
        session_id: SessionId,
        agent_id: Option<AgentId>,
        parent_session_id: Option<SessionId>,
    ) -> Result<Arc<Session>, MemoryError> {
        let memory = self.build_memory(session_id.clone());
        let session = Arc::new(Session::new(session_id, agent_id, parent_session_id, memory));
        self.persist(&session).await?;
        Ok(session)
    }

    async fn persist(&self, session: &Session) -> Result<(), MemoryError> {
        if let Some(store) = &self.deps.session_store {
            let mut record = SessionRecord::new(session.id().clone(), session.agent_id(), session.parent_session_id());
            record.totals = session.totals();
            store.save_session(&record).await?;
        }
        Ok(())
    }

    /// Append a message to both the live session and the session store,
    /// then notify every registered observer on a newly spawned task.
    pub async fn add_message(&self, session_id: &SessionId, message: Message) -> Result<(), MemoryError> {
        let session = self
            .sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| MemoryError::Storage(agentflow_store::StorageError::NotFound(session_id.to_string())))?;

        session.memory().add_message(message.clone()).await?;

        if let Some(store) = &self.deps.session_store {
            store
                .save_message(&MessageRecord { session_id: session_id.clone(), message: message.clone() })
                .await?;
        }

        let observers = self.observers.read().await.clone();
        if !observers.is_empty() {
            let session_id = session_id.clone();
            tokio::spawn(async move {
                for observer in observers {
                    observer.on_message_added(&session_id, &message).await;
                }
            });
        }
        Ok(())
    }

    /// Look up a cached session without creating one.
    pub async fn get(&self, session_id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.read().await.get(session_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentflow_store::MemorySessionStore;

    fn manager() -> MemoryManager {
        MemoryManager::new(ManagerConfig::default(), ManagerDeps::default(), Arc::new(TokenCounter::new()))
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent_without_store() {
        let manager = manager();
        let id = SessionId::new("s1");
        let a = manager.get_or_create(id.clone(), None, None).await.unwrap();
        let b = manager.get_or_create(id.clone(), None, None).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn get_or_create_fills_empty_agent_id() {
        let manager = manager();
        let id = SessionId::new("s1");
        manager.get_or_create(id.clone(), None, None).await.unwrap();
        let session = manager.get_or_create(id.clone(), Some(AgentId::new("a1")), None).await.unwrap();
        assert_eq!(session.agent_id(), Some(AgentId::new("a1")));
    }

    #[tokio::test]
    async fn add_message_writes_through_to_store() {
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
        let deps = ManagerDeps { session_store: Some(Arc::clone(&store)), ..Default::default() };
        let manager = MemoryManager::new(ManagerConfig::default(), deps, Arc::new(TokenCounter::new()));
        let id = SessionId::new("s1");
        manager.get_or_create(id.clone(), None, None).await.unwrap();
        manager.add_message(&id, Message::user("hello")).await.unwrap();
        let persisted = store.load_messages(&id).await.unwrap();
        assert_eq!(persisted.len(), 1);
    }

    #[tokio::test]
    async fn observers_are_notified_after_add_message() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct Counter(Arc<AtomicUsize>);
        #[async_trait]
        impl SessionObserver for Counter {
            async fn on_message_added(&self, _session_id: &SessionId, _message: &Message) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let manager = manager();
        let id = SessionId::new("s1");
        manager.get_or_create(id.clone(), None, None).await.unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        manager.register_observer(Arc::new(Counter(Arc::clone(&count)))).await;
        manager.add_message(&id, Message::user("hi")).await.unwrap();

        for _ in 0..20 {
            if count.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
