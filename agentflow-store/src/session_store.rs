//! Durable Session Store (C4): the trait boundary every backend (SQLite,
//! in-memory) implements.

use async_trait::async_trait;
use agentflow_types::{
    AgentId, MemorySnapshot, MessageRecord, SessionContext, SessionId, SessionRecord,
    ToolExecutionRecord,
};

use crate::error::StorageError;

/// A message returned from a full-text search, with its relevance score.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// The matching message.
    pub record: MessageRecord,
    /// BM25 relevance score from the backing index (lower is more relevant,
    /// matching SQLite FTS5's convention).
    pub score: f64,
}

/// A callback invoked when a session is deleted, so dependents (notably the
/// Reference Tracker, C11) can release what they're holding for it.
#[async_trait]
pub trait CleanupHook: Send + Sync {
    /// Called synchronously before the session row is removed.
    async fn on_session_deleted(&self, session_id: &SessionId);
}

/// Durable storage for sessions, their message history, tool executions, and
/// memory snapshots.
///
/// Object-safe: the runtime holds this behind `Arc<dyn SessionStore>` so the
/// backend (SQLite vs. in-memory) is a deployment choice, not a generic
/// parameter threaded through the loop and memory manager.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert or replace a session row.
    async fn save_session(&self, record: &SessionRecord) -> Result<(), StorageError>;

    /// Load a session by id.
    async fn load_session(&self, id: &SessionId) -> Result<Option<SessionRecord>, StorageError>;

    /// Delete a session and everything recorded under it, after running
    /// registered cleanup hooks.
    async fn delete_session(&self, id: &SessionId) -> Result<(), StorageError>;

    /// List every known session id, most recently updated first.
    async fn list_sessions(&self) -> Result<Vec<SessionId>, StorageError>;

    /// Append a message to a session's history.
    async fn save_message(&self, record: &MessageRecord) -> Result<(), StorageError>;

    /// Load a session's full message history, oldest first.
    async fn load_messages(&self, session_id: &SessionId) -> Result<Vec<MessageRecord>, StorageError>;

    /// Record a tool execution, success or failure.
    async fn save_tool_execution(&self, record: &ToolExecutionRecord) -> Result<(), StorageError>;

    /// Persist a memory snapshot (e.g. an L2 summary evicted to swap).
    async fn save_memory_snapshot(&self, snapshot: &MemorySnapshot) -> Result<(), StorageError>;

    /// Load up to `limit` snapshots of the given kind for a session, oldest first.
    async fn load_memory_snapshots(
        &self,
        session_id: &SessionId,
        kind: &str,
        limit: usize,
    ) -> Result<Vec<MemorySnapshot>, StorageError>;

    /// List every session owned by an agent, most recently updated first.
    async fn load_agent_sessions(&self, agent_id: &AgentId) -> Result<Vec<SessionId>, StorageError>;

    /// Load every message belonging to any session owned by an agent, in
    /// timestamp order across sessions (not grouped by session).
    async fn load_messages_for_agent(&self, agent_id: &AgentId) -> Result<Vec<MessageRecord>, StorageError>;

    /// Load a parent session's messages as visible to one of its sub-agent
    /// sessions: only [`SessionContext::Shared`] and
    /// [`SessionContext::Coordinator`] messages, never `Direct`.
    async fn load_messages_from_parent_session(
        &self,
        parent_session_id: &SessionId,
    ) -> Result<Vec<MessageRecord>, StorageError> {
        let all = self.load_messages(parent_session_id).await?;
        Ok(all
            .into_iter()
            .filter(|m| !matches!(m.visibility(), SessionContext::Direct))
            .collect())
    }

    /// Full-text search over message content, ranked by relevance. `None`
    /// searches across every session in the store.
    async fn search_messages(
        &self,
        session_id: Option<&SessionId>,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, StorageError>;

    /// Full-text search scoped to every session owned by an agent.
    async fn search_messages_for_agent(
        &self,
        agent_id: &AgentId,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, StorageError>;

    /// Register a hook to run before a session is deleted.
    fn register_cleanup_hook(&self, hook: std::sync::Arc<dyn CleanupHook>);
}
