//! In-memory [`SessionStore`], for tests and single-process deployments that
//! don't need durability across restarts.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use agentflow_types::{
    AgentId, MemorySnapshot, MessageRecord, SessionId, SessionRecord, ToolExecutionRecord,
};
use async_trait::async_trait;

use crate::error::StorageError;
use crate::session_store::{CleanupHook, SearchHit, SessionStore};

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, SessionRecord>,
    messages: HashMap<SessionId, Vec<MessageRecord>>,
    tool_executions: Vec<ToolExecutionRecord>,
    memory_snapshots: HashMap<(SessionId, String), Vec<MemorySnapshot>>,
}

/// A `SessionStore` backed entirely by in-process data structures.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: Mutex<Inner>,
    cleanup_hooks: Mutex<Vec<Arc<dyn CleanupHook>>>,
}

impl MemorySessionStore {
    /// Build an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save_session(&self, record: &SessionRecord) -> Result<(), StorageError> {
        self.inner.lock().unwrap().sessions.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn load_session(&self, id: &SessionId) -> Result<Option<SessionRecord>, StorageError> {
        Ok(self.inner.lock().unwrap().sessions.get(id).cloned())
    }

    async fn delete_session(&self, id: &SessionId) -> Result<(), StorageError> {
        let hooks: Vec<Arc<dyn CleanupHook>> = self.cleanup_hooks.lock().unwrap().clone();
        for hook in &hooks {
            hook.on_session_deleted(id).await;
        }
        let mut inner = self.inner.lock().unwrap();
        inner.sessions.remove(id);
        inner.messages.remove(id);
        inner.memory_snapshots.retain(|(sid, _), _| sid != id);
        inner.tool_executions.retain(|t| &t.session_id != id);
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<SessionId>, StorageError> {
        let mut records: Vec<SessionRecord> = self.inner.lock().unwrap().sessions.values().cloned().collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records.into_iter().map(|r| r.id).collect())
    }

    async fn save_message(&self, record: &MessageRecord) -> Result<(), StorageError> {
        self.inner
            .lock()
            .unwrap()
            .messages
            .entry(record.session_id.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn load_messages(&self, session_id: &SessionId) -> Result<Vec<MessageRecord>, StorageError> {
        Ok(self.inner.lock().unwrap().messages.get(session_id).cloned().unwrap_or_default())
    }

    async fn save_tool_execution(&self, record: &ToolExecutionRecord) -> Result<(), StorageError> {
        self.inner.lock().unwrap().tool_executions.push(record.clone());
        Ok(())
    }

    async fn save_memory_snapshot(&self, snapshot: &MemorySnapshot) -> Result<(), StorageError> {
        self.inner
            .lock()
            .unwrap()
            .memory_snapshots
            .entry((snapshot.session_id.clone(), snapshot.kind.clone()))
            .or_default()
            .push(snapshot.clone());
        Ok(())
    }

    async fn load_memory_snapshots(
        &self,
        session_id: &SessionId,
        kind: &str,
        limit: usize,
    ) -> Result<Vec<MemorySnapshot>, StorageError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .memory_snapshots
            .get(&(session_id.clone(), kind.to_string()))
            .map(|snapshots| snapshots.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn load_agent_sessions(&self, agent_id: &AgentId) -> Result<Vec<SessionId>, StorageError> {
        let mut records: Vec<SessionRecord> = self
            .inner
            .lock()
            .unwrap()
            .sessions
            .values()
            .filter(|r| r.agent_id.as_ref() == Some(agent_id))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records.into_iter().map(|r| r.id).collect())
    }

    async fn load_messages_for_agent(&self, agent_id: &AgentId) -> Result<Vec<MessageRecord>, StorageError> {
        let sessions = self.load_agent_sessions(agent_id).await?;
        let mut out = Vec::new();
        for session_id in sessions {
            out.extend(self.load_messages(&session_id).await?);
        }
        out.sort_by_key(|record| record.message.timestamp);
        Ok(out)
    }

    async fn search_messages(
        &self,
        session_id: Option<&SessionId>,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, StorageError> {
        let needle = query.to_lowercase();
        let messages = match session_id {
            Some(session_id) => self.load_messages(session_id).await?,
            None => {
                let sessions: Vec<SessionId> = self.inner.lock().unwrap().messages.keys().cloned().collect();
                let mut all = Vec::new();
                for session_id in sessions {
                    all.extend(self.load_messages(&session_id).await?);
                }
                all
            }
        };
        Ok(messages
            .into_iter()
            .filter(|m| m.message.as_text().to_lowercase().contains(&needle))
            .take(limit)
            .map(|record| SearchHit { record, score: 0.0 })
            .collect())
    }

    async fn search_messages_for_agent(
        &self,
        agent_id: &AgentId,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, StorageError> {
        let needle = query.to_lowercase();
        let messages = self.load_messages_for_agent(agent_id).await?;
        Ok(messages
            .into_iter()
            .filter(|m| m.message.as_text().to_lowercase().contains(&needle))
            .take(limit)
            .map(|record| SearchHit { record, score: 0.0 })
            .collect())
    }

    fn register_cleanup_hook(&self, hook: Arc<dyn CleanupHook>) {
        self.cleanup_hooks.lock().unwrap().push(hook);
    }
}
