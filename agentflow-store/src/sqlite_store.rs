//! SQLite-backed [`SessionStore`].
//!
//! Schema grows additively: `init_schema` only ever issues `CREATE TABLE IF
//! NOT EXISTS` / `CREATE INDEX IF NOT EXISTS`, tracked by `PRAGMA
//! user_version` rather than a migration framework — there is exactly one
//! schema version to reach today.

use std::path::Path;
use std::sync::{Arc, Mutex};

use agentflow_types::{
    AgentId, ContentBlock, MemorySnapshot, MessageRecord, Message, Role, SessionContext, SessionId,
    SessionRecord, SessionTotals, ToolExecutionRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection};
use tokio::task;

use crate::error::StorageError;
use crate::session_store::{CleanupHook, SearchHit, SessionStore};

const SCHEMA_VERSION: i64 = 1;

/// A durable session store backed by a single SQLite database file.
///
/// Each call wraps a blocking `rusqlite` operation in
/// `tokio::task::spawn_blocking`; the connection itself lives behind a
/// `Mutex` since `rusqlite::Connection` has no internal locking of its own.
pub struct SqliteSessionStore {
    conn: Arc<Mutex<Connection>>,
    cleanup_hooks: Mutex<Vec<Arc<dyn CleanupHook>>>,
}

impl SqliteSessionStore {
    /// Open (or create) a session store at the given database path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)), cleanup_hooks: Mutex::new(Vec::new()) })
    }

    /// Open an in-memory SQLite database, useful for tests.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)), cleanup_hooks: Mutex::new(Vec::new()) })
    }

    fn init_schema(conn: &Connection) -> Result<(), StorageError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                agent_id TEXT,
                parent_session_id TEXT,
                context TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                cost_usd TEXT NOT NULL,
                total_tokens INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_agent ON sessions(agent_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_parent ON sessions(parent_session_id);

            CREATE TABLE IF NOT EXISTS messages (
                row_id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL,
                visibility TEXT NOT NULL,
                content TEXT NOT NULL,
                text_content TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                token_count INTEGER NOT NULL,
                cost_usd TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, row_id);

            CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts USING fts5(
                text_content,
                content='messages',
                content_rowid='row_id'
            );

            CREATE TRIGGER IF NOT EXISTS messages_ai AFTER INSERT ON messages BEGIN
                INSERT INTO messages_fts(rowid, text_content) VALUES (new.row_id, new.text_content);
            END;
            CREATE TRIGGER IF NOT EXISTS messages_ad AFTER DELETE ON messages BEGIN
                INSERT INTO messages_fts(messages_fts, rowid, text_content) VALUES ('delete', old.row_id, old.text_content);
            END;

            CREATE TABLE IF NOT EXISTS tool_executions (
                row_id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                tool_name TEXT NOT NULL,
                input TEXT NOT NULL,
                result TEXT,
                error TEXT,
                execution_time_ms INTEGER NOT NULL,
                timestamp INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_tool_executions_session ON tool_executions(session_id);

            CREATE TABLE IF NOT EXISTS memory_snapshots (
                row_id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                text TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_memory_snapshots_session ON memory_snapshots(session_id, kind);
            "#,
        )?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(())
    }

    fn blocking<F, T>(&self, f: F) -> task::JoinHandle<Result<T, StorageError>>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        task::spawn_blocking(move || {
            let guard = conn.lock().unwrap();
            f(&guard)
        })
    }

    async fn run<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        self.blocking(f).await.map_err(|_| StorageError::Cancelled)?
    }
}

fn ts(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

fn from_ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}

fn visibility_str(v: SessionContext) -> &'static str {
    match v {
        SessionContext::Direct => "direct",
        SessionContext::Shared => "shared",
        SessionContext::Coordinator => "coordinator",
    }
}

fn parse_visibility(s: &str) -> SessionContext {
    match s {
        "shared" => SessionContext::Shared,
        "coordinator" => SessionContext::Coordinator,
        _ => SessionContext::Direct,
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn save_session(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let record = record.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO sessions
                 (id, agent_id, parent_session_id, context, created_at, updated_at, cost_usd, total_tokens)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id.as_str(),
                    record.agent_id.as_ref().map(|a| a.as_str()),
                    record.parent_session_id.as_ref().map(|s| s.as_str()),
                    serde_json::to_string(&record.context)?,
                    ts(record.created_at),
                    ts(record.updated_at),
                    record.totals.cost_usd.to_string(),
                    record.totals.total_tokens as i64,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn load_session(&self, id: &SessionId) -> Result<Option<SessionRecord>, StorageError> {
        let id = id.clone();
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, agent_id, parent_session_id, context, created_at, updated_at, cost_usd, total_tokens
                 FROM sessions WHERE id = ?1",
            )?;
            let mut rows = stmt.query(params![id.as_str()])?;
            let Some(row) = rows.next()? else { return Ok(None) };
            let context_raw: String = row.get(3)?;
            let cost_raw: String = row.get(6)?;
            Ok(Some(SessionRecord {
                id: SessionId::new(row.get::<_, String>(0)?),
                agent_id: row.get::<_, Option<String>>(1)?.map(AgentId::new),
                parent_session_id: row.get::<_, Option<String>>(2)?.map(SessionId::new),
                context: serde_json::from_str(&context_raw)?,
                created_at: from_ts(row.get(4)?),
                updated_at: from_ts(row.get(5)?),
                totals: SessionTotals {
                    cost_usd: cost_raw.parse().unwrap_or_default(),
                    total_tokens: row.get::<_, i64>(7)? as u64,
                },
            }))
        })
        .await
    }

    async fn delete_session(&self, id: &SessionId) -> Result<(), StorageError> {
        let hooks: Vec<Arc<dyn CleanupHook>> = self.cleanup_hooks.lock().unwrap().clone();
        for hook in &hooks {
            hook.on_session_deleted(id).await;
        }
        let id = id.clone();
        self.run(move |conn| {
            conn.execute("DELETE FROM sessions WHERE id = ?1", params![id.as_str()])?;
            conn.execute("DELETE FROM messages WHERE session_id = ?1", params![id.as_str()])?;
            conn.execute("DELETE FROM tool_executions WHERE session_id = ?1", params![id.as_str()])?;
            conn.execute("DELETE FROM memory_snapshots WHERE session_id = ?1", params![id.as_str()])?;
            Ok(())
        })
        .await
    }

    async fn list_sessions(&self) -> Result<Vec<SessionId>, StorageError> {
        self.run(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM sessions ORDER BY updated_at DESC")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ids.into_iter().map(SessionId::new).collect())
        })
        .await
    }

    async fn save_message(&self, record: &MessageRecord) -> Result<(), StorageError> {
        let record = record.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO messages
                 (session_id, role, visibility, content, text_content, timestamp, token_count, cost_usd)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.session_id.as_str(),
                    role_str(record.message.role),
                    visibility_str(record.message.session_context),
                    serde_json::to_string(&record.message.content)?,
                    record.message.as_text(),
                    ts(record.message.timestamp),
                    record.message.token_count as i64,
                    record.message.cost_usd.map(|d| d.to_string()),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn load_messages(&self, session_id: &SessionId) -> Result<Vec<MessageRecord>, StorageError> {
        let session_id = session_id.clone();
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT role, visibility, content, timestamp, token_count, cost_usd
                 FROM messages WHERE session_id = ?1 ORDER BY row_id ASC",
            )?;
            let rows = stmt.query_map(params![session_id.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })?;
            let mut out = Vec::new();
            for row in rows {
                let (role, visibility, content, timestamp, token_count, cost_usd) = row?;
                let content: Vec<ContentBlock> = serde_json::from_str(&content)?;
                out.push(MessageRecord {
                    session_id: session_id.clone(),
                    message: Message {
                        role: parse_role(&role),
                        content,
                        timestamp: from_ts(timestamp),
                        token_count: token_count as u32,
                        cost_usd: cost_usd.and_then(|s| s.parse().ok()),
                        session_context: parse_visibility(&visibility),
                    },
                });
            }
            Ok(out)
        })
        .await
    }

    async fn save_tool_execution(&self, record: &ToolExecutionRecord) -> Result<(), StorageError> {
        let record = record.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO tool_executions
                 (session_id, tool_name, input, result, error, execution_time_ms, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.session_id.as_str(),
                    record.tool_name,
                    record.input.to_string(),
                    record.result.as_ref().map(|v| v.to_string()),
                    record.error,
                    record.execution_time_ms as i64,
                    ts(record.timestamp),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn save_memory_snapshot(&self, snapshot: &MemorySnapshot) -> Result<(), StorageError> {
        let snapshot = snapshot.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO memory_snapshots (session_id, kind, text, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![snapshot.session_id.as_str(), snapshot.kind, snapshot.text, ts(snapshot.created_at)],
            )?;
            Ok(())
        })
        .await
    }

    async fn load_memory_snapshots(
        &self,
        session_id: &SessionId,
        kind: &str,
        limit: usize,
    ) -> Result<Vec<MemorySnapshot>, StorageError> {
        let session_id = session_id.clone();
        let kind = kind.to_string();
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT text, created_at FROM memory_snapshots
                 WHERE session_id = ?1 AND kind = ?2 ORDER BY row_id ASC LIMIT ?3",
            )?;
            let rows = stmt.query_map(params![session_id.as_str(), kind, limit as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            let mut out = Vec::new();
            for row in rows {
                let (text, created_at) = row?;
                out.push(MemorySnapshot {
                    session_id: session_id.clone(),
                    kind: kind.clone(),
                    text,
                    created_at: from_ts(created_at),
                });
            }
            Ok(out)
        })
        .await
    }

    async fn load_agent_sessions(&self, agent_id: &AgentId) -> Result<Vec<SessionId>, StorageError> {
        let agent_id = agent_id.clone();
        self.run(move |conn| {
            let mut stmt =
                conn.prepare("SELECT id FROM sessions WHERE agent_id = ?1 ORDER BY updated_at DESC")?;
            let ids = stmt
                .query_map(params![agent_id.as_str()], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ids.into_iter().map(SessionId::new).collect())
        })
        .await
    }

    async fn load_messages_for_agent(&self, agent_id: &AgentId) -> Result<Vec<MessageRecord>, StorageError> {
        let agent_id = agent_id.clone();
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT m.session_id, m.role, m.visibility, m.content, m.timestamp, m.token_count, m.cost_usd
                 FROM messages m
                 JOIN sessions s ON s.id = m.session_id
                 WHERE s.agent_id = ?1
                 ORDER BY m.timestamp ASC, m.row_id ASC",
            )?;
            let rows = stmt.query_map(params![agent_id.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            })?;
            let mut out = Vec::new();
            for row in rows {
                let (session_id, role, visibility, content, timestamp, token_count, cost_usd) = row?;
                let content: Vec<ContentBlock> = serde_json::from_str(&content)?;
                out.push(MessageRecord {
                    session_id: SessionId::new(session_id),
                    message: Message {
                        role: parse_role(&role),
                        content,
                        timestamp: from_ts(timestamp),
                        token_count: token_count as u32,
                        cost_usd: cost_usd.and_then(|s| s.parse().ok()),
                        session_context: parse_visibility(&visibility),
                    },
                });
            }
            Ok(out)
        })
        .await
    }

    async fn search_messages(
        &self,
        session_id: Option<&SessionId>,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, StorageError> {
        let session_id = session_id.cloned();
        let query = query.to_string();
        self.run(move |conn| {
            let mut out = Vec::new();
            match &session_id {
                Some(session_id) => {
                    let mut stmt = conn.prepare(
                        "SELECT m.session_id, m.role, m.visibility, m.content, m.timestamp, m.token_count, m.cost_usd, f.rank
                         FROM messages_fts f
                         JOIN messages m ON m.row_id = f.rowid
                         WHERE f.text_content MATCH ?1 AND m.session_id = ?2
                         ORDER BY f.rank LIMIT ?3",
                    )?;
                    let rows = stmt.query_map(params![query, session_id.as_str(), limit as i64], search_hit_row)?;
                    for row in rows {
                        out.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT m.session_id, m.role, m.visibility, m.content, m.timestamp, m.token_count, m.cost_usd, f.rank
                         FROM messages_fts f
                         JOIN messages m ON m.row_id = f.rowid
                         WHERE f.text_content MATCH ?1
                         ORDER BY f.rank LIMIT ?2",
                    )?;
                    let rows = stmt.query_map(params![query, limit as i64], search_hit_row)?;
                    for row in rows {
                        out.push(row?);
                    }
                }
            }
            Ok(out)
        })
        .await
    }

    async fn search_messages_for_agent(
        &self,
        agent_id: &AgentId,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, StorageError> {
        let agent_id = agent_id.clone();
        let query = query.to_string();
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT m.session_id, m.role, m.visibility, m.content, m.timestamp, m.token_count, m.cost_usd, f.rank
                 FROM messages_fts f
                 JOIN messages m ON m.row_id = f.rowid
                 JOIN sessions s ON s.id = m.session_id
                 WHERE f.text_content MATCH ?1 AND s.agent_id = ?2
                 ORDER BY f.rank LIMIT ?3",
            )?;
            let rows = stmt.query_map(params![query, agent_id.as_str(), limit as i64], search_hit_row)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
    }

    fn register_cleanup_hook(&self, hook: Arc<dyn CleanupHook>) {
        self.cleanup_hooks.lock().unwrap().push(hook);
    }
}

fn search_hit_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SearchHit> {
    let session_id: String = row.get(0)?;
    let role: String = row.get(1)?;
    let visibility: String = row.get(2)?;
    let content: String = row.get(3)?;
    let timestamp: i64 = row.get(4)?;
    let token_count: i64 = row.get(5)?;
    let cost_usd: Option<String> = row.get(6)?;
    let score: f64 = row.get(7)?;
    let content: Vec<ContentBlock> = serde_json::from_str(&content).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(SearchHit {
        record: MessageRecord {
            session_id: SessionId::new(session_id),
            message: Message {
                role: parse_role(&role),
                content,
                timestamp: from_ts(timestamp),
                token_count: token_count as u32,
                cost_usd: cost_usd.and_then(|s| s.parse().ok()),
                session_context: parse_visibility(&visibility),
            },
        },
        score,
    })
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn parse_role(s: &str) -> Role {
    match s {
        "system" => Role::System,
        "assistant" => Role::Assistant,
        "tool" => Role::Tool,
        _ => Role::User,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_record(id: &str) -> SessionRecord {
        SessionRecord::new(SessionId::new(id), None, None)
    }

    #[tokio::test]
    async fn save_and_load_session_roundtrips() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        let record = session_record("s1");
        store.save_session(&record).await.unwrap();
        let loaded = store.load_session(&record.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, record.id);
    }

    #[tokio::test]
    async fn messages_roundtrip_in_order() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        let session_id = SessionId::new("s1");
        store.save_session(&session_record("s1")).await.unwrap();
        store
            .save_message(&MessageRecord { session_id: session_id.clone(), message: Message::user("hi") })
            .await
            .unwrap();
        store
            .save_message(&MessageRecord { session_id: session_id.clone(), message: Message::assistant("hello") })
            .await
            .unwrap();
        let messages = store.load_messages(&session_id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].message.as_text(), "hi");
        assert_eq!(messages[1].message.as_text(), "hello");
    }

    #[tokio::test]
    async fn parent_session_hides_direct_messages() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        let parent = SessionId::new("parent");
        store.save_session(&session_record("parent")).await.unwrap();
        let mut direct = Message::user("private");
        direct.session_context = SessionContext::Direct;
        let mut shared = Message::assistant("visible to subagents");
        shared.session_context = SessionContext::Shared;
        store.save_message(&MessageRecord { session_id: parent.clone(), message: direct }).await.unwrap();
        store.save_message(&MessageRecord { session_id: parent.clone(), message: shared }).await.unwrap();

        let visible = store.load_messages_from_parent_session(&parent).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].message.as_text(), "visible to subagents");
    }

    #[tokio::test]
    async fn full_text_search_finds_matching_message() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        let session_id = SessionId::new("s1");
        store.save_session(&session_record("s1")).await.unwrap();
        store
            .save_message(&MessageRecord {
                session_id: session_id.clone(),
                message: Message::user("the quarterly revenue report is attached"),
            })
            .await
            .unwrap();
        store
            .save_message(&MessageRecord { session_id: session_id.clone(), message: Message::assistant("noted") })
            .await
            .unwrap();

        let hits = store.search_messages(Some(&session_id), "revenue", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].record.message.as_text().contains("revenue"));
    }

    #[tokio::test]
    async fn messages_for_agent_are_ordered_by_timestamp_across_sessions() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        let agent_id = AgentId::new("a1");
        let session_a = SessionId::new("a");
        let session_b = SessionId::new("b");
        // Session B is the most-recently-updated session, but its messages
        // interleave with session A's by timestamp.
        store.save_session(&SessionRecord::new(session_a.clone(), Some(agent_id.clone()), None)).await.unwrap();
        store.save_session(&SessionRecord::new(session_b.clone(), Some(agent_id.clone()), None)).await.unwrap();

        let mut m1 = Message::user("a-t1");
        m1.timestamp = Utc.timestamp_opt(1, 0).unwrap();
        let mut m5 = Message::user("a-t5");
        m5.timestamp = Utc.timestamp_opt(5, 0).unwrap();
        let mut m2 = Message::user("b-t2");
        m2.timestamp = Utc.timestamp_opt(2, 0).unwrap();
        let mut m3 = Message::user("b-t3");
        m3.timestamp = Utc.timestamp_opt(3, 0).unwrap();

        store.save_message(&MessageRecord { session_id: session_a.clone(), message: m1 }).await.unwrap();
        store.save_message(&MessageRecord { session_id: session_a.clone(), message: m5 }).await.unwrap();
        store.save_message(&MessageRecord { session_id: session_b.clone(), message: m2 }).await.unwrap();
        store.save_message(&MessageRecord { session_id: session_b.clone(), message: m3 }).await.unwrap();

        let messages = store.load_messages_for_agent(&agent_id).await.unwrap();
        let texts: Vec<&str> = messages.iter().map(|r| r.message.as_text()).collect();
        assert_eq!(texts, vec!["a-t1", "b-t2", "b-t3", "a-t5"]);
    }

    #[tokio::test]
    async fn load_memory_snapshots_respects_limit() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        let session_id = SessionId::new("s1");
        store.save_session(&session_record("s1")).await.unwrap();
        for i in 0..5 {
            store
                .save_memory_snapshot(&MemorySnapshot {
                    session_id: session_id.clone(),
                    kind: "l2_summary".to_string(),
                    text: format!("snapshot {i}"),
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        let snapshots = store.load_memory_snapshots(&session_id, "l2_summary", 2).await.unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].text, "snapshot 0");
    }

    #[tokio::test]
    async fn search_messages_for_agent_spans_its_sessions_only() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        let agent_id = AgentId::new("a1");
        let session_a = SessionId::new("a");
        let other_session = SessionId::new("other");
        store.save_session(&SessionRecord::new(session_a.clone(), Some(agent_id.clone()), None)).await.unwrap();
        store.save_session(&session_record("other")).await.unwrap();

        store
            .save_message(&MessageRecord { session_id: session_a.clone(), message: Message::user("quarterly revenue up") })
            .await
            .unwrap();
        store
            .save_message(&MessageRecord { session_id: other_session.clone(), message: Message::user("revenue in another agent's session") })
            .await
            .unwrap();

        let hits = store.search_messages_for_agent(&agent_id, "revenue", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.session_id, session_a);
    }

    #[tokio::test]
    async fn search_messages_without_session_id_searches_globally() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        store.save_session(&session_record("s1")).await.unwrap();
        store.save_session(&session_record("s2")).await.unwrap();
        store
            .save_message(&MessageRecord { session_id: SessionId::new("s1"), message: Message::user("revenue report") })
            .await
            .unwrap();
        store
            .save_message(&MessageRecord { session_id: SessionId::new("s2"), message: Message::user("revenue forecast") })
            .await
            .unwrap();

        let hits = store.search_messages(None, "revenue", 10).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn delete_session_runs_cleanup_hooks_and_removes_rows() {
        use std::sync::atomic::{AtomicBool, Ordering};

        struct Flag(Arc<AtomicBool>);
        #[async_trait]
        impl CleanupHook for Flag {
            async fn on_session_deleted(&self, _session_id: &SessionId) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let store = SqliteSessionStore::open_in_memory().unwrap();
        let called = Arc::new(AtomicBool::new(false));
        store.register_cleanup_hook(Arc::new(Flag(Arc::clone(&called))));
        let session_id = SessionId::new("s1");
        store.save_session(&session_record("s1")).await.unwrap();
        store.delete_session(&session_id).await.unwrap();

        assert!(called.load(Ordering::SeqCst));
        assert!(store.load_session(&session_id).await.unwrap().is_none());
    }
}
