//! Persistable session records.
//!
//! These are the rows the session store reads and writes. The live,
//! in-memory `Session` aggregate (owning a `SegmentedMemory` and a
//! `FailureTracker`) is built on top of `SessionRecord` by the memory
//! manager — kept separate here so this crate has no dependency on the
//! memory or storage crates.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::content::{Message, SessionContext};
use crate::id::{AgentId, SessionId};

/// Running totals tracked per session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionTotals {
    /// Cumulative cost across every completion in this session.
    pub cost_usd: Decimal,
    /// Cumulative input + output tokens across every completion.
    pub total_tokens: u64,
}

/// Durable row for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Caller-supplied session identifier.
    pub id: SessionId,
    /// Owning agent, if known.
    pub agent_id: Option<AgentId>,
    /// Parent session, for sub-agent sessions.
    pub parent_session_id: Option<SessionId>,
    /// Free-form context map (caller-defined key/value pairs).
    pub context: serde_json::Map<String, serde_json::Value>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
    /// Running cost/token totals.
    pub totals: SessionTotals,
}

impl SessionRecord {
    /// Create a fresh record for a session seen for the first time.
    pub fn new(id: SessionId, agent_id: Option<AgentId>, parent_session_id: Option<SessionId>) -> Self {
        let now = Utc::now();
        Self {
            id,
            agent_id,
            parent_session_id,
            context: serde_json::Map::new(),
            created_at: now,
            updated_at: now,
            totals: SessionTotals::default(),
        }
    }
}

/// A recorded tool execution, success or failure.
///
/// An MCP tool that returns `success: false` with no accompanying
/// language-level error is still recorded here as a failure — see
/// `ToolOutput::success` in `agentflow_types::tool`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecutionRecord {
    /// Owning session.
    pub session_id: SessionId,
    /// Tool name.
    pub tool_name: String,
    /// Input arguments, as JSON.
    pub input: serde_json::Value,
    /// Result payload, as JSON, when the call succeeded.
    pub result: Option<serde_json::Value>,
    /// Error message, when the call failed (language-level or MCP `success: false`).
    pub error: Option<String>,
    /// Wall-clock execution time.
    pub execution_time_ms: u64,
    /// When this execution completed.
    pub timestamp: DateTime<Utc>,
}

/// A memory snapshot persisted to swap (kind `"l2_summary"`, or caller-defined).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySnapshot {
    /// Owning session.
    pub session_id: SessionId,
    /// Snapshot kind, e.g. `"l2_summary"`.
    pub kind: String,
    /// Snapshot text.
    pub text: String,
    /// When this snapshot was written.
    pub created_at: DateTime<Utc>,
}

/// A persisted message row, mirroring `Message` plus its session linkage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Owning session.
    pub session_id: SessionId,
    /// The message itself.
    pub message: Message,
}

impl MessageRecord {
    /// Visibility tag, convenience accessor over `message.session_context`.
    pub fn visibility(&self) -> SessionContext {
        self.message.session_context
    }
}
