//! The live, in-memory `Session` aggregate: a session's identity plus its
//! segmented memory and failure tracker, as owned by the Memory Manager.

use std::sync::Mutex;

use agentflow_failure::FailureTracker;
use agentflow_types::{AgentId, SessionId, SessionTotals};

use crate::segmented::SegmentedMemory;

/// A live session: identity, running totals, and the two per-session
/// subsystems built on top of it (memory, failure tracking).
///
/// Mutated only through the Memory Manager that owns it — see §3's
/// "mutated only via Memory Manager" rule — this type has no public
/// constructor outside `crate::manager`.
pub struct Session {
    id: SessionId,
    agent_id: Mutex<Option<AgentId>>,
    parent_session_id: Mutex<Option<SessionId>>,
    totals: Mutex<SessionTotals>,
    memory: SegmentedMemory,
    failure_tracker: FailureTracker,
}

impl Session {
    pub(crate) fn new(
        id: SessionId,
        agent_id: Option<AgentId>,
        parent_session_id: Option<SessionId>,
        memory: SegmentedMemory,
    ) -> Self {
        Self {
            id,
            agent_id: Mutex::new(agent_id),
            parent_session_id: Mutex::new(parent_session_id),
            totals: Mutex::new(SessionTotals::default()),
            memory,
            failure_tracker: FailureTracker::new(),
        }
    }

    /// This session's identifier.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Owning agent, if known.
    pub fn agent_id(&self) -> Option<AgentId> {
        self.agent_id.lock().unwrap().clone()
    }

    /// Set the owning agent, only if previously unset.
    pub(crate) fn set_agent_id_if_empty(&self, agent_id: AgentId) -> bool {
        let mut current = self.agent_id.lock().unwrap();
        if current.is_none() {
            *current = Some(agent_id);
            true
        } else {
            false
        }
    }

    /// Parent session, for sub-agent sessions.
    pub fn parent_session_id(&self) -> Option<SessionId> {
        self.parent_session_id.lock().unwrap().clone()
    }

    /// Set the parent session, only if previously unset.
    pub(crate) fn set_parent_session_id_if_empty(&self, parent: SessionId) -> bool {
        let mut current = self.parent_session_id.lock().unwrap();
        if current.is_none() {
            *current = Some(parent);
            true
        } else {
            false
        }
    }

    /// This session's segmented memory.
    pub fn memory(&self) -> &SegmentedMemory {
        &self.memory
    }

    /// This session's failure tracker.
    pub fn failure_tracker(&self) -> &FailureTracker {
        &self.failure_tracker
    }

    /// Running cost/token totals.
    pub fn totals(&self) -> SessionTotals {
        self.totals.lock().unwrap().clone()
    }

    /// Add to the running totals after a completion.
    pub fn record_usage(&self, cost_usd: rust_decimal::Decimal, tokens: u64) {
        let mut totals = self.totals.lock().unwrap();
        totals.cost_usd += cost_usd;
        totals.total_tokens += tokens;
    }
}
