//! Structured error surface (C12): full tool-error detail is stored here,
//! keyed by [`ErrorId`], and summarized inline for the model. The full
//! detail is fetched back only through the progressively registered
//! `get_error_details` tool.

use std::collections::HashMap;
use std::sync::Mutex;

use agentflow_types::{ErrorId, SessionId, ToolErrorDetail};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// A structured error recorded by the Tool Executor.
#[derive(Debug, Clone)]
pub struct StoredError {
    /// Identifier handed to the model in place of the full detail.
    pub id: ErrorId,
    /// Owning session.
    pub session_id: SessionId,
    /// Tool that produced the error.
    pub tool_name: String,
    /// Full structured detail.
    pub detail: ToolErrorDetail,
    /// When the error was recorded.
    pub created_at: DateTime<Utc>,
}

/// Keyed store of [`StoredError`]s, backing the `get_error_details` tool.
#[derive(Default)]
pub struct ErrorStore {
    entries: Mutex<HashMap<ErrorId, StoredError>>,
}

impl ErrorStore {
    /// Build an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a tool error, returning the id the model is given in its place.
    pub fn record(&self, session_id: &SessionId, tool_name: &str, detail: ToolErrorDetail) -> ErrorId {
        let id = Self::derive_id(session_id, tool_name, &detail);
        let entry = StoredError {
            id: id.clone(),
            session_id: session_id.clone(),
            tool_name: tool_name.to_string(),
            detail,
            created_at: Utc::now(),
        };
        self.entries.lock().unwrap().insert(id.clone(), entry);
        id
    }

    /// Fetch the full detail for a previously recorded error.
    pub fn get(&self, id: &ErrorId) -> Option<StoredError> {
        self.entries.lock().unwrap().get(id).cloned()
    }

    fn derive_id(session_id: &SessionId, tool_name: &str, detail: &ToolErrorDetail) -> ErrorId {
        let mut hasher = Sha256::new();
        hasher.update(session_id.as_str().as_bytes());
        hasher.update(tool_name.as_bytes());
        hasher.update(detail.code.as_bytes());
        hasher.update(detail.message.as_bytes());
        hasher.update(Utc::now().timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
        ErrorId::new(format!("err_{:x}", hasher.finalize()))
    }
}
