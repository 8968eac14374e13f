//! Tool-facing wire types: definitions handed to the model, output payloads
//! handed back, and the runtime context injected into every call.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::id::{AgentId, SessionId};
use crate::provider::CacheControl;

/// Definition of a tool, as advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Description shown to the model.
    pub description: String,
    /// JSON Schema for the tool's input.
    pub input_schema: serde_json::Value,
    /// Backend identifier; empty string means backend-agnostic.
    pub backend: String,
    /// Optional prompt-cache control for this definition.
    pub cache_control: Option<CacheControl>,
}

/// A tagged union over the shapes a tool result payload can take.
///
/// Preferred over a raw `serde_json::Value` per the runtime's payload
/// convention — each variant carries the preview/schema shape the large
/// result path (`agentflow-store`) needs without re-inspecting the value.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolResultPayload {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
    /// A JSON object.
    JsonObject {
        /// The object.
        value: serde_json::Map<String, serde_json::Value>,
    },
    /// A JSON array.
    JsonArray {
        /// The array elements.
        value: Vec<serde_json::Value>,
    },
    /// Tabular data with a header row.
    CsvTable {
        /// Column headers.
        headers: Vec<String>,
        /// Row data.
        rows: Vec<Vec<String>>,
    },
    /// Raw binary data, described but not inlined.
    Binary {
        /// Declared content type.
        content_type: String,
        /// Size in bytes.
        size: usize,
    },
}

impl ToolResultPayload {
    /// Approximate size in bytes, used to decide whether this payload needs
    /// to go through the large-object store.
    pub fn approx_len(&self) -> usize {
        match self {
            ToolResultPayload::Text { text } => text.len(),
            ToolResultPayload::JsonObject { value } => {
                serde_json::to_string(value).map(|s| s.len()).unwrap_or(0)
            }
            ToolResultPayload::JsonArray { value } => {
                serde_json::to_string(value).map(|s| s.len()).unwrap_or(0)
            }
            ToolResultPayload::CsvTable { headers, rows } => {
                headers.iter().map(String::len).sum::<usize>()
                    + rows.iter().flatten().map(String::len).sum::<usize>()
            }
            ToolResultPayload::Binary { size, .. } => *size,
        }
    }
}

/// Structured detail accompanying a tool error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolErrorDetail {
    /// A short machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Optional remedial suggestion for the model.
    pub suggestion: Option<String>,
}

/// Output from a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Whether the tool call succeeded.
    pub success: bool,
    /// The payload, present even on failure when the tool has partial output.
    pub data: Option<ToolResultPayload>,
    /// Structured error detail, present when `success` is false.
    pub error: Option<ToolErrorDetail>,
    /// Free-form metadata (MCP `truncated` flag, row/column counts, etc.).
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Wall-clock execution time.
    pub execution_time_ms: u64,
}

impl ToolOutput {
    /// Whether an MCP wrapper has already truncated this result — the large
    /// result path must not additionally store it as a reference.
    pub fn is_wrapper_truncated(&self) -> bool {
        self.metadata
            .get("truncated")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }
}

/// Reports progress for long-running tool operations.
pub trait ProgressReporter: Send + Sync {
    /// Report progress. `total` enables percentage display when known.
    fn report(&self, progress: f64, total: Option<f64>, message: Option<&str>);
}

/// Runtime context injected into every tool call.
pub struct ToolContext {
    /// Current working directory for tools that touch the filesystem.
    pub cwd: PathBuf,
    /// Session this call belongs to.
    pub session_id: SessionId,
    /// Agent this call belongs to, if known.
    pub agent_id: Option<AgentId>,
    /// Environment variables visible to the tool.
    pub environment: HashMap<String, String>,
    /// Cooperative cancellation token, checked at every suspension point.
    pub cancellation_token: CancellationToken,
    /// Progress callback, propagated so nested tools can also emit.
    pub progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

impl ToolContext {
    /// Build a context for the given session, with no agent identity yet.
    pub fn new(session_id: SessionId) -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/tmp")),
            session_id,
            agent_id: None,
            environment: HashMap::new(),
            cancellation_token: CancellationToken::new(),
            progress_reporter: None,
        }
    }

    /// Attach an agent identity.
    #[must_use]
    pub fn with_agent(mut self, agent_id: AgentId) -> Self {
        self.agent_id = Some(agent_id);
        self
    }
}

/// A stage of loop progress, emitted through the context's progress callback.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A pattern recommendation was selected (or skipped) before the loop began.
    PatternSelection,
    /// A turn's LLM call is in flight.
    LlmGeneration {
        /// Turn index, zero-based.
        turn: u32,
    },
    /// A tool call is executing.
    ToolExecution {
        /// Tool name.
        name: String,
    },
    /// A tool call is waiting on a human decision.
    HumanInTheLoop {
        /// Tool name.
        name: String,
    },
    /// The synthesis turn (no tools) is in flight.
    Synthesis,
    /// The loop failed.
    Failed {
        /// Error message.
        message: String,
    },
    /// The loop completed successfully.
    Completed,
}
