//! The Conversation Loop's return type.

use agentflow_types::{StopReason, TokenUsage, ToolExecutionRecord};

/// Bookkeeping about how a loop run ended.
#[derive(Debug, Clone, Default)]
pub struct ResponseMetadata {
    /// Turns consumed.
    pub turns: u32,
    /// Tool executions consumed.
    pub tool_executions: u32,
    /// Why the final LLM call stopped, absent only if synthesis itself
    /// never received a response (`synthesis_error` is set instead).
    pub stop_reason: Option<StopReason>,
    /// Whether the loop hit `max_turns` before the model stopped on its own.
    pub max_turns_hit: bool,
    /// Whether the loop hit `max_tool_executions` before the model stopped on its own.
    pub max_exec_hit: bool,
    /// Whether the returned content came from the forced synthesis turn.
    pub synthesized: bool,
    /// Set when the forced synthesis call itself failed; `content` then
    /// carries the configured fallback guidance instead of the LLM's text.
    pub synthesis_error: Option<String>,
}

/// The result of one `AgentLoop::run` call.
#[derive(Debug, Clone)]
pub struct Response {
    /// Final assistant-facing text.
    pub content: String,
    /// Token usage accumulated across every completion this run.
    pub usage: TokenUsage,
    /// Every tool execution recorded this run, in call order.
    pub tool_executions: Vec<ToolExecutionRecord>,
    /// Loop bookkeeping.
    pub metadata: ResponseMetadata,
}
