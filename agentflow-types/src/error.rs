//! The runtime-level error vocabulary.
//!
//! Per-crate concerns (`agentflow_store::StorageError`, `agentflow_tool::ToolError`,
//! `agentflow_memory::ProfileError`, ...) keep their own narrower enums; this
//! is the vocabulary the conversation loop surfaces to its caller, exactly
//! the ten kinds named by the runtime's error design.

use thiserror::Error;

/// The ten runtime-level error kinds.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Malformed input to a tool or operation.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// What was wrong.
        message: String,
        /// Remedial suggestion, if any.
        suggestion: Option<String>,
    },

    /// A session, reference, or snapshot was missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// A token-budget operation (use, promote) was denied for lack of room.
    #[error("budget exceeded: requested {requested}, available {available}")]
    BudgetExceeded {
        /// Tokens requested.
        requested: u64,
        /// Tokens available at the time of the request.
        available: u64,
    },

    /// A tool wrapper (MCP) truncated its own output; no reference was created.
    #[error("tool output truncated by wrapper")]
    Truncated,

    /// A tool returned `success: false` with its own code/message.
    #[error("tool failure [{code}]: {message}")]
    McpFailure {
        /// Tool-reported code.
        code: String,
        /// Tool-reported message.
        message: String,
    },

    /// A circuit breaker short-circuited the request.
    #[error("circuit open for tool {tool}")]
    CircuitOpen {
        /// The tool whose breaker is open.
        tool: String,
    },

    /// The LLM repeatedly hit `max_tokens` with truncated tool calls.
    #[error("output exhausted: {count} consecutive truncations, threshold {threshold} ({config_key})")]
    OutputExhausted {
        /// Consecutive truncation count observed.
        count: u32,
        /// Configured threshold that was reached.
        threshold: u32,
        /// Name of the configuration key controlling this threshold.
        config_key: &'static str,
    },

    /// A permission checker denied the call.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A retriable storage or network error.
    #[error("transient io error: {0}")]
    TransientIo(String),

    /// An unrecoverable runtime failure.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl RuntimeError {
    /// Whether the caller may reasonably retry the operation that produced
    /// this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, RuntimeError::TransientIo(_) | RuntimeError::CircuitOpen { .. })
    }

    /// Whether this error aborts the conversation loop outright, per the
    /// propagation rules: only `OutputExhausted` and `Fatal` abort; every
    /// other kind is recorded and fed back to the model as a tool result.
    #[must_use]
    pub fn aborts_loop(&self) -> bool {
        matches!(self, RuntimeError::OutputExhausted { .. } | RuntimeError::Fatal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_output_exhausted_and_fatal_abort() {
        assert!(RuntimeError::Fatal("x".into()).aborts_loop());
        assert!(RuntimeError::OutputExhausted { count: 3, threshold: 3, config_key: "output_token_cb_threshold" }.aborts_loop());
        assert!(!RuntimeError::NotFound("x".into()).aborts_loop());
        assert!(!RuntimeError::PermissionDenied("x".into()).aborts_loop());
    }

    #[test]
    fn transient_io_and_circuit_open_are_retryable() {
        assert!(RuntimeError::TransientIo("timeout".into()).is_retryable());
        assert!(RuntimeError::CircuitOpen { tool: "bash".into() }.is_retryable());
        assert!(!RuntimeError::Fatal("x".into()).is_retryable());
    }
}
