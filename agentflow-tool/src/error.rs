//! Errors from tool registry and dispatch operations.

use thiserror::Error;

/// Errors surfaced by [`crate::ToolRegistry`] and [`crate::ToolDyn`] callers.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool is registered under the requested name.
    #[error("tool not registered: {0}")]
    NotRegistered(String),
    /// The input provided to the tool was invalid.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Tool execution failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    /// An injected permission checker denied the call.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// The call was cancelled via its context's cancellation token.
    #[error("cancelled")]
    Cancelled,
}
