//! Optional permission-check step of the Tool Executor (C9 step 3).

use agentflow_types::ToolContext;
use async_trait::async_trait;

/// Injected collaborator consulted before every tool call. Absence means
/// every call is permitted.
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    /// Decide whether `tool_name` may run with `input` in `ctx`. `Err`
    /// carries the denial reason surfaced as `RuntimeError::PermissionDenied`.
    async fn check(&self, tool_name: &str, input: &serde_json::Value, ctx: &ToolContext) -> Result<(), String>;
}
