//! Middleware chain wrapping tool execution.
//!
//! Mirrors axum's `from_fn` shape: each middleware receives a [`Next`] it can
//! call to continue the chain, or skip to short-circuit. The permission
//! check step of the tool executor (C9 step 3) is implemented as one such
//! middleware in `agentflow-runtime`, not hard-coded here.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use agentflow_types::ToolContext;

use crate::error::ToolError;
use crate::registry::ToolDyn;

/// A tool call in flight through the middleware pipeline.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Identifier assigned by the model.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Input arguments.
    pub input: serde_json::Value,
}

type BoxedOutputFuture<'a> =
    Pin<Box<dyn Future<Output = Result<agentflow_types::ToolOutput, ToolError>> + Send + 'a>>;

/// Middleware wrapping tool execution with a cross-cutting concern
/// (permission checks, circuit breaking, logging).
pub trait ToolMiddleware: Send + Sync {
    /// Process a call, optionally delegating to the rest of the chain.
    fn process<'a>(&'a self, call: &'a ToolCall, ctx: &'a ToolContext, next: Next<'a>) -> BoxedOutputFuture<'a>;
}

/// The remaining middleware chain plus the underlying tool. Consumed on use
/// to prevent double invocation.
pub struct Next<'a> {
    tool: &'a dyn ToolDyn,
    middleware: &'a [Arc<dyn ToolMiddleware>],
}

impl<'a> Next<'a> {
    /// Build a `Next` over the given tool and the remaining middleware slice.
    pub fn new(tool: &'a dyn ToolDyn, middleware: &'a [Arc<dyn ToolMiddleware>]) -> Self {
        Self { tool, middleware }
    }

    /// Continue the chain, eventually calling the tool itself.
    pub async fn run(self, call: &'a ToolCall, ctx: &'a ToolContext) -> Result<agentflow_types::ToolOutput, ToolError> {
        if let Some((head, tail)) = self.middleware.split_first() {
            let next = Next::new(self.tool, tail);
            head.process(call, ctx, next).await
        } else {
            self.tool.call(call.input.clone(), ctx).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentflow_types::{SessionId, ToolDefinition, ToolOutput, ToolResultPayload};
    use serde_json::json;

    struct NoopTool;

    impl ToolDyn for NoopTool {
        fn name(&self) -> &str {
            "noop"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "noop".into(),
                description: String::new(),
                input_schema: json!({}),
                backend: String::new(),
                cache_control: None,
            }
        }

        fn call(
            &self,
            _input: serde_json::Value,
            _ctx: &ToolContext,
        ) -> Pin<Box<dyn Future<Output = Result<ToolOutput, ToolError>> + Send + '_>> {
            Box::pin(async {
                Ok(ToolOutput {
                    success: true,
                    data: Some(ToolResultPayload::Text { text: "ok".into() }),
                    error: None,
                    metadata: serde_json::Map::new(),
                    execution_time_ms: 0,
                })
            })
        }
    }

    struct DenyAll;

    impl ToolMiddleware for DenyAll {
        fn process<'a>(&'a self, _call: &'a ToolCall, _ctx: &'a ToolContext, _next: Next<'a>) -> BoxedOutputFuture<'a> {
            Box::pin(async { Err(ToolError::PermissionDenied("policy".into())) })
        }
    }

    #[tokio::test]
    async fn middleware_can_short_circuit() {
        let tool = NoopTool;
        let middleware: Vec<Arc<dyn ToolMiddleware>> = vec![Arc::new(DenyAll)];
        let call = ToolCall { id: "t1".into(), name: "noop".into(), input: json!({}) };
        let ctx = ToolContext::new(SessionId::new("s1"));
        let next = Next::new(&tool, &middleware);
        let result = next.run(&call, &ctx).await;
        assert!(matches!(result, Err(ToolError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn empty_chain_calls_tool_directly() {
        let tool = NoopTool;
        let middleware: Vec<Arc<dyn ToolMiddleware>> = Vec::new();
        let call = ToolCall { id: "t1".into(), name: "noop".into(), input: json!({}) };
        let ctx = ToolContext::new(SessionId::new("s1"));
        let next = Next::new(&tool, &middleware);
        let result = next.run(&call, &ctx).await.unwrap();
        assert!(result.success);
    }
}
