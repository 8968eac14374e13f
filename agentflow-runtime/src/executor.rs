//! Tool Executor (C9): the five-step `execute` algorithm over a
//! [`ToolRegistry`], with identity injection, optional permission/circuit
//! breaker gates, and the large-result reference path.

use std::sync::Arc;
use std::time::Instant;

use agentflow_failure::CircuitBreaker;
use agentflow_store::{LargeObjectStore, ObjectStoreError};
use agentflow_types::{
    AgentId, ErrorId, ReferenceId, RuntimeError, SessionId, ToolCall, ToolContext, ToolDefinition,
    ToolErrorDetail, ToolOutput, ToolResultPayload,
};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{from_object_store_error, from_tool_error};
use crate::error_details_tool::GetErrorDetailsTool;
use crate::error_store::ErrorStore;
use crate::permission::PermissionChecker;
use crate::query_tool_result::QueryToolResultTool;
use crate::reference_tracker::ReferenceTracker;
use crate::well_known::{GET_ERROR_DETAILS_NAME, QUERY_TOOL_RESULT_NAME};
use agentflow_tool::ToolRegistry;

/// Payloads larger than this many bytes are stored via the Large-Object
/// Store and replaced with a summary, unless already wrapper-truncated.
pub const DEFAULT_LARGE_RESULT_THRESHOLD_BYTES: usize = 8 * 1024;

/// Everything the Tool Executor produced for one call: the (possibly
/// reference-summarized) output on success, or the error the loop should
/// record and feed back, plus the id the error was filed under so
/// `get_error_details` can fetch it back.
pub struct ExecutionOutcome {
    /// The tool's output, present whenever the tool itself ran (even if it
    /// reported `success: false`).
    pub output: Option<ToolOutput>,
    /// Set when the call never produced an output: unregistered tool,
    /// permission denial, or open circuit breaker.
    pub error: Option<RuntimeError>,
    /// Id under which a structured error was filed, if any.
    pub error_id: Option<ErrorId>,
    /// Wall-clock time spent in this call.
    pub execution_time_ms: u64,
}

impl ExecutionOutcome {
    /// Whether this call failed, by either path (executor-level error or
    /// `output.success == false`).
    pub fn is_error(&self) -> bool {
        self.error.is_some() || self.output.as_ref().is_some_and(|o| !o.success)
    }
}

/// Holds the tool registry and the collaborators the five-step `execute`
/// algorithm consults: an optional permission checker, an optional circuit
/// breaker, the large-object store and reference tracker for the oversized
/// result path, and the error store backing `get_error_details`.
pub struct ToolExecutor {
    registry: RwLock<ToolRegistry>,
    large_objects: Arc<LargeObjectStore>,
    reference_tracker: Arc<ReferenceTracker>,
    error_store: Arc<ErrorStore>,
    permission_checker: Option<Arc<dyn PermissionChecker>>,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
    large_result_threshold_bytes: usize,
}

impl ToolExecutor {
    /// Build an executor over the given registry and large-object/error
    /// collaborators, with no permission checker or circuit breaker.
    pub fn new(
        registry: ToolRegistry,
        large_objects: Arc<LargeObjectStore>,
        reference_tracker: Arc<ReferenceTracker>,
        error_store: Arc<ErrorStore>,
    ) -> Self {
        Self {
            registry: RwLock::new(registry),
            large_objects,
            reference_tracker,
            error_store,
            permission_checker: None,
            circuit_breaker: None,
            large_result_threshold_bytes: DEFAULT_LARGE_RESULT_THRESHOLD_BYTES,
        }
    }

    /// Install a permission checker consulted before every call.
    #[must_use]
    pub fn with_permission_checker(mut self, checker: Arc<dyn PermissionChecker>) -> Self {
        self.permission_checker = Some(checker);
        self
    }

    /// Install a per-tool circuit breaker.
    #[must_use]
    pub fn with_circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = Some(breaker);
        self
    }

    /// Override the large-result threshold.
    #[must_use]
    pub fn with_large_result_threshold_bytes(mut self, threshold: usize) -> Self {
        self.large_result_threshold_bytes = threshold;
        self
    }

    /// Tool definitions for every currently registered tool, including the
    /// two progressive-disclosure tools once lazily registered.
    pub async fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.registry.read().await.definitions()
    }

    /// Run the five-step executor algorithm for one tool call.
    pub async fn execute(
        &self,
        ctx: &mut ToolContext,
        call: &ToolCall,
        session_id: &SessionId,
        agent_id: Option<&AgentId>,
    ) -> ExecutionOutcome {
        ctx.session_id = session_id.clone();
        ctx.agent_id = agent_id.cloned();

        let tool = { self.registry.read().await.get(&call.name).cloned() };
        let Some(tool) = tool else {
            let detail = ToolErrorDetail {
                code: "not_registered".to_string(),
                message: format!("tool not registered: {}", call.name),
                suggestion: None,
            };
            let error_id = self.record_error(session_id, &call.name, detail).await;
            return ExecutionOutcome {
                output: None,
                error: Some(RuntimeError::NotFound(format!("tool not registered: {}", call.name))),
                error_id: Some(error_id),
                execution_time_ms: 0,
            };
        };

        if let Some(checker) = &self.permission_checker {
            if let Err(reason) = checker.check(&call.name, &call.input, ctx).await {
                let detail = ToolErrorDetail {
                    code: "permission_denied".to_string(),
                    message: reason.clone(),
                    suggestion: None,
                };
                let error_id = self.record_error(session_id, &call.name, detail).await;
                return ExecutionOutcome {
                    output: None,
                    error: Some(RuntimeError::PermissionDenied(reason)),
                    error_id: Some(error_id),
                    execution_time_ms: 0,
                };
            }
        }

        if let Some(breaker) = &self.circuit_breaker {
            if let Err(err) = breaker.check(&call.name) {
                let detail =
                    ToolErrorDetail { code: "circuit_open".to_string(), message: err.to_string(), suggestion: None };
                let error_id = self.record_error(session_id, &call.name, detail).await;
                return ExecutionOutcome { output: None, error: Some(err), error_id: Some(error_id), execution_time_ms: 0 };
            }
        }

        let started = Instant::now();
        let result = tool.call(call.input.clone(), ctx).await;
        let execution_time_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(mut output) => {
                output.execution_time_ms = execution_time_ms;
                if let Some(breaker) = &self.circuit_breaker {
                    if output.success {
                        breaker.record_success(&call.name);
                    } else {
                        breaker.record_failure(&call.name);
                    }
                }

                let error_id = if output.success {
                    None
                } else {
                    let detail = output.error.clone().unwrap_or_else(|| ToolErrorDetail {
                        code: "tool_failure".to_string(),
                        message: "tool reported failure".to_string(),
                        suggestion: None,
                    });
                    Some(self.record_error(session_id, &call.name, detail).await)
                };

                let output = self.maybe_store_large_result(session_id, &call.name, output).await;
                ExecutionOutcome { output: Some(output), error: None, error_id, execution_time_ms }
            }
            Err(err) => {
                if let Some(breaker) = &self.circuit_breaker {
                    breaker.record_failure(&call.name);
                }
                let runtime_err = from_tool_error(err);
                let detail =
                    ToolErrorDetail { code: "tool_error".to_string(), message: runtime_err.to_string(), suggestion: None };
                let error_id = self.record_error(session_id, &call.name, detail).await;
                ExecutionOutcome {
                    output: None,
                    error: Some(runtime_err),
                    error_id: Some(error_id),
                    execution_time_ms,
                }
            }
        }
    }

    async fn record_error(&self, session_id: &SessionId, tool_name: &str, detail: ToolErrorDetail) -> ErrorId {
        let error_id = self.error_store.record(session_id, tool_name, detail);
        self.register_tool_if_absent(GET_ERROR_DETAILS_NAME, || {
            Arc::new(GetErrorDetailsTool::new(Arc::clone(&self.error_store)))
        })
        .await;
        error_id
    }

    /// Step 5: store oversized, non-wrapper-truncated results via the
    /// Large-Object Store, pin them to the session, and replace the payload
    /// with a rich-metadata summary. A tool call retrieving a reference
    /// (i.e. `query_tool_result` itself) is never re-wrapped.
    async fn maybe_store_large_result(&self, session_id: &SessionId, tool_name: &str, output: ToolOutput) -> ToolOutput {
        if tool_name == QUERY_TOOL_RESULT_NAME || output.is_wrapper_truncated() {
            return output;
        }
        let Some(payload) = &output.data else { return output };
        if payload.approx_len() <= self.large_result_threshold_bytes {
            return output;
        }
        let Some((bytes, content_type)) = payload_to_bytes(payload) else { return output };

        let reference = self.large_objects.store(bytes, content_type, output.metadata.clone());
        self.reference_tracker.pin(session_id, reference.id.clone());
        self.register_tool_if_absent(QUERY_TOOL_RESULT_NAME, || {
            Arc::new(QueryToolResultTool::new(Arc::clone(&self.large_objects)))
        })
        .await;

        let summary = summarize_reference(&reference);
        ToolOutput { data: Some(summary), ..output }
    }

    async fn register_tool_if_absent(&self, name: &str, build: impl FnOnce() -> Arc<dyn agentflow_tool::ToolDyn>) {
        if self.registry.read().await.contains(name) {
            return;
        }
        let mut registry = self.registry.write().await;
        if !registry.contains(name) {
            registry.register(build());
        }
    }

    /// Fetch a previously stored large result, for callers that need direct
    /// access rather than going through the registered `query_tool_result`
    /// tool (e.g. rendering a full transcript for export).
    pub fn fetch_reference(&self, id: &ReferenceId) -> Result<Vec<u8>, RuntimeError> {
        self.large_objects.get(id).map_err(from_object_store_error)
    }
}

fn payload_to_bytes(payload: &ToolResultPayload) -> Option<(Vec<u8>, String)> {
    match payload {
        ToolResultPayload::Text { text } => Some((text.clone().into_bytes(), "text/plain".to_string())),
        ToolResultPayload::JsonObject { value } => {
            Some((serde_json::to_vec(value).unwrap_or_default(), "application/json".to_string()))
        }
        ToolResultPayload::JsonArray { value } => {
            Some((serde_json::to_vec(value).unwrap_or_default(), "application/json".to_string()))
        }
        ToolResultPayload::CsvTable { headers, rows } => {
            let mut text = headers.join(",");
            for row in rows {
                text.push('\n');
                text.push_str(&row.join(","));
            }
            Some((text.into_bytes(), "text/csv".to_string()))
        }
        ToolResultPayload::Binary { .. } => None,
    }
}

fn summarize_reference(reference: &agentflow_store::DataReference) -> ToolResultPayload {
    let mut value = serde_json::Map::new();
    value.insert("reference_id".to_string(), Value::String(reference.id.to_string()));
    value.insert("content_type".to_string(), Value::String(reference.content_type.clone()));
    value.insert("size_bytes".to_string(), Value::from(reference.size));
    value.insert(
        "preview".to_string(),
        serde_json::to_value(&reference.preview).unwrap_or(Value::Null),
    );
    value.insert(
        "retrieval_hint".to_string(),
        Value::String(format!("call {QUERY_TOOL_RESULT_NAME} with this reference_id to page through the full result")),
    );
    ToolResultPayload::JsonObject { value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentflow_store::{MemorySessionStore, ObjectStoreConfig, SessionStore};
    use agentflow_tool::{error::ToolError as ToolDynError, ToolDyn};
    use agentflow_types::ToolDefinition;
    use serde_json::json;
    use std::future::Future;
    use std::pin::Pin;

    struct EchoTool;
    impl ToolDyn for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "echo".into(),
                description: "echoes".into(),
                input_schema: json!({"type": "object"}),
                backend: String::new(),
                cache_control: None,
            }
        }
        fn call(
            &self,
            input: Value,
            _ctx: &ToolContext,
        ) -> Pin<Box<dyn Future<Output = Result<ToolOutput, ToolDynError>> + Send + '_>> {
            Box::pin(async move {
                Ok(ToolOutput {
                    success: true,
                    data: Some(ToolResultPayload::Text { text: input.to_string() }),
                    error: None,
                    metadata: Default::default(),
                    execution_time_ms: 0,
                })
            })
        }
    }

    struct LargeTool;
    impl ToolDyn for LargeTool {
        fn name(&self) -> &str {
            "large"
        }
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "large".into(),
                description: "returns a huge payload".into(),
                input_schema: json!({"type": "object"}),
                backend: String::new(),
                cache_control: None,
            }
        }
        fn call(
            &self,
            _input: Value,
            _ctx: &ToolContext,
        ) -> Pin<Box<dyn Future<Output = Result<ToolOutput, ToolDynError>> + Send + '_>> {
            Box::pin(async move {
                Ok(ToolOutput {
                    success: true,
                    data: Some(ToolResultPayload::Text { text: "x".repeat(20_000) }),
                    error: None,
                    metadata: Default::default(),
                    execution_time_ms: 0,
                })
            })
        }
    }

    struct FailingTool;
    impl ToolDyn for FailingTool {
        fn name(&self) -> &str {
            "failing"
        }
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "failing".into(),
                description: "always errors".into(),
                input_schema: json!({"type": "object"}),
                backend: String::new(),
                cache_control: None,
            }
        }
        fn call(
            &self,
            _input: Value,
            _ctx: &ToolContext,
        ) -> Pin<Box<dyn Future<Output = Result<ToolOutput, ToolDynError>> + Send + '_>> {
            Box::pin(async move { Err(ToolDynError::ExecutionFailed("boom".to_string())) })
        }
    }

    fn executor(registry: ToolRegistry) -> ToolExecutor {
        ToolExecutor::new(
            registry,
            Arc::new(LargeObjectStore::new(ObjectStoreConfig::default())),
            Arc::new(ReferenceTracker::new(Arc::new(LargeObjectStore::new(ObjectStoreConfig::default())))),
            Arc::new(ErrorStore::new()),
        )
    }

    #[tokio::test]
    async fn unregistered_tool_returns_not_found() {
        let executor = executor(ToolRegistry::new());
        let mut ctx = ToolContext::new(SessionId::new("s1"));
        let call = ToolCall { id: "t1".into(), name: "missing".into(), input: json!({}) };
        let outcome = executor.execute(&mut ctx, &call, &SessionId::new("s1"), None).await;
        assert!(outcome.is_error());
        assert!(matches!(outcome.error, Some(RuntimeError::NotFound(_))));
    }

    #[tokio::test]
    async fn successful_call_returns_output() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let executor = executor(registry);
        let mut ctx = ToolContext::new(SessionId::new("s1"));
        let call = ToolCall { id: "t1".into(), name: "echo".into(), input: json!({"x": 1}) };
        let outcome = executor.execute(&mut ctx, &call, &SessionId::new("s1"), None).await;
        assert!(!outcome.is_error());
        assert!(outcome.output.unwrap().success);
    }

    #[tokio::test]
    async fn large_result_is_stored_and_summarized() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(LargeTool));
        let executor = ToolExecutor::new(
            registry,
            Arc::new(LargeObjectStore::new(ObjectStoreConfig::default())),
            Arc::new(ReferenceTracker::new(Arc::new(LargeObjectStore::new(ObjectStoreConfig::default())))),
            Arc::new(ErrorStore::new()),
        )
        .with_large_result_threshold_bytes(1024);
        let mut ctx = ToolContext::new(SessionId::new("s1"));
        let call = ToolCall { id: "t1".into(), name: "large".into(), input: json!({}) };
        let outcome = executor.execute(&mut ctx, &call, &SessionId::new("s1"), None).await;
        let output = outcome.output.unwrap();
        match output.data {
            Some(ToolResultPayload::JsonObject { value }) => assert!(value.contains_key("reference_id")),
            _ => panic!("expected reference summary"),
        }
        assert_eq!(executor.tool_definitions().await.iter().filter(|d| d.name == QUERY_TOOL_RESULT_NAME).count(), 1);
    }

    #[tokio::test]
    async fn failing_tool_records_error_and_registers_get_error_details() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FailingTool));
        let executor = executor(registry);
        let mut ctx = ToolContext::new(SessionId::new("s1"));
        let call = ToolCall { id: "t1".into(), name: "failing".into(), input: json!({}) };
        let outcome = executor.execute(&mut ctx, &call, &SessionId::new("s1"), None).await;
        assert!(outcome.is_error());
        assert!(outcome.error_id.is_some());
        assert_eq!(executor.tool_definitions().await.iter().filter(|d| d.name == GET_ERROR_DETAILS_NAME).count(), 1);
    }

    #[tokio::test]
    async fn wrapper_truncated_result_is_not_stored() {
        struct TruncatedTool;
        impl ToolDyn for TruncatedTool {
            fn name(&self) -> &str {
                "truncated"
            }
            fn definition(&self) -> ToolDefinition {
                ToolDefinition {
                    name: "truncated".into(),
                    description: "already truncated by a wrapper".into(),
                    input_schema: json!({"type": "object"}),
                    backend: String::new(),
                    cache_control: None,
                }
            }
            fn call(
                &self,
                _input: Value,
                _ctx: &ToolContext,
            ) -> Pin<Box<dyn Future<Output = Result<ToolOutput, ToolDynError>> + Send + '_>> {
                Box::pin(async move {
                    let mut metadata = serde_json::Map::new();
                    metadata.insert("truncated".into(), Value::Bool(true));
                    Ok(ToolOutput {
                        success: true,
                        data: Some(ToolResultPayload::Text { text: "x".repeat(20_000) }),
                        error: None,
                        metadata,
                        execution_time_ms: 0,
                    })
                })
            }
        }

        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(TruncatedTool));
        let executor = ToolExecutor::new(
            registry,
            Arc::new(LargeObjectStore::new(ObjectStoreConfig::default())),
            Arc::new(ReferenceTracker::new(Arc::new(LargeObjectStore::new(ObjectStoreConfig::default())))),
            Arc::new(ErrorStore::new()),
        )
        .with_large_result_threshold_bytes(1024);
        let mut ctx = ToolContext::new(SessionId::new("s1"));
        let call = ToolCall { id: "t1".into(), name: "truncated".into(), input: json!({}) };
        let outcome = executor.execute(&mut ctx, &call, &SessionId::new("s1"), None).await;
        match outcome.output.unwrap().data {
            Some(ToolResultPayload::Text { .. }) => {}
            _ => panic!("wrapper-truncated result must not be re-wrapped as a reference"),
        }
    }

    #[tokio::test]
    async fn cleanup_hook_releases_large_result_pin_on_session_delete() {
        let store = Arc::new(LargeObjectStore::new(ObjectStoreConfig::default()));
        let tracker = Arc::new(ReferenceTracker::new(Arc::clone(&store)));
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(LargeTool));
        let executor = ToolExecutor::new(registry, Arc::clone(&store), Arc::clone(&tracker), Arc::new(ErrorStore::new()))
            .with_large_result_threshold_bytes(1024);

        let session_id = SessionId::new("s1");
        let mut ctx = ToolContext::new(session_id.clone());
        let call = ToolCall { id: "t1".into(), name: "large".into(), input: json!({}) };
        executor.execute(&mut ctx, &call, &session_id, None).await;
        assert_eq!(tracker.pinned_count(&session_id), 1);

        let session_store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
        session_store.register_cleanup_hook(tracker.clone());
        session_store
            .save_session(&agentflow_types::SessionRecord::new(session_id.clone(), None, None))
            .await
            .unwrap();
        session_store.delete_session(&session_id).await.unwrap();
        assert_eq!(tracker.pinned_count(&session_id), 0);
    }
}
