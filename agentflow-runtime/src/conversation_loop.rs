//! Conversation Loop (C10): the driver that turns a user message into a
//! final response, calling the LLM provider and the Tool Executor in
//! lockstep with the bounds and circuit breakers described in §4.10.

use std::sync::Arc;

use agentflow_failure::{is_truncated_input, FailureTracker};
use agentflow_memory::{MemoryManager, Session};
use agentflow_types::{
    AgentId, CompletionRequest, ContentBlock, Message, Provider, Role, RuntimeError, SessionId,
    StopReason, ToolCall, ToolContext, ToolErrorDetail, ToolExecutionRecord, ToolOutput,
    ToolResultPayload,
};
use chrono::{DateTime, Utc};

use crate::error::{from_memory_error, from_provider_error};
use crate::executor::{ExecutionOutcome, ToolExecutor};
use crate::findings::FindingsExtractor;
use crate::loop_config::LoopConfig;
use crate::pattern::PatternSource;
use crate::prelude::system_prelude;
use crate::progress::ProgressCallback;
use crate::response::{Response, ResponseMetadata};

/// Lower bound on the tool-execution soft-reminder window, per §4.10
/// ("lower bound also floored at 10").
const MIN_EXEC_REMINDER_FLOOR: u32 = 10;
/// Lower bound on the turn soft-reminder window ("the same for turns, floor 8").
const MIN_TURN_REMINDER_FLOOR: u32 = 8;

/// Builds an [`AgentLoop`] with optional collaborators layered on.
pub struct AgentLoopBuilder<P: Provider> {
    provider: P,
    model: String,
    executor: Arc<ToolExecutor>,
    manager: Arc<MemoryManager>,
    config: LoopConfig,
    pattern_source: Option<Arc<dyn PatternSource>>,
    findings_extractor: Option<Arc<dyn FindingsExtractor>>,
    progress: Option<ProgressCallback>,
}

impl<P: Provider> AgentLoopBuilder<P> {
    /// Override the default loop configuration.
    #[must_use]
    pub fn config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    /// Inject a pattern source consulted once before the loop starts.
    #[must_use]
    pub fn pattern_source(mut self, source: Arc<dyn PatternSource>) -> Self {
        self.pattern_source = Some(source);
        self
    }

    /// Inject a background finding extractor.
    #[must_use]
    pub fn findings_extractor(mut self, extractor: Arc<dyn FindingsExtractor>) -> Self {
        self.findings_extractor = Some(extractor);
        self
    }

    /// Install a progress callback, fired at every stage transition.
    #[must_use]
    pub fn progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Finish building the loop.
    pub fn build(self) -> AgentLoop<P> {
        AgentLoop {
            provider: self.provider,
            model: self.model,
            executor: self.executor,
            manager: self.manager,
            config: self.config,
            pattern_source: self.pattern_source,
            findings_extractor: self.findings_extractor,
            progress: self.progress,
        }
    }
}

/// Drives one user turn through the LLM/tool loop to a final [`Response`].
///
/// Generic over `P: Provider` rather than boxed — mirrors the teacher's
/// `AgentLoop<P, C>`, since `Provider` uses RPITIT and is not object-safe.
pub struct AgentLoop<P: Provider> {
    provider: P,
    model: String,
    executor: Arc<ToolExecutor>,
    manager: Arc<MemoryManager>,
    config: LoopConfig,
    pattern_source: Option<Arc<dyn PatternSource>>,
    findings_extractor: Option<Arc<dyn FindingsExtractor>>,
    progress: Option<ProgressCallback>,
}

impl<P: Provider> AgentLoop<P> {
    /// Start building a loop over `provider`, calling `model`, executing
    /// tools through `executor`, and persisting through `manager`.
    pub fn builder(provider: P, model: impl Into<String>, executor: Arc<ToolExecutor>, manager: Arc<MemoryManager>) -> AgentLoopBuilder<P> {
        AgentLoopBuilder {
            provider,
            model: model.into(),
            executor,
            manager,
            config: LoopConfig::default(),
            pattern_source: None,
            findings_extractor: None,
            progress: None,
        }
    }

    fn emit(&self, event: agentflow_types::ProgressEvent) {
        if let Some(callback) = &self.progress {
            callback(event);
        }
    }

    /// Run one user turn to completion.
    ///
    /// `now` drives the date/time prelude (§4.10, last paragraph) — passed
    /// explicitly rather than read from `Utc::now()` inside the loop, so
    /// callers can assert on the exact rendered block in tests.
    pub async fn run(
        &self,
        ctx: &mut ToolContext,
        session_id: SessionId,
        agent_id: Option<AgentId>,
        user_message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Response, RuntimeError> {
        let session = self.manager.get_or_create(session_id.clone(), agent_id.clone(), None).await.map_err(from_memory_error)?;

        self.emit(agentflow_types::ProgressEvent::PatternSelection);
        if let Some(pattern_source) = &self.pattern_source {
            let user_text = user_message.into();
            if let Some(recommendation) = pattern_source.recommend(&user_text).await {
                if recommendation.confidence >= self.config.min_pattern_confidence {
                    session.memory().with_kernel_mut(|k| k.add_finding(recommendation.text.clone())).await;
                }
            }
            self.manager.add_message(&session_id, Message::user(user_text)).await.map_err(from_memory_error)?;
        } else {
            self.manager.add_message(&session_id, Message::user(user_message.into())).await.map_err(from_memory_error)?;
        }

        let mut turn: u32 = 0;
        let mut tool_exec: u32 = 0;
        let mut max_turns_hit = false;
        let mut max_exec_hit = false;
        let mut total_usage = agentflow_types::TokenUsage::default();
        let mut tool_executions: Vec<ToolExecutionRecord> = Vec::new();
        let mut since_extraction: u32 = 0;

        loop {
            if turn >= self.config.max_turns {
                max_turns_hit = true;
                break;
            }
            if tool_exec >= self.config.max_tool_executions {
                max_exec_hit = true;
                break;
            }

            let mut messages = session.memory().context_for_llm().await;
            attach_prelude(&mut messages, now);
            self.attach_soft_reminders(&mut messages, turn, tool_exec);

            self.emit(agentflow_types::ProgressEvent::LlmGeneration { turn });

            let available = session.memory().budget().available();
            let max_tokens = self.config.max_output_tokens.resolve(available);
            let tool_defs = self.executor.tool_definitions().await;
            let request = CompletionRequest {
                model: self.model.clone(),
                messages,
                system: None,
                tools: Some(tool_defs),
                max_tokens: Some(max_tokens),
            };

            let completion = self.provider.complete(request).await.map_err(from_provider_error)?;
            accumulate_usage(&mut total_usage, &completion.usage);
            session.record_usage(completion.usage.cost_usd.unwrap_or_default(), completion.usage.total_tokens());

            let tool_calls = extract_tool_calls(&completion.message);

            if completion.stop_reason == StopReason::MaxTokens {
                let truncated = tool_calls.is_empty() || tool_calls.iter().all(|c| is_truncated_input(&c.input));
                session.failure_tracker().record_output_exhaustion(truncated);
                if let Err(err) = session.failure_tracker().check_output_circuit_breaker(self.config.output_token_cb_threshold) {
                    self.emit(agentflow_types::ProgressEvent::Failed { message: err.to_string() });
                    return Err(err);
                }
            } else {
                session.failure_tracker().clear_output_exhaustion();
            }

            if tool_calls.is_empty() {
                let content = completion.message.as_text();
                self.manager.add_message(&session_id, completion.message).await.map_err(from_memory_error)?;
                self.emit(agentflow_types::ProgressEvent::Completed);
                return Ok(Response {
                    content,
                    usage: total_usage,
                    tool_executions,
                    metadata: ResponseMetadata {
                        turns: turn + 1,
                        tool_executions: tool_exec,
                        stop_reason: Some(completion.stop_reason),
                        max_turns_hit: false,
                        max_exec_hit: false,
                        synthesized: false,
                        synthesis_error: None,
                    },
                });
            }

            // The assistant message carrying tool_calls MUST precede the
            // tool messages answering them.
            self.manager.add_message(&session_id, completion.message).await.map_err(from_memory_error)?;

            for call in &tool_calls {
                if tool_exec >= self.config.max_tool_executions {
                    max_exec_hit = true;
                    break;
                }
                tool_exec += 1;
                self.emit(agentflow_types::ProgressEvent::ToolExecution { name: call.name.clone() });

                let outcome = self.executor.execute(ctx, call, &session_id, agent_id.as_ref()).await;
                let is_error = outcome.is_error();

                let escalation = if is_error {
                    let error_type = error_type_tag(&outcome);
                    let count = session.failure_tracker().record(&call.name, &call.input, error_type);
                    FailureTracker::escalation_message(count, self.config.escalation_threshold)
                } else {
                    session.failure_tracker().clear(&call.name, &call.input);
                    None
                };

                let formatted = format_tool_result(outcome.output.as_ref(), outcome.error.as_ref(), escalation.as_deref());
                let tool_message = Message::tool_result(call.id.clone(), formatted, is_error);
                self.manager.add_message(&session_id, tool_message).await.map_err(from_memory_error)?;

                tool_executions.push(tool_execution_record(&session_id, call, &outcome));

                since_extraction += 1;
                if self.config.extraction.enabled && since_extraction >= self.config.extraction.cadence {
                    since_extraction = 0;
                    self.spawn_finding_extraction(Arc::clone(&session)).await;
                }
            }

            turn += 1;
        }

        self.synthesize(ctx, &session, &session_id, now, turn, tool_exec, max_turns_hit, max_exec_hit, total_usage, tool_executions)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn synthesize(
        &self,
        _ctx: &mut ToolContext,
        session: &Arc<Session>,
        session_id: &SessionId,
        now: DateTime<Utc>,
        turn: u32,
        tool_exec: u32,
        max_turns_hit: bool,
        max_exec_hit: bool,
        mut total_usage: agentflow_types::TokenUsage,
        tool_executions: Vec<ToolExecutionRecord>,
    ) -> Result<Response, RuntimeError> {
        self.emit(agentflow_types::ProgressEvent::Synthesis);
        self.manager
            .add_message(
                session_id,
                Message::user("No further tool calls are available. Provide your best answer now given everything above."),
            )
            .await
            .map_err(from_memory_error)?;

        let mut messages = session.memory().context_for_llm().await;
        attach_prelude(&mut messages, now);

        let available = session.memory().budget().available();
        let max_tokens = self.config.max_output_tokens.resolve(available);
        let request = CompletionRequest {
            model: self.model.clone(),
            messages,
            system: None,
            tools: None,
            max_tokens: Some(max_tokens),
        };

        let (content, stop_reason, synthesis_error) = match self.provider.complete(request).await {
            Ok(completion) => {
                accumulate_usage(&mut total_usage, &completion.usage);
                let text = completion.message.as_text();
                self.manager.add_message(session_id, completion.message.clone()).await.map_err(from_memory_error)?;
                (text, Some(completion.stop_reason), None)
            }
            Err(err) => (self.config.synthesis_guidance.clone(), None, Some(from_provider_error(err).to_string())),
        };

        self.emit(agentflow_types::ProgressEvent::Completed);
        Ok(Response {
            content,
            usage: total_usage,
            tool_executions,
            metadata: ResponseMetadata {
                turns: turn,
                tool_executions: tool_exec,
                stop_reason,
                max_turns_hit,
                max_exec_hit,
                synthesized: true,
                synthesis_error,
            },
        })
    }

    async fn spawn_finding_extraction(&self, session: Arc<Session>) {
        let Some(extractor) = self.findings_extractor.clone() else { return };
        let max_findings = self.config.extraction.max_findings;
        let messages = session.memory().context_for_llm().await;
        tokio::spawn(async move {
            let findings = extractor.extract(&messages).await;
            for finding in findings {
                session
                    .memory()
                    .with_kernel_mut(|kernel| {
                        if kernel.findings().len() < max_findings {
                            kernel.add_finding(finding);
                        }
                    })
                    .await;
            }
        });
    }

    /// §4.10 "Soft reminders": appended to the first system or user message
    /// once turn/tool-exec counts enter `[0.75·Max, 0.90·Max)`, floored at
    /// 8 turns / 10 tool executions; suppressed once the upper bound is hit.
    fn attach_soft_reminders(&self, messages: &mut [Message], turn: u32, tool_exec: u32) {
        let turn_lower = (((0.75 * self.config.max_turns as f64).floor() as u32)).max(MIN_TURN_REMINDER_FLOOR);
        let turn_upper = (0.90 * self.config.max_turns as f64).floor() as u32;
        let exec_lower = (((0.75 * self.config.max_tool_executions as f64).floor() as u32)).max(MIN_EXEC_REMINDER_FLOOR);
        let exec_upper = (0.90 * self.config.max_tool_executions as f64).floor() as u32;

        let mut reminders = Vec::new();
        if turn >= turn_lower && turn < turn_upper {
            reminders.push(format!("reminder: turn {turn} of {} before forced synthesis", self.config.max_turns));
        }
        if tool_exec >= exec_lower && tool_exec < exec_upper {
            reminders.push(format!(
                "reminder: {tool_exec} of {} tool executions used before forced synthesis",
                self.config.max_tool_executions
            ));
        }
        if reminders.is_empty() {
            return;
        }
        let reminder_text = reminders.join("; ");
        if let Some(target) = messages.iter_mut().find(|m| matches!(m.role, Role::System | Role::User)) {
            if let Some(ContentBlock::Text { text }) = target.content.first_mut() {
                text.push_str("\n\n");
                text.push_str(&reminder_text);
            }
        }
    }
}

fn attach_prelude(messages: &mut [Message], now: DateTime<Utc>) {
    if let Some(first) = messages.first_mut() {
        if first.role == Role::System {
            if let Some(ContentBlock::Text { text }) = first.content.first_mut() {
                *text = format!("{}\n\n{}", system_prelude(now), text);
            }
        }
    }
}

fn extract_tool_calls(message: &Message) -> Vec<ToolCall> {
    message
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } => {
                Some(ToolCall { id: id.clone(), name: name.clone(), input: input.clone() })
            }
            _ => None,
        })
        .collect()
}

fn accumulate_usage(total: &mut agentflow_types::TokenUsage, usage: &agentflow_types::TokenUsage) {
    total.input_tokens += usage.input_tokens;
    total.output_tokens += usage.output_tokens;
    total.cost_usd = match (total.cost_usd, usage.cost_usd) {
        (Some(a), Some(b)) => Some(a + b),
        (Some(a), None) => Some(a),
        (None, other) => other,
    };
}

fn error_type_tag(outcome: &ExecutionOutcome) -> &'static str {
    if let Some(err) = &outcome.error {
        match err {
            RuntimeError::InvalidArgument { .. } => "invalid_argument",
            RuntimeError::NotFound(_) => "not_found",
            RuntimeError::BudgetExceeded { .. } => "budget_exceeded",
            RuntimeError::Truncated => "truncated",
            RuntimeError::McpFailure { .. } => "mcp_failure",
            RuntimeError::CircuitOpen { .. } => "circuit_open",
            RuntimeError::OutputExhausted { .. } => "output_exhausted",
            RuntimeError::PermissionDenied(_) => "permission_denied",
            RuntimeError::TransientIo(_) => "transient_io",
            RuntimeError::Fatal(_) => "fatal",
            _ => "unknown",
        }
    } else {
        "mcp_failure"
    }
}

fn format_tool_result(output: Option<&ToolOutput>, error: Option<&RuntimeError>, escalation: Option<&str>) -> String {
    let mut text = if let Some(err) = error {
        format!("error: {err}")
    } else if let Some(output) = output {
        if output.success {
            render_payload(output.data.as_ref())
        } else {
            format_error_detail(output.error.as_ref())
        }
    } else {
        "error: tool produced no output".to_string()
    };

    if let Some(escalation) = escalation {
        text.push_str("\n\n");
        text.push_str(escalation);
    }
    text
}

fn format_error_detail(detail: Option<&ToolErrorDetail>) -> String {
    match detail {
        Some(detail) => {
            let mut text = format!("error[{}]: {}", detail.code, detail.message);
            if let Some(suggestion) = &detail.suggestion {
                text.push_str(&format!(" (suggestion: {suggestion})"));
            }
            text
        }
        None => "error: tool reported failure".to_string(),
    }
}

fn render_payload(payload: Option<&ToolResultPayload>) -> String {
    match payload {
        Some(ToolResultPayload::Text { text }) => text.clone(),
        Some(other) => serde_json::to_string(other).unwrap_or_default(),
        None => String::new(),
    }
}

fn tool_execution_record(session_id: &SessionId, call: &ToolCall, outcome: &ExecutionOutcome) -> ToolExecutionRecord {
    ToolExecutionRecord {
        session_id: session_id.clone(),
        tool_name: call.name.clone(),
        input: call.input.clone(),
        result: outcome.output.as_ref().and_then(|o| serde_json::to_value(o).ok()),
        error: outcome
            .error
            .as_ref()
            .map(|e| e.to_string())
            .or_else(|| outcome.output.as_ref().filter(|o| !o.success).and_then(|o| o.error.as_ref()).map(|e| e.message.clone())),
        execution_time_ms: outcome.execution_time_ms,
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentflow_memory::{ManagerConfig, ManagerDeps};
    use agentflow_store::{LargeObjectStore, MemorySessionStore, ObjectStoreConfig};
    use agentflow_token::TokenCounter;
    use agentflow_types::{CompletionResponse, ProviderError, ToolDefinition};
    use serde_json::json;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    use crate::error_store::ErrorStore;
    use crate::reference_tracker::ReferenceTracker;

    /// A scripted provider returning one `CompletionResponse` per call.
    struct ScriptedProvider {
        responses: Mutex<Vec<Result<CompletionResponse, String>>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<CompletionResponse>) -> Self {
            Self { responses: Mutex::new(responses.into_iter().map(Ok).rev().collect()) }
        }
    }

    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn complete(
            &self,
            _request: CompletionRequest,
        ) -> impl Future<Output = Result<CompletionResponse, ProviderError>> + Send {
            let next = self.responses.lock().unwrap().pop();
            async move {
                match next {
                    Some(Ok(response)) => Ok(response),
                    _ => Err(ProviderError::RequestFailed("scripted provider exhausted".to_string())),
                }
            }
        }
    }

    fn text_response(text: &str, stop_reason: StopReason) -> CompletionResponse {
        CompletionResponse {
            message: Message::assistant(text),
            stop_reason,
            usage: agentflow_types::TokenUsage { input_tokens: 10, output_tokens: 5, cost_usd: None },
        }
    }

    fn tool_call_response(id: &str, name: &str) -> CompletionResponse {
        CompletionResponse {
            message: Message::assistant_tool_calls(vec![ToolCall { id: id.to_string(), name: name.to_string(), input: json!({}) }]),
            stop_reason: StopReason::ToolUse,
            usage: agentflow_types::TokenUsage { input_tokens: 10, output_tokens: 5, cost_usd: None },
        }
    }

    struct EchoTool;
    impl agentflow_tool::ToolDyn for EchoTool {
        fn name(&self) -> &str {
            "list"
        }
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "list".into(),
                description: "lists things".into(),
                input_schema: json!({"type": "object"}),
                backend: String::new(),
                cache_control: None,
            }
        }
        fn call(
            &self,
            _input: serde_json::Value,
            _ctx: &ToolContext,
        ) -> Pin<Box<dyn Future<Output = Result<ToolOutput, agentflow_tool::ToolError>> + Send + '_>> {
            Box::pin(async move {
                Ok(ToolOutput {
                    success: true,
                    data: Some(ToolResultPayload::Text { text: "[A,B,C]".to_string() }),
                    error: None,
                    metadata: Default::default(),
                    execution_time_ms: 1,
                })
            })
        }
    }

    fn manager() -> Arc<MemoryManager> {
        Arc::new(MemoryManager::new(ManagerConfig::default(), ManagerDeps::default(), Arc::new(TokenCounter::new())))
    }

    fn executor() -> Arc<ToolExecutor> {
        let mut registry = agentflow_tool::ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        Arc::new(ToolExecutor::new(
            registry,
            Arc::new(LargeObjectStore::new(ObjectStoreConfig::default())),
            Arc::new(ReferenceTracker::new(Arc::new(LargeObjectStore::new(ObjectStoreConfig::default())))),
            Arc::new(ErrorStore::new()),
        ))
    }

    fn now() -> DateTime<Utc> {
        "2026-01-15T09:30:00Z".parse().unwrap()
    }

    #[tokio::test]
    async fn text_only_answer_scenario() {
        let provider = ScriptedProvider::new(vec![text_response("Hi", StopReason::EndTurn)]);
        let agent_loop = AgentLoop::builder(provider, "test-model", executor(), manager()).build();
        let mut ctx = ToolContext::new(SessionId::new("S1"));

        let response = agent_loop.run(&mut ctx, SessionId::new("S1"), None, "hello", now()).await.unwrap();

        assert_eq!(response.content, "Hi");
        assert_eq!(response.metadata.turns, 1);
        assert_eq!(response.metadata.tool_executions, 0);
        assert!(!response.metadata.synthesized);
    }

    #[tokio::test]
    async fn single_tool_roundtrip_scenario() {
        let provider = ScriptedProvider::new(vec![
            tool_call_response("t1", "list"),
            text_response("Found A, B, C", StopReason::EndTurn),
        ]);
        let manager = manager();
        let agent_loop = AgentLoop::builder(provider, "test-model", executor(), Arc::clone(&manager)).build();
        let mut ctx = ToolContext::new(SessionId::new("S1"));

        let response = agent_loop.run(&mut ctx, SessionId::new("S1"), None, "list databases", now()).await.unwrap();

        assert_eq!(response.content, "Found A, B, C");
        assert_eq!(response.metadata.tool_executions, 1);

        let session = manager.get(&SessionId::new("S1")).await.unwrap();
        let _ = session; // session is live; full message-order assertions covered at the store level.
    }

    #[tokio::test]
    async fn output_token_circuit_breaker_trips_on_threshold() {
        let truncated = CompletionResponse {
            message: Message::assistant_tool_calls(vec![ToolCall { id: "t1".into(), name: "list".into(), input: json!({}) }]),
            stop_reason: StopReason::MaxTokens,
            usage: agentflow_types::TokenUsage::default(),
        };
        let provider = ScriptedProvider::new(vec![
            CompletionResponse { message: truncated.message.clone(), ..truncated.clone() },
            CompletionResponse { message: truncated.message.clone(), ..truncated.clone() },
            CompletionResponse { message: truncated.message.clone(), ..truncated.clone() },
        ]);
        let mut config = LoopConfig::default();
        config.output_token_cb_threshold = 3;
        let agent_loop = AgentLoop::builder(provider, "test-model", executor(), manager()).config(config).build();
        let mut ctx = ToolContext::new(SessionId::new("S1"));

        let err = agent_loop.run(&mut ctx, SessionId::new("S1"), None, "go", now()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::OutputExhausted { count: 3, threshold: 3, .. }));
    }

    #[tokio::test]
    async fn forced_synthesis_on_max_turns() {
        let provider = ScriptedProvider::new(vec![
            tool_call_response("t1", "list"),
            text_response("synthesis answer", StopReason::EndTurn),
        ]);
        let mut config = LoopConfig::default();
        config.max_turns = 1;
        let agent_loop = AgentLoop::builder(provider, "test-model", executor(), manager()).config(config).build();
        let mut ctx = ToolContext::new(SessionId::new("S1"));

        let response = agent_loop.run(&mut ctx, SessionId::new("S1"), None, "go", now()).await.unwrap();
        assert!(response.metadata.synthesized);
        assert!(response.metadata.max_turns_hit);
        assert_eq!(response.content, "synthesis answer");
    }

    #[tokio::test]
    async fn synthesis_failure_falls_back_to_configured_guidance() {
        let provider = ScriptedProvider::new(vec![tool_call_response("t1", "list")]);
        let mut config = LoopConfig::default();
        config.max_turns = 1;
        let guidance = config.synthesis_guidance.clone();
        let agent_loop = AgentLoop::builder(provider, "test-model", executor(), manager()).config(config).build();
        let mut ctx = ToolContext::new(SessionId::new("S1"));

        let response = agent_loop.run(&mut ctx, SessionId::new("S1"), None, "go", now()).await.unwrap();
        assert_eq!(response.content, guidance);
        assert!(response.metadata.synthesis_error.is_some());
    }

    #[tokio::test]
    async fn prelude_precedes_rom_in_system_message() {
        let mut messages = vec![Message::system("my rom text")];
        attach_prelude(&mut messages, now());
        let text = messages[0].as_text();
        assert!(text.starts_with("current date:"));
        assert!(text.ends_with("my rom text"));
    }
}
