#![deny(missing_docs)]
//! Shared wire types and trait boundaries for the agentflow runtime.
//!
//! Every other crate in the workspace depends on this one and nothing else
//! in the workspace — it carries no business logic, only the nouns (ids,
//! messages, session records) and the two external-interface traits
//! ([`provider::Provider`], consumed by the conversation loop) that the
//! runtime is built around.

pub mod content;
pub mod error;
pub mod id;
pub mod provider;
pub mod session;
pub mod tool;

pub use content::{ContentBlock, Message, Role, SessionContext, ToolCall};
pub use error::RuntimeError;
pub use id::{AgentId, ErrorId, ReferenceId, SessionId};
pub use provider::{
    CacheControl, CacheTtl, CompletionRequest, CompletionResponse, Provider, ProviderError,
    StopReason, SystemBlock, SystemPrompt, TokenUsage,
};
pub use session::{MemorySnapshot, MessageRecord, SessionRecord, SessionTotals, ToolExecutionRecord};
pub use tool::{
    ProgressEvent, ProgressReporter, ToolContext, ToolDefinition, ToolErrorDetail, ToolOutput,
    ToolResultPayload,
};
