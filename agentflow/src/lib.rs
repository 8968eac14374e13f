#![deny(missing_docs)]
//! # agentflow — umbrella crate
//!
//! Single import surface over the agentflow agent runtime: wire types and
//! the provider trait, token counting, tiered segmented memory, the
//! object-safe tool registry, consecutive-failure tracking and circuit
//! breakers, and the conversation loop that ties them together. Re-exports
//! each subsystem crate behind a feature flag, plus a [`prelude`] for the
//! happy path.

#[cfg(feature = "types")]
pub use agentflow_types;

#[cfg(feature = "token")]
pub use agentflow_token;

#[cfg(feature = "store")]
pub use agentflow_store;

#[cfg(feature = "failure")]
pub use agentflow_failure;

#[cfg(feature = "tool")]
pub use agentflow_tool;

#[cfg(feature = "memory")]
pub use agentflow_memory;

#[cfg(feature = "runtime")]
pub use agentflow_runtime;

/// Happy-path imports for composing an agentflow runtime.
pub mod prelude {
    #[cfg(feature = "types")]
    pub use agentflow_types::{
        AgentId, CompletionRequest, CompletionResponse, ContentBlock, Message, Provider,
        ProviderError, ReferenceId, Role, RuntimeError, SessionId, StopReason, ToolContext,
        ToolDefinition, ToolOutput, ToolResultPayload,
    };

    #[cfg(feature = "token")]
    pub use agentflow_token::{TokenBudget, TokenCounter};

    #[cfg(feature = "store")]
    pub use agentflow_store::{LargeObjectStore, MemorySessionStore, ObjectStoreConfig, SessionStore};

    #[cfg(feature = "failure")]
    pub use agentflow_failure::{BreakerConfig, CircuitBreaker, FailureTracker};

    #[cfg(feature = "tool")]
    pub use agentflow_tool::{ToolDyn, ToolRegistry};

    #[cfg(feature = "memory")]
    pub use agentflow_memory::{ManagerConfig, ManagerDeps, MemoryManager, SegmentedMemory};

    #[cfg(feature = "runtime")]
    pub use agentflow_runtime::{
        AgentLoop, AgentLoopBuilder, ErrorStore, ExecutionOutcome, LoopConfig, ReferenceTracker,
        Response, ResponseMetadata, ToolExecutor,
    };
}
