#![deny(missing_docs)]
//! The agentflow conversation loop: Tool Executor (C9), Conversation Loop
//! (C10), Reference Tracker (C11), and the progress/error surface (C12).
//!
//! Everything here is generic over [`agentflow_types::Provider`] rather than
//! boxed, following the provider trait's own RPITIT design — see
//! `agentflow_types::provider` for why it isn't object-safe.

pub mod conversation_loop;
pub mod error;
pub mod error_details_tool;
pub mod error_store;
pub mod executor;
pub mod findings;
pub mod loop_config;
pub mod pattern;
pub mod permission;
pub mod prelude;
pub mod progress;
pub mod query_tool_result;
pub mod reference_tracker;
pub mod response;
pub mod well_known;

pub use conversation_loop::{AgentLoop, AgentLoopBuilder};
pub use error::{from_memory_error, from_object_store_error, from_provider_error, from_storage_error, from_tool_error};
pub use error_details_tool::GetErrorDetailsTool;
pub use error_store::{ErrorStore, StoredError};
pub use executor::{ExecutionOutcome, ToolExecutor, DEFAULT_LARGE_RESULT_THRESHOLD_BYTES};
pub use findings::FindingsExtractor;
pub use loop_config::{ExtractionConfig, LoopConfig, MaxOutputTokensPolicy};
pub use pattern::{PatternRecommendation, PatternSource};
pub use permission::PermissionChecker;
pub use prelude::system_prelude;
pub use progress::ProgressCallback;
pub use query_tool_result::QueryToolResultTool;
pub use reference_tracker::ReferenceTracker;
pub use response::{Response, ResponseMetadata};
pub use well_known::{GET_ERROR_DETAILS_NAME, QUERY_TOOL_RESULT_NAME};
