//! Progress callback plumbing (C12).
//!
//! `ProgressEvent` itself lives in `agentflow-types` (it travels on
//! `ToolContext` so nested tools can also emit); this module only adds the
//! loop-level callback type, matching the teacher's synchronous-callback
//! convention rather than introducing a channel the spec never asked for.

use std::sync::Arc;

use agentflow_types::ProgressEvent;

/// Callback invoked at each loop stage transition.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;
