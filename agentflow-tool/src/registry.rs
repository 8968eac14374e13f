//! The object-safe tool trait and its registry.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use agentflow_types::{ToolContext, ToolDefinition, ToolOutput};

use crate::error::ToolError;

/// Object-safe tool implementation.
///
/// Any tool source — a local function, an MCP-proxied server, an HTTP
/// endpoint — implements this trait and is stored as `Arc<dyn ToolDyn>` in
/// a [`ToolRegistry`].
pub trait ToolDyn: Send + Sync {
    /// Unique tool name.
    fn name(&self) -> &str;

    /// Full definition advertised to the model.
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with the given input.
    fn call(
        &self,
        input: serde_json::Value,
        ctx: &ToolContext,
    ) -> Pin<Box<dyn Future<Output = Result<ToolOutput, ToolError>> + Send + '_>>;
}

/// Registry of tools available to a conversation loop.
///
/// Tools may be added after construction — the executor lazily registers
/// `query_tool_result` on the first large result and `get_error_details` on
/// the first stored error (see `agentflow-runtime`), so the registry must
/// support insertion after the loop has started.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolDyn>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    /// Register a tool, overwriting any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn ToolDyn>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolDyn>> {
        self.tools.get(name)
    }

    /// Whether a tool with this name is already registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Definitions for every registered tool, in registration-map order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
