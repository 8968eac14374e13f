//! The `get_error_details` tool (C12): fetches the full structured detail
//! behind a previously summarized tool error.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use agentflow_tool::{ToolDyn, ToolError};
use agentflow_types::{ErrorId, ToolContext, ToolDefinition, ToolOutput, ToolResultPayload};
use serde_json::{json, Value};

use crate::error_store::ErrorStore;
use crate::well_known::GET_ERROR_DETAILS_NAME;

/// Fetches the full detail behind a stored error id.
pub struct GetErrorDetailsTool {
    store: Arc<ErrorStore>,
}

impl GetErrorDetailsTool {
    /// Build the tool over the given error store.
    pub fn new(store: Arc<ErrorStore>) -> Self {
        Self { store }
    }
}

impl ToolDyn for GetErrorDetailsTool {
    fn name(&self) -> &str {
        GET_ERROR_DETAILS_NAME
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: GET_ERROR_DETAILS_NAME.to_string(),
            description: "Fetch the full detail behind a previously summarized tool error.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "error_id": {"type": "string"}
                },
                "required": ["error_id"]
            }),
            backend: String::new(),
            cache_control: None,
        }
    }

    fn call(
        &self,
        input: Value,
        _ctx: &ToolContext,
    ) -> Pin<Box<dyn Future<Output = Result<ToolOutput, ToolError>> + Send + '_>> {
        let store = Arc::clone(&self.store);
        Box::pin(async move {
            let error_id = input
                .get("error_id")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolError::InvalidInput("error_id is required".to_string()))?;
            let stored = store
                .get(&ErrorId::new(error_id))
                .ok_or_else(|| ToolError::InvalidInput(format!("unknown error_id: {error_id}")))?;

            let mut value = serde_json::Map::new();
            value.insert("tool_name".to_string(), Value::String(stored.tool_name));
            value.insert("code".to_string(), Value::String(stored.detail.code));
            value.insert("message".to_string(), Value::String(stored.detail.message));
            value.insert(
                "suggestion".to_string(),
                stored.detail.suggestion.map(Value::String).unwrap_or(Value::Null),
            );
            value.insert("created_at".to_string(), Value::String(stored.created_at.to_rfc3339()));

            Ok(ToolOutput {
                success: true,
                data: Some(ToolResultPayload::JsonObject { value }),
                error: None,
                metadata: serde_json::Map::new(),
                execution_time_ms: 0,
            })
        })
    }
}
