//! The `query_tool_result` tool (C9 step 5): progressive disclosure over a
//! large result previously stored in the Large-Object Store.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use agentflow_store::LargeObjectStore;
use agentflow_tool::{ToolDyn, ToolError};
use agentflow_types::{ReferenceId, ToolContext, ToolDefinition, ToolOutput, ToolResultPayload};
use serde_json::{json, Value};

use crate::well_known::QUERY_TOOL_RESULT_NAME;

/// Fetches a line-windowed slice of a stored large result by reference id.
pub struct QueryToolResultTool {
    store: Arc<LargeObjectStore>,
}

impl QueryToolResultTool {
    /// Build the tool over the given large-object store.
    pub fn new(store: Arc<LargeObjectStore>) -> Self {
        Self { store }
    }
}

impl ToolDyn for QueryToolResultTool {
    fn name(&self) -> &str {
        QUERY_TOOL_RESULT_NAME
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: QUERY_TOOL_RESULT_NAME.to_string(),
            description: "Fetch a slice of a previously stored large tool result by its reference id.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "reference_id": {"type": "string"},
                    "offset": {"type": "integer", "minimum": 0},
                    "limit": {"type": "integer", "minimum": 1}
                },
                "required": ["reference_id"]
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
            let reference_id = input
                .get("reference_id")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolError::InvalidInput("reference_id is required".to_string()))?;
            let offset = input.get("offset").and_then(Value::as_u64).unwrap_or(0) as usize;
            let limit = input.get("limit").and_then(Value::as_u64).unwrap_or(200) as usize;

            let id = ReferenceId(reference_id.to_string());
            let bytes = store.get(&id).map_err(|err| ToolError::ExecutionFailed(err.to_string()))?;
            let text = String::from_utf8_lossy(&bytes);
            let lines: Vec<&str> = text.lines().collect();
            let total_lines = lines.len();
            let slice = lines.iter().skip(offset).take(limit).copied().collect::<Vec<_>>().join("\n");

            let mut metadata = serde_json::Map::new();
            metadata.insert("total_lines".to_string(), Value::from(total_lines));
            metadata.insert("offset".to_string(), Value::from(offset));
            metadata.insert("returned_lines".to_string(), Value::from(slice.lines().count()));

            Ok(ToolOutput {
                success: true,
                data: Some(ToolResultPayload::Text { text: slice }),
                error: None,
                metadata,
                execution_time_ms: 0,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentflow_store::ObjectStoreConfig;
    use agentflow_types::SessionId;

    #[tokio::test]
    async fn fetches_a_window_of_stored_lines() {
        let store = Arc::new(LargeObjectStore::new(ObjectStoreConfig::default()));
        let reference = store.store(b"a\nb\nc\nd".to_vec(), "text/plain", Default::default());
        let tool = QueryToolResultTool::new(Arc::clone(&store));
        let ctx = ToolContext::new(SessionId::new("s1"));

        let output = tool
            .call(json!({"reference_id": reference.id.as_str(), "offset": 1, "limit": 2}), &ctx)
            .await
            .unwrap();
        match output.data {
            Some(ToolResultPayload::Text { text }) => assert_eq!(text, "b\nc"),
            _ => panic!("expected text payload"),
        }
    }

    #[tokio::test]
    async fn unknown_reference_errors() {
        let store = Arc::new(LargeObjectStore::new(ObjectStoreConfig::default()));
        let tool = QueryToolResultTool::new(store);
        let ctx = ToolContext::new(SessionId::new("s1"));
        let result = tool.call(json!({"reference_id": "ref_missing"}), &ctx).await;
        assert!(result.is_err());
    }
}
