//! Message and content types shared across the loop, memory, and storage crates.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The system prompt.
    System,
    /// A human user.
    User,
    /// The LLM assistant.
    Assistant,
    /// A tool result fed back to the assistant.
    Tool,
}

/// A single tool invocation requested by the assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier for this call, assigned by the model.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// Structured input arguments.
    pub input: serde_json::Value,
}

/// A block of message content.
///
/// Kept as a tagged union rather than a single string so a message can carry
/// text alongside tool calls or a tool result without ad hoc string packing.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
    /// A tool invocation request from the assistant.
    ToolUse {
        /// Identifier for this call.
        id: String,
        /// Tool name.
        name: String,
        /// Structured input.
        input: serde_json::Value,
    },
    /// Result of a tool invocation, fed back as a `tool` message.
    ToolResult {
        /// The `ToolUse::id` this result answers.
        tool_use_id: String,
        /// Rendered result content shown to the model.
        content: String,
        /// Whether the tool call errored.
        is_error: bool,
    },
}

/// Where a message is visible from, for cross-session/sub-agent queries.
///
/// See [`crate::session_store::SessionStore::load_messages_from_parent_session`]:
/// loading a parent session's view for a sub-agent includes only `Coordinator`
/// and `Shared` messages, never `Direct`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionContext {
    /// Visible only within the owning session.
    Direct,
    /// Visible to sub-agents of the owning session.
    Shared,
    /// Visible to sub-agents and surfaced as coordinator-authored.
    Coordinator,
}

/// A single message in a session's append-only history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Author role.
    pub role: Role,
    /// Content blocks.
    pub content: Vec<ContentBlock>,
    /// When this message was appended.
    pub timestamp: DateTime<Utc>,
    /// Token count as measured by the token counter at append time.
    pub token_count: u32,
    /// Cost attributed to this message, if known (assistant messages only).
    pub cost_usd: Option<Decimal>,
    /// Visibility of this message to sub-agents of the owning session.
    pub session_context: SessionContext,
}

impl Message {
    /// Build a user message with a single text block.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::text(Role::User, text)
    }

    /// Build an assistant message with a single text block.
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(Role::Assistant, text)
    }

    /// Build a system message with a single text block.
    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self::text(Role::System, text)
    }

    fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![ContentBlock::Text { text: text.into() }],
            timestamp: Utc::now(),
            token_count: 0,
            cost_usd: None,
            session_context: SessionContext::Direct,
        }
    }

    /// Build an assistant message carrying tool calls.
    #[must_use]
    pub fn assistant_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: calls
                .into_iter()
                .map(|c| ContentBlock::ToolUse {
                    id: c.id,
                    name: c.name,
                    input: c.input,
                })
                .collect(),
            timestamp: Utc::now(),
            token_count: 0,
            cost_usd: None,
            session_context: SessionContext::Direct,
        }
    }

    /// Build a tool-result message.
    #[must_use]
    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        Self {
            role: Role::Tool,
            content: vec![ContentBlock::ToolResult {
                tool_use_id: tool_use_id.into(),
                content: content.into(),
                is_error,
            }],
            timestamp: Utc::now(),
            token_count: 0,
            cost_usd: None,
            session_context: SessionContext::Direct,
        }
    }

    /// Whether this message carries any tool-use blocks.
    pub fn has_tool_calls(&self) -> bool {
        self.content.iter().any(|b| matches!(b, ContentBlock::ToolUse { .. }))
    }

    /// Ids of every `ToolUse` block in this message, in order.
    pub fn tool_use_ids(&self) -> Vec<&str> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Plain-text rendering, concatenating every `Text` block.
    pub fn as_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_use_ids_extracts_in_order() {
        let msg = Message::assistant_tool_calls(vec![
            ToolCall { id: "t1".into(), name: "list".into(), input: serde_json::json!({}) },
            ToolCall { id: "t2".into(), name: "get".into(), input: serde_json::json!({}) },
        ]);
        assert_eq!(msg.tool_use_ids(), vec!["t1", "t2"]);
    }

    #[test]
    fn as_text_joins_text_blocks_only() {
        let msg = Message::user("hello");
        assert_eq!(msg.as_text(), "hello");
    }

    #[test]
    fn tool_result_marks_error() {
        let msg = Message::tool_result("t1", "boom", true);
        match &msg.content[0] {
            ContentBlock::ToolResult { is_error, .. } => assert!(is_error),
            _ => panic!("expected tool result"),
        }
    }
}
