//! LLM provider interface.
//!
//! `Provider` uses RPITIT and is intentionally not object-safe — the
//! conversation loop is generic over `P: Provider`, so there is no need to
//! box or type-erase it the way the tool registry must.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::content::Message;

/// System prompt sent with a completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SystemPrompt {
    /// A single text block.
    Text(String),
    /// Structured blocks (e.g. for provider-side prompt caching).
    Blocks(Vec<SystemBlock>),
}

/// A block within a structured system prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemBlock {
    /// Block text.
    pub text: String,
    /// Optional cache control.
    pub cache_control: Option<CacheControl>,
}

/// Prompt-cache control for a system block or tool definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheControl {
    /// Cache lifetime.
    pub ttl: CacheTtl,
}

/// Supported cache lifetimes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum CacheTtl {
    /// Five minutes.
    FiveMinutes,
    /// One hour.
    OneHour,
}

impl From<String> for SystemPrompt {
    fn from(s: String) -> Self {
        SystemPrompt::Text(s)
    }
}

impl From<&str> for SystemPrompt {
    fn from(s: &str) -> Self {
        SystemPrompt::Text(s.to_string())
    }
}

/// A completion request sent to an LLM provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model identifier.
    pub model: String,
    /// Conversation messages, already assembled by segmented memory.
    pub messages: Vec<Message>,
    /// System prompt, including the date/time prelude.
    pub system: Option<SystemPrompt>,
    /// Tool definitions available this turn. `None` requests a no-tools
    /// (synthesis) call.
    pub tools: Option<Vec<crate::tool::ToolDefinition>>,
    /// Maximum tokens to generate, per the configured output-token policy.
    pub max_tokens: Option<usize>,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of turn.
    EndTurn,
    /// Model wants to invoke tools.
    ToolUse,
    /// Hit the output token cap mid-generation.
    MaxTokens,
    /// Hit a stop sequence.
    StopSequence,
    /// Content was filtered.
    ContentFilter,
}

/// Token and cost accounting for one completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input/prompt tokens.
    pub input_tokens: u64,
    /// Output/completion tokens.
    pub output_tokens: u64,
    /// Total cost in USD, if the provider reports pricing.
    pub cost_usd: Option<rust_decimal::Decimal>,
}

impl TokenUsage {
    /// Input + output tokens.
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// A completion response from an LLM provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// The response message (role is always `Assistant`).
    pub message: Message,
    /// Why generation stopped.
    pub stop_reason: StopReason,
    /// Token usage for this call.
    pub usage: TokenUsage,
}

/// Errors from LLM provider operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The request failed at the transport layer.
    #[error("request failed: {0}")]
    RequestFailed(String),
    /// The provider rate-limited the request.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Suggested retry delay, if the provider reported one.
        retry_after: Option<Duration>,
    },
    /// Authentication or authorization failed.
    #[error("auth failed: {0}")]
    AuthFailed(String),
    /// The provider's response could not be parsed.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ProviderError {
    /// Whether retrying this request might succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. } | ProviderError::RequestFailed(_)
        )
    }
}

/// LLM provider interface. Each concrete provider (Anthropic, OpenAI,
/// Ollama, a test double) implements this trait; the conversation loop is
/// generic over it rather than boxing it, so provider-specific extras never
/// need to cross a type-erasure boundary.
pub trait Provider: Send + Sync {
    /// The provider's display name (used in logs and error messages).
    fn name(&self) -> &str;

    /// Whether this provider supports streaming responses. The loop consults
    /// this to select a streaming-aware system prompt variant.
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Send a completion request.
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<CompletionResponse, ProviderError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_retryable() {
        assert!(ProviderError::RateLimited { retry_after: None }.is_retryable());
        assert!(ProviderError::RequestFailed("timeout".into()).is_retryable());
        assert!(!ProviderError::AuthFailed("bad key".into()).is_retryable());
    }

    #[test]
    fn token_usage_totals() {
        let usage = TokenUsage { input_tokens: 10, output_tokens: 5, cost_usd: None };
        assert_eq!(usage.total_tokens(), 15);
    }
}
