//! The injectable `Compressor` used to fold evicted L1 batches into L2 text,
//! and the deterministic fallback used when none is configured.

use async_trait::async_trait;
use agentflow_types::{Message, Role};
use thiserror::Error;

/// Failure producing a compressed summary.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ContextError {
    /// The injected compressor (typically LLM-backed) failed.
    #[error("compression failed: {0}")]
    CompressionFailed(String),
}

/// Produces a summary of a batch of evicted L1 messages for storage in L2.
///
/// Object-safe so the memory manager can hold it behind `Arc<dyn Compressor>`
/// without making `SegmentedMemory` generic over a provider type.
#[async_trait]
pub trait Compressor: Send + Sync {
    /// Summarize `messages`, oldest first, into replacement L2 text.
    async fn compress(&self, messages: &[Message]) -> Result<String, ContextError>;
}

/// Deterministic, LLM-free fallback: role-prefixed, per-message truncated
/// concatenation. Used whenever no `Compressor` is injected, and as the
/// behavior a caller can rely on in tests without a live model.
pub struct DeterministicCompressor {
    per_message_chars: usize,
}

impl DeterministicCompressor {
    /// Build a fallback compressor truncating each message body to
    /// `per_message_chars` characters.
    pub fn new(per_message_chars: usize) -> Self {
        Self { per_message_chars }
    }
}

impl Default for DeterministicCompressor {
    fn default() -> Self {
        Self::new(280)
    }
}

#[async_trait]
impl Compressor for DeterministicCompressor {
    async fn compress(&self, messages: &[Message]) -> Result<String, ContextError> {
        Ok(summarize_deterministically(messages, self.per_message_chars))
    }
}

/// The plain-function form of [`DeterministicCompressor::compress`], used
/// directly by [`crate::segmented::SegmentedMemory`] when no `Compressor`
/// is configured at all (avoiding an `Arc<dyn Compressor>` allocation on
/// the hot path).
pub fn summarize_deterministically(messages: &[Message], per_message_chars: usize) -> String {
    messages
        .iter()
        .map(|m| {
            let role = role_prefix(m.role);
            let text = m.as_text();
            let truncated = truncate_chars(&text, per_message_chars);
            format!("[{role}] {truncated}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn role_prefix(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}…")
}

/// Re-ranks search candidates by relevance to a query, using an injected
/// LLM provider. Deliberately narrower than `agentflow_types::Provider` so
/// `SegmentedMemory` can hold it behind `Arc<dyn Reranker>` without the
/// non-object-safe `Provider` trait leaking into this crate.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Return the indices of `candidates` in descending relevance order to
    /// `query`. Implementations should return all indices exactly once.
    async fn rerank(&self, query: &str, candidates: &[String]) -> Result<Vec<usize>, ContextError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentflow_types::Message;

    #[tokio::test]
    async fn deterministic_compressor_prefixes_role_and_truncates() {
        let compressor = DeterministicCompressor::new(5);
        let messages = vec![Message::user("hello world this is long")];
        let summary = compressor.compress(&messages).await.unwrap();
        assert!(summary.starts_with("[user] hello"));
        assert!(summary.ends_with('…'));
    }

    #[test]
    fn truncate_chars_is_noop_under_limit() {
        assert_eq!(truncate_chars("short", 100), "short");
    }
}
