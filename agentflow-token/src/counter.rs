//! Deterministic token counting.

use agentflow_types::{ContentBlock, Message};
use tiktoken_rs::CoreBPE;

/// Fixed per-message overhead added by [`TokenCounter::count_messages`],
/// approximating provider-side framing (role markers, separators).
pub const MESSAGE_OVERHEAD_TOKENS: u32 = 10;

/// Fixed per-tool-result overhead added by [`TokenCounter::count_tool_results`].
pub const TOOL_RESULT_OVERHEAD_TOKENS: u32 = 20;

/// Tokens charged for a reference-handle summary in place of an inlined
/// tool result body.
pub const REFERENCE_HANDLE_TOKENS: u32 = 50;

/// Deterministic, idempotent token counter.
///
/// Built once by the composition root and shared behind an `Arc` — this is
/// a plain value, not a hidden global. Wraps a BPE encoder; if construction
/// of the encoder fails, counting falls back to `byte_len / 4` for the
/// lifetime of this instance and a warning is logged once.
pub struct TokenCounter {
    bpe: Option<CoreBPE>,
}

impl TokenCounter {
    /// Build a counter using a cl100k-class BPE encoder, falling back to
    /// the byte-length heuristic if the encoder cannot be constructed.
    pub fn new() -> Self {
        match tiktoken_rs::cl100k_base() {
            Ok(bpe) => Self { bpe: Some(bpe) },
            Err(err) => {
                tracing::warn!(error = %err, "failed to initialize BPE encoder, falling back to byte-length heuristic");
                Self { bpe: None }
            }
        }
    }

    /// Count tokens in a single string. Deterministic and idempotent:
    /// calling this twice on the same text returns the same count.
    pub fn count(&self, text: &str) -> u32 {
        match &self.bpe {
            Some(bpe) => bpe.encode_with_special_tokens(text).len() as u32,
            None => (text.len() as u32).div_ceil(4),
        }
    }

    /// Count tokens across a batch of messages, including fixed per-message
    /// overhead and the serialized cost of tool calls / tool results.
    pub fn count_messages(&self, messages: &[Message]) -> u32 {
        messages.iter().map(|m| self.count_message(m)).sum()
    }

    fn count_message(&self, message: &Message) -> u32 {
        let mut total = MESSAGE_OVERHEAD_TOKENS;
        for block in &message.content {
            total += match block {
                ContentBlock::Text { text } => self.count(text),
                ContentBlock::ToolUse { name, input, .. } => {
                    self.count(name) + self.count(&input.to_string())
                }
                ContentBlock::ToolResult { content, .. } => self.count(content),
            };
        }
        total
    }

    /// Count tokens across cached tool results, charging the reference-handle
    /// overhead for results that were stored out of line rather than inlined.
    pub fn count_tool_results(&self, results: &[CachedToolResultTokens<'_>]) -> u32 {
        results
            .iter()
            .map(|r| {
                let mut total = TOOL_RESULT_OVERHEAD_TOKENS + self.count(r.name) + self.count(r.args);
                total += match r.inline_body {
                    Some(body) => self.count(body),
                    None => REFERENCE_HANDLE_TOKENS,
                };
                total
            })
            .sum()
    }
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// View over a cached tool result sufficient for counting, without pulling
/// in `agentflow-store`'s richer `CachedToolResult` type.
pub struct CachedToolResultTokens<'a> {
    /// Tool name.
    pub name: &'a str,
    /// Serialized input arguments.
    pub args: &'a str,
    /// Inlined result body, or `None` if the result is stored via a reference.
    pub inline_body: Option<&'a str>,
}
