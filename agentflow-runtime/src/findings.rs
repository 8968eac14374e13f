//! Optional background finding extraction, cadenced by tool-call count.

use agentflow_types::Message;
use async_trait::async_trait;

/// Injected collaborator that distills findings from recent conversation
/// turns. Absence disables extraction regardless of `ExtractionConfig::enabled`.
#[async_trait]
pub trait FindingsExtractor: Send + Sync {
    /// Extract zero or more findings from the messages seen so far.
    async fn extract(&self, messages: &[Message]) -> Vec<String>;
}
