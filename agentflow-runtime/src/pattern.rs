//! Optional pattern-injection collaborator consulted before the loop starts.
//!
//! Intent classification and the pattern library itself are out of scope
//! (§1 Non-goals); this trait is only the seam the loop calls through if a
//! caller wires one in.

use async_trait::async_trait;

/// A pattern recommended for the user's message, with the classifier's
/// confidence in the recommendation.
#[derive(Debug, Clone)]
pub struct PatternRecommendation {
    /// Formatted pattern text, injected into the kernel once.
    pub text: String,
    /// Classifier confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Injected collaborator recommending a pattern for the user's opening message.
#[async_trait]
pub trait PatternSource: Send + Sync {
    /// Recommend a pattern for `user_message`, or `None` if nothing fits.
    async fn recommend(&self, user_message: &str) -> Option<PatternRecommendation>;
}
