//! Configuration surface for the Conversation Loop (§6).

use serde::{Deserialize, Serialize};

/// How the loop caps a completion's `max_tokens`.
///
/// Resolved open question: no single compiled-in constant. `Fixed` names an
/// exact cap; `FractionOfBudget` scales with whatever the token budget
/// currently reports as available.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum MaxOutputTokensPolicy {
    /// A fixed output-token cap, independent of the current budget.
    Fixed(u32),
    /// A fraction of the token budget's currently available tokens.
    FractionOfBudget(f32),
}

impl Default for MaxOutputTokensPolicy {
    fn default() -> Self {
        MaxOutputTokensPolicy::FractionOfBudget(0.25)
    }
}

impl MaxOutputTokensPolicy {
    /// Resolve this policy against the tokens currently available in the budget.
    pub fn resolve(&self, available: u64) -> usize {
        match self {
            MaxOutputTokensPolicy::Fixed(n) => *n as usize,
            MaxOutputTokensPolicy::FractionOfBudget(frac) => {
                ((available as f64) * (*frac as f64)).round() as usize
            }
        }
    }
}

/// Background finding-extraction tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Whether extraction runs at all.
    pub enabled: bool,
    /// Run extraction every `cadence` tool calls.
    pub cadence: u32,
    /// Stop recording new findings once the kernel holds this many.
    pub max_findings: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self { enabled: true, cadence: 3, max_findings: 50 }
    }
}

/// Conversation Loop tunables (§6 "Loop bounds", "Output-token circuit
/// breaker", "Finding extraction").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Maximum LLM turns before forced synthesis.
    pub max_turns: u32,
    /// Maximum tool executions across the whole loop before forced synthesis.
    pub max_tool_executions: u32,
    /// Consecutive `max_tokens` stops (with empty/truncated tool calls)
    /// before the output-token circuit breaker trips.
    pub output_token_cb_threshold: u32,
    /// How the loop caps each completion's `max_tokens`.
    pub max_output_tokens: MaxOutputTokensPolicy,
    /// Background finding extraction.
    pub extraction: ExtractionConfig,
    /// Minimum pattern-classifier confidence required to inject a pattern.
    pub min_pattern_confidence: f64,
    /// Guidance returned as the response content when synthesis itself fails.
    pub synthesis_guidance: String,
    /// Escalation threshold passed to `FailureTracker::escalation_message`.
    pub escalation_threshold: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_turns: 25,
            max_tool_executions: 50,
            output_token_cb_threshold: 3,
            max_output_tokens: MaxOutputTokensPolicy::default(),
            extraction: ExtractionConfig::default(),
            min_pattern_confidence: 0.6,
            synthesis_guidance:
                "I've reached my turn or tool-call limit for this request. Here is what I found so far; \
                 please let me know if you'd like me to continue."
                    .to_string(),
            escalation_threshold: agentflow_failure::FailureTracker::default_escalation_threshold(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_policy_ignores_available() {
        assert_eq!(MaxOutputTokensPolicy::Fixed(4_096).resolve(100), 4_096);
    }

    #[test]
    fn fraction_policy_scales_with_available() {
        let resolved = MaxOutputTokensPolicy::FractionOfBudget(0.5).resolve(1_000);
        assert_eq!(resolved, 500);
    }

    #[test]
    fn defaults_match_configuration_surface() {
        let config = LoopConfig::default();
        assert_eq!(config.max_turns, 25);
        assert_eq!(config.max_tool_executions, 50);
        assert_eq!(config.output_token_cb_threshold, 3);
        assert!(config.extraction.enabled);
        assert_eq!(config.extraction.cadence, 3);
        assert_eq!(config.extraction.max_findings, 50);
    }
}
