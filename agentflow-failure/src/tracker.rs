//! Per-session failure tracking (C7): consecutive per-tool failure counters
//! and the output-token exhaustion counter.

use std::collections::HashMap;
use std::sync::Mutex;

use agentflow_types::RuntimeError;
use serde_json::Value;

use crate::signature::canonical_signature;

const DEFAULT_ESCALATION_THRESHOLD: u32 = 2;

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
struct FailureKey {
    tool_name: String,
    input_signature: String,
    error_type: String,
}

/// Per-session tracker for consecutive tool failures and output-token
/// exhaustion. One instance per session, owned alongside its `Session`.
#[derive(Default)]
pub struct FailureTracker {
    consecutive: Mutex<HashMap<FailureKey, u32>>,
    output_exhaustion: Mutex<u32>,
}

impl FailureTracker {
    /// Build an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a tool failure, incrementing the counter for this
    /// (tool, input signature, error type) key.
    pub fn record(&self, tool_name: &str, input: &Value, error_type: &str) -> u32 {
        let key = FailureKey {
            tool_name: tool_name.to_string(),
            input_signature: canonical_signature(input),
            error_type: error_type.to_string(),
        };
        let mut counters = self.consecutive.lock().unwrap();
        let count = counters.entry(key).or_insert(0);
        *count += 1;
        *count
    }

    /// Reset the counter for this key after a success. Other input
    /// signatures for the same tool are unaffected.
    pub fn clear(&self, tool_name: &str, input: &Value) {
        let mut counters = self.consecutive.lock().unwrap();
        counters.retain(|key, _| !(key.tool_name == tool_name && key.input_signature == canonical_signature(input)));
    }

    /// Current consecutive-failure count for this key, `0` if never recorded.
    pub fn count_for(&self, tool_name: &str, input: &Value, error_type: &str) -> u32 {
        let key = FailureKey {
            tool_name: tool_name.to_string(),
            input_signature: canonical_signature(input),
            error_type: error_type.to_string(),
        };
        *self.consecutive.lock().unwrap().get(&key).unwrap_or(&0)
    }

    /// An escalation message, non-empty only once `n >= threshold`.
    pub fn escalation_message(n: u32, threshold: u32) -> Option<String> {
        if n >= threshold {
            Some(format!(
                "This has failed {n} times in a row (escalation threshold {threshold}). Consider a different approach."
            ))
        } else {
            None
        }
    }

    /// Default escalation threshold, used when the caller doesn't override it.
    pub fn default_escalation_threshold() -> u32 {
        DEFAULT_ESCALATION_THRESHOLD
    }

    /// Record an output-token-exhaustion event. Only increments when the
    /// response's tool calls were truncated; a non-truncated large response
    /// leaves the counter unchanged (callers separately call
    /// `clear_output_exhaustion` on any non-`max_tokens` response).
    pub fn record_output_exhaustion(&self, truncated: bool) -> u32 {
        let mut counter = self.output_exhaustion.lock().unwrap();
        if truncated {
            *counter += 1;
        }
        *counter
    }

    /// Zero the output-exhaustion counter.
    pub fn clear_output_exhaustion(&self) {
        *self.output_exhaustion.lock().unwrap() = 0;
    }

    /// Current output-exhaustion counter value.
    pub fn output_exhaustion_count(&self) -> u32 {
        *self.output_exhaustion.lock().unwrap()
    }

    /// Fail with [`RuntimeError::OutputExhausted`] once the counter reaches
    /// `threshold`.
    pub fn check_output_circuit_breaker(&self, threshold: u32) -> Result<(), RuntimeError> {
        let count = self.output_exhaustion_count();
        if count >= threshold {
            Err(RuntimeError::OutputExhausted { count, threshold, config_key: "output_token_cb_threshold" })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn different_signatures_track_independently() {
        let tracker = FailureTracker::new();
        tracker.record("list", &json!({"limit": 5}), "mcp_failure");
        tracker.record("list", &json!({"limit": 6}), "mcp_failure");
        assert_eq!(tracker.count_for("list", &json!({"limit": 5}), "mcp_failure"), 1);
        assert_eq!(tracker.count_for("list", &json!({"limit": 6}), "mcp_failure"), 1);
    }

    #[test]
    fn clear_resets_only_matching_signature() {
        let tracker = FailureTracker::new();
        tracker.record("list", &json!({"limit": 5}), "mcp_failure");
        tracker.record("list", &json!({"limit": 6}), "mcp_failure");
        tracker.clear("list", &json!({"limit": 5}));
        assert_eq!(tracker.count_for("list", &json!({"limit": 5}), "mcp_failure"), 0);
        assert_eq!(tracker.count_for("list", &json!({"limit": 6}), "mcp_failure"), 1);
    }

    #[test]
    fn escalation_message_only_past_threshold() {
        assert!(FailureTracker::escalation_message(1, 2).is_none());
        assert!(FailureTracker::escalation_message(2, 2).is_some());
    }

    #[test]
    fn output_exhaustion_triggers_at_threshold() {
        let tracker = FailureTracker::new();
        tracker.record_output_exhaustion(true);
        tracker.record_output_exhaustion(true);
        assert!(tracker.check_output_circuit_breaker(3).is_ok());
        tracker.record_output_exhaustion(true);
        let err = tracker.check_output_circuit_breaker(3).unwrap_err();
        assert!(matches!(err, RuntimeError::OutputExhausted { count: 3, threshold: 3, .. }));
    }

    #[test]
    fn non_truncated_response_does_not_increment() {
        let tracker = FailureTracker::new();
        tracker.record_output_exhaustion(true);
        tracker.record_output_exhaustion(false);
        assert_eq!(tracker.output_exhaustion_count(), 1);
    }

    #[test]
    fn clear_output_exhaustion_restarts_counter() {
        let tracker = FailureTracker::new();
        tracker.record_output_exhaustion(true);
        tracker.record_output_exhaustion(true);
        tracker.clear_output_exhaustion();
        assert_eq!(tracker.output_exhaustion_count(), 0);
    }
}
