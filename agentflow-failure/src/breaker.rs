//! Per-tool circuit breakers (C8).

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agentflow_types::RuntimeError;
use chrono::{DateTime, Utc};

/// Circuit breaker tunables.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BreakerConfig {
    /// Failures within `window` needed to trip the breaker.
    pub failure_threshold: u32,
    /// Rolling window over which failures are counted.
    #[serde(with = "humantime_serde_secs")]
    pub window: Duration,
    /// How long the breaker stays open before allowing a probe.
    #[serde(with = "humantime_serde_secs")]
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, window: Duration::from_secs(60), cooldown: Duration::from_secs(30) }
    }
}

mod humantime_serde_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_secs().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

/// Breaker state for one tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct BreakerEntry {
    state: State,
    failures: VecDeque<DateTime<Utc>>,
    opened_at: Option<DateTime<Utc>>,
}

impl BreakerEntry {
    fn new() -> Self {
        Self { state: State::Closed, failures: VecDeque::new(), opened_at: None }
    }
}

/// Per-tool Closed → Open → HalfOpen → Closed state machine, isolating a
/// persistently failing tool without aborting the loop.
#[derive(Default)]
pub struct CircuitBreaker {
    config: BreakerConfigByTool,
    entries: Mutex<HashMap<String, BreakerEntry>>,
    guardrail: Option<Arc<dyn GuardrailEngine>>,
}

/// Per-tool config override, falling back to a default.
#[derive(Default)]
struct BreakerConfigByTool {
    default: BreakerConfig,
    overrides: HashMap<String, BreakerConfig>,
}

impl CircuitBreaker {
    /// Build a breaker using one config for every tool.
    pub fn new(default: BreakerConfig) -> Self {
        Self {
            config: BreakerConfigByTool { default, overrides: HashMap::new() },
            entries: Mutex::new(HashMap::new()),
            guardrail: None,
        }
    }

    /// Install a guardrail engine, consulted on every failure and cleared on
    /// the next success (§4.8: "a guardrail engine, when enabled,
    /// additionally records structured per-session error analyses and
    /// clears them on the next success").
    #[must_use]
    pub fn with_guardrail(mut self, guardrail: Arc<dyn GuardrailEngine>) -> Self {
        self.guardrail = Some(guardrail);
        self
    }

    /// Override the config for a specific tool.
    pub fn set_tool_config(&mut self, tool_name: impl Into<String>, config: BreakerConfig) {
        self.config.overrides.insert(tool_name.into(), config);
    }

    fn config_for(&self, tool_name: &str) -> &BreakerConfig {
        self.config.overrides.get(tool_name).unwrap_or(&self.config.default)
    }

    /// Check whether a call to `tool_name` is currently permitted, transitioning
    /// Open → HalfOpen once the cooldown has elapsed.
    pub fn check(&self, tool_name: &str) -> Result<(), RuntimeError> {
        let cfg = self.config_for(tool_name).clone();
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(tool_name.to_string()).or_insert_with(BreakerEntry::new);
        match entry.state {
            State::Closed => Ok(()),
            State::HalfOpen => Ok(()),
            State::Open => {
                let opened_at = entry.opened_at.unwrap_or_else(Utc::now);
                let elapsed = Utc::now().signed_duration_since(opened_at);
                if elapsed.to_std().unwrap_or_default() >= cfg.cooldown {
                    entry.state = State::HalfOpen;
                    Ok(())
                } else {
                    Err(RuntimeError::CircuitOpen { tool: tool_name.to_string() })
                }
            }
        }
    }

    /// Record a successful call, closing the breaker and clearing any
    /// guardrail analysis recorded against it.
    pub fn record_success(&self, tool_name: &str) {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(tool_name.to_string()).or_insert_with(BreakerEntry::new);
        entry.state = State::Closed;
        entry.failures.clear();
        entry.opened_at = None;
        drop(entries);

        if let Some(guardrail) = &self.guardrail {
            guardrail.clear(tool_name);
        }
    }

    /// Record a failed call. A probe failure during `HalfOpen` re-opens
    /// immediately; otherwise the breaker opens once the rolling window has
    /// accumulated `failure_threshold` failures. When a guardrail is
    /// installed, every failure is recorded against it regardless of whether
    /// it trips the breaker.
    pub fn record_failure(&self, tool_name: &str) {
        let cfg = self.config_for(tool_name).clone();
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(tool_name.to_string()).or_insert_with(BreakerEntry::new);

        if entry.state == State::HalfOpen {
            entry.state = State::Open;
            entry.opened_at = Some(Utc::now());
            drop(entries);
            if let Some(guardrail) = &self.guardrail {
                guardrail.record_failure_analysis(tool_name, "probe failure during half-open recovery".to_string());
            }
            return;
        }

        let now = Utc::now();
        entry.failures.push_back(now);
        while let Some(&front) = entry.failures.front() {
            let age = now.signed_duration_since(front).to_std().unwrap_or_default();
            if age > cfg.window {
                entry.failures.pop_front();
            } else {
                break;
            }
        }
        let tripped = entry.failures.len() as u32 >= cfg.failure_threshold;
        if tripped {
            entry.state = State::Open;
            entry.opened_at = Some(now);
        }
        let failure_count = entry.failures.len();
        drop(entries);

        if let Some(guardrail) = &self.guardrail {
            let analysis = if tripped {
                format!("breaker tripped for {tool_name} after {failure_count} failures within the rolling window")
            } else {
                format!("failure {failure_count}/{} recorded for {tool_name}", cfg.failure_threshold)
            };
            guardrail.record_failure_analysis(tool_name, analysis);
        }
    }

    /// Whether the breaker for `tool_name` is currently open.
    pub fn is_open(&self, tool_name: &str) -> bool {
        matches!(self.entries.lock().unwrap().get(tool_name).map(|e| e.state), Some(State::Open))
    }
}

/// Structured per-session error analysis recorded by an optional guardrail
/// engine, cleared automatically on the next success.
pub trait GuardrailEngine: Send + Sync {
    /// Record an analysis of a failure for `tool_name`.
    fn record_failure_analysis(&self, tool_name: &str, analysis: String);
    /// Clear any recorded analysis for `tool_name` after a success.
    fn clear(&self, tool_name: &str);
}
