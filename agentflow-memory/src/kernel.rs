//! Kernel tier: small process-window state carried alongside L1/L2 —
//! the most recent tool results, a schema LRU, and extracted findings.

use std::collections::VecDeque;

use agentflow_types::ReferenceId;
use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// A recently executed tool call, cached for quick re-display without a
/// round trip through the session store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedToolResult {
    /// Tool name.
    pub name: String,
    /// Input arguments as passed to the tool.
    pub input: serde_json::Value,
    /// Short human-readable summary of the result.
    pub summary: String,
    /// Reference handle, when the full payload was stored out of line.
    pub reference: Option<ReferenceId>,
    /// When this result was produced.
    pub timestamp: DateTime<Utc>,
}

const DEFAULT_CACHED_RESULTS: usize = 1;
const DEFAULT_SCHEMA_CACHE: usize = 10;

/// Process-window state: the most recent tool results (bounded), a schema
/// LRU keyed by tool name, and extracted findings text.
pub struct Kernel {
    cached_results: VecDeque<CachedToolResult>,
    max_cached_results: usize,
    schema_cache: LruCache<String, serde_json::Value>,
    findings: Vec<String>,
}

impl Kernel {
    /// Build a kernel with the given capacities.
    pub fn new(max_cached_results: usize, schema_cache_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(schema_cache_capacity.max(1)).unwrap();
        Self {
            cached_results: VecDeque::new(),
            max_cached_results: max_cached_results.max(1),
            schema_cache: LruCache::new(capacity),
            findings: Vec::new(),
        }
    }

    /// Push a newly executed tool result, evicting the oldest once over capacity.
    pub fn push_result(&mut self, result: CachedToolResult) {
        self.cached_results.push_back(result);
        while self.cached_results.len() > self.max_cached_results {
            self.cached_results.pop_front();
        }
    }

    /// The currently cached tool results, oldest first.
    pub fn cached_results(&self) -> &VecDeque<CachedToolResult> {
        &self.cached_results
    }

    /// Record (or refresh) a tool's input schema in the LRU.
    pub fn remember_schema(&mut self, tool_name: impl Into<String>, schema: serde_json::Value) {
        self.schema_cache.put(tool_name.into(), schema);
    }

    /// Look up a cached schema, refreshing its LRU position.
    pub fn schema_for(&mut self, tool_name: &str) -> Option<&serde_json::Value> {
        self.schema_cache.get(tool_name)
    }

    /// Append an extracted finding.
    pub fn add_finding(&mut self, finding: impl Into<String>) {
        self.findings.push(finding.into());
    }

    /// All findings extracted so far, in extraction order.
    pub fn findings(&self) -> &[String] {
        &self.findings
    }

    /// Render the kernel as context text: findings, then a one-line summary
    /// per cached tool result.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        if !self.findings.is_empty() {
            lines.push("findings:".to_string());
            for finding in &self.findings {
                lines.push(format!("- {finding}"));
            }
        }
        for result in &self.cached_results {
            lines.push(format!("[tool:{}] {}", result.name, result.summary));
        }
        lines.join("\n")
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new(DEFAULT_CACHED_RESULTS, DEFAULT_SCHEMA_CACHE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(name: &str) -> CachedToolResult {
        CachedToolResult {
            name: name.to_string(),
            input: json!({}),
            summary: format!("{name} ran"),
            reference: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn default_caps_to_one_cached_result() {
        let mut kernel = Kernel::default();
        kernel.push_result(result("a"));
        kernel.push_result(result("b"));
        assert_eq!(kernel.cached_results().len(), 1);
        assert_eq!(kernel.cached_results().front().unwrap().name, "b");
    }

    #[test]
    fn schema_cache_evicts_lru() {
        let mut kernel = Kernel::new(1, 2);
        kernel.remember_schema("a", json!({}));
        kernel.remember_schema("b", json!({}));
        kernel.remember_schema("c", json!({}));
        assert!(kernel.schema_for("a").is_none());
        assert!(kernel.schema_for("b").is_some());
        assert!(kernel.schema_for("c").is_some());
    }

    #[test]
    fn render_includes_findings_and_results() {
        let mut kernel = Kernel::default();
        kernel.add_finding("discovered X");
        kernel.push_result(result("search"));
        let rendered = kernel.render();
        assert!(rendered.contains("discovered X"));
        assert!(rendered.contains("search ran"));
    }
}
