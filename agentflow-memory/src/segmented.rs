//! Segmented Memory (C5): the six-tier per-session memory store — ROM,
//! kernel, L1, L2, swap, promoted — with adaptive compression, eviction,
//! retrieval/search, and token-budget accounting.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use agentflow_store::SessionStore;
use agentflow_types::{Message, MemorySnapshot, SessionId};
use agentflow_token::{BudgetWarning, TokenBudget, TokenCounter};
use chrono::Utc;
use tokio::sync::RwLock;

use crate::compressor::{summarize_deterministically, Compressor, Reranker};
use crate::error::MemoryError;
use crate::kernel::Kernel;
use crate::profile::CompressionProfile;

const MAX_RETRIEVE_LIMIT: usize = 50;
const L2_SEPARATOR: &str = "\n---\n";

/// Per-tier token accounting returned by [`SegmentedMemory::stats`].
#[derive(Debug, Clone)]
pub struct MemoryStats {
    /// Tokens attributed to ROM text.
    pub rom_tokens: u32,
    /// Tokens attributed to the rendered kernel.
    pub kernel_tokens: u32,
    /// Tokens attributed to L1 messages.
    pub l1_tokens: u32,
    /// Tokens attributed to L2 text.
    pub l2_tokens: u32,
    /// Tokens attributed to promoted messages.
    pub promoted_tokens: u32,
    /// Fraction of the usable context budget in use, in `[0, 1]`.
    pub usage_pct: f64,
    /// Coarse severity label for `usage_pct` against the active profile's
    /// thresholds: one of `""`, `"info"`, `"warning"`, `"critical"`.
    pub budget_warning: &'static str,
    /// Number of times L2 has been evicted to swap.
    pub eviction_count: u64,
    /// Number of `retrieve` calls served from swap.
    pub retrieval_count: u64,
}

struct Inner {
    kernel: Kernel,
    l1: VecDeque<Message>,
    l2: String,
    promoted: Vec<Message>,
}

/// Dependencies injected into a `SegmentedMemory` by the Memory Manager.
#[derive(Default)]
pub struct MemoryDeps {
    /// Enables `retrieve`/`promote`/`search` and L2-overflow snapshotting.
    pub session_store: Option<Arc<dyn SessionStore>>,
    /// Folds evicted L1 batches into L2 text; falls back to a deterministic
    /// truncation when absent.
    pub compressor: Option<Arc<dyn Compressor>>,
    /// Re-ranks `search` candidates by relevance; absent means insertion order.
    pub reranker: Option<Arc<dyn Reranker>>,
}

/// Tiered per-session memory: ROM, kernel, L1, L2, swap, promoted.
pub struct SegmentedMemory {
    session_id: SessionId,
    rom: String,
    inner: RwLock<Inner>,
    budget: TokenBudget,
    counter: Arc<TokenCounter>,
    profile: CompressionProfile,
    max_l2_tokens: u32,
    deps: MemoryDeps,
    eviction_counter: AtomicU64,
    retrieval_counter: AtomicU64,
}

impl SegmentedMemory {
    /// Build a fresh segmented memory for `session_id`.
    pub fn new(
        session_id: SessionId,
        rom: impl Into<String>,
        counter: Arc<TokenCounter>,
        budget: TokenBudget,
        profile: CompressionProfile,
        max_l2_tokens: u32,
        deps: MemoryDeps,
    ) -> Self {
        Self {
            session_id,
            rom: rom.into(),
            inner: RwLock::new(Inner {
                kernel: Kernel::default(),
                l1: VecDeque::new(),
                l2: String::new(),
                promoted: Vec::new(),
            }),
            budget,
            counter,
            profile,
            max_l2_tokens,
            deps,
            eviction_counter: AtomicU64::new(0),
            retrieval_counter: AtomicU64::new(0),
        }
    }

    /// The active compression profile.
    pub fn profile(&self) -> &CompressionProfile {
        &self.profile
    }

    /// The token budget backing this memory's context window.
    pub fn budget(&self) -> &TokenBudget {
        &self.budget
    }

    /// Mutable access to the kernel tier, for callers recording tool
    /// results or findings outside of `add_message`.
    pub async fn with_kernel_mut<R>(&self, f: impl FnOnce(&mut Kernel) -> R) -> R {
        let mut inner = self.inner.write().await;
        f(&mut inner.kernel)
    }

    /// Append a message to L1, accounting its tokens against the budget and
    /// triggering compression if L1 has grown past the profile's threshold
    /// or the budget has crossed its critical usage level.
    pub async fn add_message(&self, mut message: Message) -> Result<(), MemoryError> {
        let tokens = self.counter.count_messages(std::slice::from_ref(&message));
        message.token_count = tokens;

        let mut inner = self.inner.write().await;
        inner.l1.push_back(message);
        if !self.budget.use_tokens(tokens as u64) {
            tracing::debug!(session_id = %self.session_id, tokens, "token budget exceeded on add_message, compression will reclaim");
        }

        let should_compress =
            inner.l1.len() > self.profile.max_l1_tokens as usize || self.budget.is_critical();
        if should_compress {
            self.compress(&mut inner).await?;
        }
        Ok(())
    }

    fn batch_size_for_usage(&self) -> u32 {
        let usage_pct = self.budget.usage_pct() * 100.0;
        if usage_pct >= self.profile.critical_pct as f64 {
            self.profile.critical_batch
        } else if usage_pct >= self.profile.warning_pct as f64 {
            self.profile.warning_batch
        } else {
            self.profile.normal_batch
        }
    }

    /// Compress the oldest batch of L1 into L2, evicting L2 overflow to swap.
    async fn compress(&self, inner: &mut Inner) -> Result<(), MemoryError> {
        let min_l1 = self.profile.min_l1_messages as usize;
        let available_to_compress = inner.l1.len().saturating_sub(min_l1);
        if available_to_compress == 0 {
            return Ok(());
        }
        let batch_size = (self.batch_size_for_usage() as usize).min(available_to_compress);
        if batch_size == 0 {
            return Ok(());
        }

        let batch: Vec<Message> = inner.l1.drain(..batch_size).collect();
        let freed: u64 = batch.iter().map(|m| m.token_count as u64).sum();
        self.budget.free(freed);

        let summary = match &self.deps.compressor {
            Some(compressor) => compressor.compress(&batch).await?,
            None => summarize_deterministically(&batch, 280),
        };

        if !inner.l2.is_empty() {
            inner.l2.push_str(L2_SEPARATOR);
        }
        inner.l2.push_str(&summary);

        self.evict_l2_overflow_if_needed(inner).await?;
        Ok(())
    }

    async fn evict_l2_overflow_if_needed(&self, inner: &mut Inner) -> Result<(), MemoryError> {
        while self.counter.count(&inner.l2) > self.max_l2_tokens {
            let Some((oldest, rest)) = inner.l2.split_once(L2_SEPARATOR) else {
                break;
            };
            let oldest = oldest.to_string();
            inner.l2 = rest.to_string();

            if let Some(store) = &self.deps.session_store {
                let snapshot = MemorySnapshot {
                    session_id: self.session_id.clone(),
                    kind: "l2_summary".to_string(),
                    text: oldest,
                    created_at: Utc::now(),
                };
                store.save_memory_snapshot(&snapshot).await?;
            }
            self.eviction_counter.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    /// Retrieve a bounded window of this session's persisted message
    /// history, oldest first. Requires a session store to be injected.
    pub async fn retrieve(&self, offset: usize, limit: usize) -> Result<Vec<Message>, MemoryError> {
        let store = self.deps.session_store.as_ref().ok_or(MemoryError::NotEnabled)?;
        let limit = limit.min(MAX_RETRIEVE_LIMIT);
        let records = store.load_messages(&self.session_id).await?;
        self.retrieval_counter.fetch_add(1, Ordering::SeqCst);
        Ok(records.into_iter().skip(offset).take(limit).map(|r| r.message).collect())
    }

    /// Add messages to the promoted tier, only if their combined token cost
    /// fits in the remaining budget. On failure, promoted is left unchanged.
    pub async fn promote(&self, messages: Vec<Message>) -> Result<(), MemoryError> {
        let tokens = self.counter.count_messages(&messages) as u64;
        if !self.budget.use_tokens(tokens) {
            return Err(MemoryError::BudgetExceeded { requested: tokens, available: self.budget.available() });
        }
        let mut inner = self.inner.write().await;
        inner.promoted.extend(messages);
        Ok(())
    }

    /// Drop the promoted tier, freeing its tokens back to the budget, and
    /// return how many messages were dropped.
    pub async fn clear_promoted(&self) -> usize {
        let mut inner = self.inner.write().await;
        let tokens: u64 = inner.promoted.iter().map(|m| m.token_count as u64).sum();
        let count = inner.promoted.len();
        inner.promoted.clear();
        self.budget.free(tokens);
        count
    }

    /// Full-text search over this session's persisted history, optionally
    /// re-ranked by an injected `Reranker`.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<Message>, MemoryError> {
        let store = self.deps.session_store.as_ref().ok_or(MemoryError::NotEnabled)?;
        let hits = store.search_messages(Some(&self.session_id), query, limit).await?;
        let mut messages: Vec<Message> = hits.into_iter().map(|h| h.record.message).collect();

        if let Some(reranker) = &self.deps.reranker {
            if messages.len() > 1 {
                let texts: Vec<String> = messages.iter().map(|m| m.as_text()).collect();
                if let Ok(order) = reranker.rerank(query, &texts).await {
                    let mut reordered = Vec::with_capacity(messages.len());
                    let mut taken = vec![false; messages.len()];
                    for idx in order {
                        if let Some(true) = taken.get(idx) {
                            continue;
                        }
                        if idx < messages.len() {
                            taken[idx] = true;
                            reordered.push(messages[idx].clone());
                        }
                    }
                    for (idx, msg) in messages.into_iter().enumerate() {
                        if !taken[idx] {
                            reordered.push(msg);
                        }
                    }
                    messages = reordered;
                }
            }
        }
        Ok(messages)
    }

    /// Compose the context sent to the LLM: a system message carrying ROM,
    /// the rendered kernel, and L2 text, followed by promoted messages and
    /// then L1, in that order.
    pub async fn context_for_llm(&self) -> Vec<Message> {
        let inner = self.inner.read().await;
        let mut system_text = self.rom.clone();

        let kernel_text = inner.kernel.render();
        if !kernel_text.is_empty() {
            system_text.push_str("\n\n");
            system_text.push_str(&kernel_text);
        }
        if !inner.l2.is_empty() {
            system_text.push_str("\n\nconversation summary:\n");
            system_text.push_str(&inner.l2);
        }

        let mut messages = vec![Message::system(system_text)];
        messages.extend(inner.promoted.iter().cloned());
        messages.extend(inner.l1.iter().cloned());
        messages
    }

    /// Per-tier token accounting and usage classification.
    pub async fn stats(&self) -> MemoryStats {
        let inner = self.inner.read().await;
        let rom_tokens = self.counter.count(&self.rom);
        let kernel_tokens = self.counter.count(&inner.kernel.render());
        let l1_tokens: u32 = inner.l1.iter().map(|m| m.token_count).sum();
        let l2_tokens = self.counter.count(&inner.l2);
        let promoted_tokens: u32 = inner.promoted.iter().map(|m| m.token_count).sum();

        let usage_pct = self.budget.usage_pct();
        let usage_as_pct = usage_pct * 100.0;
        let budget_warning = if usage_as_pct >= self.profile.critical_pct as f64 {
            "critical"
        } else if usage_as_pct >= self.profile.warning_pct as f64 {
            "warning"
        } else if usage_as_pct >= (self.profile.warning_pct as f64) / 2.0 {
            "info"
        } else {
            ""
        };

        MemoryStats {
            rom_tokens,
            kernel_tokens,
            l1_tokens,
            l2_tokens,
            promoted_tokens,
            usage_pct,
            budget_warning,
            eviction_count: self.eviction_counter.load(Ordering::SeqCst),
            retrieval_count: self.retrieval_counter.load(Ordering::SeqCst),
        }
    }

    /// Current L1 message count, for invariant checks in tests.
    pub async fn l1_len(&self) -> usize {
        self.inner.read().await.l1.len()
    }

    /// Whether the budget's own three-level warning has crossed `Critical`.
    pub fn budget_warning_level(&self) -> BudgetWarning {
        self.budget.warning_level()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentflow_store::MemorySessionStore;

    fn memory(profile: CompressionProfile, max_tokens: u64, deps: MemoryDeps) -> SegmentedMemory {
        SegmentedMemory::new(
            SessionId::new("s1"),
            "system prompt",
            Arc::new(TokenCounter::new()),
            TokenBudget::new(max_tokens, 0),
            profile,
            2_000,
            deps,
        )
    }

    #[tokio::test]
    async fn add_message_keeps_l1_within_bounds() {
        let profile = CompressionProfile { max_l1_tokens: 3, min_l1_messages: 1, ..CompressionProfile::balanced() };
        let mem = memory(profile.clone(), 100_000, MemoryDeps::default());
        for i in 0..10 {
            mem.add_message(Message::user(format!("message {i}"))).await.unwrap();
        }
        let len = mem.l1_len().await;
        assert!(len >= profile.min_l1_messages as usize);
        assert!(len <= profile.max_l1_tokens as usize);
    }

    #[tokio::test]
    async fn promote_fails_when_over_budget() {
        let mem = memory(CompressionProfile::balanced(), 5, MemoryDeps::default());
        let big = vec![Message::user("x".repeat(10_000))];
        let err = mem.promote(big).await.unwrap_err();
        assert!(matches!(err, MemoryError::BudgetExceeded { .. }));
        assert_eq!(mem.clear_promoted().await, 0);
    }

    #[tokio::test]
    async fn retrieve_without_swap_is_not_enabled() {
        let mem = memory(CompressionProfile::balanced(), 100_000, MemoryDeps::default());
        assert!(matches!(mem.retrieve(0, 10).await, Err(MemoryError::NotEnabled)));
    }

    #[tokio::test]
    async fn retrieve_returns_messages_in_order() {
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
        let session_id = SessionId::new("s1");
        store
            .save_session(&agentflow_types::SessionRecord::new(session_id.clone(), None, None))
            .await
            .unwrap();
        for text in ["first", "second", "third"] {
            store
                .save_message(&agentflow_types::MessageRecord { session_id: session_id.clone(), message: Message::user(text) })
                .await
                .unwrap();
        }
        let deps = MemoryDeps { session_store: Some(store), ..Default::default() };
        let mem = SegmentedMemory::new(
            session_id,
            "rom",
            Arc::new(TokenCounter::new()),
            TokenBudget::new(100_000, 0),
            CompressionProfile::balanced(),
            2_000,
            deps,
        );
        let retrieved = mem.retrieve(0, 2).await.unwrap();
        assert_eq!(retrieved.len(), 2);
        assert_eq!(retrieved[0].as_text(), "first");
        assert_eq!(retrieved[1].as_text(), "second");
    }

    #[tokio::test]
    async fn context_for_llm_orders_rom_kernel_l2_promoted_l1() {
        let mem = memory(CompressionProfile::balanced(), 100_000, MemoryDeps::default());
        mem.with_kernel_mut(|k| k.add_finding("a finding")).await;
        mem.add_message(Message::user("hi")).await.unwrap();
        let context = mem.context_for_llm().await;
        assert_eq!(context.len(), 2);
        let system_text = context[0].as_text();
        assert!(system_text.contains("system prompt"));
        assert!(system_text.contains("a finding"));
        assert_eq!(context[1].as_text(), "hi");
    }

    #[tokio::test]
    async fn eviction_counter_increments_once_l2_overflows() {
        let profile = CompressionProfile { max_l1_tokens: 1, min_l1_messages: 1, normal_batch: 1, warning_batch: 1, critical_batch: 1, ..CompressionProfile::balanced() };
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
        let deps = MemoryDeps { session_store: Some(store), ..Default::default() };
        let mem = SegmentedMemory::new(
            SessionId::new("s1"),
            "rom",
            Arc::new(TokenCounter::new()),
            TokenBudget::new(1_000_000, 0),
            profile,
            20,
            deps,
        );
        for i in 0..30 {
            mem.add_message(Message::user(format!("filler text number {i} with some extra padding words"))).await.unwrap();
        }
        let stats = mem.stats().await;
        assert!(stats.eviction_count > 0);
    }
}
