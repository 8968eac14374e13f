//! Token budget accounting.

use std::sync::Mutex;

/// How close a budget is to exhaustion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetWarning {
    /// Comfortably under budget.
    None,
    /// Usage has crossed the warning threshold (default 70%).
    Warning,
    /// Usage has crossed the critical threshold (default 85%).
    Critical,
}

struct BudgetState {
    used: u64,
}

/// Tracks used / reserved / available tokens against a hard maximum.
///
/// `use_tokens`/`free` are the atomic primitives; every other query reads
/// the same lock so no caller ever observes a torn update.
pub struct TokenBudget {
    max_tokens: u64,
    reserved_tokens: u64,
    state: Mutex<BudgetState>,
}

impl TokenBudget {
    /// Build a budget with `reserved_tokens` carved out for the model's
    /// output, leaving `max_tokens - reserved_tokens` available for input.
    pub fn new(max_tokens: u64, reserved_tokens: u64) -> Self {
        Self {
            max_tokens,
            reserved_tokens,
            state: Mutex::new(BudgetState { used: 0 }),
        }
    }

    /// Atomically decrement available tokens by `n`, failing (and leaving
    /// the budget unchanged) if `n` exceeds what's available.
    pub fn use_tokens(&self, n: u64) -> bool {
        let mut state = self.state.lock().unwrap();
        let available = self.max_tokens.saturating_sub(self.reserved_tokens).saturating_sub(state.used);
        if n > available {
            return false;
        }
        state.used += n;
        true
    }

    /// Release `n` tokens back to the budget, clamped at zero used.
    pub fn free(&self, n: u64) {
        let mut state = self.state.lock().unwrap();
        state.used = state.used.saturating_sub(n);
    }

    /// Reset to the initial, empty state.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        state.used = 0;
    }

    /// Tokens currently in use.
    pub fn used(&self) -> u64 {
        self.state.lock().unwrap().used
    }

    /// Tokens still available for input.
    pub fn available(&self) -> u64 {
        let state = self.state.lock().unwrap();
        self.max_tokens.saturating_sub(self.reserved_tokens).saturating_sub(state.used)
    }

    /// Whether `n` more tokens would fit without exceeding the budget.
    pub fn can_fit(&self, n: u64) -> bool {
        n <= self.available()
    }

    /// Fraction of the usable budget (`max - reserved`) currently used, in `[0, 1]`.
    pub fn usage_pct(&self) -> f64 {
        let usable = self.max_tokens.saturating_sub(self.reserved_tokens);
        if usable == 0 {
            return 1.0;
        }
        self.used() as f64 / usable as f64
    }

    /// Whether usage has crossed the given threshold fraction (e.g. `0.7`).
    pub fn near_limit(&self, threshold: f64) -> bool {
        self.usage_pct() >= threshold
    }

    /// Whether usage has crossed the critical threshold (85%).
    pub fn is_critical(&self) -> bool {
        self.near_limit(0.85)
    }

    /// Whether usage has crossed the warning threshold (70%).
    pub fn needs_warning(&self) -> bool {
        self.near_limit(0.70)
    }

    /// Combined warning level, for display in `Segmented Memory`'s `stats()`.
    pub fn warning_level(&self) -> BudgetWarning {
        if self.is_critical() {
            BudgetWarning::Critical
        } else if self.needs_warning() {
            BudgetWarning::Warning
        } else {
            BudgetWarning::None
        }
    }
}
