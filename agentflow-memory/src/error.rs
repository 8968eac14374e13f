//! Errors from segmented-memory and memory-manager operations.

use agentflow_store::StorageError;
use thiserror::Error;

use crate::compressor::ContextError;

/// Errors surfaced by [`crate::segmented::SegmentedMemory`] and
/// [`crate::manager::MemoryManager`].
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum MemoryError {
    /// A `promote` call would exceed the remaining token budget.
    #[error("budget exceeded: requested {requested}, available {available}")]
    BudgetExceeded {
        /// Tokens the promotion would have consumed.
        requested: u64,
        /// Tokens actually available.
        available: u64,
    },
    /// `retrieve`/`promote`/`search` were called with swap disabled (no
    /// session store injected).
    #[error("swap is not enabled for this session")]
    NotEnabled,
    /// The injected (or fallback) compressor failed.
    #[error(transparent)]
    Compression(#[from] ContextError),
    /// The backing session store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
