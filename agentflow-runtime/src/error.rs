//! Boundary mapping from per-crate error enums into the unified
//! [`RuntimeError`] vocabulary the conversation loop returns.
//!
//! `RuntimeError` lives in `agentflow-types`, which depends on none of the
//! crates whose errors are mapped here — so these are free functions, not
//! `From` impls (a `From<ToolError> for RuntimeError` impl here would be an
//! orphan impl: neither type is local to this crate).

use agentflow_types::RuntimeError;

use agentflow_memory::MemoryError;
use agentflow_store::{ObjectStoreError, StorageError};
use agentflow_tool::ToolError;
use agentflow_types::ProviderError;

/// Map an [`ObjectStoreError`] to the unified vocabulary.
pub fn from_object_store_error(err: ObjectStoreError) -> RuntimeError {
    match err {
        ObjectStoreError::NotFound(what) => RuntimeError::NotFound(what),
        ObjectStoreError::Io(err) => RuntimeError::TransientIo(err.to_string()),
    }
}

/// Map a [`ToolError`] to the unified vocabulary.
pub fn from_tool_error(err: ToolError) -> RuntimeError {
    match err {
        ToolError::NotRegistered(name) => RuntimeError::NotFound(format!("tool not registered: {name}")),
        ToolError::InvalidInput(msg) => RuntimeError::InvalidArgument { message: msg, suggestion: None },
        ToolError::ExecutionFailed(msg) => RuntimeError::TransientIo(msg),
        ToolError::PermissionDenied(msg) => RuntimeError::PermissionDenied(msg),
        ToolError::Cancelled => RuntimeError::Fatal("tool call cancelled".to_string()),
    }
}

/// Map a [`StorageError`] to the unified vocabulary.
pub fn from_storage_error(err: StorageError) -> RuntimeError {
    match err {
        StorageError::NotFound(what) => RuntimeError::NotFound(what),
        StorageError::Serialization(msg) => RuntimeError::Fatal(format!("serialization error: {msg}")),
        StorageError::Database(msg) => RuntimeError::TransientIo(msg),
        StorageError::Cancelled => RuntimeError::Fatal("storage operation cancelled".to_string()),
    }
}

/// Map a [`MemoryError`] to the unified vocabulary.
pub fn from_memory_error(err: MemoryError) -> RuntimeError {
    match err {
        MemoryError::BudgetExceeded { requested, available } => RuntimeError::BudgetExceeded { requested, available },
        MemoryError::NotEnabled => RuntimeError::InvalidArgument {
            message: "swap is not enabled for this session".to_string(),
            suggestion: Some("inject a session store to enable retrieve/promote/search".to_string()),
        },
        MemoryError::Compression(err) => RuntimeError::Fatal(err.to_string()),
        MemoryError::Storage(err) => from_storage_error(err),
    }
}

/// Map a [`ProviderError`] to the unified vocabulary.
pub fn from_provider_error(err: ProviderError) -> RuntimeError {
    if err.is_retryable() {
        RuntimeError::TransientIo(err.to_string())
    } else {
        RuntimeError::Fatal(err.to_string())
    }
}
