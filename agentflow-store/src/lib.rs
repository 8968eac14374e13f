#![deny(missing_docs)]
//! Large-object store and durable session store for the agentflow runtime.

pub mod error;
pub mod large_object;
pub mod memory_store;
pub mod session_store;
pub mod sqlite_store;

pub use error::{ObjectStoreError, StorageError};
pub use large_object::{DataReference, LargeObjectStore, ObjectStoreConfig, StoredValueKind};
pub use memory_store::MemorySessionStore;
pub use session_store::{CleanupHook, SearchHit, SessionStore};
pub use sqlite_store::SqliteSessionStore;
