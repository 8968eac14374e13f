//! Large-Object Store (C3): a content-addressed store for oversized tool
//! outputs, with reference handles, refcounts, TTL, and LRU eviction.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use agentflow_types::ReferenceId;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ObjectStoreError;

/// Classification of a stored value's shape, used to build a preview without
/// re-parsing the full payload on every access.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoredValueKind {
    /// A JSON object; preview carries field name -> JSON type.
    JsonObject {
        /// Field name to JSON type name (`"string"`, `"number"`, ...).
        schema: HashMap<String, String>,
    },
    /// A JSON array; preview carries item count and a sample.
    JsonArray {
        /// Number of items in the array.
        item_count: usize,
        /// First and last sampled items, rendered as JSON strings.
        sample: Vec<String>,
    },
    /// Plain text; preview carries first/last lines.
    Text {
        /// First N lines.
        head: Vec<String>,
        /// Last N lines.
        tail: Vec<String>,
    },
    /// CSV-shaped text; preview carries the header row and a few rows.
    Csv {
        /// Header columns.
        headers: Vec<String>,
        /// Sampled rows.
        sample_rows: Vec<String>,
    },
}

const PREVIEW_LINES: usize = 5;

fn classify(content_type: &str, bytes: &[u8]) -> StoredValueKind {
    let text = String::from_utf8_lossy(bytes);
    if content_type.contains("csv") {
        let mut lines = text.lines();
        let headers = lines
            .next()
            .map(|h| h.split(',').map(str::to_string).collect())
            .unwrap_or_default();
        let sample_rows = lines.take(PREVIEW_LINES).map(str::to_string).collect();
        return StoredValueKind::Csv { headers, sample_rows };
    }
    if let Ok(value) = serde_json::from_str::<Value>(&text) {
        match value {
            Value::Object(map) => {
                let schema = map.iter().map(|(k, v)| (k.clone(), json_type_name(v))).collect();
                return StoredValueKind::JsonObject { schema };
            }
            Value::Array(items) => {
                let sample = items
                    .iter()
                    .take(PREVIEW_LINES)
                    .map(|v| v.to_string())
                    .collect();
                return StoredValueKind::JsonArray { item_count: items.len(), sample };
            }
            _ => {}
        }
    }
    let lines: Vec<&str> = text.lines().collect();
    let head = lines.iter().take(PREVIEW_LINES).map(|s| s.to_string()).collect();
    let tail = lines
        .iter()
        .rev()
        .take(PREVIEW_LINES)
        .rev()
        .map(|s| s.to_string())
        .collect();
    StoredValueKind::Text { head, tail }
}

fn json_type_name(v: &Value) -> String {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
    .to_string()
}

/// A handle to a payload stored out of line in the Large-Object Store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataReference {
    /// Content-addressed id.
    pub id: ReferenceId,
    /// Declared content type.
    pub content_type: String,
    /// Size in bytes.
    pub size: usize,
    /// Current pin count.
    pub refcount: u32,
    /// When this entry was created.
    pub created_at_unix: i64,
    /// When this entry expires (TTL), in unix seconds.
    pub expires_at_unix: i64,
    /// Shape preview, computed once at store time.
    pub preview: StoredValueKind,
    /// Caller-supplied metadata.
    pub metadata: serde_json::Map<String, Value>,
}

struct Entry {
    reference: DataReference,
    bytes: Vec<u8>,
    last_access: Instant,
}

/// Configuration for eviction policy.
#[derive(Debug, Clone)]
pub struct ObjectStoreConfig {
    /// Eviction begins once in-memory bytes exceed this threshold.
    pub max_memory_bytes: usize,
    /// Entries are expired this long after their last access, regardless of refcount.
    pub ttl: Duration,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self { max_memory_bytes: 64 * 1024 * 1024, ttl: Duration::from_secs(3600) }
    }
}

struct Inner {
    entries: HashMap<ReferenceId, Entry>,
    /// LRU order over refcount == 0 entries, eligible for eviction.
    lru: LruCache<ReferenceId, ()>,
    memory_bytes: usize,
}

/// Content-addressed store for oversized tool outputs.
///
/// Store/refcount mutations are serialized under a single write lock; reads
/// take the read lock only while copying bytes out.
pub struct LargeObjectStore {
    config: ObjectStoreConfig,
    inner: RwLock<Inner>,
}

impl LargeObjectStore {
    /// Build a store with the given eviction policy.
    pub fn new(config: ObjectStoreConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                lru: LruCache::unbounded(),
                memory_bytes: 0,
            }),
        }
    }

    /// Store bytes under a content-derived id. Identical bytes converge on
    /// one entry; calling `store` again with the same content is equivalent
    /// to `retain`.
    pub fn store(
        &self,
        bytes: Vec<u8>,
        content_type: impl Into<String>,
        metadata: serde_json::Map<String, Value>,
    ) -> DataReference {
        let content_type = content_type.into();
        let id = ReferenceId::for_content(&bytes);
        let mut inner = self.inner.write().unwrap();

        if let Some(entry) = inner.entries.get_mut(&id) {
            entry.reference.refcount += 1;
            entry.last_access = Instant::now();
            inner.lru.pop(&id);
            return entry.reference.clone();
        }

        let now = chrono::Utc::now();
        let preview = classify(&content_type, &bytes);
        let size = bytes.len();
        let reference = DataReference {
            id: id.clone(),
            content_type,
            size,
            refcount: 1,
            created_at_unix: now.timestamp(),
            expires_at_unix: (now + chrono::Duration::from_std(self.config.ttl).unwrap_or_default()).timestamp(),
            preview,
            metadata,
        };
        inner.memory_bytes += size;
        inner.entries.insert(id, Entry { reference: reference.clone(), bytes, last_access: Instant::now() });
        self.evict_if_needed(&mut inner);
        reference
    }

    /// Fetch the stored bytes for a reference.
    pub fn get(&self, id: &ReferenceId) -> Result<Vec<u8>, ObjectStoreError> {
        let mut inner = self.inner.write().unwrap();
        if !inner.entries.contains_key(id) {
            return Err(ObjectStoreError::NotFound(id.to_string()));
        }
        let entry = inner.entries.get_mut(id).unwrap();
        entry.last_access = Instant::now();
        Ok(entry.bytes.clone())
    }

    /// Fetch metadata without the payload bytes.
    pub fn get_metadata(&self, id: &ReferenceId) -> Result<DataReference, ObjectStoreError> {
        let inner = self.inner.read().unwrap();
        inner
            .entries
            .get(id)
            .map(|e| e.reference.clone())
            .ok_or_else(|| ObjectStoreError::NotFound(id.to_string()))
    }

    /// Increment the refcount.
    pub fn retain(&self, id: &ReferenceId) {
        let mut inner = self.inner.write().unwrap();
        if let Some(entry) = inner.entries.get_mut(id) {
            entry.reference.refcount += 1;
            inner.lru.pop(id);
        }
    }

    /// Decrement the refcount, clamped at zero. An entry at refcount zero
    /// becomes eligible for LRU eviction, but is not evicted immediately.
    pub fn release(&self, id: &ReferenceId) {
        let mut inner = self.inner.write().unwrap();
        if let Some(entry) = inner.entries.get_mut(id) {
            entry.reference.refcount = entry.reference.refcount.saturating_sub(1);
            if entry.reference.refcount == 0 {
                inner.lru.put(id.clone(), ());
            }
        }
        self.evict_if_needed(&mut inner);
    }

    /// Drop every entry whose TTL has elapsed since last access, regardless
    /// of refcount.
    pub fn expire_stale(&self) {
        let mut inner = self.inner.write().unwrap();
        let ttl = self.config.ttl;
        let expired: Vec<ReferenceId> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.last_access.elapsed() > ttl)
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired {
            if let Some(entry) = inner.entries.remove(&id) {
                inner.memory_bytes -= entry.bytes.len();
                inner.lru.pop(&id);
            }
        }
    }

    fn evict_if_needed(&self, inner: &mut Inner) {
        while inner.memory_bytes > self.config.max_memory_bytes {
            let Some((id, ())) = inner.lru.pop_lru() else { break };
            if let Some(entry) = inner.entries.remove(&id) {
                inner.memory_bytes -= entry.bytes.len();
            }
        }
    }
}
