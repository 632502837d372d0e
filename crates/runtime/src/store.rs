//! Key-value storage port and the expiring envelope layer on top of it.
//!
//! The backing store is whatever the embedding host provides (browser
//! localStorage, a file, a test map). Its failure contract is strict:
//! implementations never panic and never return errors -- a failing
//! backend reads as "value absent" and writes as "write refused", so the
//! rest of the runtime keeps operating in a memory-only mode.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// ──────────────────────────────────────────────
// Port
// ──────────────────────────────────────────────

/// Raw string key-value storage with best-effort semantics.
pub trait KeyValueStore: Send + Sync {
    /// Returns `None` for missing keys and for any backend failure.
    fn get(&self, key: &str) -> Option<String>;

    /// Returns `false` when the write was refused (quota, disabled
    /// storage); must not panic.
    fn set(&self, key: &str, value: &str) -> bool;

    fn remove(&self, key: &str);
}

/// In-memory store. Always succeeds; shared handles see the same map,
/// which is how tests simulate two tabs over one storage medium.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        true
    }

    fn remove(&self, key: &str) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }
}

/// Storage-disabled backend: every read misses, every write is refused.
/// Used to exercise the memory-only degradation path.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

impl KeyValueStore for NullStore {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&self, _key: &str, _value: &str) -> bool {
        false
    }

    fn remove(&self, _key: &str) {}
}

// ──────────────────────────────────────────────
// Expiring envelope layer
// ──────────────────────────────────────────────

/// Envelope wrapped around every stored value.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    written_at_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at_ms: Option<i64>,
    value: serde_json::Value,
}

/// Typed storage with per-entry expiry over a raw [`KeyValueStore`].
///
/// Reads of expired entries delete them and miss; malformed envelopes
/// (hand-edited storage, partial writes) also read as a miss. Writes
/// report success as a `bool`, never an error.
#[derive(Clone)]
pub struct ExpiringStore {
    backend: Arc<dyn KeyValueStore>,
}

impl ExpiringStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        ExpiringStore { backend }
    }

    /// Read and deserialize a value, honoring expiry.
    pub fn get<T: DeserializeOwned>(&self, key: &str, now_ms: i64) -> Option<T> {
        let raw = self.backend.get(key)?;
        let envelope: Envelope = match serde_json::from_str(&raw) {
            Ok(e) => e,
            Err(_) => {
                self.backend.remove(key);
                return None;
            }
        };
        if let Some(expires) = envelope.expires_at_ms {
            if now_ms >= expires {
                self.backend.remove(key);
                return None;
            }
        }
        serde_json::from_value(envelope.value).ok()
    }

    /// Wrap, stamp, and write a value. `ttl_ms` of `None` stores without
    /// expiry.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl_ms: Option<i64>, now_ms: i64) -> bool {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(_) => return false,
        };
        let envelope = Envelope {
            written_at_ms: now_ms,
            expires_at_ms: ttl_ms.map(|ttl| now_ms + ttl),
            value,
        };
        match serde_json::to_string(&envelope) {
            Ok(raw) => self.backend.set(key, &raw),
            Err(_) => false,
        }
    }

    pub fn remove(&self, key: &str) {
        self.backend.remove(key);
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn expiring() -> ExpiringStore {
        ExpiringStore::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn round_trip_without_ttl() {
        let store = expiring();
        assert!(store.set("k", &42u32, None, 1_000));
        assert_eq!(store.get::<u32>("k", 999_999_999), Some(42));
    }

    #[test]
    fn expired_entry_misses_and_is_deleted() {
        let backend = Arc::new(MemoryStore::new());
        let store = ExpiringStore::new(backend.clone());
        store.set("k", &"v".to_string(), Some(1_000), 0);

        assert_eq!(store.get::<String>("k", 500), Some("v".to_string()));
        assert_eq!(store.get::<String>("k", 1_000), None);
        // Deleted as a side effect of the expired read.
        assert_eq!(backend.get("k"), None);
    }

    #[test]
    fn malformed_envelope_reads_as_miss() {
        let backend = Arc::new(MemoryStore::new());
        backend.set("k", "not json at all");
        let store = ExpiringStore::new(backend.clone());

        assert_eq!(store.get::<String>("k", 0), None);
        assert_eq!(backend.get("k"), None);
    }

    #[test]
    fn null_store_degrades_silently() {
        let store = ExpiringStore::new(Arc::new(NullStore));
        assert!(!store.set("k", &1u8, None, 0));
        assert_eq!(store.get::<u8>("k", 0), None);
    }

    #[test]
    fn shared_backend_sees_fresh_writes() {
        // Two stores over one backend model two tabs.
        let backend = Arc::new(MemoryStore::new());
        let tab_a = ExpiringStore::new(backend.clone());
        let tab_b = ExpiringStore::new(backend);

        tab_a.set("k", &"from-a".to_string(), None, 0);
        assert_eq!(tab_b.get::<String>("k", 1), Some("from-a".to_string()));
    }
}
