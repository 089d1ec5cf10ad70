//! In-memory storage backend
//!
//! Backs the registry with a plain map. Used by tests and as a stand-in
//! wherever durability is handled elsewhere.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{StorageBackend, StorageError};

/// Volatile backend holding blobs in a mutex-guarded map
#[derive(Debug, Default)]
pub struct MemoryBackend {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    /// Create an empty in-memory backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the backend holds no keys
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        // A poisoned lock still holds valid blob data
        self.blobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_remove() {
        let backend = MemoryBackend::new();
        assert!(backend.get("missing").unwrap().is_none());

        backend.set("k", b"v1").unwrap();
        assert_eq!(backend.get("k").unwrap(), Some(b"v1".to_vec()));

        backend.set("k", b"v2").unwrap();
        assert_eq!(backend.get("k").unwrap(), Some(b"v2".to_vec()));

        backend.remove("k").unwrap();
        assert!(backend.get("k").unwrap().is_none());
    }

    #[test]
    fn test_remove_absent_key_is_noop() {
        let backend = MemoryBackend::new();
        backend.remove("never-set").unwrap();
        assert!(backend.is_empty());
    }
}
