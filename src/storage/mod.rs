//! # Durable Key-Value Substrate
//!
//! Abstraction over the durable stores the registry persists into. Two
//! logical domains are used at runtime: a device-local domain for the
//! registry blob, the offline write queue and the cloud session, and a
//! device-synchronized domain for filter preferences.
//!
//! Blobs are opaque byte strings; callers own the (de)serialization.
//! The registry blob is only ever written wholesale, never patched in
//! place, so a backend needs no partial-update support.

mod file;
mod memory;

pub use file::JsonFileBackend;
pub use memory::MemoryBackend;

use thiserror::Error;

/// Durable key-value backend consumed by the registry and queues
pub trait StorageBackend: Send + Sync {
    /// Read the blob stored under `key`, if any
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Write `value` under `key`, replacing any previous blob
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Remove the blob stored under `key`; removing an absent key is a no-op
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Storage backend errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem I/O failure
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend-specific failure
    #[error("storage backend error: {message}")]
    Backend {
        /// Human-readable error message
        message: String,
    },
}

impl StorageError {
    /// Create a new backend error
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}
