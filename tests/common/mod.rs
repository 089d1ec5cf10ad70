//! Common test utilities and helpers
//!
//! Shared fixtures for the integration suites: in-memory stores and
//! seeded cloud sessions.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};

use reelsync::cloud::{CloudAuth, SessionStore};
use reelsync::config::SyncConfig;
use reelsync::registry::RecordStore;
use reelsync::storage::MemoryBackend;

/// An initialized store over fresh in-memory backends
pub fn test_store() -> RecordStore {
    let backend: Arc<MemoryBackend> = Arc::new(MemoryBackend::new());
    let store = RecordStore::new(backend.clone(), backend, SyncConfig::default());
    store.init().expect("init fresh store");
    store
}

/// A session store pre-seeded with a valid signed-in session
pub fn signed_in_session(storage: Arc<MemoryBackend>) -> SessionStore {
    let session = SessionStore::new(storage);
    session.store(&test_auth()).expect("seed session");
    session
}

/// A valid, unexpired cloud session
pub fn test_auth() -> CloudAuth {
    CloudAuth {
        access_token: "test-access-token".to_string(),
        refresh_token: Some("test-refresh-token".to_string()),
        user_id: "user-1".to_string(),
        email: Some("tester@example.com".to_string()),
        expires_at: Some(Utc::now() + Duration::hours(1)),
    }
}
