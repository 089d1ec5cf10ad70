//! # Cloud Synchronization
//!
//! Everything that talks to the remote store: the persisted session
//! ([`CloudAuth`]/[`SessionStore`]), the REST client ([`CloudClient`]),
//! the bounded offline write queue ([`WriteQueue`]) and the push
//! subscriber ([`CloudPush`]) that reacts to record-changed events.
//!
//! The remote store keys rows by `(owner_id, slug)` and upserts with a
//! conflict target on that composite key, so a sparse row carrying only
//! one flag column updates exactly that flag for an existing row.
//!
//! No failure here is fatal: a missing session is a structured skip, a
//! network error enqueues the write for a later flush, and flush retains
//! whatever still fails in original order.

pub mod auth;
pub mod client;
pub mod push;
pub mod write_queue;

pub use auth::{CloudAuth, SessionStore, SESSION_KEY};
pub use client::{CloudClient, StateRow};
pub use push::{sync_bidirectional, CloudPush, SyncSummary};
pub use write_queue::{FlushReport, QueuedWrite, WriteQueue, QUEUE_KEY};

use thiserror::Error;

use crate::registry::RegistryError;
use crate::storage::StorageError;

/// Cloud operation errors
#[derive(Debug, Error)]
pub enum CloudError {
    /// No valid session; the caller decides whether that matters
    #[error("not signed in")]
    NotSignedIn,

    /// Transport-level failure (DNS, connect, timeout)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-success HTTP response from the remote store
    #[error("cloud request failed ({status}): {body}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body, for diagnostics
        body: String,
    },

    /// Wire payload (de)serialization failure
    #[error("cloud serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Durable substrate failure while loading or saving queue/session
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Local registry failure during a sync cycle
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
