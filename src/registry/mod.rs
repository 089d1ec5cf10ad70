//! # Film State Registry
//!
//! The local-first core: per-slug state records, filter preferences, the
//! two merge policies, the snapshot backup format, and the [`RecordStore`]
//! that ties them to debounced persistence and change notifications.
//!
//! ## Key Components
//!
//! - `record.rs`: record schema, flags, provenance, registry metadata
//! - `prefs.rs`: per-flag exclusion toggles
//! - `merge.rs`: timestamped and monotonic merge policies
//! - `snapshot.rs`: export/import backup document
//! - `store.rs`: the record store itself
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use reelsync::config::SyncConfig;
//! use reelsync::registry::{Flag, RecordStore, Source};
//! use reelsync::storage::MemoryBackend;
//!
//! let store = RecordStore::new(
//!     Arc::new(MemoryBackend::new()),
//!     Arc::new(MemoryBackend::new()),
//!     SyncConfig::default(),
//! );
//! store.init()?;
//! store.set_flag("dune-part-two", Flag::Watched, true, Source::UserAction)?;
//! assert!(store.should_exclude("dune-part-two")?);
//! # Ok::<(), reelsync::registry::RegistryError>(())
//! ```

pub mod merge;
pub mod prefs;
pub mod record;
pub mod snapshot;
pub mod store;

pub use merge::{merge_monotonic, merge_timestamped, UpgradeFlags};
pub use prefs::Preferences;
pub use record::{
    Flag, RegistryMeta, RegistryStats, Source, StateRecord, SyncCounts, DATA_VERSION,
};
pub use snapshot::{ImportReport, Snapshot, SnapshotMeta};
pub use store::{RecordChanged, RecordStore, PREFS_KEY, REGISTRY_KEY};

use thiserror::Error;

use crate::storage::StorageError;

/// Registry error types
#[derive(Debug, Error)]
pub enum RegistryError {
    /// An operation ran before [`RecordStore::init`] completed
    #[error("record store not initialized; call init() first")]
    NotInitialized,

    /// Durable substrate failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Registry blob or preferences (de)serialization failure
    #[error("registry serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A snapshot payload failed validation before merging
    #[error("invalid snapshot: {reason}")]
    InvalidSnapshot {
        /// Human-readable rejection reason
        reason: String,
    },
}
