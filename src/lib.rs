//! ReelSync - Main Library
//!
//! ReelSync is a local-first film state engine: every watched/liked/
//! watchlist/skip flag a user sets is recorded locally first, then
//! synchronized with a cloud store and reconciled against the catalog
//! site's own collection listings.
//!
//! # Overview
//!
//! This library provides the core functionality for ReelSync, including:
//! - A per-film flag registry with debounced local persistence
//! - Timestamped per-field merging of remote state (last write wins)
//! - Monotonic flag upgrades from paginated collection crawls
//! - An offline write queue so flag changes survive disconnection
//! - A strictly serialized background action queue for catalog-site actions
//!
//! # Module Structure
//!
//! - **`registry`** - The film state registry
//!   - Per-film records, preferences, merge policies
//!   - Snapshot export/import for manual backup
//!
//! - **`storage`** - Durable key/value substrates
//!   - In-memory backend for tests, JSON-file backend for devices
//!
//! - **`cloud`** - Remote synchronization
//!   - REST client, session handling, bounded offline write queue
//!   - Change-driven push pipeline and full bidirectional sync
//!
//! - **`crawl`** - Collection listing crawler
//!   - Paced, bounded pagination over watched/liked/watchlist listings
//!
//! - **`actions`** - Serialized catalog-site action queue
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use reelsync::config::SyncConfig;
//! use reelsync::registry::{Flag, RecordStore, Source};
//! use reelsync::storage::MemoryBackend;
//!
//! # fn example() -> Result<(), reelsync::registry::RegistryError> {
//! let backend = Arc::new(MemoryBackend::new());
//! let store = RecordStore::new(backend.clone(), backend, SyncConfig::default());
//! store.init()?;
//! store.set_flag("dune-part-two", Flag::Watched, true, Source::UserAction)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! All state is thread-safe: the registry lives behind `Arc<RwLock<>>`,
//! change notifications flow through `broadcast::Sender`, and the write
//! queue serializes access with an async mutex.
//!
//! # Error Handling
//!
//! Each module exposes its own `thiserror` enum (`RegistryError`,
//! `CloudError`, `CrawlError`, `ActionError`, `StorageError`); fallible
//! operations return `Result` and propagate with `?`.

/// Serialized catalog-site action queue
pub mod actions;

/// Remote synchronization: client, session, queue, push pipeline
pub mod cloud;

/// Tunable timing and capacity knobs
pub mod config;

/// Paginated collection listing crawler
pub mod crawl;

/// Per-film flag registry and merge policies
pub mod registry;

/// Durable key/value substrates
pub mod storage;

pub use config::SyncConfig;
pub use registry::{Flag, RecordStore, Source, StateRecord};
