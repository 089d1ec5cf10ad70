//! # Record Store
//!
//! Owns the in-memory slug-to-record map plus registry metadata, persists
//! both wholesale into the device-local storage domain with a debounced
//! save, and broadcasts a [`RecordChanged`] event for every flag mutation
//! so the cloud-push subscriber can react without the store knowing about
//! remote transport.
//!
//! ## Persistence model
//!
//! A mutating call schedules a save after a quiescence window; further
//! mutations inside the window supersede the pending save, so bursts
//! coalesce into one physical write. An abrupt termination can lose at
//! most one window of local changes; every user mutation is independently
//! queued for remote delivery, so the remote copy survives the loss.
//!
//! ## Concurrency
//!
//! Interior state lives behind `Arc<RwLock<..>>`. Each operation is a
//! complete read-modify-write, so logically concurrent callers (gesture,
//! crawl, pull, page snapshot) may interleave in any order without
//! corrupting a record.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::config::SyncConfig;
use crate::storage::StorageBackend;

use super::merge::{merge_monotonic, merge_timestamped, UpgradeFlags};
use super::prefs::Preferences;
use super::record::{
    Flag, RegistryMeta, RegistryStats, Source, StateRecord, SyncCounts, DATA_VERSION,
};
use super::snapshot::{ImportReport, Snapshot, SnapshotMeta};
use super::RegistryError;

/// Device-local storage key for the registry blob
pub const REGISTRY_KEY: &str = "reelsync_state";

/// Device-synchronized storage key for preferences
pub const PREFS_KEY: &str = "reelsync_prefs";

/// Notification emitted for every flag mutation
#[derive(Debug, Clone, PartialEq)]
pub struct RecordChanged {
    pub slug: String,
    pub flag: Flag,
    pub value: bool,
    pub timestamp: DateTime<Utc>,
    pub source: Source,
}

/// Persisted registry blob: metadata plus the full record map
#[derive(Debug, Serialize, Deserialize)]
struct RegistryBlob {
    #[serde(rename = "_meta", default)]
    meta: RegistryMeta,
    #[serde(default)]
    slugs: HashMap<String, StateRecord>,
}

#[derive(Debug, Default)]
struct StoreState {
    registry: HashMap<String, StateRecord>,
    meta: RegistryMeta,
    prefs: Preferences,
    loaded: bool,
}

/// Per-film state registry with debounced persistence
pub struct RecordStore {
    state: Arc<RwLock<StoreState>>,
    local: Arc<dyn StorageBackend>,
    synced: Arc<dyn StorageBackend>,
    events: broadcast::Sender<RecordChanged>,
    save_generation: Arc<AtomicU64>,
    config: SyncConfig,
}

impl RecordStore {
    /// Create a store over a device-local and a device-synchronized backend
    ///
    /// The store is unusable until [`init`](Self::init) has run.
    pub fn new(
        local: Arc<dyn StorageBackend>,
        synced: Arc<dyn StorageBackend>,
        config: SyncConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity);
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            local,
            synced,
            events,
            save_generation: Arc::new(AtomicU64::new(0)),
            config,
        }
    }

    /// Load the persisted registry, metadata and preferences, exactly once
    ///
    /// Idempotent: subsequent calls are no-ops. Every other operation fails
    /// with [`RegistryError::NotInitialized`] until this has completed. A
    /// corrupt persisted blob is logged and replaced with a fresh registry
    /// rather than failing startup.
    pub fn init(&self) -> Result<(), RegistryError> {
        let mut state = self.write_state();
        if state.loaded {
            return Ok(());
        }

        match self.local.get(REGISTRY_KEY)? {
            Some(bytes) => match serde_json::from_slice::<RegistryBlob>(&bytes) {
                Ok(mut blob) => {
                    if blob.meta.version < DATA_VERSION {
                        migrate(&mut blob);
                    }
                    tracing::info!(
                        "[Registry] loaded {} records (version {})",
                        blob.slugs.len(),
                        blob.meta.version
                    );
                    state.registry = blob.slugs;
                    state.meta = blob.meta;
                }
                Err(e) => {
                    tracing::warn!("[Registry] persisted state unreadable, starting fresh: {}", e);
                }
            },
            None => {
                tracing::info!("[Registry] no persisted state, starting fresh");
            }
        }

        match self.synced.get(PREFS_KEY)? {
            Some(bytes) => match serde_json::from_slice::<Preferences>(&bytes) {
                Ok(prefs) => state.prefs = prefs,
                Err(e) => {
                    tracing::warn!("[Registry] persisted prefs unreadable, using defaults: {}", e);
                }
            },
            None => {}
        }

        state.loaded = true;
        Ok(())
    }

    /// Whether [`init`](Self::init) has completed
    pub fn is_loaded(&self) -> bool {
        self.read_state().loaded
    }

    /// Look up the record for `slug`
    pub fn get(&self, slug: &str) -> Result<Option<StateRecord>, RegistryError> {
        let state = self.read_state();
        ensure_loaded(&state)?;
        Ok(state.registry.get(slug).cloned())
    }

    /// Set a single flag, creating the record lazily
    ///
    /// Updates the flag and its timestamp together, stamps `last_action`,
    /// `source` and `updated_at`, schedules a debounced save and broadcasts
    /// a [`RecordChanged`] notification. Returns the mutation timestamp.
    pub fn set_flag(
        &self,
        slug: &str,
        flag: Flag,
        value: bool,
        source: Source,
    ) -> Result<DateTime<Utc>, RegistryError> {
        let now = {
            let mut state = self.write_state();
            ensure_loaded(&state)?;

            let record = state.registry.entry(slug.to_string()).or_default();
            // Keep updated_at monotonically non-decreasing even if the wall
            // clock stepped backwards between calls.
            let mut now = Utc::now();
            if let Some(updated) = record.updated_at {
                if updated > now {
                    now = updated;
                }
            }
            record.set(flag, value, now);
            record.last_action = Some(flag);
            record.source = Some(source);
            record.updated_at = Some(now);
            now
        };

        self.schedule_save();
        tracing::debug!("[Registry] {} {}={} ({:?})", slug, flag.as_str(), value, source);
        // No subscribers is fine; the push side may not be running.
        let _ = self.events.send(RecordChanged {
            slug: slug.to_string(),
            flag,
            value,
            timestamp: now,
            source,
        });
        Ok(now)
    }

    /// Whether `slug` should be excluded under the current preferences
    ///
    /// A slug never seen locally is never excluded.
    pub fn should_exclude(&self, slug: &str) -> Result<bool, RegistryError> {
        let state = self.read_state();
        ensure_loaded(&state)?;
        let Some(record) = state.registry.get(slug) else {
            return Ok(false);
        };
        Ok(Flag::ALL
            .iter()
            .any(|&flag| state.prefs.excludes(flag) && record.flag(flag)))
    }

    /// Total and per-flag true counts, computed on demand
    pub fn stats(&self) -> Result<RegistryStats, RegistryError> {
        let state = self.read_state();
        ensure_loaded(&state)?;
        let mut stats = RegistryStats {
            total: state.registry.len(),
            ..RegistryStats::default()
        };
        for record in state.registry.values() {
            if record.watched {
                stats.watched += 1;
            }
            if record.liked {
                stats.liked += 1;
            }
            if record.listed {
                stats.listed += 1;
            }
            if record.skipped {
                stats.skipped += 1;
            }
        }
        Ok(stats)
    }

    /// Clone of the full record map, for bulk cloud pushes
    pub fn registry(&self) -> Result<HashMap<String, StateRecord>, RegistryError> {
        let state = self.read_state();
        ensure_loaded(&state)?;
        Ok(state.registry.clone())
    }

    /// Metadata of the most recent bulk crawl
    pub fn meta(&self) -> Result<RegistryMeta, RegistryError> {
        let state = self.read_state();
        ensure_loaded(&state)?;
        Ok(state.meta.clone())
    }

    /// Current filter preferences
    pub fn preferences(&self) -> Result<Preferences, RegistryError> {
        let state = self.read_state();
        ensure_loaded(&state)?;
        Ok(state.prefs)
    }

    /// Set one exclusion toggle and persist preferences immediately
    ///
    /// Preferences are small and synced across devices, so they skip the
    /// debounce used for the registry blob.
    pub fn set_pref(&self, flag: Flag, value: bool) -> Result<(), RegistryError> {
        let prefs = {
            let mut state = self.write_state();
            ensure_loaded(&state)?;
            state.prefs.set_exclude(flag, value);
            state.prefs
        };
        let bytes = serde_json::to_vec(&prefs)?;
        self.synced.set(PREFS_KEY, &bytes)?;
        Ok(())
    }

    /// Merge a remote registry with the timestamped per-field policy
    ///
    /// Returns the number of adopted fields; persistence is scheduled only
    /// when something changed.
    pub fn merge_remote(
        &self,
        incoming: &HashMap<String, StateRecord>,
    ) -> Result<usize, RegistryError> {
        let merged = {
            let mut state = self.write_state();
            ensure_loaded(&state)?;
            merge_timestamped(&mut state.registry, incoming)
        };
        if merged > 0 {
            self.schedule_save();
        }
        tracing::info!("[Registry] remote merge adopted {} fields", merged);
        Ok(merged)
    }

    /// Apply crawl observations with the monotonic upgrade policy
    ///
    /// Returns the number of upgraded flags; never demotes anything.
    pub fn apply_upgrades(
        &self,
        upgrades: &HashMap<String, UpgradeFlags>,
    ) -> Result<usize, RegistryError> {
        let upgraded = {
            let mut state = self.write_state();
            ensure_loaded(&state)?;
            merge_monotonic(&mut state.registry, upgrades, Utc::now())
        };
        if upgraded > 0 {
            self.schedule_save();
        }
        tracing::info!("[Registry] collection sync upgraded {} flags", upgraded);
        Ok(upgraded)
    }

    /// Record the outcome of a bulk crawl in the registry metadata
    pub fn set_sync_meta(
        &self,
        last_sync_at: DateTime<Utc>,
        duration: std::time::Duration,
        counts: SyncCounts,
    ) -> Result<(), RegistryError> {
        {
            let mut state = self.write_state();
            ensure_loaded(&state)?;
            state.meta.last_sync_at = Some(last_sync_at);
            state.meta.sync_duration = Some(duration.as_millis() as u64);
            state.meta.sync_counts = Some(counts);
        }
        self.schedule_save();
        Ok(())
    }

    /// Serialize registry, metadata and preferences for manual backup
    pub fn export_snapshot(&self) -> Result<String, RegistryError> {
        let state = self.read_state();
        ensure_loaded(&state)?;
        let snapshot = Snapshot {
            meta: SnapshotMeta::from_registry(&state.meta),
            slugs: state.registry.clone(),
            prefs: Some(state.prefs),
        };
        Ok(snapshot.to_json()?)
    }

    /// Validate and merge a backup document
    ///
    /// The whole payload is parsed before any merge runs; a malformed
    /// document leaves the registry untouched. Valid records go through
    /// the timestamped merge, and snapshot preferences (if present)
    /// replace the current ones.
    pub fn import_snapshot(&self, raw: &str) -> Result<ImportReport, RegistryError> {
        let snapshot =
            Snapshot::parse(raw).map_err(|reason| RegistryError::InvalidSnapshot { reason })?;

        let merged = {
            let mut state = self.write_state();
            ensure_loaded(&state)?;
            let merged = merge_timestamped(&mut state.registry, &snapshot.slugs);
            if let Some(prefs) = snapshot.prefs {
                state.prefs = prefs;
            }
            merged
        };
        if merged > 0 {
            self.schedule_save();
        }
        if let Some(prefs) = snapshot.prefs {
            let bytes = serde_json::to_vec(&prefs)?;
            self.synced.set(PREFS_KEY, &bytes)?;
        }
        tracing::info!("[Registry] snapshot import merged {} fields", merged);
        Ok(ImportReport {
            merged,
            preferences_applied: snapshot.prefs.is_some(),
        })
    }

    /// Wipe the registry and metadata and remove the persisted blob
    ///
    /// Preferences are left alone; they live in their own domain.
    pub fn clear_all(&self) -> Result<(), RegistryError> {
        {
            let mut state = self.write_state();
            ensure_loaded(&state)?;
            state.registry.clear();
            state.meta = RegistryMeta::default();
            // Supersede any pending debounced save and remove the blob while
            // still holding the lock: a save task that already passed its
            // generation check cannot write again until we release it, and
            // one that has not yet checked will see the new generation.
            self.save_generation.fetch_add(1, Ordering::SeqCst);
            self.local.remove(REGISTRY_KEY)?;
        }
        tracing::info!("[Registry] cleared all records");
        Ok(())
    }

    /// Reset only the skipped flag across all records
    pub fn clear_skipped(&self) -> Result<(), RegistryError> {
        let cleared = {
            let mut state = self.write_state();
            ensure_loaded(&state)?;
            let mut cleared = 0;
            for record in state.registry.values_mut() {
                if record.skipped {
                    record.skipped = false;
                    record.skipped_at = None;
                    cleared += 1;
                }
            }
            cleared
        };
        if cleared > 0 {
            self.schedule_save();
        }
        tracing::info!("[Registry] cleared skipped on {} records", cleared);
        Ok(())
    }

    /// Subscribe to record-changed notifications
    pub fn subscribe(&self) -> broadcast::Receiver<RecordChanged> {
        self.events.subscribe()
    }

    /// Persist immediately, bypassing the debounce window
    ///
    /// Used at shutdown and in tests.
    pub fn flush_local(&self) -> Result<(), RegistryError> {
        self.save_generation.fetch_add(1, Ordering::SeqCst);
        persist(&self.state, &self.local, None)
    }

    /// Schedule a debounced save; each call supersedes the previous timer
    fn schedule_save(&self) {
        let generation = self.save_generation.fetch_add(1, Ordering::SeqCst) + 1;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let state = Arc::clone(&self.state);
                let local = Arc::clone(&self.local);
                let save_generation = Arc::clone(&self.save_generation);
                let window = self.config.save_debounce;
                handle.spawn(async move {
                    tokio::time::sleep(window).await;
                    let gate = Some((save_generation.as_ref(), generation));
                    if let Err(e) = persist(&state, &local, gate) {
                        tracing::warn!("[Registry] debounced save failed: {}", e);
                    }
                });
            }
            Err(_) => {
                // Outside a runtime there is nothing to defer onto; save now.
                if let Err(e) = persist(&self.state, &self.local, None) {
                    tracing::warn!("[Registry] immediate save failed: {}", e);
                }
            }
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn ensure_loaded(state: &StoreState) -> Result<(), RegistryError> {
    if state.loaded {
        Ok(())
    } else {
        Err(RegistryError::NotInitialized)
    }
}

fn migrate(blob: &mut RegistryBlob) {
    // v0 -> v1: no structural changes, just stamp the version.
    if blob.meta.version < 1 {
        blob.meta.version = 1;
    }
    // Future migrations slot in here as: if blob.meta.version < 2 { .. }
}

/// Write the whole registry blob into the local domain
///
/// When a generation gate is given, the write only happens if the counter
/// still matches. The check and the write both run under the state lock,
/// so `clear_all` (which bumps the counter and removes the blob under the
/// write lock) can never interleave between them.
fn persist(
    state: &Arc<RwLock<StoreState>>,
    local: &Arc<dyn StorageBackend>,
    gate: Option<(&AtomicU64, u64)>,
) -> Result<(), RegistryError> {
    let state = state.read().unwrap_or_else(|e| e.into_inner());
    if let Some((counter, expected)) = gate {
        if counter.load(Ordering::SeqCst) != expected {
            // A newer mutation or a clear superseded this save.
            return Ok(());
        }
    }
    if !state.loaded {
        return Ok(());
    }
    let blob = RegistryBlob {
        meta: state.meta.clone(),
        slugs: state.registry.clone(),
    };
    let bytes = serde_json::to_vec(&blob)?;
    local.set(REGISTRY_KEY, &bytes)?;
    Ok(())
}
