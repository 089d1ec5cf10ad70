//! Export / import snapshot format
//!
//! A self-describing JSON document for manual backup: registry metadata
//! (with an export stamp), the full record map, and preferences. Import
//! validates the whole payload before anything is merged, then runs the
//! timestamped merge rather than a raw overwrite, so a restore cannot
//! clobber local changes that are newer per field.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::prefs::Preferences;
use super::record::{RegistryMeta, StateRecord, SyncCounts, DATA_VERSION};

/// Metadata block of an exported snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMeta {
    #[serde(default)]
    pub version: u32,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub sync_duration: Option<u64>,
    pub sync_counts: Option<SyncCounts>,
    pub exported_at: Option<DateTime<Utc>>,
}

impl Default for SnapshotMeta {
    fn default() -> Self {
        Self {
            version: DATA_VERSION,
            last_sync_at: None,
            sync_duration: None,
            sync_counts: None,
            exported_at: None,
        }
    }
}

impl SnapshotMeta {
    /// Build snapshot metadata from registry metadata, stamped now
    pub fn from_registry(meta: &RegistryMeta) -> Self {
        Self {
            version: DATA_VERSION,
            last_sync_at: meta.last_sync_at,
            sync_duration: meta.sync_duration,
            sync_counts: meta.sync_counts,
            exported_at: Some(Utc::now()),
        }
    }
}

/// Full-fidelity backup document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "_meta", default)]
    pub meta: SnapshotMeta,
    /// Registry records keyed by slug
    pub slugs: HashMap<String, StateRecord>,
    /// Filter preferences; absent in older exports
    #[serde(default)]
    pub prefs: Option<Preferences>,
}

impl Snapshot {
    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse and validate a snapshot document
    ///
    /// Fails with a descriptive message on malformed payloads (including a
    /// missing `slugs` map) without partially applying anything.
    pub fn parse(raw: &str) -> Result<Self, String> {
        serde_json::from_str(raw).map_err(|e| format!("invalid snapshot payload: {}", e))
    }
}

/// Result of a snapshot import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    /// Fields adopted by the timestamped merge
    pub merged: usize,
    /// Whether the snapshot carried preferences that were applied
    pub preferences_applied: bool,
}
