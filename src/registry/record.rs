//! Film state record schema
//!
//! One [`StateRecord`] per catalog slug. Flags and their timestamps move
//! together: a flag is never true with a null timestamp. `updated_at`
//! tracks the last modification of the record as a whole, independent of
//! the per-flag timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current persisted data version; bump alongside a migration step
pub const DATA_VERSION: u32 = 1;

/// One of the four independent boolean facts tracked per film
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Flag {
    Watched,
    Liked,
    Listed,
    Skipped,
}

impl Flag {
    /// All four flags
    pub const ALL: [Flag; 4] = [Flag::Watched, Flag::Liked, Flag::Listed, Flag::Skipped];

    /// Flags a collection crawl can report on; `Skipped` is purely local
    pub const CRAWLABLE: [Flag; 3] = [Flag::Watched, Flag::Liked, Flag::Listed];

    /// Stable lowercase name, matching the wire and storage formats
    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::Watched => "watched",
            Flag::Liked => "liked",
            Flag::Listed => "listed",
            Flag::Skipped => "skipped",
        }
    }
}

/// Provenance tag recording which subsystem last changed a record
///
/// Used for diagnostics and cloud-push filtering, never for merge
/// decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Source {
    /// Direct user gesture
    UserAction,
    /// Snapshot of flags observed on a rendered page
    PageSync,
    /// Pull or import merged from the remote store
    RemoteSync,
    /// Bulk collection crawl
    CollectionSync,
}

/// Per-film user state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRecord {
    pub watched: bool,
    pub watched_at: Option<DateTime<Utc>>,
    pub liked: bool,
    pub liked_at: Option<DateTime<Utc>>,
    pub listed: bool,
    pub listed_at: Option<DateTime<Utc>>,
    pub skipped: bool,
    pub skipped_at: Option<DateTime<Utc>>,
    /// Most recently changed flag
    pub last_action: Option<Flag>,
    /// Subsystem responsible for the last change
    pub source: Option<Source>,
    /// Instant of the last modification to this record
    pub updated_at: Option<DateTime<Utc>>,
}

impl StateRecord {
    /// Current value of `flag`
    pub fn flag(&self, flag: Flag) -> bool {
        match flag {
            Flag::Watched => self.watched,
            Flag::Liked => self.liked,
            Flag::Listed => self.listed,
            Flag::Skipped => self.skipped,
        }
    }

    /// Timestamp of the last change to `flag`
    pub fn flag_at(&self, flag: Flag) -> Option<DateTime<Utc>> {
        match flag {
            Flag::Watched => self.watched_at,
            Flag::Liked => self.liked_at,
            Flag::Listed => self.listed_at,
            Flag::Skipped => self.skipped_at,
        }
    }

    /// Set `flag` and its timestamp together, preserving the co-invariant
    pub fn set(&mut self, flag: Flag, value: bool, at: DateTime<Utc>) {
        match flag {
            Flag::Watched => {
                self.watched = value;
                self.watched_at = Some(at);
            }
            Flag::Liked => {
                self.liked = value;
                self.liked_at = Some(at);
            }
            Flag::Listed => {
                self.listed = value;
                self.listed_at = Some(at);
            }
            Flag::Skipped => {
                self.skipped = value;
                self.skipped_at = Some(at);
            }
        }
    }

    /// Whether every true flag carries a timestamp
    pub fn timestamps_consistent(&self) -> bool {
        Flag::ALL
            .iter()
            .all(|&f| !self.flag(f) || self.flag_at(f).is_some())
    }
}

/// Metadata describing the most recent bulk collection crawl
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryMeta {
    /// Persisted data version, gated through migrations at load
    #[serde(default)]
    pub version: u32,
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Crawl duration in milliseconds
    pub sync_duration: Option<u64>,
    pub sync_counts: Option<SyncCounts>,
}

impl Default for RegistryMeta {
    fn default() -> Self {
        Self {
            version: DATA_VERSION,
            last_sync_at: None,
            sync_duration: None,
            sync_counts: None,
        }
    }
}

/// Per-category slug counts from a collection crawl
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCounts {
    pub watched: usize,
    pub liked: usize,
    pub listed: usize,
}

/// On-demand registry statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total: usize,
    pub watched: usize,
    pub liked: usize,
    pub listed: usize,
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_keeps_flag_and_timestamp_together() {
        let mut record = StateRecord::default();
        let now = Utc::now();

        record.set(Flag::Watched, true, now);
        assert!(record.watched);
        assert_eq!(record.watched_at, Some(now));
        assert!(record.timestamps_consistent());
    }

    #[test]
    fn test_default_record_is_consistent() {
        let record = StateRecord::default();
        assert!(record.timestamps_consistent());
        for flag in Flag::ALL {
            assert!(!record.flag(flag));
            assert!(record.flag_at(flag).is_none());
        }
    }

    #[test]
    fn test_flag_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Flag::Watched).unwrap(), "\"watched\"");
        assert_eq!(serde_json::to_string(&Flag::Listed).unwrap(), "\"listed\"");
    }

    #[test]
    fn test_record_round_trips_through_json() {
        let mut record = StateRecord::default();
        record.set(Flag::Liked, true, Utc::now());
        record.last_action = Some(Flag::Liked);
        record.source = Some(Source::UserAction);
        record.updated_at = record.liked_at;

        let json = serde_json::to_string(&record).unwrap();
        let back: StateRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_meta_default_carries_current_version() {
        let meta = RegistryMeta::default();
        assert_eq!(meta.version, DATA_VERSION);
        assert!(meta.last_sync_at.is_none());
    }
}
