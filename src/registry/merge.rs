//! # Merge Engine
//!
//! Two distinct conflict-resolution policies, both pure functions with no
//! I/O. They are deliberately kept as separately named entry points: one is
//! time-ordered, the other monotonic, and collapsing them into a single
//! parameterized merge would blur a correctness-critical asymmetry.
//!
//! - [`merge_timestamped`]: last-writer-wins per field, used for remote
//!   pulls, imports and restores where either side may be newer per flag.
//! - [`merge_monotonic`]: false-to-true upgrades only, used for the bulk
//!   collection crawl whose output is "this flag is currently true" with no
//!   ordering guarantee relative to local state.
//!
//! The timestamped policy relies on roughly synchronized client clocks:
//! skew between devices can let a stale-but-later-stamped remote value win
//! over a genuinely newer local change. That is a documented limitation of
//! the design, preserved here rather than special-cased.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::{Flag, Source, StateRecord};

/// Positive-only flag observations produced by a collection crawl
///
/// `skipped` has no field here: the crawl cannot report on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeFlags {
    pub watched: bool,
    pub liked: bool,
    pub listed: bool,
}

impl UpgradeFlags {
    /// Whether the crawl observed `flag` as true
    pub fn observed(&self, flag: Flag) -> bool {
        match flag {
            Flag::Watched => self.watched,
            Flag::Liked => self.liked,
            Flag::Listed => self.listed,
            Flag::Skipped => false,
        }
    }

    /// Mark one crawlable flag as observed
    pub fn with(mut self, flag: Flag) -> Self {
        match flag {
            Flag::Watched => self.watched = true,
            Flag::Liked => self.liked = true,
            Flag::Listed => self.listed = true,
            Flag::Skipped => {}
        }
        self
    }
}

/// Merge an incoming registry into the local one, latest writer wins per
/// field. Returns the number of adopted fields.
///
/// Each flag is compared independently against its local timestamp: an
/// incoming flag with a timestamp that is present and strictly later than
/// the local one (or where the local one is absent) is adopted together
/// with its timestamp, and the record's provenance becomes `RemoteSync`.
/// A record may therefore take a newer `liked` from the incoming side
/// while keeping a newer local `watched`.
///
/// Separately, when the incoming `updated_at` is later, `last_action` and
/// `updated_at` are adopted as bookkeeping; that adoption is not counted.
pub fn merge_timestamped(
    local: &mut HashMap<String, StateRecord>,
    incoming: &HashMap<String, StateRecord>,
) -> usize {
    let mut merged = 0;
    for (slug, inc) in incoming {
        match local.entry(slug.clone()) {
            Entry::Occupied(mut occupied) => {
                merged += merge_record(occupied.get_mut(), inc);
            }
            Entry::Vacant(vacant) => {
                // Unknown slug: adopt through the same per-field path so a
                // malformed incoming record cannot break the flag/timestamp
                // co-invariant. Records with nothing to adopt are not created.
                let mut fresh = StateRecord::default();
                let adopted = merge_record(&mut fresh, inc);
                if adopted > 0 {
                    vacant.insert(fresh);
                    merged += adopted;
                }
            }
        }
    }
    merged
}

fn merge_record(local: &mut StateRecord, incoming: &StateRecord) -> usize {
    let mut adopted = 0;
    for flag in Flag::ALL {
        if let Some(inc_at) = incoming.flag_at(flag) {
            let newer = match local.flag_at(flag) {
                None => true,
                Some(local_at) => inc_at > local_at,
            };
            if newer {
                local.set(flag, incoming.flag(flag), inc_at);
                local.source = Some(Source::RemoteSync);
                adopted += 1;
            }
        }
    }
    if let Some(inc_updated) = incoming.updated_at {
        let newer = match local.updated_at {
            None => true,
            Some(local_updated) => inc_updated > local_updated,
        };
        if newer {
            if incoming.last_action.is_some() {
                local.last_action = incoming.last_action;
            }
            local.updated_at = Some(inc_updated);
        }
    }
    adopted
}

/// Apply positive-only crawl observations: flip flags from false to true,
/// stamped with `now`; never demote, never touch unreported flags.
/// Returns the number of upgraded flags.
pub fn merge_monotonic(
    local: &mut HashMap<String, StateRecord>,
    upgrades: &HashMap<String, UpgradeFlags>,
    now: DateTime<Utc>,
) -> usize {
    let mut upgraded = 0;
    for (slug, observed) in upgrades {
        for flag in Flag::CRAWLABLE {
            if !observed.observed(flag) {
                continue;
            }
            let record = local.entry(slug.clone()).or_default();
            if record.flag(flag) {
                continue;
            }
            record.set(flag, true, now);
            record.source = Some(Source::CollectionSync);
            record.updated_at = Some(now);
            upgraded += 1;
        }
    }
    upgraded
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record_with(flag: Flag, value: bool, at: DateTime<Utc>) -> StateRecord {
        let mut record = StateRecord::default();
        record.set(flag, value, at);
        record.updated_at = Some(at);
        record.last_action = Some(flag);
        record
    }

    #[test]
    fn test_timestamped_later_incoming_wins() {
        let t1 = Utc::now();
        let t2 = t1 + Duration::seconds(60);

        let mut local = HashMap::from([("dune".to_string(), record_with(Flag::Liked, false, t1))]);
        let incoming = HashMap::from([("dune".to_string(), record_with(Flag::Liked, true, t2))]);

        let merged = merge_timestamped(&mut local, &incoming);
        assert_eq!(merged, 1);
        let record = &local["dune"];
        assert!(record.liked);
        assert_eq!(record.liked_at, Some(t2));
        assert_eq!(record.source, Some(Source::RemoteSync));
    }

    #[test]
    fn test_timestamped_earlier_incoming_is_ignored() {
        let t1 = Utc::now();
        let t2 = t1 + Duration::seconds(60);

        let mut local = HashMap::from([("dune".to_string(), record_with(Flag::Liked, true, t2))]);
        let incoming = HashMap::from([("dune".to_string(), record_with(Flag::Liked, false, t1))]);

        let merged = merge_timestamped(&mut local, &incoming);
        assert_eq!(merged, 0);
        assert!(local["dune"].liked);
        assert_eq!(local["dune"].liked_at, Some(t2));
    }

    #[test]
    fn test_timestamped_equal_timestamps_keep_local() {
        let t1 = Utc::now();
        let mut local = HashMap::from([("dune".to_string(), record_with(Flag::Watched, true, t1))]);
        let incoming =
            HashMap::from([("dune".to_string(), record_with(Flag::Watched, false, t1))]);

        assert_eq!(merge_timestamped(&mut local, &incoming), 0);
        assert!(local["dune"].watched);
    }

    #[test]
    fn test_timestamped_merges_unrelated_flags_independently() {
        let t1 = Utc::now();
        let t2 = t1 + Duration::seconds(30);

        // Local has the newer watched, incoming has the newer liked.
        let mut local_record = record_with(Flag::Watched, true, t2);
        local_record.set(Flag::Liked, false, t1);
        let mut incoming_record = record_with(Flag::Watched, false, t1);
        incoming_record.set(Flag::Liked, true, t2);

        let mut local = HashMap::from([("heat".to_string(), local_record)]);
        let incoming = HashMap::from([("heat".to_string(), incoming_record)]);

        let merged = merge_timestamped(&mut local, &incoming);
        assert_eq!(merged, 1);
        let record = &local["heat"];
        assert!(record.watched, "newer local watched kept");
        assert!(record.liked, "newer incoming liked adopted");
    }

    #[test]
    fn test_timestamped_adopts_unknown_slug() {
        let t1 = Utc::now();
        let mut local = HashMap::new();
        let incoming = HashMap::from([("alien".to_string(), record_with(Flag::Watched, true, t1))]);

        let merged = merge_timestamped(&mut local, &incoming);
        assert_eq!(merged, 1);
        let record = &local["alien"];
        assert!(record.watched);
        assert_eq!(record.source, Some(Source::RemoteSync));
        assert!(record.timestamps_consistent());
    }

    #[test]
    fn test_timestamped_skips_empty_incoming_record() {
        let mut local = HashMap::new();
        let incoming = HashMap::from([("ghost".to_string(), StateRecord::default())]);

        assert_eq!(merge_timestamped(&mut local, &incoming), 0);
        assert!(local.is_empty(), "no zero record created");
    }

    #[test]
    fn test_timestamped_bookkeeping_not_counted() {
        let t1 = Utc::now();
        let t2 = t1 + Duration::seconds(10);

        let mut local_record = record_with(Flag::Watched, true, t2);
        local_record.updated_at = Some(t1);
        let mut incoming_record = StateRecord::default();
        incoming_record.updated_at = Some(t2);
        incoming_record.last_action = Some(Flag::Liked);

        let mut local = HashMap::from([("up".to_string(), local_record)]);
        let incoming = HashMap::from([("up".to_string(), incoming_record)]);

        let merged = merge_timestamped(&mut local, &incoming);
        assert_eq!(merged, 0, "updated_at adoption is bookkeeping only");
        assert_eq!(local["up"].updated_at, Some(t2));
        assert_eq!(local["up"].last_action, Some(Flag::Liked));
    }

    #[test]
    fn test_monotonic_never_demotes() {
        let t1 = Utc::now();
        let mut local = HashMap::from([("dune".to_string(), record_with(Flag::Watched, true, t1))]);
        // Crawl did not observe the film at all this time around.
        let upgrades = HashMap::from([("dune".to_string(), UpgradeFlags::default())]);

        let upgraded = merge_monotonic(&mut local, &upgrades, Utc::now());
        assert_eq!(upgraded, 0);
        assert!(local["dune"].watched);
    }

    #[test]
    fn test_monotonic_upgrades_only_unset_flags() {
        let t1 = Utc::now();
        let now = t1 + Duration::seconds(5);
        let mut local = HashMap::from([("dune".to_string(), record_with(Flag::Watched, true, t1))]);
        let upgrades = HashMap::from([(
            "dune".to_string(),
            UpgradeFlags::default().with(Flag::Watched).with(Flag::Liked),
        )]);

        let upgraded = merge_monotonic(&mut local, &upgrades, now);
        assert_eq!(upgraded, 1, "watched already true, only liked upgrades");
        let record = &local["dune"];
        assert_eq!(record.watched_at, Some(t1), "existing timestamp untouched");
        assert!(record.liked);
        assert_eq!(record.liked_at, Some(now));
        assert_eq!(record.source, Some(Source::CollectionSync));
    }

    #[test]
    fn test_monotonic_creates_record_for_new_slug() {
        let now = Utc::now();
        let mut local = HashMap::new();
        let upgrades =
            HashMap::from([("solaris".to_string(), UpgradeFlags::default().with(Flag::Listed))]);

        assert_eq!(merge_monotonic(&mut local, &upgrades, now), 1);
        let record = &local["solaris"];
        assert!(record.listed);
        assert!(!record.skipped, "skipped never touched by a crawl");
        assert!(record.timestamps_consistent());
    }

    #[test]
    fn test_monotonic_without_observations_creates_nothing() {
        let mut local = HashMap::new();
        let upgrades = HashMap::from([("empty".to_string(), UpgradeFlags::default())]);

        assert_eq!(merge_monotonic(&mut local, &upgrades, Utc::now()), 0);
        assert!(local.is_empty());
    }
}
