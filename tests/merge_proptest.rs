//! Property-based tests for the merge policies
//!
//! Exercises the timestamped and monotonic merges with arbitrary record
//! maps and checks the guarantees that the rest of the engine leans on:
//! flag/timestamp consistency, idempotence and one-directional upgrades.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

use reelsync::registry::{
    merge_monotonic, merge_timestamped, Flag, StateRecord, UpgradeFlags,
};

fn ts(offset: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + offset, 0).single().unwrap()
}

prop_compose! {
    /// A record whose set flags always carry timestamps
    fn arb_record()(
        watched in any::<bool>(),
        liked in any::<bool>(),
        listed in any::<bool>(),
        skipped in any::<bool>(),
        offsets in prop::array::uniform4(0i64..1_000_000),
    ) -> StateRecord {
        let mut record = StateRecord::default();
        record.set(Flag::Watched, watched, ts(offsets[0]));
        record.set(Flag::Liked, liked, ts(offsets[1]));
        record.set(Flag::Listed, listed, ts(offsets[2]));
        record.set(Flag::Skipped, skipped, ts(offsets[3]));
        record.updated_at = Some(ts(*offsets.iter().max().unwrap()));
        record
    }
}

fn arb_registry(max: usize) -> impl Strategy<Value = HashMap<String, StateRecord>> {
    prop::collection::hash_map("film-[a-e]", arb_record(), 0..max)
}

fn arb_upgrades() -> impl Strategy<Value = HashMap<String, UpgradeFlags>> {
    prop::collection::hash_map(
        "film-[a-e]",
        (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(watched, liked, listed)| {
            UpgradeFlags {
                watched,
                liked,
                listed,
            }
        }),
        0..6,
    )
}

proptest! {
    #[test]
    fn test_timestamped_merge_preserves_flag_timestamp_consistency(
        local in arb_registry(6),
        incoming in arb_registry(6),
    ) {
        let mut merged = local;
        merge_timestamped(&mut merged, &incoming);
        for (slug, record) in &merged {
            prop_assert!(
                record.timestamps_consistent(),
                "record {} lost flag/timestamp consistency", slug
            );
        }
    }

    #[test]
    fn test_timestamped_merge_is_idempotent(
        local in arb_registry(6),
        incoming in arb_registry(6),
    ) {
        let mut merged = local;
        merge_timestamped(&mut merged, &incoming);
        let settled = merged.clone();
        let second = merge_timestamped(&mut merged, &incoming);
        prop_assert_eq!(second, 0, "a second merge of the same input must adopt nothing");
        prop_assert_eq!(merged, settled);
    }

    #[test]
    fn test_timestamped_merge_keeps_strictly_newer_local_fields(
        incoming in arb_registry(6),
    ) {
        // Local fields stamped after every incoming timestamp never move.
        let mut local: HashMap<String, StateRecord> = incoming
            .keys()
            .map(|slug| {
                let mut record = StateRecord::default();
                record.set(Flag::Watched, true, ts(5_000_000));
                record.updated_at = Some(ts(5_000_000));
                (slug.clone(), record)
            })
            .collect();

        merge_timestamped(&mut local, &incoming);
        for (slug, record) in &local {
            prop_assert!(record.watched, "newer local watched on {} was overwritten", slug);
            prop_assert_eq!(record.watched_at, Some(ts(5_000_000)));
        }
    }

    #[test]
    fn test_monotonic_merge_never_clears_a_flag(
        local in arb_registry(6),
        upgrades in arb_upgrades(),
    ) {
        let before = local.clone();
        let mut merged = local;
        merge_monotonic(&mut merged, &upgrades, ts(9_000_000));

        for (slug, old) in &before {
            let new = &merged[slug];
            for flag in Flag::ALL {
                prop_assert!(
                    !old.flag(flag) || new.flag(flag),
                    "{} lost {} during a monotonic merge", slug, flag.as_str()
                );
            }
            prop_assert!(new.timestamps_consistent());
        }
    }

    #[test]
    fn test_monotonic_merge_never_touches_skipped(
        local in arb_registry(6),
        upgrades in arb_upgrades(),
    ) {
        let before = local.clone();
        let mut merged = local;
        merge_monotonic(&mut merged, &upgrades, ts(9_000_000));

        for (slug, old) in &before {
            prop_assert_eq!(merged[slug].skipped, old.skipped);
            prop_assert_eq!(merged[slug].skipped_at, old.skipped_at);
        }
    }

    #[test]
    fn test_monotonic_merge_counts_only_real_upgrades(
        local in arb_registry(6),
        upgrades in arb_upgrades(),
    ) {
        let before = local.clone();
        let mut merged = local;
        let upgraded = merge_monotonic(&mut merged, &upgrades, ts(9_000_000));

        let mut expected = 0;
        for (slug, flags) in &upgrades {
            for flag in Flag::CRAWLABLE {
                let already = before.get(slug).map(|r| r.flag(flag)).unwrap_or(false);
                if flags.observed(flag) && !already {
                    expected += 1;
                }
            }
        }
        prop_assert_eq!(upgraded, expected);
    }
}
