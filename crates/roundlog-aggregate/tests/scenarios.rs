//! Round reconstruction scenarios and invariants.

use proptest::prelude::*;
use roundlog_aggregate::rounds_from_samples;
use roundlog_config::SegmentationConfig;
use roundlog_schema::round::Round;
use roundlog_schema::sample::Sample;
use roundlog_testkit::fixtures::{at, sample};
use roundlog_testkit::proptest::strategy_sample_stream;
use std::collections::BTreeMap;

fn rounds(samples: Vec<Sample>) -> Vec<Round> {
    rounds_from_samples(samples, &SegmentationConfig::default())
}

#[test]
fn gap_and_map_change_close_the_round() {
    let out = rounds(vec![
        sample("alice", "eu-1", "dust", at(0), 0, 0),
        sample("alice", "eu-1", "dust", at(5), 5, 0),
        sample("alice", "eu-1", "nuke", at(25), 0, 0),
    ]);
    assert_eq!(out.len(), 2);
    assert_eq!((out[0].start_time, out[0].end_time), (at(0), at(5)));
    assert_eq!(out[0].final_kills, 5);
    assert_eq!(out[1].start_time, at(25));
    assert_eq!(out[1].map_name, "nuke");
}

#[test]
fn kill_counter_drop_opens_round_inside_gap() {
    let out = rounds(vec![
        sample("alice", "eu-1", "dust", at(0), 10, 0),
        sample("alice", "eu-1", "dust", at(3), 3, 0),
    ]);
    assert_eq!(out.len(), 2);
    assert_eq!(out[1].start_time, at(3));
    assert_eq!(out[1].final_kills, 3);
    assert_ne!(out[0].round_id, out[1].round_id);
}

#[test]
fn same_instant_samples_all_count_toward_finals() {
    let out = rounds(vec![
        sample("alice", "eu-1", "dust", at(0), 0, 0),
        sample("alice", "eu-1", "dust", at(5), 5, 3),
        sample("alice", "eu-1", "dust", at(5), 6, 1),
    ]);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].final_kills, 6);
    assert_eq!(out[0].final_deaths, 3);
    assert_eq!(out[0].sample_count, 3);
}

#[test]
fn output_is_in_publication_order() {
    let out = rounds(vec![
        sample("bob", "eu-1", "dust", at(0), 1, 0),
        sample("bob", "eu-1", "dust", at(40), 2, 0),
        sample("alice", "eu-1", "dust", at(10), 1, 0),
    ]);
    let ends: Vec<_> = out.iter().map(|r| r.end_time).collect();
    assert_eq!(ends, vec![at(0), at(10), at(40)]);
}

proptest! {
    /// Re-processing the same samples yields identical rounds
    #[test]
    fn prop_idempotent(samples in strategy_sample_stream()) {
        let first = rounds(samples.clone());
        let second = rounds(samples);
        prop_assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    /// Rounds of one partition never overlap
    #[test]
    fn prop_no_overlap(samples in strategy_sample_stream()) {
        let mut by_partition: BTreeMap<_, Vec<Round>> = BTreeMap::new();
        for r in rounds(samples) {
            by_partition.entry(r.partition_key()).or_default().push(r);
        }
        for list in by_partition.values() {
            for (i, a) in list.iter().enumerate() {
                for b in &list[i + 1..] {
                    prop_assert!(!a.overlaps(b), "{:?} overlaps {:?}", a, b);
                }
            }
        }
    }

    /// Finals equal the maxima of every input sample inside the round
    #[test]
    fn prop_finals_are_maxima(samples in strategy_sample_stream()) {
        for round in rounds(samples.clone()) {
            let key = round.partition_key();
            let own: Vec<&Sample> = samples
                .iter()
                .filter(|s| s.belongs_to(&key))
                .filter(|s| s.timestamp >= round.start_time && s.timestamp <= round.end_time)
                .collect();
            prop_assert_eq!(own.len(), round.sample_count as usize);
            let max = |f: fn(&Sample) -> i64| own.iter().map(|s| f(s)).max().unwrap();
            prop_assert_eq!(round.final_kills, max(|s| s.kills));
            prop_assert_eq!(round.final_deaths, max(|s| s.deaths));
            prop_assert_eq!(round.final_score, max(|s| s.score));
            prop_assert!(round.play_time_minutes >= 0.0);
            prop_assert_eq!(&round.round_id, &round.expected_id());
        }
    }

    /// Ids are unique across the output
    #[test]
    fn prop_ids_unique(samples in strategy_sample_stream()) {
        let out = rounds(samples);
        let mut ids: Vec<_> = out.iter().map(|r| r.round_id.clone()).collect();
        ids.sort();
        ids.dedup();
        prop_assert_eq!(ids.len(), out.len());
    }
}
