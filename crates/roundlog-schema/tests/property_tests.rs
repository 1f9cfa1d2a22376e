//! Property tests for roundlog-schema
//!
//! Serialization invariants for the records that cross the store boundary.

use proptest::prelude::*;
use roundlog_schema::round::Round;
use roundlog_schema::sample::Sample;

proptest! {
    /// Sample JSON round-trip preserves every field
    #[test]
    fn prop_sample_json_roundtrip(sample in roundlog_testkit::proptest::strategy_sample()) {
        let json = serde_json::to_string(&sample).unwrap();
        let back: Sample = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(sample, back);
    }

    /// Round JSON round-trip keeps identity and finals
    #[test]
    fn prop_round_json_roundtrip(round in roundlog_testkit::proptest::strategy_round()) {
        let json = serde_json::to_string(&round).unwrap();
        let back: Round = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(&round.round_id, &back.round_id);
        prop_assert_eq!(round.final_kills, back.final_kills);
        prop_assert_eq!(round.start_time, back.start_time);
    }

    /// A round always overlaps itself
    #[test]
    fn prop_round_overlaps_itself(round in roundlog_testkit::proptest::strategy_round()) {
        prop_assert!(round.overlaps(&round));
    }
}

#[test]
fn sample_optional_fields_default_when_missing() {
    let json = r#"{
        "player_name": "alice",
        "server_id": "eu-1",
        "map_name": "dust",
        "timestamp": "2025-06-01T18:00:00Z",
        "kills": 3,
        "deaths": 1,
        "score": 40,
        "ping": 35,
        "is_bot": false
    }"#;
    let sample: Sample = serde_json::from_str(json).unwrap();
    assert_eq!(sample.session_id, "");
    assert!(sample.team_label.is_none());
    insta::assert_json_snapshot!(sample.partition_key(), @r#"
    {
      "player_name": "alice",
      "server_id": "eu-1"
    }
    "#);
}
