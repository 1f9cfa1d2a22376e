//! SQLite store behavior, on disk.

use roundlog_config::{SegmentationConfig, SyncConfig};
use roundlog_ports::{
    ActivityFilter, AnalyticsStore, RoundFilter, RoundSink, SampleFilter, SampleSink, SampleSource,
};
use roundlog_schema::sample::PartitionKey;
use roundlog_store_sqlite::SqliteStore;
use roundlog_sync::SyncPipeline;
use roundlog_testkit::fixtures::{at, round, scenario_samples};
use tempfile::TempDir;

fn open() -> (TempDir, SqliteStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("roundlog.db")).unwrap();
    (dir, store)
}

#[test]
fn duplicate_samples_are_ignored() {
    let (_dir, store) = open();
    assert_eq!(store.insert_samples(&scenario_samples()).unwrap(), 10);
    assert_eq!(store.insert_samples(&scenario_samples()).unwrap(), 0);
    assert_eq!(store.sample_count().unwrap(), 10);
}

#[test]
fn samples_roundtrip_and_filter() {
    let (_dir, store) = open();
    store.insert_samples(&scenario_samples()).unwrap();

    let all = store.samples(&SampleFilter::since(None)).unwrap();
    assert_eq!(all.rows.len(), 10);
    assert_eq!(all.skipped, 0);

    let humans = store.samples(&SampleFilter::default()).unwrap();
    assert_eq!(humans.rows.len(), 9);

    let alice_late = store
        .samples(&SampleFilter::partition(&PartitionKey::new("alice", "eu-1"), at(20)))
        .unwrap();
    let times: Vec<_> = alice_late.rows.iter().map(|s| s.timestamp).collect();
    assert_eq!(times, vec![at(20), at(45), at(55)]);
}

#[test]
fn malformed_sample_rows_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roundlog.db");
    let store = SqliteStore::open(&path).unwrap();
    store.insert_samples(&scenario_samples()).unwrap();

    let raw = rusqlite::Connection::open(&path).unwrap();
    raw.execute(
        "INSERT INTO samples (player_name, server_id, map_name, timestamp, kills)
         VALUES ('ghost', NULL, 'dust', 0, 1)",
        [],
    )
    .unwrap();

    let fetched = store.samples(&SampleFilter::since(None)).unwrap();
    assert_eq!(fetched.rows.len(), 10);
    assert_eq!(fetched.skipped, 1);
}

#[test]
fn publish_upserts_and_watermark_only_moves_forward() {
    let (_dir, store) = open();
    let late = round("alice", "eu-1", "dust", at(0), at(30), 3, 1);
    store.publish_batch(&[late.clone()], &[], 2).unwrap();

    let mut updated = late.clone();
    updated.final_kills = 8;
    let early = round("bob", "eu-1", "dust", at(0), at(5), 1, 1);
    store.publish_batch(&[early, updated], &[], 2).unwrap();

    assert_eq!(store.round_count().unwrap(), 2);
    assert_eq!(store.watermark().unwrap(), Some(at(30)));
    let alice = store.rounds(&RoundFilter::player("alice")).unwrap();
    assert_eq!(alice.len(), 1);
    assert_eq!(alice[0], {
        let mut expected = late;
        expected.final_kills = 8;
        expected
    });
}

#[test]
fn retired_rounds_are_deleted_with_the_batch() {
    let (_dir, store) = open();
    let head = round("alice", "eu-1", "dust", at(0), at(5), 2, 0);
    let tail = round("alice", "eu-1", "dust", at(25), at(30), 5, 1);
    store.publish_batch(&[head, tail.clone()], &[], 2).unwrap();

    let merged = round("alice", "eu-1", "dust", at(0), at(30), 5, 1);
    store
        .publish_batch(&[merged.clone()], &[tail.round_id], 2)
        .unwrap();

    let rounds = store.rounds(&RoundFilter::player("alice")).unwrap();
    assert_eq!(rounds, vec![merged]);
    assert_eq!(store.watermark().unwrap(), Some(at(30)));
}

#[test]
fn v1_writer_keeps_core_columns_and_reads_defaults() {
    let (_dir, store) = open();
    assert_eq!(store.schema_version().unwrap(), 1);

    let mut r = round("alice", "eu-1", "dust", at(0), at(10), 2, 0);
    r.team_label = Some("red".to_string());
    r.round_index = 4;
    store.publish_batch(&[r.clone()], &[], 1).unwrap();

    assert_eq!(store.schema_version().unwrap(), 1);
    let read = store.rounds(&RoundFilter::default()).unwrap();
    assert_eq!(read[0].round_id, r.round_id);
    assert_eq!(read[0].team_label, None);
    assert_eq!(read[0].round_index, 0);

    store.publish_batch(&[r.clone()], &[], 2).unwrap();
    assert_eq!(store.schema_version().unwrap(), 2);
    let read = store.rounds(&RoundFilter::default()).unwrap();
    assert_eq!(read[0], r);
}

#[test]
fn last_round_and_anchor_reads() {
    let (_dir, store) = open();
    store
        .publish_batch(
            &[
                round("alice", "eu-1", "dust", at(0), at(10), 1, 0),
                round("alice", "eu-1", "nuke", at(20), at(40), 1, 0),
                round("bob", "eu-1", "dust", at(0), at(50), 1, 0),
            ],
            &[],
            2,
        )
        .unwrap();

    let last = store
        .last_round(&PartitionKey::new("alice", "eu-1"))
        .unwrap()
        .unwrap();
    assert_eq!(last.map_name, "nuke");
    assert!(store.last_round(&PartitionKey::new("carol", "eu-1")).unwrap().is_none());

    let anchors = store.rounds_ending_after(at(40)).unwrap();
    assert_eq!(anchors.len(), 2);
}

#[test]
fn activity_counts_distinct_real_players() {
    let (_dir, store) = open();
    store.insert_samples(&scenario_samples()).unwrap();

    let obs = store
        .activity(&ActivityFilter {
            server: Some("eu-1".to_string()),
            ..ActivityFilter::default()
        })
        .unwrap();
    let at_five = obs.iter().find(|o| o.timestamp == at(5)).unwrap();
    assert_eq!(at_five.value, 1.0);
    assert_eq!(store.servers().unwrap(), vec!["eu-1", "us-1"]);
}

#[tokio::test]
async fn sync_over_sqlite_is_idempotent() {
    let (_dir, store) = open();
    store.insert_samples(&scenario_samples()).unwrap();
    let mut sync = SyncPipeline::new(
        &store,
        &store,
        &SegmentationConfig::default(),
        SyncConfig {
            batch_delay_ms: 0,
            ..SyncConfig::default()
        },
    );

    let first = sync.run().await;
    let second = sync.run().await;

    assert!(first.success() && second.success());
    assert_eq!(first.processed_count, 5);
    assert_eq!(store.round_count().unwrap(), 5);
    assert_eq!(store.schema_version().unwrap(), 2);
    assert_eq!(second.watermark_after, Some(at(55)));
}
