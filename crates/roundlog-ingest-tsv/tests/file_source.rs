//! File-backed sample source.

use proptest::prelude::*;
use roundlog_ingest_tsv::{TsvSampleSource, decode_samples, encode_samples};
use roundlog_ports::{SampleFilter, SampleSource};
use roundlog_testkit::fixtures;

#[test]
fn reads_and_filters_dump_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("samples.tsv");
    std::fs::write(&path, encode_samples(&fixtures::scenario_samples())).unwrap();

    let source = TsvSampleSource::new(&path);
    let all = source.samples(&SampleFilter::since(None)).unwrap();
    assert_eq!(all.rows, fixtures::scenario_samples());
    assert_eq!(all.skipped, 0);

    let filter = SampleFilter {
        player: Some("alice".to_string()),
        include_bots: true,
        ..SampleFilter::default()
    };
    let alice = source.samples(&filter).unwrap();
    assert!(alice.rows.iter().all(|s| s.player_name == "alice"));
}

#[test]
fn missing_file_reports_path() {
    let source = TsvSampleSource::new("/nonexistent/roundlog/samples.tsv");
    let err = source.read_all().unwrap_err();
    assert!(format!("{err:#}").contains("samples.tsv"));
}

proptest! {
    /// Encoded dumps decode to the same samples
    #[test]
    fn prop_dump_roundtrip(samples in prop::collection::vec(roundlog_testkit::proptest::strategy_sample(), 0..20)) {
        let decoded = decode_samples(&encode_samples(&samples));
        prop_assert_eq!(decoded.skipped, 0);
        prop_assert_eq!(decoded.rows, samples);
    }
}
