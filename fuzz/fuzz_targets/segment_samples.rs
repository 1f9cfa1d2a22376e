//! Fuzz harness for round reconstruction
//!
//! Decodes arbitrary sample text and checks that every round is well-formed
//! and that rounds of one partition never overlap.
//! Target: `roundlog_aggregate::rounds_from_samples`

#![no_main]

use libfuzzer_sys::fuzz_target;
use roundlog_aggregate::rounds_from_samples;
use roundlog_config::SegmentationConfig;
use roundlog_ingest_tsv::decode_samples;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    let samples = decode_samples(input).rows;
    let rounds = rounds_from_samples(samples, &SegmentationConfig::default());
    for (i, a) in rounds.iter().enumerate() {
        assert!(a.start_time <= a.end_time);
        for b in &rounds[i + 1..] {
            if a.partition_key() == b.partition_key() {
                assert!(!a.overlaps(b), "overlapping rounds {a:?} {b:?}");
            }
        }
    }
});
