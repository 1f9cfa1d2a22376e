//! Fuzz harness for the tab-separated sample decoder
//!
//! Every input line must end up either decoded or counted as skipped.
//! Target: `roundlog_ingest_tsv::decode_samples`

#![no_main]

use libfuzzer_sys::fuzz_target;
use roundlog_ingest_tsv::decode_samples;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    let fetched = decode_samples(input);
    let lines = input.lines().filter(|l| !l.trim().is_empty()).count();
    assert!(fetched.rows.len() + fetched.skipped <= lines);
});
