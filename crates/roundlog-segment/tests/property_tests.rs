//! Property tests for roundlog-segment

use proptest::prelude::*;
use roundlog_config::SegmentationConfig;
use roundlog_schema::sample::Sample;
use roundlog_segment::{BoundaryReason, Segmenter, chronological};
use roundlog_testkit::proptest::strategy_sample_stream;

fn segmenter() -> Segmenter {
    Segmenter::new(&SegmentationConfig::default())
}

fn canonical(mut samples: Vec<Sample>) -> Vec<Sample> {
    samples.sort_by(|a, b| {
        a.partition_key()
            .cmp(&b.partition_key())
            .then_with(|| chronological(a, b))
    });
    samples
}

proptest! {
    /// Shuffling the input never changes the segments
    #[test]
    fn prop_segmentation_is_order_independent(samples in strategy_sample_stream()) {
        let mut shuffled = samples.clone();
        shuffled.reverse();
        let mid = shuffled.len() / 2;
        shuffled.rotate_left(mid);
        prop_assert_eq!(segmenter().segment(samples), segmenter().segment(shuffled));
    }

    /// Every input sample lands in exactly one segment, none are dropped
    #[test]
    fn prop_segments_keep_every_sample(samples in strategy_sample_stream()) {
        let expected = canonical(samples.clone());
        let covered: Vec<Sample> = segmenter()
            .segment(samples)
            .into_iter()
            .flat_map(|seg| seg.samples)
            .collect();
        prop_assert_eq!(canonical(covered), expected);
    }

    /// No boundary condition holds inside a segment, and each segment opens on one
    #[test]
    fn prop_boundaries_only_at_segment_starts(samples in strategy_sample_stream()) {
        let s = segmenter();
        for seg in s.segment(samples) {
            prop_assert!(!seg.reasons.is_empty());
            prop_assert_eq!(seg.reasons[0] == BoundaryReason::FirstSample, seg.round_index == 0);
            for pair in seg.samples.windows(2) {
                prop_assert!(s.boundary_reasons(Some(&pair[0]), &pair[1]).is_empty());
                prop_assert!(pair[0].timestamp <= pair[1].timestamp);
            }
        }
    }

    /// Consecutive segments of a partition never share an instant
    #[test]
    fn prop_consecutive_segments_are_disjoint(samples in strategy_sample_stream()) {
        let segs = segmenter().segment(samples);
        for pair in segs.windows(2) {
            if pair[0].key == pair[1].key {
                prop_assert_eq!(pair[1].round_index, pair[0].round_index + 1);
                prop_assert!(pair[0].last().unwrap().timestamp < pair[1].first().unwrap().timestamp);
            }
        }
    }
}
