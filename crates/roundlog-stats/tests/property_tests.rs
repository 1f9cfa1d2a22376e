//! Property tests for roundlog-stats

use proptest::prelude::*;
use roundlog_config::PercentileBreakpoints;
use roundlog_percentile::Distribution;
use roundlog_stats::{BusyClassifier, milestones, rate_summary};
use roundlog_testkit::fixtures::rounds_with_cumulative_kills;
use roundlog_testkit::proptest::{strategy_activity_history, strategy_sample_stream};

proptest! {
    /// Kill, death and score rates are never negative, whatever the resets
    #[test]
    fn prop_rates_are_non_negative(samples in strategy_sample_stream()) {
        let summary = rate_summary(&samples);
        prop_assert!(summary.kills >= 0);
        prop_assert!(summary.kill_rate >= 0.0);
        prop_assert!(summary.death_rate >= 0.0);
        prop_assert!(summary.score_rate >= 0.0);
    }

    /// Each threshold fires at most once per player
    #[test]
    fn prop_milestones_fire_once(increments in prop::collection::vec(0i64..3_000, 0..20)) {
        let cumulative: Vec<i64> = increments
            .iter()
            .scan(0, |total, k| {
                *total += k;
                Some(*total)
            })
            .collect();
        let rounds = rounds_with_cumulative_kills("alice", &cumulative);
        let thresholds = [1_000, 5_000, 10_000, 25_000];
        let found = milestones(&rounds, &thresholds);

        let reached = thresholds
            .iter()
            .filter(|t| cumulative.last().is_some_and(|total| total >= *t))
            .count();
        prop_assert_eq!(found.len(), reached);
        for pair in found.windows(2) {
            prop_assert!(pair[0].threshold < pair[1].threshold);
        }
    }

    /// Raising the current value never lowers the busy level
    #[test]
    fn prop_busy_level_is_monotonic(
        history in strategy_activity_history(),
        a in 0.0f64..250.0,
        b in 0.0f64..250.0,
    ) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let percentiles = Distribution::new(history)
            .percentiles(&PercentileBreakpoints::default())
            .unwrap();
        prop_assert!(
            BusyClassifier::classify_level(low, &percentiles)
                <= BusyClassifier::classify_level(high, &percentiles)
        );
    }
}
