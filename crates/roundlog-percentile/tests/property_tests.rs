//! Property tests for roundlog-percentile

use proptest::prelude::*;
use roundlog_config::PercentileBreakpoints;
use roundlog_percentile::Distribution;
use roundlog_testkit::proptest::strategy_activity_history;

proptest! {
    /// Breakpoints never decrease: p25 <= p50 <= p75 <= p90
    #[test]
    fn prop_breakpoints_are_ordered(values in strategy_activity_history()) {
        let p = Distribution::new(values)
            .percentiles(&PercentileBreakpoints::default())
            .unwrap();
        prop_assert!(p.p25 <= p.p50);
        prop_assert!(p.p50 <= p.p75);
        prop_assert!(p.p75 <= p.p90);
    }

    /// Every breakpoint lies within the historical range
    #[test]
    fn prop_breakpoints_within_range(values in strategy_activity_history(), p in 0.0f64..100.0) {
        let d = Distribution::new(values);
        let v = d.percentile(p).unwrap();
        prop_assert!(d.min().unwrap() <= v && v <= d.max().unwrap());
    }

    /// Rank is monotone in the queried value
    #[test]
    fn prop_rank_is_monotone(values in strategy_activity_history(), a in 0.0f64..250.0, b in 0.0f64..250.0) {
        let d = Distribution::new(values);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(d.percentile_rank(lo).unwrap() <= d.percentile_rank(hi).unwrap());
    }
}
