//! Trend fits on flat, linear and noisy daily series.

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use roundlog_config::TrendConfig;
use roundlog_schema::analytics::TrendDirection;
use roundlog_schema::bucket::TrendPoint;
use roundlog_testkit::fixtures::{day, round, sample};
use roundlog_testkit::proptest::strategy_trend_series;
use roundlog_trend::{Metric, daily_series, daily_series_where, fit_trend, trajectory};

fn series(values: &[f64]) -> Vec<TrendPoint> {
    let start = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
    values
        .iter()
        .enumerate()
        .map(|(i, v)| TrendPoint {
            date: start + Duration::days(i as i64),
            value: *v,
            sample_size: 3,
        })
        .collect()
}

#[test]
fn flat_kill_rate_is_stable() {
    let fit = fit_trend(&series(&[1.0, 1.0, 1.0, 1.0, 1.0]), &TrendConfig::default());
    assert_eq!(fit.direction, TrendDirection::Stable);
    assert!(fit.slope.abs() < 1e-12);
    assert_eq!(fit.r_squared, 0.0);
    assert_eq!(fit.points_used, 5);
}

#[test]
fn daily_rates_come_from_sample_deltas() {
    let at_day = |d: i64, minute: i64| day(d) + Duration::minutes(minute);
    let samples = vec![
        sample("alice", "eu-1", "dust", at_day(0, 0), 0, 0),
        sample("alice", "eu-1", "dust", at_day(0, 10), 10, 2),
        // a lone sample on a new map adds time but no kills
        sample("alice", "eu-1", "nuke", at_day(0, 20), 10, 2),
        sample("alice", "eu-1", "dust", at_day(2, 0), 0, 0),
        sample("alice", "eu-1", "dust", at_day(2, 20), 40, 0),
    ];
    let kill_rate = daily_series(&[], &samples, Metric::KillRate);
    assert_eq!(kill_rate.len(), 2);
    assert_eq!(kill_rate[0].sample_size, 2);
    assert_eq!(kill_rate[0].value, 0.5);
    assert_eq!(kill_rate[1].value, 2.0);

    let dust_only = daily_series_where(&[], &samples, Metric::KillRate, |s| s.map_name == "dust");
    assert_eq!(dust_only[0].value, 1.0);
    assert_eq!(dust_only[0].sample_size, 1);

    let score_rate = daily_series(&[], &samples, Metric::ScoreRate);
    assert_eq!(score_rate[1].value, 20.0);
}

#[test]
fn daily_kd_groups_rounds_by_start_date() {
    let rounds = vec![
        round("alice", "eu-1", "dust", day(0), day(0) + Duration::minutes(10), 10, 2),
        round("alice", "eu-1", "nuke", day(0) + Duration::hours(1), day(0) + Duration::minutes(70), 0, 2),
        round("alice", "eu-1", "dust", day(2), day(2) + Duration::minutes(20), 40, 0),
    ];
    let kd = daily_series(&rounds, &[], Metric::KdRatio);
    assert_eq!(kd.len(), 2);
    assert_eq!(kd[0].sample_size, 2);
    assert_eq!(kd[0].value, 2.5);
    assert_eq!(kd[1].value, 0.0);
}

#[test]
fn falling_metrics_make_a_declining_trajectory() {
    let config = TrendConfig::default();
    let falling = fit_trend(&series(&[3.0, 2.5, 2.0, 1.5]), &config);
    let sagging = fit_trend(&series(&[1.0, 0.95, 0.9, 0.86]), &config);
    let flat = fit_trend(&series(&[1.0, 1.0, 1.0, 1.0]), &config);
    let t = trajectory(&[falling, sagging, flat]);
    assert_eq!(t.direction, TrendDirection::Declining);
    assert!(t.confidence > 0.6);
}

proptest! {
    /// R² stays in [0, 1] and the slope is finite for any finite series
    #[test]
    fn prop_fit_is_bounded(values in strategy_trend_series()) {
        let fit = fit_trend(&series(&values), &TrendConfig::default());
        prop_assert!(fit.slope.is_finite());
        prop_assert!((0.0..=1.0).contains(&fit.r_squared));
    }

    /// Shifting a series up by a constant leaves the slope unchanged
    #[test]
    fn prop_shift_keeps_slope(values in strategy_trend_series(), shift in -100.0f64..100.0) {
        let config = TrendConfig::default();
        let base = fit_trend(&series(&values), &config);
        let shifted: Vec<f64> = values.iter().map(|v| v + shift).collect();
        let moved = fit_trend(&series(&shifted), &config);
        prop_assert!((base.slope - moved.slope).abs() < 1e-6);
        prop_assert_eq!(base.points_used, moved.points_used);
    }
}
