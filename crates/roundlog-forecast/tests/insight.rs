//! Forecasts, peaks and recommendations over a few weeks of history.

use chrono::{DateTime, Duration, Utc, Weekday};
use roundlog_config::ForecastConfig;
use roundlog_forecast::{HourOfWeekTable, build_insight, forecast, peak_hours};
use roundlog_schema::analytics::{ActivityTrend, BusyIndicator, BusyLevel};
use roundlog_schema::bucket::ActivityObservation;
use roundlog_testkit::fixtures::at;

fn obs(ts: DateTime<Utc>, value: f64) -> ActivityObservation {
    ActivityObservation {
        server_id: "eu-1".to_string(),
        timestamp: ts,
        value,
    }
}

/// `value` at `minute` past t0, repeated `weeks` weeks back.
fn weekly(minute: i64, value: f64, weeks: i64) -> Vec<ActivityObservation> {
    (1..=weeks)
        .map(|w| obs(at(minute) - Duration::weeks(w), value))
        .collect()
}

/// History seen from Monday 18:30: 19h is 5, 20h is 4, 21h and 22h tie at
/// 9, and Tuesday 02h is 12 but only twice.
fn history() -> Vec<ActivityObservation> {
    [
        weekly(70, 5.0, 3),
        weekly(130, 4.0, 3),
        weekly(190, 9.0, 3),
        weekly(250, 9.0, 3),
        weekly(490, 12.0, 2),
    ]
    .concat()
}

fn quiet_now(current_value: f64) -> BusyIndicator {
    BusyIndicator {
        busy_level: BusyLevel::Quiet,
        busy_text: BusyLevel::Quiet.default_text().to_string(),
        current_value,
        typical_value: Some(6.0),
        percentile: Some(30.0),
        historical_min: Some(2.0),
        historical_max: Some(10.0),
        percentiles: None,
        historical_days: 5,
        hour_of_day: 18,
        day_of_week: Weekday::Mon,
    }
}

#[test]
fn forecast_covers_the_next_hours() {
    let config = ForecastConfig::default();
    let table = HourOfWeekTable::from_observations(&history(), at(30), &config);
    let points = forecast(&table, at(30), &config);

    let summary: Vec<(u32, f64, usize)> = points
        .iter()
        .map(|p| (p.hour, p.predicted_value, p.data_point_count))
        .collect();
    assert_eq!(
        summary,
        vec![(19, 5.0, 3), (20, 4.0, 3), (21, 9.0, 3), (22, 9.0, 3)]
    );
}

#[test]
fn peaks_need_enough_samples_and_break_ties_sooner_first() {
    let config = ForecastConfig::default();
    let table = HourOfWeekTable::from_observations(&history(), at(30), &config);
    let peaks = peak_hours(&table, at(30), &config);

    let hours: Vec<u32> = peaks.iter().map(|p| p.hour).collect();
    assert_eq!(hours, vec![21, 22, 19]);
    assert!(peaks.iter().all(|p| p.day_of_week == Weekday::Mon));
}

#[test]
fn history_outside_lookback_is_ignored() {
    let config = ForecastConfig {
        lookback_days: 10,
        ..ForecastConfig::default()
    };
    let table = HourOfWeekTable::from_observations(&history(), at(30), &config);
    assert!(peak_hours(&table, at(30), &config).is_empty());
}

#[test]
fn insight_recommends_waiting_for_the_peak() {
    let insight = build_insight(
        "eu-1",
        &quiet_now(4.0),
        &history(),
        at(30),
        &ForecastConfig::default(),
    );
    assert_eq!(insight.trend_direction, ActivityTrend::Increasing);
    assert_eq!(insight.current_status, BusyLevel::Quiet);
    assert_eq!(insight.forecast.len(), 4);
    insta::assert_snapshot!(
        insight.recommendation,
        @"Quiet now but picking up within the hour. Expected peak at 21:00 UTC (Mon)."
    );
}

#[test]
fn insight_without_history_is_stable_and_plain() {
    let insight = build_insight("eu-1", &quiet_now(0.0), &[], at(30), &ForecastConfig::default());
    assert_eq!(insight.trend_direction, ActivityTrend::Stable);
    assert!(insight.peak_hours.is_empty());
    assert_eq!(insight.recommendation, "Quieter than usual right now.");
}
