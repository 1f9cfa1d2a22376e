//! Activity forecasting from historical hour-of-week averages.
//!
//! The prediction for a future hour is the historical average for the same
//! (hour of day, day of week) slot; `data_point_count` says how much history
//! backs it.

use chrono::{DateTime, Duration, DurationRound, Utc};
use itertools::Itertools;
use roundlog_config::ForecastConfig;
use roundlog_schema::analytics::{
    ActivityTrend, BusyIndicator, BusyLevel, ForecastPoint, ServerInsight,
};
use roundlog_schema::bucket::{ActivityObservation, BucketKey, HistoricalBucket, HourSlot};
use std::collections::BTreeMap;
use tracing::debug;

/// Average activity per hour-of-week slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HourOfWeekTable {
    slots: BTreeMap<u32, HistoricalBucket>,
}

impl HourOfWeekTable {
    /// Build from observations taken before `now` and inside the lookback.
    pub fn from_observations(
        observations: &[ActivityObservation],
        now: DateTime<Utc>,
        config: &ForecastConfig,
    ) -> Self {
        let since = now - Duration::days(config.lookback_days);
        let slots = observations
            .iter()
            .filter(|o| o.timestamp >= since && o.timestamp < now && o.value.is_finite())
            .into_group_map_by(|o| HourSlot::of(o.timestamp))
            .into_iter()
            .map(|(slot, obs)| {
                let bucket = HistoricalBucket {
                    key: BucketKey::HourOfWeek(slot),
                    value: obs.iter().map(|o| o.value).sum::<f64>() / obs.len() as f64,
                    sample_count: obs.len(),
                };
                (slot.ordinal(), bucket)
            })
            .collect();
        Self { slots }
    }

    pub fn get(&self, slot: HourSlot) -> Option<&HistoricalBucket> {
        self.slots.get(&slot.ordinal())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Prediction for the hour starting at `starts_at`; an empty slot predicts 0.
    pub fn point(&self, starts_at: DateTime<Utc>) -> ForecastPoint {
        let slot = HourSlot::of(starts_at);
        let (predicted_value, data_point_count) = self
            .get(slot)
            .map_or((0.0, 0), |b| (b.value, b.sample_count));
        ForecastPoint {
            starts_at,
            hour: slot.hour,
            day_of_week: slot.day_of_week,
            predicted_value,
            data_point_count,
        }
    }
}

/// Start of each of the next `hours` whole hours after `now`.
fn upcoming_hours(now: DateTime<Utc>, hours: u32) -> impl Iterator<Item = DateTime<Utc>> {
    let current = now.duration_trunc(Duration::hours(1)).unwrap_or(now);
    (1..=i64::from(hours)).map(move |i| current + Duration::hours(i))
}

/// Predictions for the next `horizon_hours`.
pub fn forecast(
    table: &HourOfWeekTable,
    now: DateTime<Utc>,
    config: &ForecastConfig,
) -> Vec<ForecastPoint> {
    upcoming_hours(now, config.horizon_hours)
        .map(|t| table.point(t))
        .collect()
}

/// Busiest well-sampled hours of the next day, sooner first on ties.
pub fn peak_hours(
    table: &HourOfWeekTable,
    now: DateTime<Utc>,
    config: &ForecastConfig,
) -> Vec<ForecastPoint> {
    upcoming_hours(now, 24)
        .map(|t| table.point(t))
        .filter(|p| p.data_point_count >= config.min_samples_per_slot)
        .sorted_by(|a, b| b.predicted_value.total_cmp(&a.predicted_value))
        .take(config.peak_count)
        .collect()
}

/// Direction of the next-hour prediction relative to `current`.
pub fn activity_trend(current: f64, next: f64, band: f64) -> ActivityTrend {
    if current <= 0.0 {
        return if next > 0.0 {
            ActivityTrend::Increasing
        } else {
            ActivityTrend::Stable
        };
    }
    let change = (next - current) / current;
    if change > band {
        ActivityTrend::Increasing
    } else if change < -band {
        ActivityTrend::Decreasing
    } else {
        ActivityTrend::Stable
    }
}

fn recommendation(status: BusyLevel, trend: ActivityTrend, peaks: &[ForecastPoint]) -> String {
    let now = match (status, trend) {
        (BusyLevel::VeryBusy | BusyLevel::Busy, ActivityTrend::Decreasing) => {
            "Busy now but winding down; join soon."
        }
        (BusyLevel::VeryBusy | BusyLevel::Busy, _) => "Busy now; a good time to join.",
        (_, ActivityTrend::Increasing) => "Quiet now but picking up within the hour.",
        (BusyLevel::Unknown, _) => "Not enough history to judge the current activity.",
        (BusyLevel::Moderate, _) => "About as busy as usual right now.",
        _ => "Quieter than usual right now.",
    };
    match peaks.first() {
        Some(peak) => format!(
            "{now} Expected peak at {} UTC ({:?}).",
            peak.starts_at.format("%H:%M"),
            peak.day_of_week
        ),
        None => now.to_string(),
    }
}

/// Forecast, peaks and a recommendation for one server.
///
/// `observations` should already be restricted to the server.
pub fn build_insight(
    server_id: &str,
    busy: &BusyIndicator,
    observations: &[ActivityObservation],
    now: DateTime<Utc>,
    config: &ForecastConfig,
) -> ServerInsight {
    let table = HourOfWeekTable::from_observations(observations, now, config);
    debug!(server = server_id, slots = table.len(), "built hour-of-week table");

    let forecast = forecast(&table, now, config);
    let peaks = peak_hours(&table, now, config);
    let next = upcoming_hours(now, 1)
        .next()
        .map_or(0.0, |t| table.point(t).predicted_value);
    let trend_direction = activity_trend(busy.current_value, next, config.stable_band);

    ServerInsight {
        server_id: server_id.to_string(),
        current_status: busy.busy_level,
        current_value: busy.current_value,
        trend_direction,
        recommendation: recommendation(busy.busy_level, trend_direction, &peaks),
        forecast,
        peak_hours: peaks,
    }
}
