use chrono::{DateTime, Duration, DurationRound, NaiveDate, Timelike, Utc};
use roundlog_config::BusyConfig;
use roundlog_percentile::Distribution;
use roundlog_schema::analytics::{BusyIndicator, BusyLevel, Percentiles};
use roundlog_schema::bucket::{ActivityObservation, HourSlot};
use std::collections::BTreeMap;
use tracing::debug;

const EXTREMELY_BUSY: &str = "Extremely busy";
const VERY_QUIET: &str = "Very quiet";

/// Classifies current activity against the same hour-of-week slot in history.
///
/// Each historical day contributes one value: observations are bucketed by
/// `bucket_minutes`, the latest value per server is kept per bucket, servers
/// are summed, and the bucket totals of the hour are averaged. Days with fewer
/// than `min_buckets_per_hour` buckets are dropped.
#[derive(Debug, Clone)]
pub struct BusyClassifier {
    config: BusyConfig,
}

impl BusyClassifier {
    pub fn new(config: &BusyConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn config(&self) -> &BusyConfig {
        &self.config
    }

    fn bucket_minutes(&self) -> u32 {
        self.config.bucket_minutes.max(1)
    }

    /// Latest value per server within the last bucket width before `now`, summed.
    pub fn current_value(&self, observations: &[ActivityObservation], now: DateTime<Utc>) -> f64 {
        let since = now - Duration::minutes(i64::from(self.bucket_minutes()));
        let mut latest: BTreeMap<&str, (DateTime<Utc>, f64)> = BTreeMap::new();
        for o in observations
            .iter()
            .filter(|o| o.timestamp > since && o.timestamp <= now)
        {
            keep_latest(&mut latest, o);
        }
        latest.values().map(|(_, v)| v).sum()
    }

    /// One value per historical day for the slot of `now`.
    ///
    /// Only observations before the start of the current hour and inside the
    /// lookback window count.
    pub fn daily_history(
        &self,
        observations: &[ActivityObservation],
        now: DateTime<Utc>,
    ) -> BTreeMap<NaiveDate, f64> {
        let slot = HourSlot::of(now);
        let hour_start = now.duration_trunc(Duration::hours(1)).unwrap_or(now);
        let since = now - Duration::days(self.config.lookback_days);
        let width = self.bucket_minutes();

        let mut buckets: BTreeMap<(NaiveDate, u32), BTreeMap<&str, (DateTime<Utc>, f64)>> =
            BTreeMap::new();
        for o in observations.iter().filter(|o| {
            o.timestamp < hour_start && o.timestamp >= since && HourSlot::of(o.timestamp) == slot
        }) {
            let key = (o.timestamp.date_naive(), o.timestamp.minute() / width);
            keep_latest(buckets.entry(key).or_default(), o);
        }

        let mut per_day: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
        for ((date, _), servers) in buckets {
            per_day
                .entry(date)
                .or_default()
                .push(servers.values().map(|(_, v)| v).sum());
        }
        per_day
            .into_iter()
            .filter(|(_, totals)| totals.len() >= self.config.min_buckets_per_hour)
            .map(|(date, totals)| (date, totals.iter().sum::<f64>() / totals.len() as f64))
            .collect()
    }

    pub fn classify_level(current: f64, percentiles: &Percentiles) -> BusyLevel {
        if current >= percentiles.p90 {
            BusyLevel::VeryBusy
        } else if current >= percentiles.p75 {
            BusyLevel::Busy
        } else if current >= percentiles.p50 {
            BusyLevel::Moderate
        } else if current >= percentiles.p25 {
            BusyLevel::Quiet
        } else {
            BusyLevel::VeryQuiet
        }
    }

    /// Level text, replaced near the edges of the historical range.
    pub fn busy_text(&self, level: BusyLevel, current: f64, min: f64, max: f64) -> String {
        if max > 0.0 && current >= self.config.extreme_high_ratio * max {
            EXTREMELY_BUSY.to_string()
        } else if min > 0.0 && current <= self.config.extreme_low_ratio * min {
            VERY_QUIET.to_string()
        } else {
            level.default_text().to_string()
        }
    }

    /// Classify `current_value` against the history in `observations`.
    pub fn indicator(
        &self,
        observations: &[ActivityObservation],
        current_value: f64,
        now: DateTime<Utc>,
    ) -> BusyIndicator {
        let slot = HourSlot::of(now);
        let history = self.daily_history(observations, now);
        let distribution: Distribution = history.values().copied().collect();

        let unknown = || BusyIndicator {
            busy_level: BusyLevel::Unknown,
            busy_text: BusyLevel::Unknown.default_text().to_string(),
            current_value,
            typical_value: None,
            percentile: None,
            historical_min: None,
            historical_max: None,
            percentiles: None,
            historical_days: distribution.len(),
            hour_of_day: slot.hour,
            day_of_week: slot.day_of_week,
        };

        if distribution.len() < self.config.min_historical_days.max(1) {
            debug!(
                days = distribution.len(),
                required = self.config.min_historical_days,
                hour = slot.hour,
                "not enough history for busy classification"
            );
            return unknown();
        }
        let (Some(percentiles), Some(min), Some(max)) = (
            distribution.percentiles(&self.config.breakpoints),
            distribution.min(),
            distribution.max(),
        ) else {
            return unknown();
        };

        let level = Self::classify_level(current_value, &percentiles);
        BusyIndicator {
            busy_level: level,
            busy_text: self.busy_text(level, current_value, min, max),
            current_value,
            typical_value: Some(percentiles.p50),
            percentile: distribution.percentile_rank(current_value),
            historical_min: Some(min),
            historical_max: Some(max),
            percentiles: Some(percentiles),
            historical_days: distribution.len(),
            hour_of_day: slot.hour,
            day_of_week: slot.day_of_week,
        }
    }
}

fn keep_latest<'a>(
    latest: &mut BTreeMap<&'a str, (DateTime<Utc>, f64)>,
    o: &'a ActivityObservation,
) {
    let entry = latest
        .entry(o.server_id.as_str())
        .or_insert((o.timestamp, o.value));
    if o.timestamp >= entry.0 {
        *entry = (o.timestamp, o.value);
    }
}
