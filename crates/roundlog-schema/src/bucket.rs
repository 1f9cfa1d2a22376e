use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc, Weekday};
use crate::sample::Sample;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A time-of-week slot: hour of day plus weekday.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HourSlot {
    pub hour: u32,
    pub day_of_week: Weekday,
}

impl HourSlot {
    pub fn of(ts: DateTime<Utc>) -> Self {
        Self {
            hour: ts.hour(),
            day_of_week: ts.weekday(),
        }
    }

    /// Monday 00h is 0, Sunday 23h is 167.
    pub fn ordinal(&self) -> u32 {
        self.day_of_week.num_days_from_monday() * 24 + self.hour
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BucketKey {
    HourOfWeek(HourSlot),
    Date { date: NaiveDate },
}

/// An aggregate over many rounds or samples.
///
/// `sample_count` gates confidence: a bucket below the configured minimum is
/// reported but not trusted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoricalBucket {
    pub key: BucketKey,
    pub value: f64,
    pub sample_count: usize,
}

impl HistoricalBucket {
    pub fn is_reliable(&self, min_samples: usize) -> bool {
        self.sample_count >= min_samples
    }
}

/// One point of a daily performance series used for regression.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub value: f64,
    pub sample_size: usize,
}

/// Server-level activity at one instant, e.g. real players online.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityObservation {
    pub server_id: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl ActivityObservation {
    /// Count distinct players per (server, poll timestamp).
    ///
    /// Samples taken in the same poll share a timestamp, so each group is one
    /// online-count observation. Bots are left out unless `include_bots`.
    pub fn online_counts(samples: &[Sample], include_bots: bool) -> Vec<ActivityObservation> {
        let mut polls: BTreeMap<(&str, DateTime<Utc>), BTreeSet<&str>> = BTreeMap::new();
        for s in samples.iter().filter(|s| include_bots || !s.is_bot) {
            polls
                .entry((s.server_id.as_str(), s.timestamp))
                .or_default()
                .insert(s.player_name.as_str());
        }
        polls
            .into_iter()
            .map(|((server_id, timestamp), players)| ActivityObservation {
                server_id: server_id.to_string(),
                timestamp,
                value: players.len() as f64,
            })
            .collect()
    }
}
