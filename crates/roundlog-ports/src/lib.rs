use anyhow::Result;
use chrono::{DateTime, Utc};
use roundlog_ids::RoundId;
use roundlog_schema::bucket::ActivityObservation;
use roundlog_schema::round::Round;
use roundlog_schema::sample::{PartitionKey, Sample};
use std::sync::Arc;

/// Rows read from a store plus the number of malformed rows left out.
#[derive(Clone, Debug, Default)]
pub struct Fetched<T> {
    pub rows: Vec<T>,
    pub skipped: usize,
}

impl<T> Fetched<T> {
    pub fn new(rows: Vec<T>, skipped: usize) -> Self {
        Self { rows, skipped }
    }

    pub fn merge(&mut self, other: Fetched<T>) {
        self.rows.extend(other.rows);
        self.skipped += other.skipped;
    }
}

/// Sample selection. Time bounds are half-open: `since <= timestamp < until`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleFilter {
    pub player: Option<String>,
    pub server: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub include_bots: bool,
}

impl SampleFilter {
    /// Everything at or after `since`, bots included.
    pub fn since(since: Option<DateTime<Utc>>) -> Self {
        Self {
            since,
            include_bots: true,
            ..Self::default()
        }
    }

    /// One partition from `since` on, bots included.
    pub fn partition(key: &PartitionKey, since: DateTime<Utc>) -> Self {
        Self {
            player: Some(key.player_name.clone()),
            server: Some(key.server_id.clone()),
            since: Some(since),
            until: None,
            include_bots: true,
        }
    }

    pub fn matches(&self, sample: &Sample) -> bool {
        self.player.as_ref().is_none_or(|p| *p == sample.player_name)
            && self.server.as_ref().is_none_or(|s| *s == sample.server_id)
            && self.since.is_none_or(|t| sample.timestamp >= t)
            && self.until.is_none_or(|t| sample.timestamp < t)
            && (self.include_bots || !sample.is_bot)
    }
}

/// Round selection. `since` bounds `end_time`, `until` bounds `start_time`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoundFilter {
    pub player: Option<String>,
    pub server: Option<String>,
    pub map: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub include_bots: bool,
}

impl RoundFilter {
    pub fn player(name: impl Into<String>) -> Self {
        Self {
            player: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, round: &Round) -> bool {
        self.player.as_ref().is_none_or(|p| *p == round.player_name)
            && self.server.as_ref().is_none_or(|s| *s == round.server_id)
            && self.map.as_ref().is_none_or(|m| *m == round.map_name)
            && self.since.is_none_or(|t| round.end_time >= t)
            && self.until.is_none_or(|t| round.start_time < t)
            && (self.include_bots || !round.is_bot)
    }
}

/// Online-count selection. Bounds are half-open on the observation time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActivityFilter {
    pub server: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub include_bots: bool,
}

impl ActivityFilter {
    pub fn as_sample_filter(&self) -> SampleFilter {
        SampleFilter {
            player: None,
            server: self.server.clone(),
            since: self.since,
            until: self.until,
            include_bots: self.include_bots,
        }
    }
}

/// Read side of the external sample stream.
pub trait SampleSource {
    fn samples(&self, filter: &SampleFilter) -> Result<Fetched<Sample>>;
}

/// Append side of the sample stream, used by importers.
pub trait SampleSink {
    /// Store samples, ignoring exact duplicates. Returns rows newly written.
    fn insert_samples(&self, samples: &[Sample]) -> Result<usize>;
}

/// Durable round publication.
///
/// Publication is keyed by `round_id`: publishing a round whose id already
/// exists replaces it. Rounds that a re-scan folded into another round are
/// retired by id in the batch that publishes their replacement.
pub trait RoundSink {
    /// Max `end_time` of published rounds, if any were published.
    fn watermark(&self) -> Result<Option<DateTime<Utc>>>;

    /// Published rounds with `end_time >= since`.
    fn rounds_ending_after(&self, since: DateTime<Utc>) -> Result<Vec<Round>>;

    /// The partition's published round with the latest `end_time`.
    fn last_round(&self, key: &PartitionKey) -> Result<Option<Round>>;

    /// In one transaction: delete the `retired` rounds, upsert `rounds`, and
    /// move the watermark forward to the batch's max `end_time`. The
    /// watermark never moves backwards. Returns the number of rounds upserted.
    fn publish_batch(
        &self,
        rounds: &[Round],
        retired: &[RoundId],
        schema_version: u32,
    ) -> Result<usize>;
}

/// Read-only queries behind the analytics engines.
pub trait AnalyticsStore: SampleSource + Send + Sync {
    fn rounds(&self, filter: &RoundFilter) -> Result<Vec<Round>>;

    fn activity(&self, filter: &ActivityFilter) -> Result<Vec<ActivityObservation>> {
        let fetched = self.samples(&filter.as_sample_filter())?;
        Ok(ActivityObservation::online_counts(
            &fetched.rows,
            filter.include_bots,
        ))
    }

    /// Distinct server ids seen in the sample stream.
    fn servers(&self) -> Result<Vec<String>>;
}

impl<T: SampleSource + ?Sized> SampleSource for &T {
    fn samples(&self, filter: &SampleFilter) -> Result<Fetched<Sample>> {
        (**self).samples(filter)
    }
}

impl<T: SampleSource + ?Sized> SampleSource for Arc<T> {
    fn samples(&self, filter: &SampleFilter) -> Result<Fetched<Sample>> {
        (**self).samples(filter)
    }
}

impl<T: RoundSink + ?Sized> RoundSink for &T {
    fn watermark(&self) -> Result<Option<DateTime<Utc>>> {
        (**self).watermark()
    }

    fn rounds_ending_after(&self, since: DateTime<Utc>) -> Result<Vec<Round>> {
        (**self).rounds_ending_after(since)
    }

    fn last_round(&self, key: &PartitionKey) -> Result<Option<Round>> {
        (**self).last_round(key)
    }

    fn publish_batch(
        &self,
        rounds: &[Round],
        retired: &[RoundId],
        schema_version: u32,
    ) -> Result<usize> {
        (**self).publish_batch(rounds, retired, schema_version)
    }
}

impl<T: RoundSink + ?Sized> RoundSink for Arc<T> {
    fn watermark(&self) -> Result<Option<DateTime<Utc>>> {
        (**self).watermark()
    }

    fn rounds_ending_after(&self, since: DateTime<Utc>) -> Result<Vec<Round>> {
        (**self).rounds_ending_after(since)
    }

    fn last_round(&self, key: &PartitionKey) -> Result<Option<Round>> {
        (**self).last_round(key)
    }

    fn publish_batch(
        &self,
        rounds: &[Round],
        retired: &[RoundId],
        schema_version: u32,
    ) -> Result<usize> {
        (**self).publish_batch(rounds, retired, schema_version)
    }
}
