//! Round boundary detection.
//!
//! Samples are split into (player, server) partitions and ordered
//! chronologically. A sample opens a new round when any boundary condition
//! holds against the previous sample of its partition; the conditions are
//! OR-combined and every one that fired is recorded on the segment. Samples
//! that share an instant always stay in one round.

use chrono::Duration;
use roundlog_config::SegmentationConfig;
use roundlog_schema::sample::{PartitionKey, Sample};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

/// Why a sample opened a new round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryReason {
    FirstSample,
    KillsReset,
    DeathsReset,
    MapChanged,
    Gap,
}

/// Samples of one round, in chronological order.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub key: PartitionKey,
    /// Running counter within the partition, starting at 0.
    pub round_index: u32,
    pub reasons: Vec<BoundaryReason>,
    pub samples: Vec<Sample>,
}

impl Segment {
    pub fn first(&self) -> Option<&Sample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }
}

/// Total order used inside a partition: timestamp, then map and counters.
pub fn chronological(a: &Sample, b: &Sample) -> Ordering {
    a.timestamp
        .cmp(&b.timestamp)
        .then_with(|| a.map_name.cmp(&b.map_name))
        .then_with(|| a.kills.cmp(&b.kills))
        .then_with(|| a.deaths.cmp(&b.deaths))
        .then_with(|| a.score.cmp(&b.score))
        .then_with(|| a.ping.cmp(&b.ping))
        .then_with(|| a.is_bot.cmp(&b.is_bot))
        .then_with(|| a.session_id.cmp(&b.session_id))
        .then_with(|| a.team_label.cmp(&b.team_label))
        .then_with(|| a.game_id.cmp(&b.game_id))
}

#[derive(Clone, Debug)]
pub struct Segmenter {
    gap: Duration,
}

impl Segmenter {
    pub fn new(config: &SegmentationConfig) -> Self {
        Self {
            gap: Duration::minutes(config.gap_minutes),
        }
    }

    pub fn gap(&self) -> Duration {
        self.gap
    }

    /// Every boundary condition that holds between `prev` and `next`.
    ///
    /// An empty result means `next` continues the round of `prev`. A sample
    /// taken at the same instant as `prev` never opens a round, so two rounds
    /// of a partition never share an instant.
    pub fn boundary_reasons(&self, prev: Option<&Sample>, next: &Sample) -> Vec<BoundaryReason> {
        let Some(prev) = prev else {
            return vec![BoundaryReason::FirstSample];
        };
        if next.timestamp == prev.timestamp {
            return Vec::new();
        }
        let mut reasons = Vec::new();
        if next.kills < prev.kills {
            reasons.push(BoundaryReason::KillsReset);
        }
        if next.deaths < prev.deaths {
            reasons.push(BoundaryReason::DeathsReset);
        }
        if next.map_name != prev.map_name {
            reasons.push(BoundaryReason::MapChanged);
        }
        if next.timestamp - prev.timestamp >= self.gap {
            reasons.push(BoundaryReason::Gap);
        }
        reasons
    }

    /// Segment samples from any number of partitions, in any input order.
    ///
    /// Output is grouped by partition key, then by round index.
    pub fn segment(&self, samples: impl IntoIterator<Item = Sample>) -> Vec<Segment> {
        let mut partitions: BTreeMap<PartitionKey, Vec<Sample>> = BTreeMap::new();
        for s in samples {
            partitions.entry(s.partition_key()).or_default().push(s);
        }

        let partition_count = partitions.len();
        let segments: Vec<Segment> = partitions
            .into_iter()
            .flat_map(|(key, samples)| self.segment_partition(key, samples))
            .collect();
        debug!(
            partitions = partition_count,
            segments = segments.len(),
            "segmented samples"
        );
        segments
    }

    /// Segment one partition's samples, ordered by [`chronological`].
    pub fn segment_partition(&self, key: PartitionKey, mut samples: Vec<Sample>) -> Vec<Segment> {
        samples.sort_by(chronological);

        let mut segments: Vec<Segment> = Vec::new();
        let mut prev: Option<&Sample> = None;
        for sample in &samples {
            let reasons = self.boundary_reasons(prev, sample);
            match segments.last_mut() {
                Some(current) if reasons.is_empty() => current.samples.push(sample.clone()),
                _ => segments.push(Segment {
                    key: key.clone(),
                    round_index: segments.len() as u32,
                    reasons,
                    samples: vec![sample.clone()],
                }),
            }
            prev = Some(sample);
        }
        segments
    }
}
