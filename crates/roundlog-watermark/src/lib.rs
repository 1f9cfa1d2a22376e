//! Watermark utilities for incremental round publication.
//!
//! The watermark is the max `end_time` already published. Each run re-scans
//! from `watermark - overlap`, and partitions with a published round near that
//! point are re-scanned from the round's start so its identity survives.

use chrono::{DateTime, Duration, Utc};
use roundlog_schema::round::Round;
use roundlog_schema::sample::PartitionKey;
use std::collections::{BTreeMap, VecDeque};

/// Progress of publication in event time.
///
/// The default watermark sits below every timestamp: nothing published yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Watermark {
    timestamp: i64,
}

impl Watermark {
    /// Create a new watermark with the given timestamp (milliseconds since epoch)
    pub fn new(timestamp: i64) -> Self {
        Self { timestamp }
    }

    pub fn from_datetime(dt: &DateTime<Utc>) -> Self {
        Self {
            timestamp: dt.timestamp_millis(),
        }
    }

    pub fn from_option(dt: Option<DateTime<Utc>>) -> Self {
        dt.map(|d| Self::from_datetime(&d)).unwrap_or_default()
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp
    }

    pub fn is_set(&self) -> bool {
        self.timestamp != i64::MIN
    }

    /// `None` while nothing has been published.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        if self.is_set() {
            DateTime::from_timestamp_millis(self.timestamp)
        } else {
            None
        }
    }

    /// Move forward to `candidate`. Returns whether the watermark moved.
    pub fn advance(&mut self, candidate: DateTime<Utc>) -> bool {
        let millis = candidate.timestamp_millis();
        if millis > self.timestamp {
            self.timestamp = millis;
            true
        } else {
            false
        }
    }

    pub fn is_before(&self, other: i64) -> bool {
        self.timestamp < other
    }

    pub fn is_after(&self, other: i64) -> bool {
        self.timestamp > other
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Self {
            timestamp: i64::MIN,
        }
    }
}

/// Where one sync run starts reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPlan {
    pub watermark: Watermark,
    /// `watermark - overlap`; `None` scans everything.
    pub scan_start: Option<DateTime<Utc>>,
    /// Published rounds ending at or after this instant anchor their partition.
    pub anchor_cutoff: Option<DateTime<Utc>>,
}

impl ScanPlan {
    pub fn new(watermark: Watermark, overlap: Duration, gap: Duration) -> Self {
        let scan_start = watermark.to_datetime().map(|wm| wm - overlap);
        Self {
            watermark,
            scan_start,
            anchor_cutoff: scan_start.map(|s| s - gap),
        }
    }

    /// Per-partition scan start for partitions with anchor rounds: the
    /// earliest anchor start, never later than `scan_start`.
    pub fn anchored_starts(&self, anchors: &[Round]) -> BTreeMap<PartitionKey, DateTime<Utc>> {
        let mut starts: BTreeMap<PartitionKey, DateTime<Utc>> = BTreeMap::new();
        let Some(scan_start) = self.scan_start else {
            return starts;
        };
        for round in anchors {
            let start = round.start_time.min(scan_start);
            starts
                .entry(round.partition_key())
                .and_modify(|s| *s = (*s).min(start))
                .or_insert(start);
        }
        starts
    }
}

/// Bounded history of watermark values, oldest first.
#[derive(Debug)]
pub struct WatermarkTracker {
    watermarks: VecDeque<Watermark>,
    max_history: usize,
}

impl WatermarkTracker {
    pub fn new(max_history: usize) -> Self {
        Self {
            watermarks: VecDeque::with_capacity(max_history),
            max_history,
        }
    }

    pub fn add(&mut self, watermark: Watermark) {
        if self.watermarks.len() >= self.max_history {
            self.watermarks.pop_front();
        }
        self.watermarks.push_back(watermark);
    }

    pub fn watermarks(&self) -> Vec<Watermark> {
        self.watermarks.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<Watermark> {
        self.watermarks.back().copied()
    }

    pub fn earliest(&self) -> Option<Watermark> {
        self.watermarks.front().copied()
    }

    pub fn is_monotonic(&self) -> bool {
        self.watermarks
            .iter()
            .zip(self.watermarks.iter().skip(1))
            .all(|(a, b)| a <= b)
    }
}

impl Default for WatermarkTracker {
    fn default() -> Self {
        Self::new(100)
    }
}
