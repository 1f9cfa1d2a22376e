//! Incremental round publication.
//!
//! One pipeline covers every round table version: the schema version is a
//! parameter handed to the sink. A run re-scans from one overlap behind the
//! watermark, re-segments, and upserts rounds by identity in bounded batches.
//! A published round that the re-scan folded into another round (a late
//! sample closed the gap between them) is retired in the batch that publishes
//! its replacement. Committed batches survive a failed run; re-running is
//! safe.

use anyhow::{Context, Result};
use chrono::Duration;
use roundlog_aggregate::aggregate;
use roundlog_config::{SegmentationConfig, SyncConfig};
use roundlog_error::one_line;
use roundlog_ids::{RoundId, SyncRunId};
use roundlog_ports::{RoundSink, SampleFilter, SampleSource};
use roundlog_schema::round::Round;
use roundlog_schema::sample::{PartitionKey, Sample};
use roundlog_schema::sync::SyncRunResult;
use roundlog_segment::Segmenter;
use roundlog_watermark::{ScanPlan, Watermark, WatermarkTracker};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Sync status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SyncStatus {
    Pending,
    InProgress,
    Completed,
    Failed(String),
}

/// Rounds to publish for one run.
#[derive(Debug)]
pub struct Collected {
    pub plan: ScanPlan,
    pub rounds: Vec<Round>,
    /// Published anchors now covered by a recomputed round with another id.
    pub superseded: Vec<Round>,
    pub anchors: usize,
    pub skipped_rows: usize,
}

impl Collected {
    /// Ids to retire alongside each batch of `rounds`, chunked by
    /// `batch_size`. A superseded round leaves with the first batch holding
    /// a round of its partition that overlaps it.
    pub fn retirements(&self, batch_size: usize) -> Vec<Vec<RoundId>> {
        let batch_size = batch_size.max(1);
        let mut out = vec![Vec::new(); self.rounds.len().div_ceil(batch_size)];
        for stale in &self.superseded {
            let Some(position) = self.rounds.iter().position(|r| covers(r, stale)) else {
                continue;
            };
            if let Some(ids) = out.get_mut(position / batch_size) {
                ids.push(stale.round_id.clone());
            }
        }
        out
    }
}

fn covers(fresh: &Round, stale: &Round) -> bool {
    fresh.round_id != stale.round_id
        && fresh.partition_key() == stale.partition_key()
        && fresh.overlaps(stale)
}

/// Single-writer publication pipeline. `run` takes `&mut self`, so one owner
/// serializes runs against its sink.
pub struct SyncPipeline<S, K> {
    source: S,
    sink: K,
    segmenter: Segmenter,
    config: SyncConfig,
    status: SyncStatus,
    history: WatermarkTracker,
}

impl<S: SampleSource, K: RoundSink> SyncPipeline<S, K> {
    pub fn new(source: S, sink: K, segmentation: &SegmentationConfig, config: SyncConfig) -> Self {
        Self {
            source,
            sink,
            segmenter: Segmenter::new(segmentation),
            config,
            status: SyncStatus::Pending,
            history: WatermarkTracker::default(),
        }
    }

    pub fn status(&self) -> &SyncStatus {
        &self.status
    }

    /// Watermark after each committed batch, across runs.
    pub fn history(&self) -> &WatermarkTracker {
        &self.history
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Work out the scan window and re-segment everything inside it.
    pub fn collect(&self, watermark: Watermark) -> Result<Collected> {
        let plan = ScanPlan::new(
            watermark,
            Duration::minutes(self.config.overlap_minutes),
            self.segmenter.gap(),
        );

        let anchors = match plan.anchor_cutoff {
            Some(cutoff) => self
                .sink
                .rounds_ending_after(cutoff)
                .context("load anchor rounds")?,
            None => Vec::new(),
        };
        let anchored = plan.anchored_starts(&anchors);

        let mut fetched = self
            .source
            .samples(&SampleFilter::since(plan.scan_start))
            .context("read samples since scan start")?;
        fetched
            .rows
            .retain(|s| !anchored.keys().any(|key| s.belongs_to(key)));
        for (key, since) in &anchored {
            let partition = self
                .source
                .samples(&SampleFilter::partition(key, *since))
                .with_context(|| format!("read samples for {key}"))?;
            fetched.merge(partition);
        }

        let offsets = self.index_offsets(&anchors, &fetched.rows)?;
        debug!(
            scan_start = ?plan.scan_start,
            anchors = anchors.len(),
            samples = fetched.rows.len(),
            "collected samples for sync"
        );
        let mut segments = self.segmenter.segment(fetched.rows);
        for segment in &mut segments {
            segment.round_index += offsets.get(&segment.key).copied().unwrap_or(0);
        }
        let rounds = aggregate(&segments);
        let fresh: BTreeSet<&RoundId> = rounds.iter().map(|r| &r.round_id).collect();
        let superseded: Vec<Round> = anchors
            .iter()
            .filter(|a| !fresh.contains(&a.round_id) && rounds.iter().any(|r| covers(r, a)))
            .cloned()
            .collect();
        Ok(Collected {
            plan,
            superseded,
            rounds,
            anchors: anchors.len(),
            skipped_rows: fetched.skipped,
        })
    }

    /// Round index of the first re-computed round in each partition, so that
    /// indexes keep counting across runs.
    fn index_offsets(&self, anchors: &[Round], samples: &[Sample]) -> Result<BTreeMap<PartitionKey, u32>> {
        let mut earliest: BTreeMap<PartitionKey, &Round> = BTreeMap::new();
        for round in anchors {
            let entry = earliest.entry(round.partition_key()).or_insert(round);
            if round.start_time < entry.start_time {
                *entry = round;
            }
        }
        let mut offsets: BTreeMap<PartitionKey, u32> = earliest
            .into_iter()
            .map(|(key, round)| (key, round.round_index))
            .collect();

        let fresh: BTreeSet<PartitionKey> = samples
            .iter()
            .map(Sample::partition_key)
            .filter(|key| !offsets.contains_key(key))
            .collect();
        for key in fresh {
            let last = self
                .sink
                .last_round(&key)
                .with_context(|| format!("load last round for {key}"))?;
            if let Some(last) = last {
                offsets.insert(key, last.round_index + 1);
            }
        }
        Ok(offsets)
    }

    /// One incremental run. Never fails: errors land in `error_message`.
    pub async fn run(&mut self) -> SyncRunResult {
        let started = Instant::now();
        let run_id = SyncRunId::now("sync");
        self.status = SyncStatus::InProgress;

        let mut result = SyncRunResult {
            run_id: run_id.to_string(),
            processed_count: 0,
            retired_count: 0,
            skipped_rows: 0,
            batches: 0,
            duration_ms: 0,
            error_message: None,
            watermark_before: None,
            watermark_after: None,
        };

        if let Err(err) = self.publish(&mut result).await {
            let message = one_line(&err);
            warn!(run_id = %run_id, error = %message, processed = result.processed_count, "sync run failed");
            result.error_message = Some(message);
        }

        result.watermark_after = self.sink.watermark().ok().flatten().or(result.watermark_before);
        result.duration_ms = started.elapsed().as_millis() as u64;
        self.status = match &result.error_message {
            None => SyncStatus::Completed,
            Some(e) => SyncStatus::Failed(e.clone()),
        };
        info!(
            run_id = %run_id,
            processed = result.processed_count,
            batches = result.batches,
            skipped = result.skipped_rows,
            duration_ms = result.duration_ms,
            success = result.success(),
            "sync run finished"
        );
        result
    }

    async fn publish(&mut self, result: &mut SyncRunResult) -> Result<()> {
        let before = self.sink.watermark().context("read watermark")?;
        result.watermark_before = before;
        let mut watermark = Watermark::from_option(before);

        let collected = self.collect(watermark)?;
        result.skipped_rows = collected.skipped_rows;
        info!(
            run_id = %result.run_id,
            rounds = collected.rounds.len(),
            superseded = collected.superseded.len(),
            anchors = collected.anchors,
            schema_version = self.config.schema_version,
            "publishing rounds"
        );

        let batch_size = self.config.batch_size.max(1);
        let retirements = collected.retirements(batch_size);
        let delay = std::time::Duration::from_millis(self.config.batch_delay_ms);
        for (i, (batch, retired)) in collected
            .rounds
            .chunks(batch_size)
            .zip(&retirements)
            .enumerate()
        {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let written = self
                .sink
                .publish_batch(batch, retired, self.config.schema_version)
                .with_context(|| format!("publish batch {i} ({} rounds)", batch.len()))?;
            result.processed_count += written;
            result.retired_count += retired.len();
            result.batches += 1;

            if let Some(end) = batch.iter().map(|r| r.end_time).max() {
                watermark.advance(end);
            }
            self.history.add(watermark);
            debug!(batch = i, written, watermark = ?watermark.to_datetime(), "batch committed");
        }
        Ok(())
    }
}
