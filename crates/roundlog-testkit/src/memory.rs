use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, Utc};
use roundlog_ids::RoundId;
use roundlog_ports::{
    AnalyticsStore, Fetched, RoundFilter, RoundSink, SampleFilter, SampleSink, SampleSource,
};
use roundlog_schema::round::Round;
use roundlog_schema::sample::{PartitionKey, Sample};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Default)]
struct Inner {
    samples: Vec<Sample>,
    rounds: BTreeMap<RoundId, Round>,
    watermark: Option<DateTime<Utc>>,
    batches: Vec<usize>,
    fail_publish_at: Option<usize>,
    fail_reads: bool,
    read_delay: Option<Duration>,
    malformed_samples: usize,
}

/// In-memory store implementing every port, with failure injection.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_samples(samples: Vec<Sample>) -> Self {
        let store = Self::default();
        if let Ok(mut inner) = store.inner.lock() {
            inner.samples = samples;
        }
        store
    }

    pub fn with_rounds(rounds: Vec<Round>) -> Self {
        let store = Self::default();
        if let Ok(mut inner) = store.inner.lock() {
            inner.watermark = rounds.iter().map(|r| r.end_time).max();
            inner.rounds = rounds.into_iter().map(|r| (r.round_id.clone(), r)).collect();
        }
        store
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }

    pub fn push_samples(&self, samples: impl IntoIterator<Item = Sample>) -> Result<()> {
        self.lock()?.samples.extend(samples);
        Ok(())
    }

    /// The publish call with this zero-based batch number fails.
    pub fn fail_publish_at(&self, batch: usize) -> Result<()> {
        self.lock()?.fail_publish_at = Some(batch);
        Ok(())
    }

    pub fn clear_failures(&self) -> Result<()> {
        let mut inner = self.lock()?;
        inner.fail_publish_at = None;
        inner.fail_reads = false;
        inner.read_delay = None;
        Ok(())
    }

    pub fn fail_reads(&self, fail: bool) -> Result<()> {
        self.lock()?.fail_reads = fail;
        Ok(())
    }

    /// Every read blocks for `delay` before answering.
    pub fn set_read_delay(&self, delay: Option<Duration>) -> Result<()> {
        self.lock()?.read_delay = delay;
        Ok(())
    }

    /// Pretend this many sample rows were malformed on every sample read.
    pub fn set_malformed_samples(&self, count: usize) -> Result<()> {
        self.lock()?.malformed_samples = count;
        Ok(())
    }

    pub fn published(&self) -> Result<Vec<Round>> {
        Ok(self.lock()?.rounds.values().cloned().collect())
    }

    /// Sizes of the batches committed so far.
    pub fn batch_sizes(&self) -> Result<Vec<usize>> {
        Ok(self.lock()?.batches.clone())
    }

    fn before_read(&self) -> Result<()> {
        let (delay, fail) = {
            let inner = self.lock()?;
            (inner.read_delay, inner.fail_reads)
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        if fail {
            bail!("injected read failure");
        }
        Ok(())
    }
}

impl SampleSource for MemoryStore {
    fn samples(&self, filter: &SampleFilter) -> Result<Fetched<Sample>> {
        self.before_read()?;
        let inner = self.lock()?;
        let rows = inner
            .samples
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        Ok(Fetched::new(rows, inner.malformed_samples))
    }
}

impl SampleSink for MemoryStore {
    fn insert_samples(&self, samples: &[Sample]) -> Result<usize> {
        let mut inner = self.lock()?;
        let mut written = 0;
        for s in samples {
            if !inner.samples.contains(s) {
                inner.samples.push(s.clone());
                written += 1;
            }
        }
        Ok(written)
    }
}

impl RoundSink for MemoryStore {
    fn watermark(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.lock()?.watermark)
    }

    fn rounds_ending_after(&self, since: DateTime<Utc>) -> Result<Vec<Round>> {
        self.before_read()?;
        Ok(self
            .lock()?
            .rounds
            .values()
            .filter(|r| r.end_time >= since)
            .cloned()
            .collect())
    }

    fn last_round(&self, key: &PartitionKey) -> Result<Option<Round>> {
        self.before_read()?;
        Ok(self
            .lock()?
            .rounds
            .values()
            .filter(|r| r.partition_key() == *key)
            .max_by_key(|r| r.end_time)
            .cloned())
    }

    fn publish_batch(
        &self,
        rounds: &[Round],
        retired: &[RoundId],
        _schema_version: u32,
    ) -> Result<usize> {
        let mut inner = self.lock()?;
        if inner.fail_publish_at == Some(inner.batches.len()) {
            bail!("injected publish failure at batch {}", inner.batches.len());
        }
        for id in retired {
            inner.rounds.remove(id);
        }
        for r in rounds {
            inner.rounds.insert(r.round_id.clone(), r.clone());
        }
        let batch_max = rounds.iter().map(|r| r.end_time).max();
        inner.watermark = inner.watermark.max(batch_max);
        inner.batches.push(rounds.len());
        Ok(rounds.len())
    }
}

impl AnalyticsStore for MemoryStore {
    fn rounds(&self, filter: &RoundFilter) -> Result<Vec<Round>> {
        self.before_read()?;
        let mut rounds: Vec<Round> = self
            .lock()?
            .rounds
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        rounds.sort_by(|a, b| a.end_time.cmp(&b.end_time).then(a.round_id.cmp(&b.round_id)));
        Ok(rounds)
    }

    fn servers(&self) -> Result<Vec<String>> {
        self.before_read()?;
        let mut servers: Vec<String> = self
            .lock()?
            .samples
            .iter()
            .map(|s| s.server_id.clone())
            .collect();
        servers.sort();
        servers.dedup();
        Ok(servers)
    }
}
