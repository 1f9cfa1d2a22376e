use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one incremental sync run.
///
/// A failed run still reports how many rounds were committed before the
/// failure; those batches stay published.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncRunResult {
    pub run_id: String,
    pub processed_count: usize,
    /// Published rounds removed because a re-scan merged them into another.
    #[serde(default)]
    pub retired_count: usize,
    pub skipped_rows: usize,
    pub batches: usize,
    pub duration_ms: u64,
    pub error_message: Option<String>,
    pub watermark_before: Option<DateTime<Utc>>,
    pub watermark_after: Option<DateTime<Utc>>,
}

impl SyncRunResult {
    pub fn success(&self) -> bool {
        self.error_message.is_none()
    }
}
