//! Import of the external sampler's tab-separated dump.
//!
//! The column layout is declared once in [`SAMPLE_COLUMNS`]; malformed rows are
//! skipped with a warning and counted, never fatal.

use anyhow::{Context, Result};
use roundlog_ports::{Fetched, SampleFilter, SampleSource};
use roundlog_query::row::{Column, ColumnKind, Row, RowError, RowSchema};
use roundlog_schema::sample::Sample;
use std::path::PathBuf;
use tracing::{debug, warn};

pub const SAMPLE_COLUMNS: &[Column] = &[
    Column::required("player_name", ColumnKind::Text),
    Column::required("server_id", ColumnKind::Text),
    Column::required("map_name", ColumnKind::Text),
    Column::required("timestamp", ColumnKind::Timestamp),
    Column::required("kills", ColumnKind::Int),
    Column::required("deaths", ColumnKind::Int),
    Column::required("score", ColumnKind::Int),
    Column::required("ping", ColumnKind::Int),
    Column::required("is_bot", ColumnKind::Bool),
    Column::optional("session_id", ColumnKind::Text),
    Column::optional("team_label", ColumnKind::Text),
    Column::optional("game_id", ColumnKind::Text),
];

pub static SAMPLE_SCHEMA: RowSchema = RowSchema::new(SAMPLE_COLUMNS);

pub fn sample_from_row(row: &Row<'_>) -> Result<Sample, RowError> {
    let non_empty = |v: Option<&str>| v.filter(|s| !s.is_empty()).map(str::to_string);
    Ok(Sample {
        player_name: row.text("player_name")?.to_string(),
        server_id: row.text("server_id")?.to_string(),
        map_name: row.text("map_name")?.to_string(),
        timestamp: row.timestamp("timestamp")?,
        kills: row.int("kills")?,
        deaths: row.int("deaths")?,
        score: row.int("score")?,
        ping: row.int("ping")?,
        is_bot: row.opt_bool("is_bot")?.unwrap_or(false),
        session_id: row.opt_text("session_id")?.unwrap_or_default().to_string(),
        team_label: non_empty(row.opt_text("team_label")?),
        game_id: non_empty(row.opt_text("game_id")?),
    })
}

/// Decode a dump, skipping blank lines, the header and malformed rows.
pub fn decode_samples(text: &str) -> Fetched<Sample> {
    let decoded = SAMPLE_SCHEMA.decode_all(text);
    let mut skipped = decoded.skipped.len();
    for err in &decoded.skipped {
        warn!(line = err.line(), error = %err, "skipping malformed sample row");
    }

    let mut samples = Vec::with_capacity(decoded.rows.len());
    for row in &decoded.rows {
        match sample_from_row(row) {
            Ok(s) => samples.push(s),
            Err(err) => {
                warn!(line = err.line(), error = %err, "skipping malformed sample row");
                skipped += 1;
            }
        }
    }
    Fetched::new(samples, skipped)
}

/// Encode samples in the dump layout, header first.
pub fn encode_samples(samples: &[Sample]) -> String {
    let mut out = SAMPLE_SCHEMA.header();
    out.push('\n');
    for s in samples {
        let fields = [
            escape(&s.player_name),
            escape(&s.server_id),
            escape(&s.map_name),
            s.timestamp.to_rfc3339(),
            s.kills.to_string(),
            s.deaths.to_string(),
            s.score.to_string(),
            s.ping.to_string(),
            if s.is_bot { "1" } else { "0" }.to_string(),
            escape(&s.session_id),
            s.team_label.as_deref().map_or_else(|| "\\N".to_string(), escape),
            s.game_id.as_deref().map_or_else(|| "\\N".to_string(), escape),
        ];
        out.push_str(&fields.join("\t"));
        out.push('\n');
    }
    out
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\t', "\\t")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

/// Sample source backed by a dump file on disk.
pub struct TsvSampleSource {
    pub path: PathBuf,
}

impl TsvSampleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn read_all(&self) -> Result<Fetched<Sample>> {
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("read {:?}", self.path))?;
        let fetched = decode_samples(&text);
        debug!(
            path = %self.path.display(),
            samples = fetched.rows.len(),
            skipped = fetched.skipped,
            "decoded sample dump"
        );
        Ok(fetched)
    }
}

impl SampleSource for TsvSampleSource {
    fn samples(&self, filter: &SampleFilter) -> Result<Fetched<Sample>> {
        let mut fetched = self.read_all()?;
        fetched.rows.retain(|s| filter.matches(s));
        Ok(fetched)
    }
}
