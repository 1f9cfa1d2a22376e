//! SQLite store for samples, published rounds and the sync watermark.
//!
//! Access is serialized through one mutex-guarded connection. Timestamps are
//! stored as unix milliseconds. Publication is `INSERT OR REPLACE` keyed by
//! `round_id`, committed per batch together with any retired rounds and the
//! watermark.

pub mod codec;
pub mod migrate;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use codec::{Bind, ROUND_SCHEMA, cell, round_from_row, round_select_list};
use roundlog_ingest_tsv::{SAMPLE_SCHEMA, sample_from_row};
use roundlog_ports::{
    ActivityFilter, AnalyticsStore, Fetched, RoundFilter, RoundSink, SampleFilter, SampleSink,
    SampleSource,
};
use roundlog_ids::RoundId;
use roundlog_query::row::{Row, RowError, RowSchema};
use roundlog_query::Query;
use roundlog_schema::bucket::ActivityObservation;
use roundlog_schema::round::Round;
use roundlog_schema::sample::{PartitionKey, Sample};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path, with at least the core tables.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).with_context(|| format!("open store {path:?}"))?;
        Self::init(conn)
    }

    /// Create an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory store")?;
        Self::init(conn)
    }

    fn init(mut conn: Connection) -> Result<Self> {
        migrate::migrate(&mut conn, 1)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("store connection lock poisoned"))
    }

    pub fn schema_version(&self) -> Result<u32> {
        migrate::schema_version(&*self.lock()?)
    }

    /// Migrate the round table up to `version`. Never downgrades.
    pub fn migrate_to(&self, version: u32) -> Result<u32> {
        migrate::migrate(&mut *self.lock()?, version)
    }

    pub fn sample_count(&self) -> Result<usize> {
        let n: i64 = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM samples", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    pub fn round_count(&self) -> Result<usize> {
        let n: i64 = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM rounds", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Run a query and decode each row against `schema`. Rows that do not
    /// fit are logged and counted, never fatal.
    fn read<T>(
        &self,
        query: &Query,
        schema: &RowSchema,
        decode: impl Fn(&Row<'_>) -> Result<T, RowError>,
    ) -> Result<Fetched<T>> {
        query.check()?;
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(query.sql())
            .with_context(|| format!("prepare {}", query.sql()))?;
        let mut rows = stmt.query(params_from_iter(query.args().iter().map(Bind)))?;

        let mut out = Fetched::new(Vec::new(), 0);
        let mut line = 0;
        while let Some(row) = rows.next()? {
            line += 1;
            let mut cells = Vec::with_capacity(schema.columns().len());
            for (i, column) in schema.columns().iter().enumerate() {
                cells.push(cell(row.get_ref(i)?, column.kind));
            }
            match schema.from_cells(cells, line).and_then(|r| decode(&r)) {
                Ok(v) => out.rows.push(v),
                Err(err) => {
                    warn!(line = err.line(), error = %err, "skipping malformed row");
                    out.skipped += 1;
                }
            }
        }
        Ok(out)
    }

    fn round_query(&self, filter: &RoundFilter) -> Result<Query> {
        let version = self.schema_version()?;
        let mut query = Query::new(format!("SELECT {} FROM rounds", round_select_list(version)))
            .filter_opt("player_name = ?", filter.player.as_ref())
            .filter_opt("server_id = ?", filter.server.as_ref())
            .filter_opt("map_name = ?", filter.map.as_ref())
            .filter_opt("end_time >= ?", filter.since)
            .filter_opt("start_time < ?", filter.until);
        if !filter.include_bots && version >= 2 {
            query = query.filter_raw("is_bot = 0");
        }
        Ok(query)
    }

    fn read_rounds(&self, query: Query) -> Result<Vec<Round>> {
        let fetched = self.read(&query, &ROUND_SCHEMA, round_from_row)?;
        Ok(fetched.rows)
    }
}

fn sample_query(select: &str, filter: &SampleFilter) -> Query {
    let query = Query::new(select)
        .filter_opt("player_name = ?", filter.player.as_ref())
        .filter_opt("server_id = ?", filter.server.as_ref())
        .filter_opt("timestamp >= ?", filter.since)
        .filter_opt("timestamp < ?", filter.until);
    if filter.include_bots {
        query
    } else {
        query.filter_raw("is_bot = 0")
    }
}

impl SampleSource for SqliteStore {
    fn samples(&self, filter: &SampleFilter) -> Result<Fetched<Sample>> {
        let columns = SAMPLE_SCHEMA.header().replace('\t', ", ");
        let query = sample_query(&format!("SELECT {columns} FROM samples"), filter)
            .push(" ORDER BY timestamp, player_name, server_id");
        self.read(&query, &SAMPLE_SCHEMA, sample_from_row)
            .context("read samples")
    }
}

impl SampleSink for SqliteStore {
    fn insert_samples(&self, samples: &[Sample]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO samples (player_name, server_id, map_name, timestamp,
                    kills, deaths, score, ping, is_bot, session_id, team_label, game_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            )?;
            for s in samples {
                written += stmt.execute(params![
                    s.player_name,
                    s.server_id,
                    s.map_name,
                    s.timestamp.timestamp_millis(),
                    s.kills,
                    s.deaths,
                    s.score,
                    s.ping,
                    s.is_bot,
                    s.session_id,
                    s.team_label,
                    s.game_id,
                ])?;
            }
        }
        tx.commit().context("commit samples")?;
        debug!(offered = samples.len(), written, "inserted samples");
        Ok(written)
    }
}

impl RoundSink for SqliteStore {
    fn watermark(&self) -> Result<Option<DateTime<Utc>>> {
        let millis: Option<Option<i64>> = self
            .lock()?
            .query_row("SELECT watermark FROM sync_state WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()
            .context("read watermark")?;
        Ok(millis.flatten().and_then(DateTime::from_timestamp_millis))
    }

    fn rounds_ending_after(&self, since: DateTime<Utc>) -> Result<Vec<Round>> {
        let filter = RoundFilter {
            since: Some(since),
            include_bots: true,
            ..RoundFilter::default()
        };
        self.read_rounds(self.round_query(&filter)?)
    }

    fn last_round(&self, key: &PartitionKey) -> Result<Option<Round>> {
        let filter = RoundFilter {
            player: Some(key.player_name.clone()),
            server: Some(key.server_id.clone()),
            include_bots: true,
            ..RoundFilter::default()
        };
        let query = self
            .round_query(&filter)?
            .push(" ORDER BY end_time DESC, round_id DESC LIMIT 1");
        Ok(self.read_rounds(query)?.into_iter().next())
    }

    fn publish_batch(
        &self,
        rounds: &[Round],
        retired: &[RoundId],
        schema_version: u32,
    ) -> Result<usize> {
        if self.schema_version()? < schema_version {
            self.migrate_to(schema_version)?;
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction().context("begin publish")?;
        {
            let mut retire = tx.prepare("DELETE FROM rounds WHERE round_id = ?1")?;
            for id in retired {
                retire
                    .execute(params![id.as_str()])
                    .with_context(|| format!("retire round {id}"))?;
            }
        }
        {
            let mut stmt = if schema_version >= 2 {
                tx.prepare(
                    "INSERT OR REPLACE INTO rounds (round_id, player_name, server_id, map_name,
                        start_time, end_time, final_kills, final_deaths, final_score,
                        play_time_minutes, session_id, team_label, game_id, is_bot,
                        round_index, sample_count)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                )?
            } else {
                tx.prepare(
                    "INSERT OR REPLACE INTO rounds (round_id, player_name, server_id, map_name,
                        start_time, end_time, final_kills, final_deaths, final_score,
                        play_time_minutes, session_id)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                )?
            };
            for r in rounds {
                let written = if schema_version >= 2 {
                    stmt.execute(params![
                        r.round_id.as_str(),
                        r.player_name,
                        r.server_id,
                        r.map_name,
                        r.start_time.timestamp_millis(),
                        r.end_time.timestamp_millis(),
                        r.final_kills,
                        r.final_deaths,
                        r.final_score,
                        r.play_time_minutes,
                        r.session_id,
                        r.team_label,
                        r.game_id,
                        r.is_bot,
                        i64::from(r.round_index),
                        i64::from(r.sample_count),
                    ])
                } else {
                    stmt.execute(params![
                        r.round_id.as_str(),
                        r.player_name,
                        r.server_id,
                        r.map_name,
                        r.start_time.timestamp_millis(),
                        r.end_time.timestamp_millis(),
                        r.final_kills,
                        r.final_deaths,
                        r.final_score,
                        r.play_time_minutes,
                        r.session_id,
                    ])
                };
                written.with_context(|| format!("upsert round {}", r.round_id))?;
            }
        }

        if let Some(end) = rounds.iter().map(|r| r.end_time).max() {
            tx.execute(
                "INSERT INTO sync_state (id, watermark) VALUES (1, ?1)
                 ON CONFLICT(id) DO UPDATE SET
                    watermark = MAX(COALESCE(watermark, excluded.watermark), excluded.watermark)",
                params![end.timestamp_millis()],
            )
            .context("advance watermark")?;
        }
        tx.commit().context("commit batch")?;
        if !retired.is_empty() {
            debug!(retired = retired.len(), upserted = rounds.len(), "retired merged rounds");
        }
        Ok(rounds.len())
    }
}

impl AnalyticsStore for SqliteStore {
    fn rounds(&self, filter: &RoundFilter) -> Result<Vec<Round>> {
        let query = self
            .round_query(filter)?
            .push(" ORDER BY end_time, round_id");
        self.read_rounds(query).context("read rounds")
    }

    fn activity(&self, filter: &ActivityFilter) -> Result<Vec<ActivityObservation>> {
        let query = sample_query(
            "SELECT server_id, timestamp, COUNT(DISTINCT player_name) FROM samples",
            &filter.as_sample_filter(),
        )
        .filter_raw("server_id IS NOT NULL AND timestamp IS NOT NULL")
        .push(" GROUP BY server_id, timestamp ORDER BY server_id, timestamp");
        query.check()?;

        let conn = self.lock()?;
        let mut stmt = conn.prepare(query.sql())?;
        let rows = stmt.query_map(params_from_iter(query.args().iter().map(Bind)), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (server_id, millis, players) = row?;
            if let Some(timestamp) = DateTime::from_timestamp_millis(millis) {
                out.push(ActivityObservation {
                    server_id,
                    timestamp,
                    value: players as f64,
                });
            }
        }
        Ok(out)
    }

    fn servers(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT server_id FROM samples WHERE server_id IS NOT NULL ORDER BY server_id",
        )?;
        let servers = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(servers)
    }
}
