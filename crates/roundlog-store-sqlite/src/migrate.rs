//! Forward-only schema migrations tracked in `PRAGMA user_version`.

use anyhow::{Context, Result, bail};
use rusqlite::Connection;
use tracing::info;

/// Latest round table layout this crate can write.
pub const LATEST_VERSION: u32 = 2;

struct Migration {
    to_version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        to_version: 1,
        name: "core tables",
        sql: "
            CREATE TABLE IF NOT EXISTS samples (
                player_name TEXT,
                server_id TEXT,
                map_name TEXT,
                timestamp INTEGER,
                kills INTEGER,
                deaths INTEGER,
                score INTEGER,
                ping INTEGER,
                is_bot INTEGER,
                session_id TEXT NOT NULL DEFAULT '',
                team_label TEXT,
                game_id TEXT
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_samples_identity
                ON samples(player_name, server_id, timestamp, map_name, kills, deaths, score);
            CREATE INDEX IF NOT EXISTS idx_samples_time ON samples(timestamp);

            CREATE TABLE IF NOT EXISTS rounds (
                round_id TEXT PRIMARY KEY,
                player_name TEXT NOT NULL,
                server_id TEXT NOT NULL,
                map_name TEXT NOT NULL,
                start_time INTEGER NOT NULL,
                end_time INTEGER NOT NULL,
                final_kills INTEGER NOT NULL,
                final_deaths INTEGER NOT NULL,
                final_score INTEGER NOT NULL,
                play_time_minutes REAL NOT NULL,
                session_id TEXT NOT NULL DEFAULT ''
            );
            CREATE INDEX IF NOT EXISTS idx_rounds_end ON rounds(end_time);
            CREATE INDEX IF NOT EXISTS idx_rounds_player ON rounds(player_name, server_id);

            CREATE TABLE IF NOT EXISTS sync_state (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                watermark INTEGER
            );
        ",
    },
    Migration {
        to_version: 2,
        name: "round attributes",
        sql: "
            ALTER TABLE rounds ADD COLUMN team_label TEXT;
            ALTER TABLE rounds ADD COLUMN game_id TEXT;
            ALTER TABLE rounds ADD COLUMN is_bot INTEGER NOT NULL DEFAULT 0;
            ALTER TABLE rounds ADD COLUMN round_index INTEGER NOT NULL DEFAULT 0;
            ALTER TABLE rounds ADD COLUMN sample_count INTEGER NOT NULL DEFAULT 0;
        ",
    },
];

pub fn schema_version(conn: &Connection) -> Result<u32> {
    let version: i64 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("read schema version")?;
    Ok(version.max(0) as u32)
}

/// Apply every migration above the current version up to `target`, each in
/// its own transaction. Returns the resulting version.
pub fn migrate(conn: &mut Connection, target: u32) -> Result<u32> {
    if target > LATEST_VERSION {
        bail!("schema version {target} is newer than supported version {LATEST_VERSION}");
    }
    let mut current = schema_version(conn)?;
    for step in MIGRATIONS
        .iter()
        .filter(move |m| m.to_version > current && m.to_version <= target)
    {
        let tx = conn.transaction().context("begin migration")?;
        tx.execute_batch(step.sql)
            .with_context(|| format!("apply migration {} ({})", step.to_version, step.name))?;
        tx.pragma_update(None, "user_version", i64::from(step.to_version))
            .context("record schema version")?;
        tx.commit().context("commit migration")?;
        info!(version = step.to_version, name = step.name, "applied store migration");
        current = step.to_version;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrates_stepwise_and_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 0);
        assert_eq!(migrate(&mut conn, 1).unwrap(), 1);
        assert_eq!(migrate(&mut conn, 1).unwrap(), 1);
        assert_eq!(migrate(&mut conn, 2).unwrap(), 2);
        // Lower targets never downgrade.
        assert_eq!(migrate(&mut conn, 1).unwrap(), 2);
    }

    #[test]
    fn rejects_unknown_versions() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert!(migrate(&mut conn, LATEST_VERSION + 1).is_err());
    }
}
