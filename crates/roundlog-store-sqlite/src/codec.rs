//! Mapping between SQLite values and the declared row shapes.

use chrono::DateTime;
use roundlog_ids::RoundId;
use roundlog_query::row::{Cell, Column, ColumnKind, Row, RowError, RowSchema};
use roundlog_query::Value;
use roundlog_schema::round::Round;
use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, ValueRef};

/// Binds a query argument natively. Timestamps are stored as unix millis.
pub struct Bind<'a>(pub &'a Value);

impl ToSql for Bind<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as Sql;
        Ok(ToSqlOutput::Owned(match self.0 {
            Value::Null => Sql::Null,
            Value::Bool(b) => Sql::Integer(i64::from(*b)),
            Value::Int(i) => Sql::Integer(*i),
            Value::Float(f) => Sql::Real(*f),
            Value::Text(s) => Sql::Text(s.clone()),
            Value::Timestamp(t) => Sql::Integer(t.timestamp_millis()),
        }))
    }
}

/// Type one stored value for its declared column.
///
/// Values of the wrong storage class come back as text so the row check
/// reports them instead of silently coercing.
pub fn cell(value: ValueRef<'_>, kind: ColumnKind) -> Cell {
    match (kind, value) {
        (_, ValueRef::Null) => Cell::Null,
        (ColumnKind::Text, ValueRef::Text(t)) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
        (ColumnKind::Text, ValueRef::Integer(i)) => Cell::Text(i.to_string()),
        (ColumnKind::Int, ValueRef::Integer(i)) => Cell::Int(i),
        (ColumnKind::Float, ValueRef::Real(f)) => Cell::Float(f),
        (ColumnKind::Float, ValueRef::Integer(i)) => Cell::Float(i as f64),
        (ColumnKind::Bool, ValueRef::Integer(i)) => Cell::Bool(i != 0),
        (ColumnKind::Timestamp, ValueRef::Integer(ms)) => {
            DateTime::from_timestamp_millis(ms).map_or(Cell::Null, Cell::Timestamp)
        }
        (_, ValueRef::Text(t)) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
        (_, ValueRef::Integer(i)) => Cell::Text(i.to_string()),
        (_, ValueRef::Real(f)) => Cell::Text(f.to_string()),
        (_, ValueRef::Blob(_)) => Cell::Text("<blob>".to_string()),
    }
}

pub const ROUND_COLUMNS: &[Column] = &[
    Column::required("round_id", ColumnKind::Text),
    Column::required("player_name", ColumnKind::Text),
    Column::required("server_id", ColumnKind::Text),
    Column::required("map_name", ColumnKind::Text),
    Column::required("start_time", ColumnKind::Timestamp),
    Column::required("end_time", ColumnKind::Timestamp),
    Column::required("final_kills", ColumnKind::Int),
    Column::required("final_deaths", ColumnKind::Int),
    Column::required("final_score", ColumnKind::Int),
    Column::required("play_time_minutes", ColumnKind::Float),
    Column::optional("session_id", ColumnKind::Text),
    Column::optional("team_label", ColumnKind::Text),
    Column::optional("game_id", ColumnKind::Text),
    Column::optional("is_bot", ColumnKind::Bool),
    Column::optional("round_index", ColumnKind::Int),
    Column::optional("sample_count", ColumnKind::Int),
];

pub static ROUND_SCHEMA: RowSchema = RowSchema::new(ROUND_COLUMNS);

/// Select list for the round table at `version`; columns a version lacks
/// are filled with their defaults so every version decodes the same way.
pub fn round_select_list(version: u32) -> String {
    ROUND_COLUMNS
        .iter()
        .map(|c| match (version, c.name) {
            (v, "team_label" | "game_id") if v < 2 => format!("NULL AS {}", c.name),
            (v, "is_bot" | "round_index" | "sample_count") if v < 2 => format!("0 AS {}", c.name),
            (_, name) => name.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn round_from_row(row: &Row<'_>) -> Result<Round, RowError> {
    let to_u32 = |v: Option<i64>| v.unwrap_or(0).clamp(0, i64::from(u32::MAX)) as u32;
    Ok(Round {
        round_id: RoundId(row.text("round_id")?.to_string()),
        player_name: row.text("player_name")?.to_string(),
        server_id: row.text("server_id")?.to_string(),
        map_name: row.text("map_name")?.to_string(),
        start_time: row.timestamp("start_time")?,
        end_time: row.timestamp("end_time")?,
        final_kills: row.int("final_kills")?,
        final_deaths: row.int("final_deaths")?,
        final_score: row.int("final_score")?,
        play_time_minutes: row.float("play_time_minutes")?,
        session_id: row.opt_text("session_id")?.unwrap_or_default().to_string(),
        team_label: row.opt_text("team_label")?.map(str::to_string),
        game_id: row.opt_text("game_id")?.map(str::to_string),
        is_bot: row.opt_bool("is_bot")?.unwrap_or(false),
        round_index: to_u32(row.opt_int("round_index")?),
        sample_count: to_u32(row.opt_int("sample_count")?),
    })
}
