use chrono::{DateTime, NaiveDateTime, Utc};
use roundlog_error::RoundlogError;
use thiserror::Error;

/// Null marker in delimited text results.
pub const NULL_MARKER: &str = "\\N";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Int,
    Float,
    Bool,
    Timestamp,
}

/// One declared column of a result shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
    /// Optional columns may be null or, at the end of a row, absent.
    pub required: bool,
}

impl Column {
    pub const fn required(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Null,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RowError {
    #[error("line {line}: expected at most {expected} columns, found {found}")]
    Arity {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: missing value for required column `{column}`")]
    Missing { line: usize, column: &'static str },
    #[error("line {line}: column `{column}` expects {kind:?}, got `{value}`")]
    Invalid {
        line: usize,
        column: &'static str,
        kind: ColumnKind,
        value: String,
    },
    #[error("line {line}: column `{column}` is not part of this result shape")]
    UnknownColumn { line: usize, column: String },
}

impl RowError {
    pub fn line(&self) -> usize {
        match self {
            RowError::Arity { line, .. }
            | RowError::Missing { line, .. }
            | RowError::Invalid { line, .. }
            | RowError::UnknownColumn { line, .. } => *line,
        }
    }
}

impl From<RowError> for RoundlogError {
    fn from(err: RowError) -> Self {
        RoundlogError::MalformedRow {
            line: err.line(),
            reason: err.to_string(),
        }
    }
}

/// A fixed, ordered list of columns for one result shape.
#[derive(Clone, Copy, Debug)]
pub struct RowSchema {
    columns: &'static [Column],
    delimiter: char,
}

/// Rows that decoded plus the rows that were skipped.
#[derive(Debug)]
pub struct Decoded<'s> {
    pub rows: Vec<Row<'s>>,
    pub skipped: Vec<RowError>,
}

impl RowSchema {
    pub const fn new(columns: &'static [Column]) -> Self {
        Self {
            columns,
            delimiter: '\t',
        }
    }

    pub const fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn columns(&self) -> &'static [Column] {
        self.columns
    }

    pub fn header(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.name)
            .collect::<Vec<_>>()
            .join(&self.delimiter.to_string())
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// A header line matches when it names a prefix of the declared columns
    /// that covers every required column, in order.
    pub fn is_header(&self, line: &str) -> bool {
        let names: Vec<&str> = line.trim_end_matches('\r').split(self.delimiter).collect();
        names.len() <= self.columns.len()
            && names.iter().zip(self.columns).all(|(n, c)| *n == c.name)
            && self.columns[names.len()..].iter().all(|c| !c.required)
    }

    /// Decode one line. `line` is 1-based and only used for error reports.
    pub fn decode_line(&self, text: &str, line: usize) -> Result<Row<'_>, RowError> {
        let fields: Vec<&str> = text.trim_end_matches('\r').split(self.delimiter).collect();
        if fields.len() > self.columns.len() {
            return Err(RowError::Arity {
                line,
                expected: self.columns.len(),
                found: fields.len(),
            });
        }

        let mut cells = Vec::with_capacity(self.columns.len());
        for (i, column) in self.columns.iter().enumerate() {
            let raw = fields.get(i).copied();
            let cell = match raw {
                None | Some(NULL_MARKER) => Cell::Null,
                Some("") if column.kind != ColumnKind::Text => Cell::Null,
                Some(raw) => parse_cell(raw, column, line)?,
            };
            if column.required && cell == Cell::Null {
                return Err(RowError::Missing {
                    line,
                    column: column.name,
                });
            }
            cells.push(cell);
        }

        Ok(Row {
            schema: self,
            cells,
            line,
        })
    }

    /// Build a row from cells a driver already typed, checking arity,
    /// required columns and kinds against the declared list.
    pub fn from_cells(&self, cells: Vec<Cell>, line: usize) -> Result<Row<'_>, RowError> {
        if cells.len() != self.columns.len() {
            return Err(RowError::Arity {
                line,
                expected: self.columns.len(),
                found: cells.len(),
            });
        }
        for (column, cell) in self.columns.iter().zip(&cells) {
            let kind_ok = match (column.kind, cell) {
                (_, Cell::Null) => !column.required,
                (ColumnKind::Text, Cell::Text(_))
                | (ColumnKind::Int, Cell::Int(_))
                | (ColumnKind::Float, Cell::Float(_) | Cell::Int(_))
                | (ColumnKind::Bool, Cell::Bool(_))
                | (ColumnKind::Timestamp, Cell::Timestamp(_)) => true,
                _ => false,
            };
            if !kind_ok {
                return Err(match cell {
                    Cell::Null => RowError::Missing {
                        line,
                        column: column.name,
                    },
                    other => RowError::Invalid {
                        line,
                        column: column.name,
                        kind: column.kind,
                        value: format!("{other:?}"),
                    },
                });
            }
        }
        Ok(Row {
            schema: self,
            cells,
            line,
        })
    }

    /// Decode a whole delimited document, skipping blank lines, an optional
    /// header line, and malformed rows.
    pub fn decode_all<'s>(&'s self, text: &str) -> Decoded<'s> {
        let mut rows = Vec::new();
        let mut skipped = Vec::new();
        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() || (i == 0 && self.is_header(line)) {
                continue;
            }
            match self.decode_line(line, i + 1) {
                Ok(row) => rows.push(row),
                Err(e) => skipped.push(e),
            }
        }
        Decoded { rows, skipped }
    }
}

fn parse_cell(raw: &str, column: &Column, line: usize) -> Result<Cell, RowError> {
    let invalid = || RowError::Invalid {
        line,
        column: column.name,
        kind: column.kind,
        value: raw.chars().take(64).collect(),
    };
    match column.kind {
        ColumnKind::Text => Ok(Cell::Text(unescape(raw))),
        ColumnKind::Int => raw.trim().parse().map(Cell::Int).map_err(|_| invalid()),
        ColumnKind::Float => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Cell::Float)
            .ok_or_else(invalid),
        ColumnKind::Bool => match raw.trim() {
            "1" | "true" | "TRUE" | "True" => Ok(Cell::Bool(true)),
            "0" | "false" | "FALSE" | "False" => Ok(Cell::Bool(false)),
            _ => Err(invalid()),
        },
        ColumnKind::Timestamp => parse_timestamp(raw.trim())
            .map(Cell::Timestamp)
            .ok_or_else(invalid),
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]` (UTC), or unix seconds.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(t.and_utc());
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// Undo the tab-separated escapes (`\t`, `\n`, `\\`).
fn unescape(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// A decoded row with typed, name-checked accessors.
#[derive(Debug)]
pub struct Row<'s> {
    schema: &'s RowSchema,
    cells: Vec<Cell>,
    line: usize,
}

impl Row<'_> {
    pub fn line(&self) -> usize {
        self.line
    }

    fn cell(&self, name: &str) -> Result<(&'static str, &Cell), RowError> {
        let idx = self
            .schema
            .index_of(name)
            .ok_or_else(|| RowError::UnknownColumn {
                line: self.line,
                column: name.to_string(),
            })?;
        Ok((self.schema.columns[idx].name, &self.cells[idx]))
    }

    fn mismatch(&self, column: &'static str, kind: ColumnKind, cell: &Cell) -> RowError {
        RowError::Invalid {
            line: self.line,
            column,
            kind,
            value: format!("{cell:?}"),
        }
    }

    pub fn opt_text(&self, name: &str) -> Result<Option<&str>, RowError> {
        match self.cell(name)? {
            (_, Cell::Null) => Ok(None),
            (_, Cell::Text(s)) => Ok(Some(s)),
            (column, other) => Err(self.mismatch(column, ColumnKind::Text, other)),
        }
    }

    pub fn text(&self, name: &str) -> Result<&str, RowError> {
        let (column, _) = self.cell(name)?;
        self.opt_text(name)?.ok_or(RowError::Missing {
            line: self.line,
            column,
        })
    }

    pub fn opt_int(&self, name: &str) -> Result<Option<i64>, RowError> {
        match self.cell(name)? {
            (_, Cell::Null) => Ok(None),
            (_, Cell::Int(i)) => Ok(Some(*i)),
            (column, other) => Err(self.mismatch(column, ColumnKind::Int, other)),
        }
    }

    pub fn int(&self, name: &str) -> Result<i64, RowError> {
        let (column, _) = self.cell(name)?;
        self.opt_int(name)?.ok_or(RowError::Missing {
            line: self.line,
            column,
        })
    }

    pub fn float(&self, name: &str) -> Result<f64, RowError> {
        match self.cell(name)? {
            (_, Cell::Float(f)) => Ok(*f),
            (_, Cell::Int(i)) => Ok(*i as f64),
            (column, Cell::Null) => Err(RowError::Missing {
                line: self.line,
                column,
            }),
            (column, other) => Err(self.mismatch(column, ColumnKind::Float, other)),
        }
    }

    pub fn opt_bool(&self, name: &str) -> Result<Option<bool>, RowError> {
        match self.cell(name)? {
            (_, Cell::Null) => Ok(None),
            (_, Cell::Bool(b)) => Ok(Some(*b)),
            (column, other) => Err(self.mismatch(column, ColumnKind::Bool, other)),
        }
    }

    pub fn timestamp(&self, name: &str) -> Result<DateTime<Utc>, RowError> {
        match self.cell(name)? {
            (_, Cell::Timestamp(t)) => Ok(*t),
            (column, Cell::Null) => Err(RowError::Missing {
                line: self.line,
                column,
            }),
            (column, other) => Err(self.mismatch(column, ColumnKind::Timestamp, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SHAPE: &[Column] = &[
        Column::required("name", ColumnKind::Text),
        Column::required("at", ColumnKind::Timestamp),
        Column::required("count", ColumnKind::Int),
        Column::optional("ratio", ColumnKind::Float),
        Column::optional("flag", ColumnKind::Bool),
    ];
    static SCHEMA: RowSchema = RowSchema::new(SHAPE);

    #[test]
    fn decodes_typed_row() {
        let row = SCHEMA
            .decode_line("alice\t2025-06-01 18:00:00\t12\t0.5\t1", 1)
            .unwrap();
        assert_eq!(row.text("name").unwrap(), "alice");
        assert_eq!(
            row.timestamp("at").unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 1, 18, 0, 0).unwrap()
        );
        assert_eq!(row.int("count").unwrap(), 12);
        assert_eq!(row.float("ratio").unwrap(), 0.5);
        assert_eq!(row.opt_bool("flag").unwrap(), Some(true));
    }

    #[test]
    fn trailing_optional_columns_may_be_absent() {
        let row = SCHEMA.decode_line("bob\t1717264800\t3", 4).unwrap();
        assert_eq!(row.opt_bool("flag").unwrap(), None);
        assert_eq!(row.line(), 4);
    }

    #[test]
    fn null_marker_in_required_column_is_missing() {
        let err = SCHEMA.decode_line("bob\t\\N\t3", 2).unwrap_err();
        assert_eq!(
            err,
            RowError::Missing {
                line: 2,
                column: "at"
            }
        );
    }

    #[test]
    fn bad_integer_is_invalid() {
        let err = SCHEMA
            .decode_line("bob\t2025-06-01T18:00:00Z\tlots", 3)
            .unwrap_err();
        assert!(matches!(err, RowError::Invalid { column: "count", .. }));
        assert_eq!(err.line(), 3);
    }

    #[test]
    fn too_many_fields_is_arity_error() {
        let err = SCHEMA.decode_line("a\t1\t2\t3\t1\textra", 9).unwrap_err();
        assert!(matches!(err, RowError::Arity { found: 6, .. }));
    }

    #[test]
    fn unknown_accessor_is_reported() {
        let row = SCHEMA.decode_line("a\t1\t2", 1).unwrap();
        assert!(matches!(
            row.int("missing"),
            Err(RowError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn text_escapes_are_undone() {
        let row = SCHEMA.decode_line("tab\\there\t1\t2", 1).unwrap();
        assert_eq!(row.text("name").unwrap(), "tab\there");
    }

    #[test]
    fn decode_all_skips_header_blank_and_bad_rows() {
        let doc = "name\tat\tcount\nalice\t1\t1\n\nbroken\nbob\t2\t2\n";
        let decoded = SCHEMA.decode_all(doc);
        assert_eq!(decoded.rows.len(), 2);
        assert_eq!(decoded.skipped.len(), 1);
        assert_eq!(decoded.skipped[0].line(), 4);
    }

    #[test]
    fn typed_cells_are_checked_against_columns() {
        let ok = SCHEMA.from_cells(
            vec![
                Cell::Text("a".to_string()),
                Cell::Timestamp(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
                Cell::Int(1),
                Cell::Int(2),
                Cell::Null,
            ],
            1,
        );
        assert_eq!(ok.unwrap().float("ratio").unwrap(), 2.0);

        let missing = SCHEMA
            .from_cells(
                vec![Cell::Text("a".into()), Cell::Null, Cell::Int(1), Cell::Null, Cell::Null],
                2,
            )
            .unwrap_err();
        assert_eq!(
            missing,
            RowError::Missing {
                line: 2,
                column: "at"
            }
        );

        let short = SCHEMA.from_cells(vec![Cell::Null], 3).unwrap_err();
        assert!(matches!(short, RowError::Arity { found: 1, .. }));
    }

    #[test]
    fn header_lists_columns_in_order() {
        insta::assert_snapshot!(SCHEMA.with_delimiter(',').header(), @"name,at,count,ratio,flag");
    }

    #[test]
    fn row_error_converts_to_malformed() {
        let err: RoundlogError = RowError::Missing {
            line: 7,
            column: "at",
        }
        .into();
        assert_eq!(
            err.category(),
            roundlog_error::ErrorCategory::Malformed
        );
    }
}
