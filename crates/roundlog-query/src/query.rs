use chrono::{DateTime, Utc};
use thiserror::Error;

/// Timestamp layout used when a value is rendered inline.
pub const INLINE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A typed query argument.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    #[error("query has {placeholders} placeholders but {args} arguments")]
    ArityMismatch { placeholders: usize, args: usize },
    #[error("unterminated quoted literal in query text")]
    UnterminatedLiteral,
    #[error("argument {index} is not a finite number")]
    NonFiniteFloat { index: usize },
}

/// SQL text with `?` placeholders plus its argument list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    sql: String,
    args: Vec<Value>,
    has_where: bool,
}

impl Query {
    pub fn new(sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let has_where = sql.to_ascii_uppercase().contains(" WHERE ");
        Self {
            sql,
            args: Vec::new(),
            has_where,
        }
    }

    /// Append an argument for the next unbound placeholder.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Append raw SQL that carries no placeholders.
    pub fn push(mut self, fragment: &str) -> Self {
        self.sql.push_str(fragment);
        self
    }

    /// Add a `WHERE`/`AND` condition with exactly one placeholder.
    pub fn filter(mut self, condition: &str, value: impl Into<Value>) -> Self {
        self.push_condition(condition);
        self.args.push(value.into());
        self
    }

    /// Add a condition only when the value is present.
    pub fn filter_opt<T: Into<Value>>(self, condition: &str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.filter(condition, v),
            None => self,
        }
    }

    /// Add a condition that carries no placeholder.
    pub fn filter_raw(mut self, condition: &str) -> Self {
        self.push_condition(condition);
        self
    }

    fn push_condition(&mut self, condition: &str) {
        self.sql
            .push_str(if self.has_where { " AND " } else { " WHERE " });
        self.has_where = true;
        self.sql.push_str(condition);
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Byte offsets of every placeholder outside quoted literals.
    fn placeholder_offsets(&self) -> Result<Vec<usize>, QueryError> {
        let mut offsets = Vec::new();
        let mut quote: Option<char> = None;
        for (i, c) in self.sql.char_indices() {
            match (quote, c) {
                (None, '\'' | '"' | '`') => quote = Some(c),
                (Some(q), c) if c == q => quote = None,
                (None, '?') => offsets.push(i),
                _ => {}
            }
        }
        if quote.is_some() {
            return Err(QueryError::UnterminatedLiteral);
        }
        Ok(offsets)
    }

    /// Confirm placeholders and arguments line up.
    pub fn check(&self) -> Result<(), QueryError> {
        let placeholders = self.placeholder_offsets()?.len();
        if placeholders != self.args.len() {
            return Err(QueryError::ArityMismatch {
                placeholders,
                args: self.args.len(),
            });
        }
        Ok(())
    }

    /// Substitute every placeholder with its escaped literal.
    ///
    /// For text-protocol backends and for logs. Drivers with native binding
    /// should use [`Query::sql`] and [`Query::args`] instead.
    pub fn render(&self) -> Result<String, QueryError> {
        let offsets = self.placeholder_offsets()?;
        if offsets.len() != self.args.len() {
            return Err(QueryError::ArityMismatch {
                placeholders: offsets.len(),
                args: self.args.len(),
            });
        }

        let mut out = String::with_capacity(self.sql.len() + self.args.len() * 8);
        let mut last = 0;
        for (index, (offset, value)) in offsets.iter().zip(&self.args).enumerate() {
            out.push_str(&self.sql[last..*offset]);
            out.push_str(&literal(value, index)?);
            last = offset + 1;
        }
        out.push_str(&self.sql[last..]);
        Ok(out)
    }
}

/// Escape a string for use inside single quotes.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

fn literal(value: &Value, index: usize) -> Result<String, QueryError> {
    Ok(match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) if f.is_finite() => format!("{f:?}"),
        Value::Float(_) => return Err(QueryError::NonFiniteFloat { index }),
        Value::Text(s) => format!("'{}'", escape_text(s)),
        Value::Timestamp(t) => format!("'{}'", t.format(INLINE_TIMESTAMP_FORMAT)),
    })
}
