//! Parameterized queries and schema-declared row decoding.
//!
//! Two rules keep call sites free of quoting logic:
//! - SQL text only ever carries `?` placeholders; values travel as a typed
//!   argument list and are substituted by exactly one routine ([`Query::render`]).
//! - Result rows are decoded against a fixed, ordered column list
//!   ([`row::RowSchema`]) instead of being inferred at runtime.

pub mod query;
pub mod row;

pub use query::{Query, QueryError, Value};
pub use row::{Cell, Column, ColumnKind, Decoded, Row, RowError, RowSchema};
