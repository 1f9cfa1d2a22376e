//! Error handling utilities for roundlog.
//!
//! Library code returns `anyhow::Result` with context. The typed
//! [`RoundlogError`] is attached where a caller needs to branch on the kind of
//! failure, and [`categorize`] recovers that kind from any error chain.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// How a failure should be handled by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Storage unreachable or I/O failure. Abort, report, retry later.
    Transient,
    /// A query or sub-analysis exceeded its time budget.
    Timeout,
    /// A single unparseable row. Skip it and continue.
    Malformed,
    /// Too little history to compute a result.
    InsufficientData,
    Config,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Transient => write!(f, "transient"),
            ErrorCategory::Timeout => write!(f, "timeout"),
            ErrorCategory::Malformed => write!(f, "malformed"),
            ErrorCategory::InsufficientData => write!(f, "insufficient_data"),
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Internal => write!(f, "internal"),
        }
    }
}

impl ErrorCategory {
    /// Whether re-running the whole operation is expected to help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Transient | ErrorCategory::Timeout)
    }
}

/// Typed roundlog failures.
#[derive(Debug, Error)]
pub enum RoundlogError {
    #[error("storage error during {operation}: {message}")]
    Storage { operation: String, message: String },

    #[error("{operation} timed out after {elapsed_ms} ms")]
    Timeout { operation: String, elapsed_ms: u64 },

    #[error("malformed row {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("insufficient data: need {needed}, found {found}")]
    InsufficientData { needed: usize, found: usize },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Internal(String),
}

impl RoundlogError {
    pub fn storage(operation: impl Into<String>, message: impl fmt::Display) -> Self {
        RoundlogError::Storage {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            RoundlogError::Storage { .. } => ErrorCategory::Transient,
            RoundlogError::Timeout { .. } => ErrorCategory::Timeout,
            RoundlogError::MalformedRow { .. } => ErrorCategory::Malformed,
            RoundlogError::InsufficientData { .. } => ErrorCategory::InsufficientData,
            RoundlogError::Config(_) => ErrorCategory::Config,
            RoundlogError::Internal(_) => ErrorCategory::Internal,
        }
    }
}

/// Walk an error chain and return the category of the first typed failure.
///
/// Untyped I/O errors count as transient; anything else is internal.
pub fn categorize(err: &anyhow::Error) -> ErrorCategory {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<RoundlogError>() {
            return e.category();
        }
        if cause.downcast_ref::<std::io::Error>().is_some() {
            return ErrorCategory::Transient;
        }
    }
    ErrorCategory::Internal
}

/// Render an error chain on one line for result objects and logs.
pub fn one_line(err: &anyhow::Error) -> String {
    format!("{err:#}")
}
