//! Logging configuration and tracing subscriber setup for roundlog.
//!
//! Library crates only emit `tracing` events. Binaries call [`init`] once with
//! a [`LoggingConfig`] loaded alongside the rest of the configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing_subscriber::EnvFilter;

/// Log level for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        f.write_str(s)
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
    Compact,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum log level to output
    #[serde(default)]
    pub level: LogLevel,
    /// Output format
    #[serde(default)]
    pub format: LogFormat,
    /// Enable timestamps
    #[serde(default = "default_true")]
    pub timestamps: bool,
    /// Enable colors (for terminal output)
    #[serde(default = "default_true")]
    pub colors: bool,
    /// Component-specific log levels, keyed by crate target (`roundlog_sync`).
    #[serde(default)]
    pub component_levels: BTreeMap<String, LogLevel>,
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Plain,
            timestamps: true,
            colors: true,
            component_levels: BTreeMap::new(),
        }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_component_level(mut self, component: impl Into<String>, level: LogLevel) -> Self {
        self.component_levels.insert(component.into(), level);
        self
    }

    /// `EnvFilter` directives: the global level first, then one per component.
    ///
    /// Component names may be written with dashes; targets use underscores.
    pub fn filter_directives(&self) -> String {
        let mut parts = vec![self.level.to_string()];
        for (component, level) in &self.component_levels {
            parts.push(format!("{}={}", component.replace('-', "_"), level));
        }
        parts.join(",")
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the configured filter.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.filter_directives()))
        .map_err(|e| anyhow::anyhow!("invalid log filter: {e}"))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(config.colors);

    let result = match (config.format, config.timestamps) {
        (LogFormat::Json, _) => builder.json().try_init(),
        (LogFormat::Compact, true) => builder.compact().try_init(),
        (LogFormat::Compact, false) => builder.compact().without_time().try_init(),
        (LogFormat::Plain, true) => builder.try_init(),
        (LogFormat::Plain, false) => builder.without_time().try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("install tracing subscriber: {e}"))
}
