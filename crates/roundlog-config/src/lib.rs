//! Configuration surface for roundlog.
//!
//! Every engine receives its own section explicitly at construction time;
//! nothing reads ambient state. The file format follows the extension
//! (`.json`, otherwise YAML) and every field has a default.

use roundlog_error::RoundlogError;
use roundlog_logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration format types supported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFormat {
    Json,
    #[default]
    Yaml,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => ConfigFormat::Json,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// Round boundary detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Elapsed minutes between samples that always opens a new round.
    #[serde(default = "default_gap_minutes")]
    pub gap_minutes: i64,
}

fn default_gap_minutes() -> i64 {
    15
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            gap_minutes: default_gap_minutes(),
        }
    }
}

/// Incremental publication of rounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    /// How far behind the watermark each run starts re-scanning.
    #[serde(default = "default_overlap_minutes")]
    pub overlap_minutes: i64,
    /// Round table schema the pipeline writes. 1 = core columns, 2 = full.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

fn default_batch_size() -> usize {
    500
}

fn default_batch_delay_ms() -> u64 {
    100
}

fn default_overlap_minutes() -> i64 {
    15
}

fn default_schema_version() -> u32 {
    2
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            overlap_minutes: default_overlap_minutes(),
            schema_version: default_schema_version(),
        }
    }
}

/// Breakpoints, in percent, for the busy classification.
///
/// The middle breakpoint is always the true median of the distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileBreakpoints {
    pub p25: f64,
    pub p75: f64,
    pub p90: f64,
}

impl Default for PercentileBreakpoints {
    fn default() -> Self {
        Self {
            p25: 25.0,
            p75: 75.0,
            p90: 90.0,
        }
    }
}

/// Busy/quiet classification against the same time-of-week slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusyConfig {
    /// Width of the dedup buckets; edges fall on multiples of this minute.
    #[serde(default = "default_bucket_minutes")]
    pub bucket_minutes: u32,
    #[serde(default = "default_min_historical_days")]
    pub min_historical_days: usize,
    #[serde(default = "default_min_buckets_per_hour")]
    pub min_buckets_per_hour: usize,
    #[serde(default = "default_busy_lookback_days")]
    pub lookback_days: i64,
    #[serde(default)]
    pub breakpoints: PercentileBreakpoints,
    /// `current >= ratio * max` reads as "Extremely busy".
    #[serde(default = "default_extreme_high_ratio")]
    pub extreme_high_ratio: f64,
    /// `current <= ratio * min` reads as "Very quiet".
    #[serde(default = "default_extreme_low_ratio")]
    pub extreme_low_ratio: f64,
    #[serde(default)]
    pub include_bots: bool,
}

fn default_bucket_minutes() -> u32 {
    15
}

fn default_min_historical_days() -> usize {
    3
}

fn default_min_buckets_per_hour() -> usize {
    2
}

fn default_busy_lookback_days() -> i64 {
    60
}

fn default_extreme_high_ratio() -> f64 {
    0.95
}

fn default_extreme_low_ratio() -> f64 {
    1.1
}

impl Default for BusyConfig {
    fn default() -> Self {
        Self {
            bucket_minutes: default_bucket_minutes(),
            min_historical_days: default_min_historical_days(),
            min_buckets_per_hour: default_min_buckets_per_hour(),
            lookback_days: default_busy_lookback_days(),
            breakpoints: PercentileBreakpoints::default(),
            extreme_high_ratio: default_extreme_high_ratio(),
            extreme_low_ratio: default_extreme_low_ratio(),
            include_bots: false,
        }
    }
}

/// Regression over daily performance series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendConfig {
    #[serde(default = "default_strong_slope")]
    pub strong_slope: f64,
    #[serde(default = "default_mild_slope")]
    pub mild_slope: f64,
    #[serde(default = "default_min_points")]
    pub min_points: usize,
    /// Days with fewer observations than this are left out of the series:
    /// counted delta pairs for rates, rounds for K/D.
    #[serde(default = "default_min_samples_per_day")]
    pub min_samples_per_day: usize,
    #[serde(default = "default_trend_lookback_days")]
    pub lookback_days: i64,
}

fn default_strong_slope() -> f64 {
    0.1
}

fn default_mild_slope() -> f64 {
    0.02
}

fn default_min_points() -> usize {
    3
}

fn default_min_samples_per_day() -> usize {
    1
}

fn default_trend_lookback_days() -> i64 {
    30
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            strong_slope: default_strong_slope(),
            mild_slope: default_mild_slope(),
            min_points: default_min_points(),
            min_samples_per_day: default_min_samples_per_day(),
            lookback_days: default_trend_lookback_days(),
        }
    }
}

/// Hour-of-week activity forecasting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_horizon_hours")]
    pub horizon_hours: u32,
    #[serde(default = "default_min_samples_per_slot")]
    pub min_samples_per_slot: usize,
    #[serde(default = "default_peak_count")]
    pub peak_count: usize,
    #[serde(default = "default_forecast_lookback_days")]
    pub lookback_days: i64,
    /// Relative change under which the next hour counts as stable.
    #[serde(default = "default_stable_band")]
    pub stable_band: f64,
}

fn default_horizon_hours() -> u32 {
    4
}

fn default_min_samples_per_slot() -> usize {
    3
}

fn default_peak_count() -> usize {
    3
}

fn default_forecast_lookback_days() -> i64 {
    90
}

fn default_stable_band() -> f64 {
    0.10
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon_hours: default_horizon_hours(),
            min_samples_per_slot: default_min_samples_per_slot(),
            peak_count: default_peak_count(),
            lookback_days: default_forecast_lookback_days(),
            stable_band: default_stable_band(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneConfig {
    #[serde(default = "default_thresholds")]
    pub thresholds: Vec<i64>,
}

fn default_thresholds() -> Vec<i64> {
    vec![1_000, 5_000, 10_000, 25_000, 50_000, 100_000]
}

impl Default for MilestoneConfig {
    fn default() -> Self {
        Self {
            thresholds: default_thresholds(),
        }
    }
}

/// Composite analytics requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Budget for each sub-analysis before it degrades to "unavailable".
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
    #[serde(default = "default_recent_days")]
    pub recent_days: i64,
}

fn default_query_timeout_ms() -> u64 {
    5_000
}

fn default_recent_days() -> i64 {
    7
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: default_query_timeout_ms(),
            recent_days: default_recent_days(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./roundlog.db")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Main roundlog configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundlogConfig {
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub busy: BusyConfig,
    #[serde(default)]
    pub trend: TrendConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub milestones: MilestoneConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl RoundlogConfig {
    /// Reject values the engines cannot work with.
    pub fn validate(&self) -> Result<(), RoundlogError> {
        let fail = |msg: &str| -> Result<(), RoundlogError> {
            Err(RoundlogError::Config(msg.to_string()))
        };

        if self.segmentation.gap_minutes <= 0 {
            return fail("segmentation.gap_minutes must be positive");
        }
        if self.sync.batch_size == 0 {
            return fail("sync.batch_size must be positive");
        }
        if self.sync.overlap_minutes < 0 {
            return fail("sync.overlap_minutes must not be negative");
        }
        if !(1..=2).contains(&self.sync.schema_version) {
            return fail("sync.schema_version must be 1 or 2");
        }
        let bucket = self.busy.bucket_minutes;
        if bucket == 0 || 60 % bucket != 0 {
            return fail("busy.bucket_minutes must divide 60");
        }
        if self.busy.min_historical_days == 0 || self.busy.lookback_days <= 0 {
            return fail("busy history window must be positive");
        }
        let bp = self.busy.breakpoints;
        if !(0.0 < bp.p25 && bp.p25 < 50.0 && 50.0 < bp.p75 && bp.p75 < bp.p90 && bp.p90 < 100.0) {
            return fail("busy.breakpoints must satisfy 0 < p25 < 50 < p75 < p90 < 100");
        }
        if !(0.0 <= self.trend.mild_slope && self.trend.mild_slope < self.trend.strong_slope) {
            return fail("trend.mild_slope must be below trend.strong_slope");
        }
        if self.trend.min_points < 2 {
            return fail("trend.min_points must be at least 2");
        }
        if !(1..=24).contains(&self.forecast.horizon_hours) {
            return fail("forecast.horizon_hours must be within 1..=24");
        }
        if self.milestones.thresholds.windows(2).any(|w| w[0] >= w[1])
            || self.milestones.thresholds.iter().any(|t| *t <= 0)
        {
            return fail("milestones.thresholds must be positive and strictly ascending");
        }
        if self.analytics.query_timeout_ms == 0 {
            return fail("analytics.query_timeout_ms must be positive");
        }
        Ok(())
    }
}

/// Load and validate configuration from a file
pub fn load_config(path: impl AsRef<Path>) -> anyhow::Result<RoundlogConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;

    let config: RoundlogConfig = match ConfigFormat::from_path(path) {
        ConfigFormat::Json => serde_json::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse JSON config: {}", e))?,
        ConfigFormat::Yaml => serde_yaml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse YAML config: {}", e))?,
    };
    config.validate()?;
    Ok(config)
}

/// Save configuration to a file
pub fn save_config(config: &RoundlogConfig, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let path = path.as_ref();
    let contents = match ConfigFormat::from_path(path) {
        ConfigFormat::Json => serde_json::to_string_pretty(config)
            .map_err(|e| anyhow::anyhow!("Failed to serialize JSON config: {}", e))?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)
            .map_err(|e| anyhow::anyhow!("Failed to serialize YAML config: {}", e))?,
    };

    std::fs::write(path, contents)?;
    Ok(())
}
