use chrono::{DateTime, Utc, Weekday};
use roundlog_ids::RoundId;
use serde::{Deserialize, Serialize};

/// Busy/quiet classification of current activity.
///
/// Variants are declared in ascending order so `Ord` follows activity level;
/// `Unknown` sorts below everything.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyLevel {
    Unknown,
    VeryQuiet,
    Quiet,
    Moderate,
    Busy,
    VeryBusy,
}

impl BusyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BusyLevel::Unknown => "unknown",
            BusyLevel::VeryQuiet => "very_quiet",
            BusyLevel::Quiet => "quiet",
            BusyLevel::Moderate => "moderate",
            BusyLevel::Busy => "busy",
            BusyLevel::VeryBusy => "very_busy",
        }
    }

    /// Default human-readable text for the level.
    pub fn default_text(&self) -> &'static str {
        match self {
            BusyLevel::Unknown => "Not enough history",
            BusyLevel::VeryQuiet => "Much quieter than usual",
            BusyLevel::Quiet => "Quieter than usual",
            BusyLevel::Moderate => "About as busy as usual",
            BusyLevel::Busy => "Busier than usual",
            BusyLevel::VeryBusy => "Much busier than usual",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
}

/// Current value against the historical distribution. Derived, never stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BusySnapshot {
    pub current_value: f64,
    pub historical_percentiles: Option<Percentiles>,
    pub classification: BusyLevel,
}

/// Busy indicator as handed to the presentation layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BusyIndicator {
    pub busy_level: BusyLevel,
    pub busy_text: String,
    pub current_value: f64,
    /// Historical median for the slot.
    pub typical_value: Option<f64>,
    /// Share of historical days at or below the current value, 0..=100.
    pub percentile: Option<f64>,
    pub historical_min: Option<f64>,
    pub historical_max: Option<f64>,
    pub percentiles: Option<Percentiles>,
    pub historical_days: usize,
    pub hour_of_day: u32,
    pub day_of_week: Weekday,
}

impl BusyIndicator {
    pub fn snapshot(&self) -> BusySnapshot {
        BusySnapshot {
            current_value: self.current_value,
            historical_percentiles: self.percentiles,
            classification: self.busy_level,
        }
    }
}

/// Five-way slope classification shared by metric trends and trajectories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrendDirection {
    StronglyImproving,
    Improving,
    Stable,
    Declining,
    StronglyDeclining,
}

impl TrendDirection {
    pub fn is_improving(&self) -> bool {
        matches!(self, TrendDirection::Improving | TrendDirection::StronglyImproving)
    }

    pub fn is_declining(&self) -> bool {
        matches!(self, TrendDirection::Declining | TrendDirection::StronglyDeclining)
    }
}

/// Result of an ordinary least-squares fit over a daily series.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendFit {
    pub direction: TrendDirection,
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub points_used: usize,
}

impl TrendFit {
    /// Sentinel for series too short to fit.
    pub fn insufficient(points_used: usize) -> Self {
        Self {
            direction: TrendDirection::Stable,
            slope: 0.0,
            intercept: 0.0,
            r_squared: 0.0,
            points_used,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub direction: TrendDirection,
    /// Mean R² of the contributing fits.
    pub confidence: f64,
    pub metrics: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub starts_at: DateTime<Utc>,
    pub hour: u32,
    pub day_of_week: Weekday,
    pub predicted_value: f64,
    pub data_point_count: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityTrend {
    Increasing,
    Decreasing,
    Stable,
}

/// Forecast and recommendation for one server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServerInsight {
    pub server_id: String,
    pub current_status: BusyLevel,
    pub current_value: f64,
    pub trend_direction: ActivityTrend,
    pub forecast: Vec<ForecastPoint>,
    pub peak_hours: Vec<ForecastPoint>,
    pub recommendation: String,
}

/// A cumulative-kill threshold crossing, recorded once per player per threshold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub player_name: String,
    pub threshold: i64,
    pub round_id: RoundId,
    pub achieved_at: DateTime<Utc>,
    pub cumulative_kills: i64,
    pub days_to_achieve: i64,
}

/// Delta-based rate summary for one or more partitions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RateSummary {
    pub kills: i64,
    pub deaths: i64,
    pub score: i64,
    pub minutes: f64,
    pub kill_rate: f64,
    pub death_rate: f64,
    pub score_rate: f64,
}
