use crate::analytics::{RateSummary, Trajectory, TrendFit};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One sub-analysis of a composite response.
///
/// A failed or timed-out section renders as "data unavailable" instead of
/// failing the whole response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum Section<T> {
    Ready(T),
    Unavailable { reason: String },
}

impl<T> Section<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Section::Ready(_))
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Section::Ready(v) => Some(v),
            Section::Unavailable { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverallProgression {
    pub rounds: usize,
    pub rates: RateSummary,
    pub kd_ratio: f64,
    pub kill_rate_trend: TrendFit,
    pub kd_trend: TrendFit,
    pub score_rate_trend: TrendFit,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapProgression {
    pub map_name: String,
    pub rounds: usize,
    pub play_time_minutes: f64,
    pub kill_rate: f64,
    pub kd_ratio: f64,
    pub kill_rate_trend: TrendFit,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecentActivity {
    pub window_days: i64,
    pub rounds: usize,
    pub play_time_minutes: f64,
    pub kills: i64,
    pub deaths: i64,
    pub servers: Vec<String>,
    pub last_seen: Option<DateTime<Utc>>,
}

/// The player's kill rate against everyone seen on the same servers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComparativeMetrics {
    pub player_kill_rate: f64,
    pub population_median_kill_rate: f64,
    /// Share of compared players at or below this player's kill rate.
    pub kill_rate_percentile: f64,
    pub players_compared: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerProgression {
    pub player_name: String,
    pub generated_at: DateTime<Utc>,
    pub overall: Section<OverallProgression>,
    pub per_map: Section<Vec<MapProgression>>,
    pub trajectory: Section<Trajectory>,
    pub recent_activity: Section<RecentActivity>,
    pub comparative: Section<ComparativeMetrics>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_section_serializes_reason() {
        let section: Section<u32> = Section::Unavailable {
            reason: "query timed out".into(),
        };
        let json = serde_json::to_value(&section).unwrap();
        assert_eq!(json["status"], "unavailable");
        assert_eq!(json["data"]["reason"], "query timed out");
        assert!(!section.is_ready());
    }

    #[test]
    fn ready_section_exposes_value() {
        let section = Section::Ready(7u32);
        assert_eq!(section.ready(), Some(&7));
    }
}
