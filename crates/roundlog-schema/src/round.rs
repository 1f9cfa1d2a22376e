use crate::sample::PartitionKey;
use chrono::{DateTime, Utc};
use roundlog_ids::RoundId;
use serde::{Deserialize, Serialize};

/// A reconstructed, bounded play session.
///
/// Finals are maxima of the constituent samples, never sums. A round is
/// immutable once finalized; re-computation supersedes it by `round_id`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Round {
    pub round_id: RoundId,
    pub player_name: String,
    pub server_id: String,
    pub map_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub final_kills: i64,
    pub final_deaths: i64,
    pub final_score: i64,
    /// `end_time - start_time` in minutes, clamped at zero.
    pub play_time_minutes: f64,
    pub team_label: Option<String>,
    pub game_id: Option<String>,
    pub is_bot: bool,
    /// Session id of the opening sample; part of the identity.
    #[serde(default)]
    pub session_id: String,
    /// Position in the partition's chronological round sequence.
    #[serde(default)]
    pub round_index: u32,
    #[serde(default)]
    pub sample_count: u32,
}

impl Round {
    pub fn partition_key(&self) -> PartitionKey {
        PartitionKey::new(&self.player_name, &self.server_id)
    }

    /// Closed-interval overlap on `[start_time, end_time]`.
    pub fn overlaps(&self, other: &Round) -> bool {
        self.start_time <= other.end_time && other.start_time <= self.end_time
    }

    /// Recompute the identity from the natural key.
    pub fn expected_id(&self) -> RoundId {
        RoundId::derive(
            &self.player_name,
            &self.server_id,
            &self.map_name,
            self.start_time,
            &self.session_id,
        )
    }
}
