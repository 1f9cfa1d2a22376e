use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One periodic observation of a player's in-game state.
///
/// Produced externally and never mutated. Counters are cumulative within a
/// round and drop back when the game resets them.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Sample {
    pub player_name: String,
    pub server_id: String,
    pub map_name: String,
    pub timestamp: DateTime<Utc>,
    pub kills: i64,
    pub deaths: i64,
    pub score: i64,
    pub ping: i64,
    pub is_bot: bool,
    /// External session identifier. Empty when the producer has none.
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub team_label: Option<String>,
    #[serde(default)]
    pub game_id: Option<String>,
}

impl Sample {
    pub fn partition_key(&self) -> PartitionKey {
        PartitionKey {
            player_name: self.player_name.clone(),
            server_id: self.server_id.clone(),
        }
    }

    pub fn belongs_to(&self, key: &PartitionKey) -> bool {
        self.player_name == key.player_name && self.server_id == key.server_id
    }
}

/// Rounds are reconstructed independently per (player, server).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionKey {
    pub player_name: String,
    pub server_id: String,
}

impl PartitionKey {
    pub fn new(player_name: impl Into<String>, server_id: impl Into<String>) -> Self {
        Self {
            player_name: player_name.into(),
            server_id: server_id.into(),
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.player_name, self.server_id)
    }
}
