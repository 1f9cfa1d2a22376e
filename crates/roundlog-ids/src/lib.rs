use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Number of hex characters kept from the SHA-256 digest of a round.
pub const ROUND_ID_HEX_LEN: usize = 16;

/// Format used for the start time when deriving a round identity.
pub const START_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Stable identity of a reconstructed round.
///
/// The rule is simple:
/// - the id is derived only from the round's natural key, never from row order;
/// - re-running segmentation over the same samples yields the same id.
///
/// That is what makes publication an upsert instead of an append.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoundId(pub String);

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl RoundId {
    /// `first16hex(SHA-256(player || server || map || start || session))`.
    ///
    /// Parts are concatenated without separators; the session id keeps rapid
    /// reconnects on the same map and second apart.
    pub fn derive(
        player_name: &str,
        server_id: &str,
        map_name: &str,
        start_time: DateTime<Utc>,
        session_id: &str,
    ) -> Self {
        let start = start_time.format(START_TIME_FORMAT).to_string();
        let mut hasher = Sha256::new();
        for part in [player_name, server_id, map_name, start.as_str(), session_id] {
            hasher.update(part.as_bytes());
        }
        let mut out = hex::encode(hasher.finalize());
        out.truncate(ROUND_ID_HEX_LEN);
        Self(out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier of one sync run. Only used for log correlation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncRunId(pub String);

impl fmt::Display for SyncRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl SyncRunId {
    /// Non-deterministic enough to avoid collisions without dragging in UUID/rand.
    pub fn now(prefix: &str) -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        SyncRunId(format!("{prefix}_{nanos}"))
    }
}
