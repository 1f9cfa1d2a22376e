use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;
use roundlog_ids::RoundId;
use roundlog_schema::round::Round;
use roundlog_schema::sample::Sample;

use crate::fixtures;

// ============================================================================
// Base Strategies
// ============================================================================

/// Minute-resolution instants within roughly 60 days of the fixture origin
pub fn strategy_datetime_utc() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..60 * 24 * 60).prop_map(fixtures::at)
}

/// Free-form samples, used for serialization and import properties
pub fn strategy_sample() -> impl Strategy<Value = Sample> {
    (
        ("[a-z][a-z0-9_]{0,11}", "[a-z]{2}-[0-9]", "[a-z_]{1,10}"),
        strategy_datetime_utc(),
        (0i64..5_000, 0i64..5_000, -100i64..50_000, 0i64..999),
        any::<bool>(),
        (
            "[a-z0-9]{0,8}",
            proptest::option::of("[a-z]{1,6}"),
            proptest::option::of("[a-z0-9]{1,10}"),
        ),
    )
        .prop_map(
            |((player, server, map), timestamp, (kills, deaths, score, ping), is_bot, (session, team, game))| Sample {
                player_name: player,
                server_id: server,
                map_name: map,
                timestamp,
                kills,
                deaths,
                score,
                ping,
                is_bot,
                session_id: session,
                team_label: team,
                game_id: game,
            },
        )
}

/// Rounds with a consistent identity and non-negative duration
pub fn strategy_round() -> impl Strategy<Value = Round> {
    (strategy_sample(), 0i64..180, 0u32..50).prop_map(|(s, minutes, index)| {
        let end = s.timestamp + Duration::minutes(minutes);
        Round {
            round_id: RoundId::derive(&s.player_name, &s.server_id, &s.map_name, s.timestamp, &s.session_id),
            player_name: s.player_name,
            server_id: s.server_id,
            map_name: s.map_name,
            start_time: s.timestamp,
            end_time: end,
            final_kills: s.kills,
            final_deaths: s.deaths,
            final_score: s.score,
            play_time_minutes: minutes as f64,
            team_label: s.team_label,
            game_id: s.game_id,
            is_bot: s.is_bot,
            session_id: s.session_id,
            round_index: index,
            sample_count: 1,
        }
    })
}

// ============================================================================
// Stream Strategies
// ============================================================================

const PLAYERS: [&str; 3] = ["alice", "bob", "carol"];
const SERVERS: [&str; 2] = ["eu-1", "us-1"];
const MAPS: [&str; 3] = ["dust", "nuke", "mirage"];

/// A noisy multi-partition stream: few players and servers, clustered
/// timestamps, counters that sometimes reset and maps that sometimes change
pub fn strategy_sample_stream() -> impl Strategy<Value = Vec<Sample>> {
    prop::collection::vec(
        (0usize..3, 0usize..2, 0usize..3, 0i64..240, 0i64..30, 0i64..15, any::<bool>()),
        0..80,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .map(|(p, s, m, minute, kills, deaths, is_bot)| Sample {
                is_bot,
                score: kills * 10 + deaths,
                ..fixtures::sample(PLAYERS[p], SERVERS[s], MAPS[m], fixtures::at(minute), kills, deaths)
            })
            .collect()
    })
}

// ============================================================================
// Numeric Strategies
// ============================================================================

/// Daily metric series of 0 to 30 finite values
pub fn strategy_trend_series() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-50.0f64..50.0, 0..30)
}

/// Historical daily activity values, never negative
pub fn strategy_activity_history() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0f64..200.0, 3..60)
}
