use chrono::{DateTime, Duration, TimeZone, Utc};
use roundlog_ids::RoundId;
use roundlog_schema::round::Round;
use roundlog_schema::sample::Sample;

/// Fixed origin for fixtures: Monday 2025-06-02 18:00 UTC.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 18, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// `t0` plus whole minutes (negative goes back).
pub fn at(minute: i64) -> DateTime<Utc> {
    t0() + Duration::minutes(minute)
}

/// `t0` plus whole days.
pub fn day(days: i64) -> DateTime<Utc> {
    t0() + Duration::days(days)
}

pub fn sample(
    player: &str,
    server: &str,
    map: &str,
    timestamp: DateTime<Utc>,
    kills: i64,
    deaths: i64,
) -> Sample {
    Sample {
        player_name: player.to_string(),
        server_id: server.to_string(),
        map_name: map.to_string(),
        timestamp,
        kills,
        deaths,
        score: kills * 10 - deaths,
        ping: 42,
        is_bot: false,
        session_id: String::new(),
        team_label: None,
        game_id: None,
    }
}

pub fn bot_sample(player: &str, server: &str, timestamp: DateTime<Utc>) -> Sample {
    Sample {
        is_bot: true,
        ..sample(player, server, "dust", timestamp, 0, 0)
    }
}

/// A finalized round with a consistent identity.
pub fn round(
    player: &str,
    server: &str,
    map: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    kills: i64,
    deaths: i64,
) -> Round {
    Round {
        round_id: RoundId::derive(player, server, map, start, ""),
        player_name: player.to_string(),
        server_id: server.to_string(),
        map_name: map.to_string(),
        start_time: start,
        end_time: end,
        final_kills: kills,
        final_deaths: deaths,
        final_score: kills * 10 - deaths,
        play_time_minutes: ((end - start).num_milliseconds() as f64 / 60_000.0).max(0.0),
        team_label: None,
        game_id: None,
        is_bot: false,
        session_id: String::new(),
        round_index: 0,
        sample_count: 2,
    }
}

/// Opening and closing samples of `round`: counters start at zero and end at
/// the round's finals.
pub fn round_samples(round: &Round) -> Vec<Sample> {
    let open = Sample {
        score: 0,
        is_bot: round.is_bot,
        session_id: round.session_id.clone(),
        ..sample(
            &round.player_name,
            &round.server_id,
            &round.map_name,
            round.start_time,
            0,
            0,
        )
    };
    let close = Sample {
        timestamp: round.end_time,
        kills: round.final_kills,
        deaths: round.final_deaths,
        score: round.final_score,
        ..open.clone()
    };
    vec![open, close]
}

/// Two players on two servers: alice plays two dust rounds (kill reset at
/// minute 12) and a nuke round after a break; bob plays one round; a bot
/// shares alice's server.
pub fn scenario_samples() -> Vec<Sample> {
    vec![
        sample("alice", "eu-1", "dust", at(0), 0, 0),
        sample("alice", "eu-1", "dust", at(5), 4, 1),
        sample("alice", "eu-1", "dust", at(10), 9, 3),
        sample("alice", "eu-1", "dust", at(12), 1, 0),
        sample("alice", "eu-1", "dust", at(20), 6, 2),
        sample("alice", "eu-1", "nuke", at(45), 0, 0),
        sample("alice", "eu-1", "nuke", at(55), 7, 4),
        sample("bob", "us-1", "mirage", at(0), 0, 0),
        sample("bob", "us-1", "mirage", at(8), 3, 5),
        bot_sample("bot-1", "eu-1", at(5)),
    ]
}

/// Consecutive one-hour rounds for `player` whose running kill total follows
/// `cumulative`, one round per day.
pub fn rounds_with_cumulative_kills(player: &str, cumulative: &[i64]) -> Vec<Round> {
    let mut previous = 0;
    cumulative
        .iter()
        .enumerate()
        .map(|(i, total)| {
            let start = day(i as i64);
            let mut r = round(
                player,
                "eu-1",
                "dust",
                start,
                start + Duration::hours(1),
                total - previous,
                1,
            );
            r.round_index = i as u32;
            previous = *total;
            r
        })
        .collect()
}
