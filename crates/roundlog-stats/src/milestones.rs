use itertools::Itertools;
use roundlog_schema::analytics::Milestone;
use roundlog_schema::round::Round;

/// Cumulative-kill threshold crossings, once per player per threshold.
///
/// Rounds are walked by `end_time`. A threshold fires at the first round whose
/// running total reaches it and never again, even if the total later dips and
/// recovers. One round can cross several thresholds. Output is ordered by
/// player, then threshold.
pub fn milestones(rounds: &[Round], thresholds: &[i64]) -> Vec<Milestone> {
    let thresholds: Vec<i64> = thresholds.iter().copied().sorted().dedup().collect();
    let by_player = rounds.iter().into_group_map_by(|r| r.player_name.as_str());

    let mut out = Vec::new();
    for (player, mut rounds) in by_player.into_iter().sorted_by_key(|(p, _)| *p) {
        rounds.sort_by(|a, b| {
            a.end_time
                .cmp(&b.end_time)
                .then(a.start_time.cmp(&b.start_time))
                .then_with(|| a.round_id.as_str().cmp(b.round_id.as_str()))
        });
        let Some(first) = rounds.first() else {
            continue;
        };
        let started = first.start_time;

        let mut total = 0i64;
        let mut pending = thresholds.iter().copied().peekable();
        for round in &rounds {
            total += round.final_kills;
            while let Some(threshold) = pending.next_if(|t| total >= *t) {
                out.push(Milestone {
                    player_name: player.to_string(),
                    threshold,
                    round_id: round.round_id.clone(),
                    achieved_at: round.end_time,
                    cumulative_kills: total,
                    days_to_achieve: (round.end_time - started).num_days(),
                });
            }
        }
    }
    out
}
