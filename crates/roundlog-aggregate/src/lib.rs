//! Round aggregation.
//!
//! Finals are maxima of the segment's samples; counters are cumulative within
//! a round, so summing them would double count.

use chrono::{DateTime, Utc};
use roundlog_config::SegmentationConfig;
use roundlog_ids::RoundId;
use roundlog_schema::round::Round;
use roundlog_schema::sample::Sample;
use roundlog_segment::{Segment, Segmenter};

/// Fractional minutes between two instants, clamped at zero.
pub fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    ((end - start).num_milliseconds() as f64 / 60_000.0).max(0.0)
}

/// Collapse one segment into a round. `None` for an empty segment.
pub fn aggregate_segment(segment: &Segment) -> Option<Round> {
    let first = segment.first()?;
    let last = segment.last()?;

    let start_time = segment.samples.iter().map(|s| s.timestamp).min()?;
    let end_time = segment.samples.iter().map(|s| s.timestamp).max()?;
    let max_of = |f: fn(&Sample) -> i64| segment.samples.iter().map(f).max().unwrap_or(0);

    Some(Round {
        round_id: RoundId::derive(
            &segment.key.player_name,
            &segment.key.server_id,
            &first.map_name,
            start_time,
            &first.session_id,
        ),
        player_name: segment.key.player_name.clone(),
        server_id: segment.key.server_id.clone(),
        map_name: first.map_name.clone(),
        start_time,
        end_time,
        final_kills: max_of(|s| s.kills),
        final_deaths: max_of(|s| s.deaths),
        final_score: max_of(|s| s.score),
        play_time_minutes: minutes_between(start_time, end_time),
        team_label: last.team_label.clone(),
        game_id: last.game_id.clone(),
        is_bot: last.is_bot,
        session_id: first.session_id.clone(),
        round_index: segment.round_index,
        sample_count: segment.samples.len() as u32,
    })
}

/// Publication order: `(end_time, player, server, start_time)`.
pub fn sort_for_publication(rounds: &mut [Round]) {
    rounds.sort_by(|a, b| {
        a.end_time
            .cmp(&b.end_time)
            .then_with(|| a.player_name.cmp(&b.player_name))
            .then_with(|| a.server_id.cmp(&b.server_id))
            .then_with(|| a.start_time.cmp(&b.start_time))
    });
}

pub fn aggregate<'a>(segments: impl IntoIterator<Item = &'a Segment>) -> Vec<Round> {
    let mut rounds: Vec<Round> = segments.into_iter().filter_map(aggregate_segment).collect();
    sort_for_publication(&mut rounds);
    rounds
}

/// Segment then aggregate in one step.
pub fn rounds_from_samples(
    samples: impl IntoIterator<Item = Sample>,
    config: &SegmentationConfig,
) -> Vec<Round> {
    let segments = Segmenter::new(config).segment(samples);
    aggregate(&segments)
}
