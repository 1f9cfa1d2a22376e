//! Pure section builders for the player progression report.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use itertools::Itertools;
use roundlog_config::TrendConfig;
use roundlog_error::RoundlogError;
use roundlog_percentile::Distribution;
use roundlog_schema::analytics::{Trajectory, TrendFit};
use roundlog_schema::progression::{
    ComparativeMetrics, MapProgression, OverallProgression, RecentActivity,
};
use roundlog_schema::round::Round;
use roundlog_schema::sample::Sample;
use roundlog_stats::{kd_ratio, kill_rate_by_player, rate_summary, rates_by, round_totals};
use roundlog_trend::{Metric, daily_series_where, fit_trend, trajectory};

fn within_lookback(rounds: &[Round], now: DateTime<Utc>, days: i64) -> Vec<Round> {
    let since = now - Duration::days(days);
    rounds
        .iter()
        .filter(|r| r.end_time >= since)
        .cloned()
        .collect()
}

/// Fit one metric over the trend lookback. Rates use only samples inside the
/// window that `keep` accepts.
fn metric_fit(
    rounds: &[Round],
    samples: &[Sample],
    metric: Metric,
    now: DateTime<Utc>,
    config: &TrendConfig,
    keep: impl Fn(&Sample) -> bool,
) -> TrendFit {
    let since = now - Duration::days(config.lookback_days);
    let recent = within_lookback(rounds, now, config.lookback_days);
    let series = daily_series_where(&recent, samples, metric, |s| s.timestamp >= since && keep(s));
    fit_trend(&series, config)
}

pub fn overall(
    rounds: &[Round],
    samples: &[Sample],
    now: DateTime<Utc>,
    config: &TrendConfig,
) -> OverallProgression {
    let fit = |metric| metric_fit(rounds, samples, metric, now, config, |_| true);
    OverallProgression {
        rounds: rounds.len(),
        rates: rate_summary(samples),
        kd_ratio: kd_ratio(rounds),
        kill_rate_trend: fit(Metric::KillRate),
        kd_trend: fit(Metric::KdRatio),
        score_rate_trend: fit(Metric::ScoreRate),
    }
}

/// Maps ordered by rounds played, then name. Kill rates come from sample
/// pairs that stay on one map.
pub fn per_map(
    rounds: &[Round],
    samples: &[Sample],
    now: DateTime<Utc>,
    config: &TrendConfig,
) -> Vec<MapProgression> {
    let rates = rates_by(samples, |s| Some(s.map_name.clone()));
    rounds
        .iter()
        .cloned()
        .into_group_map_by(|r| r.map_name.clone())
        .into_iter()
        .map(|(map_name, rounds)| {
            let kill_rate_trend = metric_fit(&rounds, samples, Metric::KillRate, now, config, |s| {
                s.map_name == map_name
            });
            MapProgression {
                rounds: rounds.len(),
                play_time_minutes: round_totals(&rounds).minutes,
                kill_rate: rates.get(&map_name).map_or(0.0, |acc| acc.kill_rate()),
                kd_ratio: kd_ratio(&rounds),
                kill_rate_trend,
                map_name,
            }
        })
        .sorted_by(|a, b| b.rounds.cmp(&a.rounds).then_with(|| a.map_name.cmp(&b.map_name)))
        .collect()
}

/// Trajectory over the metric fits that had enough points.
pub fn player_trajectory(
    rounds: &[Round],
    samples: &[Sample],
    now: DateTime<Utc>,
    config: &TrendConfig,
) -> Trajectory {
    let fits: Vec<TrendFit> = [Metric::KillRate, Metric::KdRatio, Metric::ScoreRate]
        .into_iter()
        .map(|m| metric_fit(rounds, samples, m, now, config, |_| true))
        .filter(|f| f.points_used >= config.min_points)
        .collect();
    trajectory(&fits)
}

pub fn recent_activity(rounds: &[Round], now: DateTime<Utc>, days: i64) -> RecentActivity {
    let recent = within_lookback(rounds, now, days);
    let totals = round_totals(&recent);
    RecentActivity {
        window_days: days,
        rounds: recent.len(),
        play_time_minutes: totals.minutes,
        kills: totals.kills,
        deaths: totals.deaths,
        servers: recent
            .iter()
            .map(|r| r.server_id.clone())
            .sorted()
            .dedup()
            .collect(),
        last_seen: rounds.iter().map(|r| r.end_time).max(),
    }
}

/// Compare `player` with everyone in `population` (which should include
/// their samples), by delta-based kill rate.
pub fn comparative(player: &str, population: &[Sample]) -> Result<ComparativeMetrics> {
    let rates = kill_rate_by_player(population);
    let Some(&player_kill_rate) = rates.get(player) else {
        return Err(RoundlogError::InsufficientData {
            needed: 1,
            found: 0,
        }
        .into());
    };
    let distribution: Distribution = rates.values().copied().collect();
    Ok(ComparativeMetrics {
        player_kill_rate,
        population_median_kill_rate: distribution.median().unwrap_or(0.0),
        kill_rate_percentile: distribution.percentile_rank(player_kill_rate).unwrap_or(0.0),
        players_compared: distribution.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use roundlog_schema::analytics::TrendDirection;
    use roundlog_testkit::fixtures::{at, day, round, round_samples, sample};

    fn improving_rounds() -> Vec<Round> {
        (0..5)
            .map(|d| {
                let start = day(d);
                round("alice", "eu-1", "dust", start, start + Duration::minutes(10), 5 + 5 * d, 5)
            })
            .collect()
    }

    fn samples_of(rounds: &[Round]) -> Vec<Sample> {
        rounds.iter().flat_map(round_samples).collect()
    }

    /// Ten kills over ten minutes on dust, then a lone ten-kill sample on
    /// nuke half an hour later.
    fn lone_sample_on_new_map() -> (Vec<Round>, Vec<Sample>) {
        let samples = vec![
            sample("alice", "eu-1", "dust", at(0), 0, 0),
            sample("alice", "eu-1", "dust", at(10), 10, 0),
            sample("alice", "eu-1", "nuke", at(40), 10, 0),
        ];
        let mut nuke = round("alice", "eu-1", "nuke", at(40), at(40), 10, 0);
        nuke.sample_count = 1;
        let rounds = vec![round("alice", "eu-1", "dust", at(0), at(10), 10, 0), nuke];
        (rounds, samples)
    }

    #[test]
    fn per_map_orders_by_rounds() {
        let rounds = vec![
            round("alice", "eu-1", "nuke", at(0), at(10), 1, 1),
            round("alice", "eu-1", "dust", at(20), at(30), 1, 1),
            round("alice", "eu-1", "dust", at(40), at(50), 1, 1),
        ];
        let maps = per_map(&rounds, &samples_of(&rounds), at(60), &TrendConfig::default());
        let names: Vec<&str> = maps.iter().map(|m| m.map_name.as_str()).collect();
        assert_eq!(names, vec!["dust", "nuke"]);
        assert_eq!(maps[0].play_time_minutes, 20.0);
        assert_eq!(maps[0].kill_rate, 0.1);
    }

    #[test]
    fn kill_rates_agree_with_sample_deltas() {
        let (rounds, samples) = lone_sample_on_new_map();
        let delta_rate = rate_summary(&samples).kill_rate;
        assert_eq!(delta_rate, 0.25);

        let report = overall(&rounds, &samples, at(60), &TrendConfig::default());
        assert_eq!(report.rates.kill_rate, delta_rate);

        let c = comparative("alice", &samples).unwrap();
        assert_eq!(c.player_kill_rate, delta_rate);

        let maps = per_map(&rounds, &samples, at(60), &TrendConfig::default());
        let nuke = maps.iter().find(|m| m.map_name == "nuke").unwrap();
        let dust = maps.iter().find(|m| m.map_name == "dust").unwrap();
        assert_eq!(nuke.kill_rate, 0.0);
        assert_eq!(dust.kill_rate, 1.0);
    }

    #[test]
    fn improving_player_has_improving_trajectory() {
        let rounds = improving_rounds();
        let t = player_trajectory(&rounds, &samples_of(&rounds), day(5), &TrendConfig::default());
        assert_eq!(t.direction, TrendDirection::StronglyImproving);
        assert_eq!(t.metrics, 3);
        assert!(t.confidence > 0.9);
    }

    #[test]
    fn trajectory_without_samples_uses_kd_only() {
        let rounds = improving_rounds();
        let t = player_trajectory(&rounds, &[], day(5), &TrendConfig::default());
        assert_eq!(t.metrics, 1);
        assert_eq!(t.direction, TrendDirection::Stable);
    }

    #[test]
    fn recent_activity_respects_window() {
        let rounds = improving_rounds();
        let recent = recent_activity(&rounds, day(5), 2);
        assert_eq!(recent.rounds, 2);
        assert_eq!(recent.servers, vec!["eu-1".to_string()]);
        assert_eq!(recent.last_seen, Some(day(4) + Duration::minutes(10)));
    }

    #[test]
    fn comparative_ranks_against_population() {
        let population = vec![
            round("alice", "eu-1", "dust", at(0), at(10), 20, 1),
            round("bob", "eu-1", "dust", at(0), at(10), 10, 1),
            round("carol", "eu-1", "dust", at(0), at(10), 30, 1),
        ];
        let c = comparative("alice", &samples_of(&population)).unwrap();
        assert_eq!(c.player_kill_rate, 2.0);
        assert_eq!(c.population_median_kill_rate, 2.0);
        assert!((c.kill_rate_percentile - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(c.players_compared, 3);
    }

    #[test]
    fn comparative_without_pairs_is_insufficient() {
        let lone = [sample("dave", "eu-1", "dust", at(0), 4, 0)];
        let err = comparative("dave", &lone).unwrap_err();
        assert_eq!(
            roundlog_error::categorize(&err),
            roundlog_error::ErrorCategory::InsufficientData
        );
    }
}
