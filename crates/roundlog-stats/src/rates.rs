use itertools::Itertools;
use roundlog_schema::analytics::RateSummary;
use roundlog_schema::round::Round;
use roundlog_schema::sample::Sample;
use roundlog_segment::chronological;
use std::collections::BTreeMap;

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Sums of valid consecutive-sample deltas.
///
/// A pair counts only when time moved forward and kills did not drop; a kill
/// drop is a round reset, not negative progress. Death and score deltas of a
/// valid pair are floored at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KillRateAccumulator {
    kills: i64,
    deaths: i64,
    score: i64,
    minutes: f64,
    pairs: usize,
}

impl KillRateAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one pair of consecutive samples. Returns whether it counted.
    pub fn push_pair(&mut self, prev: &Sample, next: &Sample) -> bool {
        let minutes = (next.timestamp - prev.timestamp).num_milliseconds() as f64 / 60_000.0;
        let kills = next.kills - prev.kills;
        if minutes <= 0.0 || kills < 0 {
            return false;
        }
        self.kills += kills;
        self.deaths += (next.deaths - prev.deaths).max(0);
        self.score += (next.score - prev.score).max(0);
        self.minutes += minutes;
        self.pairs += 1;
        true
    }

    /// Add every consecutive pair of one partition's samples.
    pub fn add_partition(&mut self, samples: &[Sample]) {
        let ordered: Vec<&Sample> = samples.iter().sorted_by(|a, b| chronological(a, b)).collect();
        for (prev, next) in ordered.iter().tuple_windows() {
            self.push_pair(prev, next);
        }
    }

    pub fn merge(&mut self, other: &KillRateAccumulator) {
        self.kills += other.kills;
        self.deaths += other.deaths;
        self.score += other.score;
        self.minutes += other.minutes;
        self.pairs += other.pairs;
    }

    pub fn pairs(&self) -> usize {
        self.pairs
    }

    pub fn kill_rate(&self) -> f64 {
        ratio(self.kills as f64, self.minutes)
    }

    pub fn summary(&self) -> RateSummary {
        RateSummary {
            kills: self.kills,
            deaths: self.deaths,
            score: self.score,
            minutes: self.minutes,
            kill_rate: self.kill_rate(),
            death_rate: ratio(self.deaths as f64, self.minutes),
            score_rate: ratio(self.score as f64, self.minutes),
        }
    }
}

/// Delta-based accumulators keyed by `key`.
///
/// Pairs are walked per partition in time order. A pair counts toward a key
/// only when both samples map to that same key; samples keyed `None` break
/// the chain on either side.
pub fn rates_by<K, F>(samples: &[Sample], key: F) -> BTreeMap<K, KillRateAccumulator>
where
    K: Ord,
    F: Fn(&Sample) -> Option<K>,
{
    let mut out: BTreeMap<K, KillRateAccumulator> = BTreeMap::new();
    let partitions = samples.iter().into_group_map_by(|s| s.partition_key());
    for partition in partitions.values() {
        let ordered = partition.iter().sorted_by(|a, b| chronological(a, b));
        for (prev, next) in ordered.tuple_windows() {
            let (Some(k), Some(k_next)) = (key(prev), key(next)) else {
                continue;
            };
            if k != k_next {
                continue;
            }
            let mut pair = KillRateAccumulator::new();
            if pair.push_pair(prev, next) {
                out.entry(k).or_default().merge(&pair);
            }
        }
    }
    out
}

/// Delta-based rates over samples from any number of partitions.
pub fn rate_summary(samples: &[Sample]) -> RateSummary {
    rates_by(samples, |_| Some(()))
        .remove(&())
        .unwrap_or_default()
        .summary()
}

/// Delta-based kill rate per player; players without a counted pair are
/// left out.
pub fn kill_rate_by_player(samples: &[Sample]) -> BTreeMap<String, f64> {
    rates_by(samples, |s| Some(s.player_name.clone()))
        .into_iter()
        .map(|(player, acc)| (player, acc.kill_rate()))
        .collect()
}

/// Summed finals and play time of finalized rounds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RoundTotals {
    pub kills: i64,
    pub deaths: i64,
    pub score: i64,
    pub minutes: f64,
}

pub fn round_totals(rounds: &[Round]) -> RoundTotals {
    rounds.iter().fold(RoundTotals::default(), |t, r| RoundTotals {
        kills: t.kills + r.final_kills,
        deaths: t.deaths + r.final_deaths,
        score: t.score + r.final_score,
        minutes: t.minutes + r.play_time_minutes,
    })
}

/// `sum(final_kills) / sum(final_deaths)`, 0 without deaths.
pub fn kd_ratio(rounds: &[Round]) -> f64 {
    let totals = round_totals(rounds);
    ratio(totals.kills as f64, totals.deaths as f64)
}
