//! Trend fits over daily performance series.
//!
//! A series is fitted with ordinary least squares, using the position in the
//! series as x. Series shorter than `min_points` yield a `Stable` sentinel
//! with zero slope and R², never an error.

use chrono::NaiveDate;
use itertools::Itertools;
use roundlog_config::TrendConfig;
use roundlog_schema::analytics::{Trajectory, TrendDirection, TrendFit};
use roundlog_schema::bucket::TrendPoint;
use roundlog_schema::round::Round;
use roundlog_schema::sample::Sample;
use roundlog_stats::{kd_ratio, rates_by};
use serde::{Deserialize, Serialize};

/// Per-day performance metric.
///
/// Kill and score rates come from consecutive-sample deltas within the day;
/// K/D comes from the finals of rounds started that day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    KillRate,
    KdRatio,
    ScoreRate,
}

/// One point per calendar day, ordered by date.
pub fn daily_series(rounds: &[Round], samples: &[Sample], metric: Metric) -> Vec<TrendPoint> {
    daily_series_where(rounds, samples, metric, |_| true)
}

/// [`daily_series`] over the samples `keep` accepts. A delta pair with a
/// rejected sample on either side is not counted.
pub fn daily_series_where<F>(
    rounds: &[Round],
    samples: &[Sample],
    metric: Metric,
    keep: F,
) -> Vec<TrendPoint>
where
    F: Fn(&Sample) -> bool,
{
    let day_of = |s: &Sample| keep(s).then(|| s.timestamp.date_naive());
    match metric {
        Metric::KdRatio => rounds
            .iter()
            .cloned()
            .into_group_map_by(|r| r.start_time.date_naive())
            .into_iter()
            .sorted_by_key(|(date, _)| *date)
            .map(|(date, day): (NaiveDate, Vec<Round>)| TrendPoint {
                date,
                value: kd_ratio(&day),
                sample_size: day.len(),
            })
            .collect(),
        Metric::KillRate | Metric::ScoreRate => rates_by(samples, day_of)
            .into_iter()
            .map(|(date, acc)| {
                let summary = acc.summary();
                TrendPoint {
                    date,
                    value: if metric == Metric::KillRate {
                        summary.kill_rate
                    } else {
                        summary.score_rate
                    },
                    sample_size: acc.pairs(),
                }
            })
            .collect(),
    }
}

pub fn classify_slope(slope: f64, config: &TrendConfig) -> TrendDirection {
    if slope > config.strong_slope {
        TrendDirection::StronglyImproving
    } else if slope > config.mild_slope {
        TrendDirection::Improving
    } else if slope < -config.strong_slope {
        TrendDirection::StronglyDeclining
    } else if slope < -config.mild_slope {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    }
}

/// Ordinary least-squares fit of `value` against the point's position.
///
/// Points below `min_samples_per_day` are dropped first. R² is clamped at 0
/// and is 0 for a flat series.
pub fn fit_trend(points: &[TrendPoint], config: &TrendConfig) -> TrendFit {
    let ys: Vec<f64> = points
        .iter()
        .sorted_by_key(|p| p.date)
        .filter(|p| p.sample_size >= config.min_samples_per_day && p.value.is_finite())
        .map(|p| p.value)
        .collect();
    let n = ys.len();
    if n < config.min_points.max(2) {
        return TrendFit::insufficient(n);
    }

    let nf = n as f64;
    let mean_x = (nf - 1.0) / 2.0;
    let mean_y = ys.iter().sum::<f64>() / nf;
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (i, y) in ys.iter().enumerate() {
        let dx = i as f64 - mean_x;
        sxy += dx * (y - mean_y);
        sxx += dx * dx;
    }
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    let intercept = mean_y - slope * mean_x;

    let ss_tot: f64 = ys.iter().map(|y| (y - mean_y).powi(2)).sum();
    let ss_res: f64 = ys
        .iter()
        .enumerate()
        .map(|(i, y)| (y - (intercept + slope * i as f64)).powi(2))
        .sum();
    let r_squared = if ss_tot > 0.0 {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    } else {
        0.0
    };

    TrendFit {
        direction: classify_slope(slope, config),
        slope,
        intercept,
        r_squared,
        points_used: n,
    }
}

/// Combine metric fits into one direction.
///
/// Two or more strong fits one way win outright; otherwise the side with more
/// leaning fits wins, and a tie is `Stable`. Confidence is the mean R².
pub fn trajectory(fits: &[TrendFit]) -> Trajectory {
    if fits.len() < 2 {
        return Trajectory {
            direction: TrendDirection::Stable,
            confidence: 0.0,
            metrics: fits.len(),
        };
    }
    let count = |pred: fn(&TrendDirection) -> bool| {
        fits.iter().filter(|f| pred(&f.direction)).count()
    };
    let strong_up = count(|d| *d == TrendDirection::StronglyImproving);
    let strong_down = count(|d| *d == TrendDirection::StronglyDeclining);
    let up = count(TrendDirection::is_improving);
    let down = count(TrendDirection::is_declining);

    let direction = if strong_up >= 2 && strong_up >= strong_down {
        TrendDirection::StronglyImproving
    } else if strong_down >= 2 {
        TrendDirection::StronglyDeclining
    } else if up > down {
        TrendDirection::Improving
    } else if down > up {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    };
    Trajectory {
        direction,
        confidence: fits.iter().map(|f| f.r_squared).sum::<f64>() / fits.len() as f64,
        metrics: fits.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn series(values: &[f64]) -> Vec<TrendPoint> {
        let start = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| TrendPoint {
                date: start + Duration::days(i as i64),
                value: *v,
                sample_size: 1,
            })
            .collect()
    }

    fn fit(direction: TrendDirection, r_squared: f64) -> TrendFit {
        TrendFit {
            direction,
            slope: 0.0,
            intercept: 0.0,
            r_squared,
            points_used: 5,
        }
    }

    #[test]
    fn slope_buckets() {
        let c = TrendConfig::default();
        assert_eq!(classify_slope(0.2, &c), TrendDirection::StronglyImproving);
        assert_eq!(classify_slope(0.05, &c), TrendDirection::Improving);
        assert_eq!(classify_slope(0.02, &c), TrendDirection::Stable);
        assert_eq!(classify_slope(-0.05, &c), TrendDirection::Declining);
        assert_eq!(classify_slope(-0.2, &c), TrendDirection::StronglyDeclining);
    }

    #[test]
    fn perfect_line_has_full_confidence() {
        let f = fit_trend(&series(&[1.0, 1.5, 2.0, 2.5]), &TrendConfig::default());
        assert!((f.slope - 0.5).abs() < 1e-12);
        assert!((f.intercept - 1.0).abs() < 1e-12);
        assert!((f.r_squared - 1.0).abs() < 1e-12);
        assert_eq!(f.direction, TrendDirection::StronglyImproving);
    }

    #[test]
    fn short_series_is_insufficient() {
        let f = fit_trend(&series(&[1.0, 9.0]), &TrendConfig::default());
        assert_eq!(f, TrendFit::insufficient(2));
    }

    #[test]
    fn thin_days_are_dropped_before_fitting() {
        let mut points = series(&[1.0, 2.0, 3.0, 4.0]);
        points[3].sample_size = 0;
        let config = TrendConfig {
            min_samples_per_day: 1,
            ..TrendConfig::default()
        };
        assert_eq!(fit_trend(&points, &config).points_used, 3);
    }

    #[test]
    fn two_strong_fits_win() {
        let t = trajectory(&[
            fit(TrendDirection::StronglyDeclining, 0.9),
            fit(TrendDirection::StronglyDeclining, 0.5),
            fit(TrendDirection::Improving, 0.1),
        ]);
        assert_eq!(t.direction, TrendDirection::StronglyDeclining);
        assert!((t.confidence - 0.5).abs() < 1e-12);
    }

    #[test]
    fn majority_lean_wins_and_tie_is_stable() {
        let lean = trajectory(&[
            fit(TrendDirection::Improving, 0.2),
            fit(TrendDirection::StronglyImproving, 0.2),
            fit(TrendDirection::Declining, 0.2),
        ]);
        assert_eq!(lean.direction, TrendDirection::Improving);

        let tie = trajectory(&[
            fit(TrendDirection::Improving, 0.2),
            fit(TrendDirection::Declining, 0.2),
        ]);
        assert_eq!(tie.direction, TrendDirection::Stable);
    }

    #[test]
    fn single_fit_has_no_confidence() {
        let t = trajectory(&[fit(TrendDirection::StronglyImproving, 1.0)]);
        assert_eq!(t.direction, TrendDirection::Stable);
        assert_eq!(t.confidence, 0.0);
    }
}
